//! Fixed encoding profiles, one per attempt.
//!
//! Each step up the table trades more quality for a smaller file: higher
//! CRF, lower frame rate, lower bitrate.

/// Highest attempt index in the table.
pub const LAST_ATTEMPT: usize = 3;

/// Number of profiles, and so the most attempts a run can make.
pub const ATTEMPT_COUNT: usize = LAST_ATTEMPT + 1;

/// Acceptance threshold shrinks by this fraction of the original per attempt.
pub const THRESHOLD_STEP: f64 = 0.05;

// (crf, frame rate, bitrate kbps)
const PROFILES: [(u32, u32, u32); ATTEMPT_COUNT] = [
    (28, 60, 500),
    (34, 50, 400),
    (38, 40, 300),
    (42, 30, 150),
];

const _: () = assert!(ATTEMPT_COUNT > 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingAttempt {
    pub index: usize,
    pub crf: u32,
    pub frame_rate: u32,
    pub bitrate_kbps: u32,
}

impl EncodingAttempt {
    /// Profile for `index`, or `None` past the end of the table.
    pub fn for_index(index: usize) -> Option<Self> {
        let (crf, frame_rate, bitrate_kbps) = *PROFILES.get(index)?;
        Some(Self {
            index,
            crf,
            frame_rate,
            bitrate_kbps,
        })
    }

    pub fn first() -> Self {
        match Self::for_index(0) {
            Some(first) => first,
            None => unreachable!("profile table is never empty"),
        }
    }

    /// The next, more aggressive profile.
    pub fn escalate(&self) -> Option<Self> {
        Self::for_index(self.index + 1)
    }

    /// Largest size (MB) this attempt's result may have and still be accepted.
    pub fn acceptance_threshold(&self, original_mb: f64) -> f64 {
        original_mb * (1.0 - THRESHOLD_STEP * self.index as f64)
    }
}
