use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, ShrinkError>;

#[derive(Debug, thiserror::Error)]
pub enum ShrinkError {
    #[error("cannot read {}: {source}", path.display())]
    SourceMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is a directory, expected a video file", .0.display())]
    SourceIsDirectory(PathBuf),

    #[error("encoder `{name}` not found in PATH: {source}")]
    EncoderNotFound {
        name: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to spawn encoder: {0}")]
    EncoderSpawn(#[source] io::Error),

    #[error("encoder exited with {status}")]
    EncoderFailed { status: ExitStatus },

    #[error("encoder did not finish within {}s", .0.as_secs())]
    EncoderTimeout(Duration),

    #[error("cannot read compressed output {}: {source}", path.display())]
    OutputUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("compressed file is larger than the original ({final_mb} MB > {original_mb} MB)")]
    LargerOutput { original_mb: f64, final_mb: f64 },

    #[error("interrupted")]
    Interrupted,

    #[error("cannot rename {} to {}: {source}", from.display(), to.display())]
    Swap {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse grouping used for exit codes and for deciding what to clean up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserInput,
    Environment,
    Execution,
    PostCondition,
    Interruption,
}

impl ShrinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShrinkError::SourceMissing { .. } | ShrinkError::SourceIsDirectory(_) => {
                ErrorKind::UserInput
            }
            ShrinkError::EncoderNotFound { .. } => ErrorKind::Environment,
            ShrinkError::EncoderSpawn(_)
            | ShrinkError::EncoderFailed { .. }
            | ShrinkError::EncoderTimeout(_)
            | ShrinkError::OutputUnreadable { .. }
            | ShrinkError::Swap { .. } => ErrorKind::Execution,
            ShrinkError::LargerOutput { .. } => ErrorKind::PostCondition,
            ShrinkError::Interrupted => ErrorKind::Interruption,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::UserInput => 2,
            ErrorKind::Environment => 3,
            ErrorKind::Execution => 4,
            ErrorKind::PostCondition => 5,
            ErrorKind::Interruption => 130,
        }
    }
}
