//! Re-encode a video with progressively harsher settings until it comes out
//! smaller than the original, then swap it into the original's place.

pub mod app;
pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod policy;
pub mod profile;
pub mod report;
pub mod swap;

pub use config::{RunContext, ShrinkConfig};
pub use encoder::{Encoder, FfmpegEncoder};
pub use error::{Result, ShrinkError};
pub use report::{JsonReporter, Reporter, StatusEvent, Summary, TerminalReporter};
