use crate::media::TranscodeError;
use thiserror::Error;

/// Why a job stopped early
#[derive(Debug, Error)]
pub enum JobError {
    /// Input number `index` (1-based) could not be fetched
    #[error("download of input {index} failed: {error:#}")]
    Download { index: usize, error: anyhow::Error },

    #[error("transcoder failed: {0}")]
    Transform(#[from] TranscodeError),

    /// The result was produced but could not be sent back
    #[error("delivery failed: {error:#}")]
    Delivery { error: anyhow::Error },

    #[error("job admission closed")]
    Closed,
}
