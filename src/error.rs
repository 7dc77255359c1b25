use thiserror::Error;

use crate::registry::ChainId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed header at height {height:?}: {reason}")]
    MalformedHeader { height: Option<u64>, reason: String },

    #[error("Invalid difficulty encoding {bits:?}: {reason}")]
    InvalidDifficultyEncoding { bits: String, reason: String },

    #[error("Invalid batch range [{start}, {end}): end must be start + 32")]
    InvalidBatchRange { start: i64, end: i64 },

    #[error("Negative block height {0}")]
    NegativeHeight(i64),

    #[error("Batch must hold {expected} headers, got {actual}")]
    BatchSize { expected: usize, actual: usize },

    #[error("Prover failed: {0}")]
    ProverFailure(String),

    #[error("Submission of {chain} batch [{start}, {end}) failed: {reason}")]
    SubmissionFailure {
        chain: ChainId,
        start: u64,
        end: u64,
        reason: String,
    },

    #[error("Registry query failed: {0}")]
    RegistryQuery(String),

    #[error("Header source failed: {0}")]
    HeaderSource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(height: Option<u64>, reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            height,
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_bits(bits: &str, reason: impl Into<String>) -> Self {
        Error::InvalidDifficultyEncoding {
            bits: bits.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
