//! Error types for the recalculation toolchain.
//!
//! Configuration and read failures stop a run before any write is issued.
//! Write failures during apply are reported on the `RecalcReport` instead,
//! so the count of committed writes stays visible.

use thiserror::Error;

/// Missing or malformed settings. Always fatal, raised before any store call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Failures surfaced by a tag or work store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{resource} request failed with status {status}: {body}")]
    Status {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Errors that prevent a recalculation or lint report from being produced.
#[derive(Debug, Error)]
pub enum RecalcError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to read {resource}: {source}")]
    StoreRead {
        resource: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("failed to write {resource}: {source}")]
    StoreWrite {
        resource: &'static str,
        #[source]
        source: StoreError,
    },
}

impl RecalcError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::InvalidRequest(_) => 400,
            Self::StoreRead { .. } | Self::StoreWrite { .. } => 502,
        }
    }
}
