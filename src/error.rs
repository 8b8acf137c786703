//! Error taxonomy for broker and AI endpoint exchanges

use thiserror::Error;

/// Broker-reported problem embedded in an otherwise successful response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Session-level `errorCode` with its description
    #[error("{0}")]
    Session(String),

    /// Track-level error on the first track of the batch
    #[error("{0}")]
    Track(String),

    #[error("empty SDP from broker for session")]
    MissingSdp,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Transport-level failure reaching the broker or the AI endpoint
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed JSON where JSON was expected
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl BridgeError {
    pub(crate) fn decode(what: &'static str, source: serde_json::Error) -> Self {
        BridgeError::Decode { what, source }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
