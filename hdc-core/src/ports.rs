//! Traits describing the council API and shared helper types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde_json::Error as JsonError;

use crate::model::{BinCollection, Uprn};

/// Status reported for a UPRN outside the district or unknown to the council.
pub const STATUS_INVALID_UPRN: &str = "invalid_uprn";
/// Prefix of every status describing a failure to reach the council.
pub const STATUS_CONNECTION_ERROR: &str = "connection_error";
/// Status reported for a UPRN the council recognises.
pub const STATUS_VALID_UPRN: &str = "valid_uprn";

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the council backend.
pub enum ApiError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] JsonError),
    /// Internal client error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of asking the council whether a UPRN is serviceable.
pub struct UprnVerification {
    /// Whether the council accepted the UPRN.
    pub is_valid: bool,
    /// Machine-readable status, e.g. [`STATUS_INVALID_UPRN`].
    pub status: String,
}

impl UprnVerification {
    /// Verification for an accepted UPRN.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            status: STATUS_VALID_UPRN.to_owned(),
        }
    }

    /// Verification for a rejected UPRN.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            status: STATUS_INVALID_UPRN.to_owned(),
        }
    }

    /// Verification that could not reach the council; `kind` is appended to the status.
    #[must_use]
    pub fn connection_error(kind: &str) -> Self {
        Self {
            is_valid: false,
            status: format!("{STATUS_CONNECTION_ERROR}_{kind}"),
        }
    }
}

#[async_trait]
/// Trait for the council's bin collection backend.
pub trait BinCollectionPort: Send + Sync {
    /// Check whether the council serves the given property.
    ///
    /// Connection problems are reported through the returned status rather than as errors.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] for failures that are not connection problems.
    async fn verify_uprn(&self, uprn: Uprn) -> Result<UprnVerification, ApiError>;

    /// Fetch the next collection for every bin at the property.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails or the response cannot be decoded.
    async fn collect(&self, uprn: Uprn) -> Result<Vec<BinCollection>, ApiError>;
}
