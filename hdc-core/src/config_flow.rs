//! Config flow: validates a user-supplied UPRN against the council before creating an entry.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{error, warn};

use crate::integration::REFRESH_TIMEOUT;
use crate::model::{ConfigEntry, EntryData, entry_title, unique_id_for};
use crate::ports::{BinCollectionPort, STATUS_CONNECTION_ERROR, STATUS_INVALID_UPRN};

/// Step id of the only form the flow shows.
pub const STEP_USER: &str = "user";
/// Form field holding the UPRN.
pub const FIELD_UPRN: &str = "uprn";
/// Key under which form-wide errors are reported.
pub const ERROR_BASE: &str = "base";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a UPRN cannot be configured.
pub enum FlowError {
    /// The council does not recognise the UPRN.
    #[error("UPRN is invalid or not within the Harborough district")]
    InvalidIdentifier,
    /// The council could not be reached.
    #[error("Cannot connect to the council")]
    ConnectionFailure,
    /// Anything else.
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl FlowError {
    /// Translation key shown on the form.
    #[must_use]
    pub fn form_error(&self) -> &'static str {
        match self {
            FlowError::InvalidIdentifier => "invalid_auth",
            FlowError::ConnectionFailure => "cannot_connect",
            FlowError::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Details of a validated entry.
pub struct EntryInfo {
    /// Title for the new entry.
    pub title: String,
}

/// Verify `data.uprn` with the council, once, within `timeout`.
///
/// # Errors
///
/// Returns [`FlowError::InvalidIdentifier`] for an unknown UPRN,
/// [`FlowError::ConnectionFailure`] when the council is unreachable or too slow,
/// and [`FlowError::Unknown`] for every other outcome.
pub async fn validate_input(
    port: &dyn BinCollectionPort,
    data: EntryData,
    timeout: Duration,
) -> Result<EntryInfo, FlowError> {
    let verification = time::timeout(timeout, port.verify_uprn(data.uprn))
        .await
        .map_err(|_elapsed| FlowError::ConnectionFailure)?
        .map_err(|err| FlowError::Unknown(err.to_string()))?;

    if verification.status == STATUS_INVALID_UPRN {
        return Err(FlowError::InvalidIdentifier);
    }
    if verification.status.starts_with(STATUS_CONNECTION_ERROR) {
        return Err(FlowError::ConnectionFailure);
    }
    if verification.is_valid {
        return Ok(EntryInfo {
            title: entry_title(data.uprn),
        });
    }

    Err(FlowError::Unknown(format!(
        "unrecognised verification status {:?}",
        verification.status
    )))
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the host should do after a flow step.
pub enum FlowResult {
    /// Show (or re-show) a form.
    Form {
        /// Step the form belongs to.
        step_id: &'static str,
        /// Errors keyed by field, or [`ERROR_BASE`] for form-wide errors.
        errors: BTreeMap<&'static str, &'static str>,
    },
    /// Persist and set up a new entry.
    CreateEntry(ConfigEntry),
    /// Stop the flow.
    Abort {
        /// Translation key describing why.
        reason: &'static str,
    },
}

/// User-initiated flow adding a single UPRN.
pub struct ConfigFlow {
    port: Arc<dyn BinCollectionPort>,
    configured: HashSet<String>,
    unique_id: Option<String>,
    timeout: Duration,
}

impl ConfigFlow {
    /// Start a flow aware of the entries already configured.
    #[must_use]
    pub fn new<'entry, I>(port: Arc<dyn BinCollectionPort>, configured: I) -> Self
    where
        I: IntoIterator<Item = &'entry ConfigEntry>,
    {
        Self {
            port,
            configured: configured
                .into_iter()
                .map(|entry| entry.unique_id.clone())
                .collect(),
            unique_id: None,
            timeout: REFRESH_TIMEOUT,
        }
    }

    /// Override the verification deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Unique id claimed by the last submitted input.
    #[must_use]
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Handle the user step. `None` means the form has not been submitted yet.
    pub async fn step_user(&mut self, user_input: Option<EntryData>) -> FlowResult {
        let mut errors = BTreeMap::new();

        if let Some(data) = user_input {
            let unique_id = unique_id_for(data.uprn);
            let already_configured = self.configured.contains(&unique_id);
            self.unique_id = Some(unique_id);
            if already_configured {
                return FlowResult::Abort {
                    reason: "already_configured",
                };
            }

            match validate_input(self.port.as_ref(), data, self.timeout).await {
                Ok(info) => return FlowResult::CreateEntry(ConfigEntry::new(info.title, data)),
                Err(err) => {
                    match &err {
                        FlowError::InvalidIdentifier => error!(
                            uprn = %data.uprn,
                            "UPRN is either invalid or not within the Harborough district"
                        ),
                        FlowError::ConnectionFailure => {
                            warn!(uprn = %data.uprn, "Cannot connect to the council");
                        }
                        FlowError::Unknown(message) => {
                            error!(uprn = %data.uprn, error = %message, "Unexpected exception");
                        }
                    }
                    errors.insert(ERROR_BASE, err.form_error());
                }
            }
        }

        FlowResult::Form {
            step_id: STEP_USER,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::model::{BinCollection, Uprn};
    use crate::ports::{ApiError, UprnVerification};

    struct Verifier(Result<UprnVerification, String>);

    #[async_trait]
    impl BinCollectionPort for Verifier {
        async fn verify_uprn(&self, _uprn: Uprn) -> Result<UprnVerification, ApiError> {
            self.0.clone().map_err(ApiError::Internal)
        }

        async fn collect(&self, _uprn: Uprn) -> Result<Vec<BinCollection>, ApiError> {
            Ok(Vec::new())
        }
    }

    struct Stalled;

    #[async_trait]
    impl BinCollectionPort for Stalled {
        async fn verify_uprn(&self, _uprn: Uprn) -> Result<UprnVerification, ApiError> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(UprnVerification::valid())
        }

        async fn collect(&self, _uprn: Uprn) -> Result<Vec<BinCollection>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn flow(outcome: Result<UprnVerification, String>) -> ConfigFlow {
        ConfigFlow::new(Arc::new(Verifier(outcome)), &[])
    }

    fn input(uprn: u64) -> Option<EntryData> {
        Some(EntryData { uprn: Uprn(uprn) })
    }

    fn form_error(result: &FlowResult) -> Option<&'static str> {
        match result {
            FlowResult::Form { errors, .. } => errors.get(ERROR_BASE).copied(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn initial_step_shows_empty_form() {
        let result = flow(Ok(UprnVerification::valid())).step_user(None).await;

        assert_eq!(
            result,
            FlowResult::Form {
                step_id: STEP_USER,
                errors: BTreeMap::new()
            },
            "empty form"
        );
    }

    #[tokio::test]
    async fn valid_uprn_creates_entry() {
        let mut flow = flow(Ok(UprnVerification::valid()));

        let result = flow.step_user(input(100_030_478_839)).await;

        let FlowResult::CreateEntry(entry) = result else {
            panic!("expected an entry, got {result:?}");
        };
        assert!(entry.title.contains("100030478839"), "title has UPRN");
        assert_eq!(entry.data.uprn, Uprn(100_030_478_839), "entry data");
        assert_eq!(flow.unique_id(), Some("hdc_bins_100030478839"), "unique id");
    }

    #[tokio::test]
    async fn invalid_uprn_shows_invalid_auth() {
        let result = flow(Ok(UprnVerification::invalid()))
            .step_user(input(1))
            .await;

        assert_eq!(form_error(&result), Some("invalid_auth"), "form error");
    }

    #[tokio::test]
    async fn connection_error_statuses_show_cannot_connect() {
        for kind in ["connect", "timeout", "503"] {
            let result = flow(Ok(UprnVerification::connection_error(kind)))
                .step_user(input(1))
                .await;

            assert_eq!(form_error(&result), Some("cannot_connect"), "status {kind}");
        }
    }

    #[tokio::test]
    async fn unrecognised_status_shows_unknown() {
        let rejected = UprnVerification {
            is_valid: false,
            status: "maintenance".to_owned(),
        };
        let result = flow(Ok(rejected)).step_user(input(1)).await;
        assert_eq!(form_error(&result), Some("unknown"), "invalid without status");

        let result = flow(Err("boom".to_owned())).step_user(input(1)).await;
        assert_eq!(form_error(&result), Some("unknown"), "client error");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_verification_shows_cannot_connect() {
        let mut flow = ConfigFlow::new(Arc::new(Stalled), &[]);

        let result = flow.step_user(input(1)).await;

        assert_eq!(form_error(&result), Some("cannot_connect"), "timed out");
    }

    #[tokio::test]
    async fn configured_uprn_aborts() {
        let existing = ConfigEntry::new(entry_title(Uprn(5)), EntryData { uprn: Uprn(5) });
        let mut flow = ConfigFlow::new(
            Arc::new(Verifier(Ok(UprnVerification::valid()))),
            [&existing],
        );

        let result = flow.step_user(input(5)).await;

        assert_eq!(
            result,
            FlowResult::Abort {
                reason: "already_configured"
            },
            "duplicate rejected"
        );
    }
}
