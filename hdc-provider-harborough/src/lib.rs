//! Client for the bin collection API FCC Environment runs for Harborough District Council.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Error as ReqwestError, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use hdc_core::{
    model::{BinCollection, Uprn},
    ports::{ApiError, BinCollectionPort, UprnVerification},
};

/// Production API root.
pub const BASE_URL: &str = "https://harborough.fccenvironment.co.uk/api";

/// Response from /uprn/{uprn}
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    valid: bool,
    // the address fields are not needed
}

/// Council API bound to a shared HTTP client.
pub struct HarboroughClient {
    client: Client,
    base_url: String,
}

impl HarboroughClient {
    /// Create a client talking to [`BASE_URL`].
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_owned(),
        }
    }

    /// Point the client at another API root, e.g. a staging server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// API root in use.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BinCollectionPort for HarboroughClient {
    async fn verify_uprn(&self, uprn: Uprn) -> Result<UprnVerification, ApiError> {
        let response = match self
            .client
            .get(format!("{}/uprn/{uprn}", self.base_url))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Ok(connection_error(uprn, &err)),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(uprn = %uprn, "Council does not know the UPRN");
            return Ok(UprnVerification::invalid());
        }
        if status.is_server_error() {
            warn!(uprn = %uprn, status = %status, "Council API unavailable");
            return Ok(UprnVerification::connection_error(status.as_str()));
        }

        let body = decode_json::<VerifyResponse>(response.error_for_status()?).await?;

        Ok(if body.valid {
            UprnVerification::valid()
        } else {
            UprnVerification::invalid()
        })
    }

    async fn collect(&self, uprn: Uprn) -> Result<Vec<BinCollection>, ApiError> {
        let req = self
            .client
            .get(format!("{}/uprn/{uprn}/collections", self.base_url));
        fetch_json::<Vec<BinCollection>>(req).await
    }
}

/// Build the council API port for the host.
#[must_use]
pub fn port(client: Client, base_url: Option<&str>) -> Arc<dyn BinCollectionPort> {
    let api = HarboroughClient::new(client);
    match base_url {
        Some(base_url) => Arc::new(api.with_base_url(base_url)),
        None => Arc::new(api),
    }
}

/// Map a transport failure to a `connection_error_*` status.
fn connection_error(uprn: Uprn, err: &ReqwestError) -> UprnVerification {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "request"
    };
    warn!(uprn = %uprn, error = %err, kind, "Cannot reach council API");
    UprnVerification::connection_error(kind)
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ApiError> {
    let response = req
        .send()
        .await
        .map_err(ApiError::from)?
        .error_for_status()
        .map_err(ApiError::from)?;
    decode_json(response).await
}

// Body read failures stay network errors; malformed JSON becomes a decode error.
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.bytes().await.map_err(ApiError::from)?;
    serde_json::from_slice(&body).map_err(ApiError::from)
}
