//! Integration tests for the council API client using wiremock.

use std::time::Duration;

use chrono::NaiveDate;
use hdc_core::{ApiError, BinCollectionPort, Uprn, UprnVerification};
use hdc_provider_harborough::HarboroughClient;
use reqwest::Client;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UPRN: Uprn = Uprn(100_030_478_839);

fn api(server: &MockServer) -> HarboroughClient {
    HarboroughClient::new(Client::new()).with_base_url(server.uri())
}

mod verify_uprn {
    use super::*;

    #[tokio::test]
    async fn accepted_uprn_is_valid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uprn/100030478839"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "valid": true,
                "address": "1 High Street, Market Harborough"
            })))
            .mount(&server)
            .await;

        let verification = api(&server).verify_uprn(UPRN).await.expect("verification completes");

        assert_eq!(verification, UprnVerification::valid(), "accepted");
    }

    #[tokio::test]
    async fn rejected_uprn_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uprn/100030478839"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "valid": false })),
            )
            .mount(&server)
            .await;

        let verification = api(&server).verify_uprn(UPRN).await.expect("verification completes");

        assert_eq!(verification.status, "invalid_uprn", "status");
        assert!(!verification.is_valid, "rejected");
    }

    #[tokio::test]
    async fn unknown_uprn_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let verification = api(&server).verify_uprn(UPRN).await.expect("verification completes");

        assert_eq!(verification, UprnVerification::invalid(), "unknown to the council");
    }

    #[tokio::test]
    async fn server_error_is_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let verification = api(&server).verify_uprn(UPRN).await.expect("verification completes");

        assert_eq!(verification.status, "connection_error_503", "status carries HTTP code");
    }

    #[tokio::test]
    async fn slow_server_is_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "valid": true }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("client builds");

        let verification = HarboroughClient::new(client)
            .with_base_url(server.uri())
            .verify_uprn(UPRN)
            .await
            .expect("verification completes");

        assert_eq!(verification.status, "connection_error_timeout", "client timeout");
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_error() {
        // nothing listens on the tcpmux port
        let verification = HarboroughClient::new(Client::new())
            .with_base_url("http://127.0.0.1:1")
            .verify_uprn(UPRN)
            .await
            .expect("verification completes");

        assert!(
            verification.status.starts_with("connection_error"),
            "connection status"
        );
        assert!(!verification.is_valid, "not valid");
    }
}

mod collect {
    use super::*;

    #[tokio::test]
    async fn parses_collections() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uprn/100030478839/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "bin_type": "general", "collection_timestamp": "2024-01-01T00:00:00" },
                { "bin_type": "recycling", "collection_timestamp": "2024-01-02T07:30:00" }
            ])))
            .mount(&server)
            .await;

        let records = api(&server).collect(UPRN).await.expect("collections load");

        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).and_then(|date| date.and_hms_opt(7, 30, 0));
        assert_eq!(records.len(), 2, "two records");
        assert_eq!(
            records.first().map(|record| record.bin_type.as_str()),
            Some("general"),
            "order kept"
        );
        assert_eq!(
            records.get(1).map(|record| record.collection_timestamp),
            expected,
            "timestamp with time of day"
        );
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = api(&server).collect(UPRN).await;

        assert!(matches!(result, Err(ApiError::Network(_))), "HTTP status error");
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "bin_type": "general" }])),
            )
            .mount(&server)
            .await;

        let result = api(&server).collect(UPRN).await;

        assert!(matches!(result, Err(ApiError::Decode(_))), "decode error");
    }
}
