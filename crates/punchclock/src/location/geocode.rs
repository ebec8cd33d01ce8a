//! Reverse geocoding.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{Fix, ReverseGeocoder};

/// Errors from a reverse-geocoding lookup.
///
/// These never leave the resolver; they only decide when the fallback
/// address is used.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The HTTP request failed or its body could not be decoded.
    #[error("reverse geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("reverse geocoding service returned {0}")]
    Status(StatusCode),
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Client for the Nominatim `/reverse` endpoint.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    language: String,
}

impl NominatimGeocoder {
    /// Create a client for the service at `endpoint`.
    ///
    /// `language` is sent as `accept-language`. Nominatim's usage policy
    /// requires an identifying `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        language: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> std::result::Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            language: language.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn display_name(&self, fix: Fix) -> std::result::Result<Option<String>, GeocodeError> {
        let url = format!("{}/reverse", self.endpoint);
        debug!(%url, latitude = fix.latitude, longitude = fix.longitude, "Reverse geocoding");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", fix.latitude.to_string()),
                ("lon", fix.longitude.to_string()),
                ("format", "json".to_string()),
                ("accept-language", self.language.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }

        let body: ReverseResponse = response.json().await?;
        Ok(body.display_name.filter(|name| !name.trim().is_empty()))
    }
}

/// A geocoder that never resolves anything, for offline use.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

#[async_trait::async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn display_name(&self, _fix: Fix) -> std::result::Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::testing::tokyo_station;

    fn geocoder(server: &MockServer) -> NominatimGeocoder {
        NominatimGeocoder::new(
            &server.uri(),
            "ja",
            "punchclock-test/0.1",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_reads_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "35.6812"))
            .and(query_param("lon", "139.7671"))
            .and(query_param("format", "json"))
            .and(query_param("accept-language", "ja"))
            .and(header("user-agent", "punchclock-test/0.1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "place_id": 1,
                    "display_name": "Tokyo Station"
                })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let name = geocoder(&server)
            .display_name(tokyo_station())
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Tokyo Station"));
    }

    #[tokio::test]
    async fn test_missing_display_name_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let name = geocoder(&server)
            .display_name(tokyo_station())
            .await
            .unwrap();
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = geocoder(&server)
            .display_name(tokyo_station())
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::Status(StatusCode::SERVICE_UNAVAILABLE)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = geocoder(&server)
            .display_name(tokyo_station())
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::Request(_)));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "display_name": "late" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let geocoder = NominatimGeocoder::new(
            &server.uri(),
            "ja",
            "punchclock-test/0.1",
            Duration::from_millis(50),
        )
        .unwrap();
        assert!(geocoder.display_name(tokyo_station()).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_geocoder() {
        assert!(DisabledGeocoder
            .display_name(tokyo_station())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let geocoder = NominatimGeocoder::new(
            "https://nominatim.openstreetmap.org/",
            "en",
            "ua",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(geocoder.endpoint, "https://nominatim.openstreetmap.org");
    }
}
