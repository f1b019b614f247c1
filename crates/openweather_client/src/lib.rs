//! OpenWeather 5-day/3-hour forecast client.
//!
//! Fetches raw forecast payloads for a location. No retries and no filtering
//! here: a transport failure, non-2xx status, or undecodable body is an
//! `Error::Fetch`, and recovery belongs to the next scheduled pass.

pub mod budget;
pub mod rate_limit;

use async_trait::async_trait;
use common::{Error, Location, Result};
use serde::Deserialize;
use tracing::debug;

pub use budget::{Admission, FetchBudget};
pub use rate_limit::RateLimitedFetcher;

// ── Provider response types ───────────────────────────────────────────

/// Raw forecast payload from `/data/2.5/forecast`.
///
/// `cnt` is the provider's authoritative count of entries in `list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub cod: String,
    #[serde(default)]
    pub message: f64,
    #[serde(default)]
    pub cnt: usize,
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
}

/// One three-hour forecast step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastEntry {
    /// Unix timestamp (UTC seconds) of the step.
    #[serde(default)]
    pub dt: i64,
    #[serde(default)]
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<ConditionTag>,
    #[serde(default)]
    pub wind: WindReading,
    #[serde(default)]
    pub rain: Precip3h,
    #[serde(default)]
    pub snow: Precip3h,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MainReadings {
    #[serde(default)]
    pub temp: f64,
    #[serde(default)]
    pub humidity: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionTag {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindReading {
    #[serde(default)]
    pub speed: f64,
}

/// Accumulated precipitation over the three-hour step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Precip3h {
    #[serde(rename = "3h", default)]
    pub volume: f64,
}

// ── Provider seam ─────────────────────────────────────────────────────

/// Anything that can produce a raw forecast payload for a location.
///
/// The scheduler is written against this trait so passes can be exercised
/// without a live provider.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch_forecast(&self, location: &Location) -> Result<ForecastResponse>;
}

// ── Implementation ────────────────────────────────────────────────────

/// HTTP client for the OpenWeather forecast endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    units: String,
    lang: String,
}

impl OpenWeatherClient {
    /// Build a client with a short request timeout.
    ///
    /// The timeout is deliberately tight: a slow provider must not stall a
    /// sync pass for longer than one forecast is worth.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        units: impl Into<String>,
        lang: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            units: units.into(),
            lang: lang.into(),
        })
    }
}

#[async_trait]
impl ForecastProvider for OpenWeatherClient {
    async fn fetch_forecast(&self, location: &Location) -> Result<ForecastResponse> {
        let url = format!("{}/data/2.5/forecast", self.base_url);

        debug!("Fetching forecast for ({}, {})", location.lat, location.lon);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("lat", location.lat.as_str()),
                ("lon", location.lon.as_str()),
                ("units", self.units.as_str()),
                ("lang", self.lang.as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                Error::Fetch(format!(
                    "HTTP error for ({}, {}): {}",
                    location.lat, location.lon, e
                ))
            })?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "provider returned {} for ({}, {}): {}",
                status,
                location.lat,
                location.lon,
                &body[..body.len().min(500)]
            )));
        }

        let data: ForecastResponse = resp.json().await.map_err(|e| {
            Error::Fetch(format!(
                "JSON parse error for ({}, {}): {}",
                location.lat, location.lon, e
            ))
        })?;

        debug!(
            "Got {} forecast steps for ({}, {})",
            data.cnt, location.lat, location.lon
        );

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "cod": "200",
            "message": 0.0,
            "cnt": 2,
            "list": [
                {
                    "dt": 1_717_232_400i64,
                    "main": { "temp": 18.4, "humidity": 62 },
                    "weather": [{ "description": "light rain" }],
                    "wind": { "speed": 3.2 },
                    "rain": { "3h": 0.4 }
                },
                {
                    "dt": 1_717_243_200i64,
                    "main": { "temp": 21.0, "humidity": 55 },
                    "weather": [{ "description": "clear sky" }],
                    "wind": { "speed": 2.1 }
                }
            ]
        })
    }

    async fn client_for(server: &MockServer) -> OpenWeatherClient {
        OpenWeatherClient::new(
            server.uri(),
            "test-key",
            "metric",
            "en",
            Duration::from_secs(2),
        )
        .expect("client builds")
    }

    #[tokio::test]
    async fn parses_a_successful_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("lat", "45.0"))
            .and(query_param("lon", "15.0"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let payload = client
            .fetch_forecast(&Location::new("45.0", "15.0"))
            .await
            .expect("fetch succeeds");

        assert_eq!(payload.cnt, 2);
        assert_eq!(payload.list.len(), 2);
        assert_eq!(payload.list[0].weather[0].description, "light rain");
        assert_eq!(payload.list[0].rain.volume, 0.4);
        // Absent rain/snow objects default to zero volume.
        assert_eq!(payload.list[1].rain.volume, 0.0);
        assert_eq!(payload.list[1].snow.volume, 0.0);
    }

    #[tokio::test]
    async fn non_2xx_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"cod\":401}"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .fetch_forecast(&Location::new("45.0", "15.0"))
            .await
            .expect_err("401 must fail");
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .fetch_forecast(&Location::new("45.0", "15.0"))
            .await
            .expect_err("garbage body must fail");
        assert!(matches!(err, Error::Fetch(_)));
    }
}
