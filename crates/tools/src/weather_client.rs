//! National-Weather-Service-style REST client.
//!
//! Alerts come from `/alerts/active?area=<region>`. Forecasts are a two-step
//! fetch: `/points/<lat>,<lon>` yields the gridpoint forecast URL, which is
//! then fetched for the periods. Responses are capped at ingestion: 5 alerts
//! (description ≤ 500 chars, instruction ≤ 300) and 7 forecast periods.

use async_trait::async_trait;
use serde::Deserialize;
use snowdesk_core::error::WeatherError;
use snowdesk_core::weather::{ForecastPeriod, WeatherAlert, WeatherService};
use tracing::debug;

const MAX_ALERTS: usize = 5;
const MAX_ALERT_DESCRIPTION: usize = 500;
const MAX_ALERT_INSTRUCTION: usize = 300;
const MAX_FORECAST_PERIODS: usize = 7;

pub struct NwsWeatherClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AlertsResponse {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    #[serde(default)]
    properties: AlertProperties,
}

#[derive(Debug, Default, Deserialize)]
struct AlertProperties {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<PeriodData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    temperature: Option<i32>,
    #[serde(default)]
    temperature_unit: Option<String>,
    #[serde(default)]
    short_forecast: Option<String>,
    #[serde(default)]
    detailed_forecast: Option<String>,
}

/// Truncate on a character boundary, not a byte boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

impl NwsWeatherClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.into())
            .build()
            .map_err(|e| WeatherError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::ApiError {
                status_code: status.as_u16(),
                message: format!("GET {url}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e| WeatherError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl WeatherService for NwsWeatherClient {
    async fn alerts(&self, region: &str) -> Result<Vec<WeatherAlert>, WeatherError> {
        let url = format!("{}/alerts/active?area={region}", self.base_url);
        debug!(region, "Fetching active weather alerts");
        let body: AlertsResponse = self.get_json(&url).await?;

        Ok(body
            .features
            .into_iter()
            .take(MAX_ALERTS)
            .map(|feature| {
                let props = feature.properties;
                WeatherAlert {
                    event: props.event.unwrap_or_else(|| "Unknown Event".into()),
                    severity: props.severity.unwrap_or_else(|| "Unknown".into()),
                    description: truncate_chars(
                        &props.description.unwrap_or_default(),
                        MAX_ALERT_DESCRIPTION,
                    ),
                    instruction: truncate_chars(
                        &props.instruction.unwrap_or_default(),
                        MAX_ALERT_INSTRUCTION,
                    ),
                }
            })
            .collect())
    }

    async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<ForecastPeriod>, WeatherError> {
        let points_url = format!("{}/points/{latitude},{longitude}", self.base_url);
        debug!(latitude, longitude, "Resolving forecast gridpoint");
        let points: PointsResponse = self.get_json(&points_url).await?;

        let forecast: ForecastResponse = self.get_json(&points.properties.forecast).await?;

        Ok(forecast
            .properties
            .periods
            .into_iter()
            .take(MAX_FORECAST_PERIODS)
            .map(|period| ForecastPeriod {
                period_name: period.name.unwrap_or_default(),
                temperature: period.temperature.unwrap_or(0),
                temperature_unit: period.temperature_unit.unwrap_or_else(|| "F".into()),
                short_forecast: period.short_forecast.unwrap_or_default(),
                detailed_forecast: period.detailed_forecast.unwrap_or_default(),
            })
            .collect())
    }
}
