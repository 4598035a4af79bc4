//! WeatherService trait: the weather-data boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

/// An active weather alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub event: String,
    pub severity: String,
    pub description: String,
    pub instruction: String,
}

/// One forecast period (e.g. "Tonight", "Saturday").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub period_name: String,
    pub temperature: i32,
    pub temperature_unit: String,
    pub short_forecast: String,
    pub detailed_forecast: String,
}

/// The external weather service (NWS-style REST API).
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Active alerts for a governing region (state code, e.g. "AK").
    async fn alerts(
        &self,
        region: &str,
    ) -> std::result::Result<Vec<WeatherAlert>, WeatherError>;

    /// Forecast periods for coordinates, in chronological order.
    async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> std::result::Result<Vec<ForecastPeriod>, WeatherError>;
}
