//! The `fetch_weather` tool executor.
//!
//! Performs two independent sub-fetches; active alerts for the governing
//! region and a forecast for the coordinates; each routed through the
//! shared time-bounded cache keyed by the request parameters. Either
//! sub-fetch failing degrades to an empty list so the dialogue proceeds
//! with partial or absent weather context.

use std::sync::Arc;
use std::time::Duration;

use snowdesk_cache::{alerts_key, forecast_key, TtlCache};
use snowdesk_core::tool::{ToolDefinition, TOOL_FETCH_WEATHER};
use snowdesk_core::weather::{ForecastPeriod, WeatherAlert, WeatherService};
use tracing::warn;

const MAX_SUMMARY_ALERTS: usize = 3;
const MAX_SUMMARY_PERIODS: usize = 3;
const MAX_SUMMARY_DESCRIPTION: usize = 200;

/// The process-wide weather caches, constructed once at startup and shared
/// by reference across all concurrent dialogues.
pub struct WeatherCaches {
    alerts: TtlCache<Vec<WeatherAlert>>,
    forecast: TtlCache<Vec<ForecastPeriod>>,
    ttl: Duration,
}

impl WeatherCaches {
    pub fn new(ttl: Duration) -> Self {
        Self {
            alerts: TtlCache::new(),
            forecast: TtlCache::new(),
            ttl,
        }
    }
}

pub struct FetchWeatherTool {
    weather: Arc<dyn WeatherService>,
    caches: Arc<WeatherCaches>,
    region: String,
}

impl FetchWeatherTool {
    pub fn new(
        weather: Arc<dyn WeatherService>,
        caches: Arc<WeatherCaches>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            weather,
            caches,
            region: region.into(),
        }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: TOOL_FETCH_WEATHER.into(),
            description: "Get current weather alerts, warnings, and the forecast for a \
                          location. Use when the user asks about weather, conditions, \
                          alerts, or forecasts."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "latitude": {
                        "type": "number",
                        "description": "Latitude of the location"
                    },
                    "longitude": {
                        "type": "number",
                        "description": "Longitude of the location"
                    }
                }
            }),
        }
    }

    /// Alerts for the governing region, cached. A fetch failure yields an
    /// empty list and is never cached.
    async fn cached_alerts(&self) -> Vec<WeatherAlert> {
        let key = alerts_key(&self.region);
        if let Some(alerts) = self.caches.alerts.get(&key) {
            return alerts;
        }
        // The upstream call happens with no lock held; the result is
        // written back under a briefly re-acquired lock inside `put`.
        match self.weather.alerts(&self.region).await {
            Ok(alerts) => {
                self.caches.alerts.put(key, alerts.clone(), self.caches.ttl);
                alerts
            }
            Err(e) => {
                warn!(error = %e, region = %self.region, "Alert fetch failed");
                Vec::new()
            }
        }
    }

    /// Forecast for the coordinates, cached.
    async fn cached_forecast(&self, latitude: f64, longitude: f64) -> Vec<ForecastPeriod> {
        let key = forecast_key(latitude, longitude);
        if let Some(periods) = self.caches.forecast.get(&key) {
            return periods;
        }
        match self.weather.forecast(latitude, longitude).await {
            Ok(periods) => {
                self.caches
                    .forecast
                    .put(key, periods.clone(), self.caches.ttl);
                periods
            }
            Err(e) => {
                warn!(error = %e, latitude, longitude, "Forecast fetch failed");
                Vec::new()
            }
        }
    }

    /// Execute both sub-fetches and serialize the result payload.
    pub async fn execute(&self, latitude: f64, longitude: f64) -> String {
        let alerts = self.cached_alerts().await;
        let forecast = self.cached_forecast(latitude, longitude).await;
        serialize_weather(&alerts, &forecast)
    }
}

/// Format alerts as a text block for model consumption (first 3 alerts,
/// descriptions re-capped at 200 chars).
pub fn format_alerts_context(alerts: &[WeatherAlert]) -> String {
    if alerts.is_empty() {
        return "No active weather alerts.".into();
    }

    let mut text = String::from("ACTIVE WEATHER ALERTS:\n");
    for (i, alert) in alerts.iter().take(MAX_SUMMARY_ALERTS).enumerate() {
        let description: String = alert.description.chars().take(MAX_SUMMARY_DESCRIPTION).collect();
        text.push_str(&format!(
            "\n{}. {} ({})\n   {}\n",
            i + 1,
            alert.event,
            alert.severity,
            description
        ));
    }
    text
}

/// Format the forecast as a text block for model consumption (first 3
/// periods).
pub fn format_forecast_context(forecast: &[ForecastPeriod]) -> String {
    if forecast.is_empty() {
        return "Forecast not available.".into();
    }

    let mut text = String::from("WEATHER FORECAST:\n");
    for period in forecast.iter().take(MAX_SUMMARY_PERIODS) {
        text.push_str(&format!(
            "\n{}: {}°{}\n  {}\n",
            period.period_name, period.temperature, period.temperature_unit, period.short_forecast
        ));
    }
    text
}

fn serialize_weather(alerts: &[WeatherAlert], forecast: &[ForecastPeriod]) -> String {
    let alert_entries: Vec<serde_json::Value> = alerts
        .iter()
        .take(MAX_SUMMARY_ALERTS)
        .map(|alert| {
            let description: String =
                alert.description.chars().take(MAX_SUMMARY_DESCRIPTION).collect();
            serde_json::json!({
                "event": alert.event,
                "severity": alert.severity,
                "description": description,
            })
        })
        .collect();

    let forecast_entries: Vec<serde_json::Value> = forecast
        .iter()
        .take(MAX_SUMMARY_PERIODS)
        .map(|period| {
            serde_json::json!({
                "period": period.period_name,
                "temperature": format!("{}°{}", period.temperature, period.temperature_unit),
                "conditions": period.short_forecast,
            })
        })
        .collect();

    serde_json::json!({
        "alerts": alert_entries,
        "forecast": forecast_entries,
        "summary": format!(
            "{}\n\n{}",
            format_alerts_context(alerts),
            format_forecast_context(forecast)
        ),
    })
    .to_string()
}
