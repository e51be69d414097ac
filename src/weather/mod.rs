//! Destination weather lookup and risk classification.
//!
//! Classification is a fixed ordered rule list over current conditions, not
//! a model: storm keywords, then precipitation, then numeric thresholds,
//! with Low as the default. The OpenWeather call is best-effort; advisory
//! pages fall back to a neutral entry when it fails.

use serde::Deserialize;

use crate::models::{Recommendation, RiskLevel, WeatherSnapshot};

/// Wind speed (km/h) at or above which travel is rated High risk.
const HIGH_WIND_KMH: f64 = 60.0;
/// Temperature extremes (deg C) at which travel is rated High risk.
const HIGH_TEMP_C: f64 = 45.0;
const LOW_TEMP_C: f64 = -15.0;
/// Humidity (%) at or above which conditions rate Medium risk.
const HIGH_HUMIDITY: f64 = 95.0;

const STORM_KEYWORDS: &[&str] = &["thunder", "storm", "extreme"];
const PRECIPITATION_KEYWORDS: &[&str] = &["rain", "snow", "sleet", "drizzle", "mist", "fog"];

/// Classify current weather into a travel risk level.
///
/// Deterministic and total: every input lands in exactly one branch of the
/// ordered rule list.
pub fn classify(main: &str, temp_c: f64, wind_kmh: f64, humidity: f64) -> RiskLevel {
    let main = main.to_lowercase();

    if contains_any(&main, STORM_KEYWORDS) {
        return RiskLevel::High;
    }
    if contains_any(&main, PRECIPITATION_KEYWORDS) {
        return RiskLevel::Medium;
    }
    if wind_kmh >= HIGH_WIND_KMH {
        return RiskLevel::High;
    }
    if temp_c >= HIGH_TEMP_C || temp_c <= LOW_TEMP_C {
        return RiskLevel::High;
    }
    if humidity >= HIGH_HUMIDITY {
        return RiskLevel::Medium;
    }
    RiskLevel::Low
}

/// Derive the traveller-facing recommendation from the same thresholds.
pub fn recommendation(main: &str, temp_c: f64, wind_kmh: f64, humidity: f64) -> Recommendation {
    let main = main.to_lowercase();

    if contains_any(&main, STORM_KEYWORDS) {
        return avoid_travel();
    }
    if contains_any(&main, &["rain", "snow", "sleet"]) {
        return caution();
    }
    if wind_kmh >= HIGH_WIND_KMH {
        return avoid_travel();
    }
    if temp_c >= HIGH_TEMP_C || temp_c <= LOW_TEMP_C {
        return avoid_travel();
    }
    if humidity >= HIGH_HUMIDITY {
        return caution();
    }

    Recommendation {
        label: "Safe".to_string(),
        color: "green".to_string(),
    }
}

fn avoid_travel() -> Recommendation {
    Recommendation {
        label: "Avoid Travel".to_string(),
        color: "red".to_string(),
    }
}

fn caution() -> Recommendation {
    Recommendation {
        label: "Caution".to_string(),
        color: "orange".to_string(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// OpenWeather "current weather" response, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    weather: Vec<OwmCondition>,
    main: Option<OwmMain>,
    wind: Option<OwmWind>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    /// Kelvin.
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    /// Metres per second.
    speed: Option<f64>,
}

/// Client for the OpenWeather current-conditions API.
#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Fetch current conditions for a city.
    ///
    /// Returns None on any failure (no key, network error, unexpected
    /// body); callers substitute a neutral Low entry rather than surfacing
    /// an error.
    pub async fn current(&self, city: &str) -> Option<WeatherSnapshot> {
        let api_key = self.api_key.as_ref()?;
        let url = format!(
            "https://api.openweathermap.org/data/2.5/weather?q={}&appid={}",
            city, api_key
        );

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Weather API request failed for {}: {}", city, e);
                return None;
            }
        };

        let data: OwmResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Weather API returned an unexpected body for {}: {}", city, e);
                return None;
            }
        };

        let condition = data.weather.first()?;
        let temp_c = data
            .main
            .as_ref()
            .and_then(|m| m.temp)
            .map(|kelvin| (kelvin - 273.15).round());
        let humidity = data.main.as_ref().and_then(|m| m.humidity);
        let wind_kmh = data
            .wind
            .as_ref()
            .and_then(|w| w.speed)
            .map(|ms| (ms * 3.6).round());

        let recommendation = recommendation(
            &condition.main,
            temp_c.unwrap_or(0.0),
            wind_kmh.unwrap_or(0.0),
            humidity.unwrap_or(0.0),
        );

        Some(WeatherSnapshot {
            main: condition.main.clone(),
            icon: condition.icon.clone(),
            temp_c,
            humidity,
            wind_kmh,
            recommendation: Some(recommendation),
        })
    }
}
