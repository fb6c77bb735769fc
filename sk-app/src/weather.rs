//! Current-temperature lookup via Open-Meteo. Degrades to an apology string
//! on any failure; the bot never surfaces weather transport errors.

use serde::Deserialize;
use std::time::Duration;

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const MOSCOW_LAT: &str = "55.7558";
const MOSCOW_LON: &str = "37.6173";
const WEATHER_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn moscow_now(http: &reqwest::Client) -> String {
    match fetch_current_temperature(http).await {
        Ok(celsius) => format!("Moscow: {}\u{b0}C right now", celsius.round() as i64),
        Err(e) => {
            tracing::warn!(%e, "weather fetch failed");
            "Could not fetch the weather.".to_string()
        }
    }
}

async fn fetch_current_temperature(http: &reqwest::Client) -> anyhow::Result<f64> {
    #[derive(Deserialize)]
    struct Forecast {
        current: Current,
    }
    #[derive(Deserialize)]
    struct Current {
        temperature_2m: f64,
    }

    let forecast: Forecast = http
        .get(OPEN_METEO_URL)
        .query(&[
            ("latitude", MOSCOW_LAT),
            ("longitude", MOSCOW_LON),
            ("current", "temperature_2m"),
            ("timezone", "Europe/Moscow"),
        ])
        .timeout(WEATHER_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(forecast.current.temperature_2m)
}
