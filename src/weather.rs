/*
 *  weather.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Current conditions from OpenWeather, pulled apart by key path
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
#![allow(async_fn_in_trait)]

use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::time::Duration;

use flate2::read::GzDecoder;
use log::{debug, error, info};
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WeatherSettings;
use crate::jsonpath::{Extractor, KeyPath, PathError, lookup};

const VERSION: &str = concat!("wxclock v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum WeatherApiError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OpenWeather API error {code}: {message}")]
    Status { code: i64, message: String },
    #[error("Missing weather data: {0}")]
    MissingData(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Weather configuration error: {0}")]
    Config(String),
}

impl From<PathError> for WeatherApiError {
    fn from(e: PathError) -> Self {
        WeatherApiError::Config(e.to_string())
    }
}

/// Measurement system requested from the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    /// Kelvin, OpenWeather's default when no units are sent
    Standard,
}

impl Units {
    /// Value for the `units=` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub fn temp_symbol(&self) -> char {
        match self {
            Units::Metric => 'C',
            Units::Imperial => 'F',
            Units::Standard => 'K',
        }
    }

    pub fn wind_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

impl FromStr for Units {
    type Err = WeatherApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(Units::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(Units::Imperial),
            "standard" | "k" | "kelvin" => Ok(Units::Standard),
            other => Err(WeatherApiError::InvalidInput(format!(
                "unknown units '{other}', expected metric|imperial|standard"
            ))),
        }
    }
}

impl TryFrom<String> for Units {
    type Error = WeatherApiError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Units> for String {
    fn from(u: Units) -> Self {
        u.as_query().to_string()
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

/// Where each field lives in the response, as dotted key paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPaths {
    pub temp: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind_speed: String,
    pub condition_main: String,
    pub condition_description: String,
    pub timestamp: String,
    pub timezone: String,
    pub pressure: String,
    pub visibility: String,
    pub cloudiness: String,
    pub rain_1h: String,
    pub snow_1h: String,
    pub location: String,
}

impl Default for FieldPaths {
    fn default() -> Self {
        Self {
            temp: "main.temp".into(),
            feels_like: "main.feels_like".into(),
            humidity: "main.humidity".into(),
            wind_speed: "wind.speed".into(),
            condition_main: "weather[0].main".into(),
            condition_description: "weather[0].description".into(),
            timestamp: "dt".into(),
            timezone: "timezone".into(),
            pressure: "main.pressure".into(),
            visibility: "visibility".into(),
            cloudiness: "clouds.all".into(),
            rain_1h: "rain.1h".into(),
            snow_1h: "snow.1h".into(),
            location: "name".into(),
        }
    }
}

impl FieldPaths {
    /// Parse every path; the first bad one is reported.
    pub fn compile(&self) -> Result<FieldKeys, PathError> {
        Ok(FieldKeys {
            temp: self.temp.parse()?,
            feels_like: self.feels_like.parse()?,
            humidity: self.humidity.parse()?,
            wind_speed: self.wind_speed.parse()?,
            condition_main: self.condition_main.parse()?,
            condition_description: self.condition_description.parse()?,
            timestamp: self.timestamp.parse()?,
            timezone: self.timezone.parse()?,
            pressure: self.pressure.parse()?,
            visibility: self.visibility.parse()?,
            cloudiness: self.cloudiness.parse()?,
            rain_1h: self.rain_1h.parse()?,
            snow_1h: self.snow_1h.parse()?,
            location: self.location.parse()?,
        })
    }
}

/// [`FieldPaths`] after parsing, ready for lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKeys {
    pub temp: KeyPath,
    pub feels_like: KeyPath,
    pub humidity: KeyPath,
    pub wind_speed: KeyPath,
    pub condition_main: KeyPath,
    pub condition_description: KeyPath,
    pub timestamp: KeyPath,
    pub timezone: KeyPath,
    pub pressure: KeyPath,
    pub visibility: KeyPath,
    pub cloudiness: KeyPath,
    pub rain_1h: KeyPath,
    pub snow_1h: KeyPath,
    pub location: KeyPath,
}

/// Current conditions, units as requested.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherData {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub condition_main: String,
    pub condition_description: String,
    /// observation time, unix seconds
    pub timestamp: i64,
    /// offset from UTC in seconds
    pub timezone_offset: i64,
    pub pressure: Option<f64>,
    pub visibility: Option<i64>,
    /// percent
    pub cloudiness: Option<i64>,
    pub has_precip: bool,
    /// mm over the last hour
    pub precip_1h: f64,
    pub location: String,
}

impl Default for WeatherData {
    fn default() -> Self {
        Self {
            temp: 0.0,
            feels_like: 0.0,
            humidity: 0.0,
            wind_speed: 0.0,
            condition_main: "Unknown".into(),
            condition_description: String::new(),
            timestamp: 0,
            timezone_offset: 0,
            pressure: None,
            visibility: None,
            cloudiness: None,
            has_precip: false,
            precip_1h: 0.0,
            location: String::new(),
        }
    }
}

impl WeatherData {
    /// Pull every field out of `text`. Missing or garbled fields fall back to
    /// defaults; this never fails.
    pub fn from_raw(text: &str, keys: &FieldKeys, extractor: &Extractor) -> Self {
        let get = |path: &KeyPath| extractor.extract(text, path);

        let rain = get(&keys.rain_1h).as_f64();
        let snow = get(&keys.snow_1h).as_f64();
        let precip = rain.or(snow);

        Self {
            temp: get(&keys.temp).as_f64_or(0.0),
            feels_like: get(&keys.feels_like).as_f64_or(0.0),
            humidity: get(&keys.humidity).as_f64_or(0.0),
            wind_speed: get(&keys.wind_speed).as_f64_or(0.0),
            condition_main: get(&keys.condition_main).text_or("Unknown"),
            condition_description: get(&keys.condition_description).text_or(""),
            timestamp: get(&keys.timestamp).as_i64_or(0),
            timezone_offset: get(&keys.timezone).as_i64_or(0),
            pressure: get(&keys.pressure).as_f64(),
            visibility: get(&keys.visibility).as_i64(),
            cloudiness: get(&keys.cloudiness).as_i64(),
            has_precip: precip.is_some(),
            precip_1h: precip.unwrap_or(0.0),
            location: get(&keys.location).text_or(""),
        }
    }
}

/// Source of current conditions.
pub trait WeatherProvider {
    fn name(&self) -> &'static str;

    async fn current(&self) -> Result<WeatherData, WeatherApiError>;
}

/// Gzip bodies are inflated, anything else is taken as text.
pub fn decode_body(raw: &[u8]) -> String {
    if raw.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(raw);
        let mut decoded = String::new();
        if decoder.read_to_string(&mut decoded).is_ok() {
            return decoded;
        }
        debug!("gzip magic but inflate failed, using raw body");
    }
    String::from_utf8_lossy(raw).into_owned()
}

/// Turn a non-200 reply into an error, preferring the body's own
/// `cod`/`message` when it has them.
pub fn status_error(status: StatusCode, body: &str) -> WeatherApiError {
    let code = lookup(body, "cod").as_i64().unwrap_or(i64::from(status.as_u16()));
    let message = lookup(body, "message").into_string().unwrap_or_else(|| {
        let snippet: String = body.chars().take(120).collect();
        if snippet.trim().is_empty() {
            status.canonical_reason().unwrap_or("no reason").to_string()
        } else {
            snippet
        }
    });
    WeatherApiError::Status { code, message }
}

/// OpenWeather "current weather" endpoint.
pub struct OpenWeather {
    client: Client,
    base_url: String,
    api_key: String,
    lat: f64,
    lon: f64,
    units: Units,
    lang: String,
    keys: FieldKeys,
    extractor: Extractor,
}

impl OpenWeather {
    pub const BASE_URL: &'static str = "https://api.openweathermap.org/data/2.5/weather";

    pub fn new(settings: &WeatherSettings) -> Result<Self, WeatherApiError> {
        if settings.api_key.trim().is_empty() {
            return Err(WeatherApiError::Config("no API key specified".into()));
        }
        if settings.timeout.is_zero() {
            return Err(WeatherApiError::Config("timeout must be > 0".into()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept-Encoding", header::HeaderValue::from_static("gzip"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(settings.timeout.min(Duration::from_secs(5)))
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: Self::BASE_URL.to_string(),
            api_key: settings.api_key.clone(),
            lat: settings.lat,
            lon: settings.lon,
            units: settings.units,
            lang: settings.lang.clone(),
            keys: settings.fields.compile()?,
            extractor: Extractor::new(settings.brace_mode),
        })
    }

    /// Point at another host, e.g. a local stand-in.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn units(&self) -> Units {
        self.units
    }

    fn query(&self) -> [(&'static str, String); 5] {
        [
            ("lat", self.lat.to_string()),
            ("lon", self.lon.to_string()),
            ("appid", self.api_key.clone()),
            ("units", self.units.as_query().to_string()),
            ("lang", self.lang.clone()),
        ]
    }

    /// One bounded GET; the decoded body on 200.
    pub async fn fetch_raw(&self) -> Result<String, WeatherApiError> {
        debug!(
            "GET {} lat={} lon={} units={} lang={}",
            self.base_url, self.lat, self.lon, self.units, self.lang
        );
        let response = self.client.get(&self.base_url).query(&self.query()).send().await?;
        let status = response.status();
        let raw = response.bytes().await?;
        let body = decode_body(&raw);

        if status != StatusCode::OK {
            let err = status_error(status, &body);
            error!("{err}");
            return Err(err);
        }
        Ok(body)
    }

    /// Assemble a record from a 200 body. No temperature means the body is
    /// not a weather report and must not replace good data.
    pub fn parse(&self, body: &str) -> Result<WeatherData, WeatherApiError> {
        self.extractor
            .try_extract(body, &self.keys.temp)
            .map_err(|e| WeatherApiError::MissingData(e.to_string()))?;
        Ok(WeatherData::from_raw(body, &self.keys, &self.extractor))
    }
}

impl WeatherProvider for OpenWeather {
    fn name(&self) -> &'static str {
        "openweather"
    }

    async fn current(&self) -> Result<WeatherData, WeatherApiError> {
        let body = self.fetch_raw().await?;
        let data = self.parse(&body)?;
        info!(
            "weather for {}: {:.1}{} {} ({})",
            if data.location.is_empty() { "here" } else { data.location.as_str() },
            data.temp,
            self.units.temp_symbol(),
            data.condition_main,
            data.condition_description
        );
        Ok(data)
    }
}
