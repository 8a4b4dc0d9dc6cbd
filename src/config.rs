/*
 *  config.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Layered configuration: defaults, YAML, .env, environment, command line
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
use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use log::{debug, info};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, io, path::{Path, PathBuf}};
use thiserror::Error;

use crate::display::{Rgb, SinkKind};
use crate::face::is_valid_time_format;
use crate::jsonpath::BraceMode;
use crate::weather::{FieldPaths, Units};

pub const ENV_API_KEY: &str = "WEATHER_API_KEY";
pub const ENV_LAT: &str = "WEATHER_LAT";
pub const ENV_LON: &str = "WEATHER_LON";
pub const ENV_LANG: &str = "WEATHER_LANG";
pub const ENV_UNITS: &str = "WEATHER_UNITS";

pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Everything that can be set from a file, env or the command line. All
/// fields are Options so each layer only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub weather: Option<WeatherConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub units: Option<Units>,
    pub lang: Option<String>,
    /// seconds between fetches, 0 = every tick
    pub refresh_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    /// skip braces inside quoted strings when spanning objects
    pub strict_braces: Option<bool>,
    pub fields: Option<FieldPaths>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DisplayConfig {
    pub sink: Option<SinkKind>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub time_formats: Option<Vec<String>>,
    pub clock_color: Option<Rgb>,
    pub weather_color: Option<Rgb>,
    pub background: Option<Rgb>,
    pub outline: Option<Rgb>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub line_spacing: Option<i32>,
    pub details: Option<bool>,
    pub frame_dump: Option<PathBuf>,
}

/// Validated weather settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSettings {
    pub api_key: String,
    pub lat: f64,
    pub lon: f64,
    pub units: Units,
    pub lang: String,
    pub refresh: Duration,
    pub timeout: Duration,
    pub brace_mode: BraceMode,
    pub fields: FieldPaths,
}

/// Validated display settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub sink: SinkKind,
    pub width: u32,
    pub height: u32,
    pub time_formats: Vec<String>,
    pub clock_color: Rgb,
    pub weather_color: Rgb,
    pub background: Rgb,
    pub outline: Option<Rgb>,
    pub x: i32,
    pub y: i32,
    pub line_spacing: i32,
    pub show_details: bool,
    pub frame_dump: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            sink: SinkKind::Console,
            width: 128,
            height: 32,
            time_formats: vec![DEFAULT_TIME_FORMAT.to_string()],
            clock_color: Rgb::YELLOW,
            weather_color: Rgb::CYAN,
            background: Rgb::BLACK,
            outline: None,
            x: 0,
            y: 0,
            line_spacing: 2,
            show_details: false,
            frame_dump: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: String,
    pub weather: WeatherSettings,
    pub display: DisplaySettings,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "wxclock", version, about = "Clock and current weather, redrawn every second")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// strftime format for a clock line; repeat for more lines
    #[arg(short = 'd', long = "time-format", value_name = "FORMAT")]
    pub time_format: Vec<String>,
    /// clock color r,g,b
    #[arg(short = 'C', long)]
    pub clock_color: Option<Rgb>,
    /// weather color r,g,b
    #[arg(short = 'W', long)]
    pub weather_color: Option<Rgb>,
    /// background color r,g,b
    #[arg(short = 'B', long)]
    pub background: Option<Rgb>,
    /// outline color r,g,b, drawn behind the text for contrast
    #[arg(short = 'O', long)]
    pub outline: Option<Rgb>,
    #[arg(short = 'x', long, allow_negative_numbers = true)]
    pub x: Option<i32>,
    #[arg(short = 'y', long, allow_negative_numbers = true)]
    pub y: Option<i32>,
    /// extra pixels between lines
    #[arg(short = 's', long, allow_negative_numbers = true)]
    pub line_spacing: Option<i32>,
    /// seconds between weather fetches (0 = every second)
    #[arg(long = "weather-refresh", value_name = "SECONDS")]
    pub weather_refresh: Option<u64>,
    /// metric | imperial | standard
    #[arg(long)]
    pub units: Option<Units>,
    #[arg(long)]
    pub lang: Option<String>,
    /// HTTP timeout for a fetch
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
    /// add a feels-like / humidity / wind line
    #[arg(long, action = ArgAction::SetTrue)]
    pub details: bool,
    /// ignore braces inside quoted strings when spanning objects
    #[arg(long, action = ArgAction::SetTrue)]
    pub strict_braces: bool,
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// write every presented frame here as PPM (frame sink)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub frame_dump: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// shorthand for --log-level debug
    #[arg(short = 'v', long = "debug", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// KEY=VALUE file read before the process environment
    #[arg(long, default_value = ".env", value_hint = ValueHint::FilePath)]
    pub env_file: PathBuf,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML and env, merge, validate.
pub fn load() -> Result<(Config, Cli), ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli, |key| std::env::var(key).ok())?;
    Ok((cfg, cli))
}

/// Merge every layer under `cli`. `process_env` stands in for the process
/// environment so callers can pin it.
pub fn load_from<F>(cli: &Cli, process_env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            merge(&mut cfg, read_yaml(p)?);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        info!("using config {}", p.display());
        merge(&mut cfg, read_yaml(&p)?);
    }

    // 3) .env then the process environment, same names
    let file_env = load_env_file(&cli.env_file)?;
    apply_env(&mut cfg, |key| process_env(key).or_else(|| file_env.get(key).cloned()))?;

    // 4) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/wxclock/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/wxclock/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/wxclock.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["wxclock.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// `KEY=VALUE` lines. `#` lines and lines without `=` are skipped, one pair
/// of surrounding double quotes is stripped from the value.
pub fn parse_env(text: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in text.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    vars
}

/// A missing file is an empty environment.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let vars = parse_env(&text);
            debug!("{} entries from {}", vars.len(), path.display());
            Ok(vars)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn parse_coord(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} is not a number: '{value}'")))
}

fn apply_env<F>(cfg: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let w = cfg.weather.get_or_insert_with(WeatherConfig::default);
    if let Some(v) = lookup(ENV_API_KEY) { w.api_key = Some(v); }
    if let Some(v) = lookup(ENV_LAT) { w.lat = Some(parse_coord(ENV_LAT, &v)?); }
    if let Some(v) = lookup(ENV_LON) { w.lon = Some(parse_coord(ENV_LON, &v)?); }
    if let Some(v) = lookup(ENV_LANG) { w.lang = Some(v); }
    if let Some(v) = lookup(ENV_UNITS) {
        w.units = Some(v.parse().map_err(|e| ConfigError::Validation(format!("{ENV_UNITS}: {e}")))?);
    }
    Ok(())
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    match (&mut dst.weather, src.weather) {
        (None, Some(c)) => dst.weather = Some(c),
        (Some(d), Some(s)) => merge_weather(d, s),
        _ => {}
    }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
}

fn merge_weather(dst: &mut WeatherConfig, src: WeatherConfig) {
    if src.api_key.is_some()        { dst.api_key = src.api_key; }
    if src.lat.is_some()            { dst.lat = src.lat; }
    if src.lon.is_some()            { dst.lon = src.lon; }
    if src.units.is_some()          { dst.units = src.units; }
    if src.lang.is_some()           { dst.lang = src.lang; }
    if src.refresh_secs.is_some()   { dst.refresh_secs = src.refresh_secs; }
    if src.timeout_secs.is_some()   { dst.timeout_secs = src.timeout_secs; }
    if src.strict_braces.is_some()  { dst.strict_braces = src.strict_braces; }
    if src.fields.is_some()         { dst.fields = src.fields; }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.sink.is_some()           { dst.sink = src.sink; }
    if src.width.is_some()          { dst.width = src.width; }
    if src.height.is_some()         { dst.height = src.height; }
    if src.time_formats.is_some()   { dst.time_formats = src.time_formats; }
    if src.clock_color.is_some()    { dst.clock_color = src.clock_color; }
    if src.weather_color.is_some()  { dst.weather_color = src.weather_color; }
    if src.background.is_some()     { dst.background = src.background; }
    if src.outline.is_some()        { dst.outline = src.outline; }
    if src.x.is_some()              { dst.x = src.x; }
    if src.y.is_some()              { dst.y = src.y; }
    if src.line_spacing.is_some()   { dst.line_spacing = src.line_spacing; }
    if src.details.is_some()        { dst.details = src.details; }
    if src.frame_dump.is_some()     { dst.frame_dump = src.frame_dump; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.debug {
        cfg.log_level = Some("debug".into());
    } else if cli.log_level.is_some() {
        cfg.log_level = cli.log_level.clone();
    }

    let weather = cfg.weather.get_or_insert_with(WeatherConfig::default);
    if cli.weather_refresh.is_some()  { weather.refresh_secs = cli.weather_refresh; }
    if cli.units.is_some()            { weather.units = cli.units; }
    if cli.lang.is_some()             { weather.lang = cli.lang.clone(); }
    if cli.timeout.is_some()          { weather.timeout_secs = cli.timeout; }
    if cli.strict_braces              { weather.strict_braces = Some(true); }

    let display = cfg.display.get_or_insert_with(DisplayConfig::default);
    if !cli.time_format.is_empty()    { display.time_formats = Some(cli.time_format.clone()); }
    if cli.clock_color.is_some()      { display.clock_color = cli.clock_color; }
    if cli.weather_color.is_some()    { display.weather_color = cli.weather_color; }
    if cli.background.is_some()       { display.background = cli.background; }
    if cli.outline.is_some()          { display.outline = cli.outline; }
    if cli.x.is_some()                { display.x = cli.x; }
    if cli.y.is_some()                { display.y = cli.y; }
    if cli.line_spacing.is_some()     { display.line_spacing = cli.line_spacing; }
    if cli.details                    { display.details = Some(true); }
    if cli.sink.is_some()             { display.sink = cli.sink; }
    if cli.width.is_some()            { display.width = cli.width; }
    if cli.height.is_some()           { display.height = cli.height; }
    if cli.frame_dump.is_some()       { display.frame_dump = cli.frame_dump.clone(); }
}

impl Config {
    /// Apply defaults and check every invariant.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));
        let w = self.weather.clone().unwrap_or_default();
        let d = self.display.clone().unwrap_or_default();

        let api_key = w.api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            ConfigError::Validation(format!("weather API key required ({ENV_API_KEY} or weather.api_key)"))
        })?;
        let lat = w.lat.ok_or_else(|| ConfigError::Validation(format!("latitude required ({ENV_LAT} or weather.lat)")))?;
        let lon = w.lon.ok_or_else(|| ConfigError::Validation(format!("longitude required ({ENV_LON} or weather.lon)")))?;
        if !(-90.0..=90.0).contains(&lat) {
            return invalid(format!("latitude {lat} outside -90..=90"));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return invalid(format!("longitude {lon} outside -180..=180"));
        }
        let timeout_secs = w.timeout_secs.unwrap_or(10);
        if timeout_secs == 0 {
            return invalid("weather timeout must be > 0".into());
        }
        let fields = w.fields.unwrap_or_default();
        if let Err(e) = fields.compile() {
            return invalid(format!("weather.fields: {e}"));
        }

        let width = d.width.unwrap_or(128);
        let height = d.height.unwrap_or(32);
        if width == 0 || height == 0 {
            return invalid("display width/height must be > 0".into());
        }
        let time_formats = match d.time_formats {
            Some(f) if !f.is_empty() => f,
            _ => vec![DEFAULT_TIME_FORMAT.to_string()],
        };
        if let Some(bad) = time_formats.iter().find(|f| !is_valid_time_format(f)) {
            return invalid(format!("time format '{bad}' is not valid strftime"));
        }

        let defaults = DisplaySettings::default();
        Ok(Settings {
            log_level: self.log_level.clone().unwrap_or_else(|| "info".into()),
            weather: WeatherSettings {
                api_key,
                lat,
                lon,
                units: w.units.unwrap_or_default(),
                lang: w.lang.filter(|l| !l.trim().is_empty()).unwrap_or_else(|| "en".into()),
                refresh: Duration::from_secs(w.refresh_secs.unwrap_or(600)),
                timeout: Duration::from_secs(timeout_secs),
                brace_mode: if w.strict_braces.unwrap_or(false) {
                    BraceMode::StringAware
                } else {
                    BraceMode::Naive
                },
                fields,
            },
            display: DisplaySettings {
                sink: d.sink.unwrap_or(defaults.sink),
                width,
                height,
                time_formats,
                clock_color: d.clock_color.unwrap_or(defaults.clock_color),
                weather_color: d.weather_color.unwrap_or(defaults.weather_color),
                background: d.background.unwrap_or(defaults.background),
                outline: d.outline,
                x: d.x.unwrap_or(defaults.x),
                y: d.y.unwrap_or(defaults.y),
                line_spacing: d.line_spacing.unwrap_or(defaults.line_spacing),
                show_details: d.details.unwrap_or(defaults.show_details),
                frame_dump: d.frame_dump,
            },
        })
    }

    /// Pretty YAML of the merged config with the API key masked.
    pub fn dump(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if let Some(key) = shown.weather.as_mut().and_then(|w| w.api_key.as_mut()) {
            *key = mask(key);
        }
        Ok(serde_yaml::to_string(&shown)?)
    }
}

fn mask(secret: &str) -> String {
    let tail: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if secret.chars().count() <= 8 {
        "****".into()
    } else {
        format!("****{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["wxclock", "--env-file", "/nonexistent/wxclock.env", "--config"];
        argv.push("/nonexistent/placeholder.yaml");
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn yaml_file(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    fn base_env(key: &str) -> Option<String> {
        match key {
            ENV_API_KEY => Some("abc123".into()),
            ENV_LAT => Some("51.5".into()),
            ENV_LON => Some("-0.12".into()),
            _ => None,
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn load_yaml(body: &str, args: &[&str], env: fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let file = yaml_file(body);
        let path = file.path().to_string_lossy().into_owned();
        let mut argv = vec!["wxclock", "--env-file", "/nonexistent/wxclock.env", "--config", path.as_str()];
        argv.extend_from_slice(args);
        load_from(&Cli::parse_from(argv), env)
    }

    #[test]
    fn test_parse_env() {
        let vars = parse_env(
            "# comment\nWEATHER_API_KEY=\"quoted\"\nWEATHER_LAT=40.7\nnonsense line\n=novalue\nWEATHER_LANG = de \nEMPTY=\n",
        );
        assert_eq!(vars.get("WEATHER_API_KEY").unwrap(), "quoted");
        assert_eq!(vars.get("WEATHER_LAT").unwrap(), "40.7");
        assert_eq!(vars.get("WEATHER_LANG").unwrap(), "de");
        assert_eq!(vars.get("EMPTY").unwrap(), "");
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_parse_env_keeps_inner_equals_and_single_quote_pair() {
        let vars = parse_env("A=x=y\nB=\"\"inner\"\"\n");
        assert_eq!(vars.get("A").unwrap(), "x=y");
        assert_eq!(vars.get("B").unwrap(), "\"inner\"");
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let vars = load_env_file(Path::new("/nonexistent/dir/.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let err = load_from(&cli(&[]), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(m) if m.contains("not found")));
    }

    #[test]
    fn test_defaults_resolve_with_required_env() {
        let cfg = load_yaml("{}", &[], base_env).unwrap();
        let s = cfg.resolve().unwrap();
        assert_eq!(s.weather.api_key, "abc123");
        assert_eq!(s.weather.lat, 51.5);
        assert_eq!(s.weather.lon, -0.12);
        assert_eq!(s.weather.units, Units::Metric);
        assert_eq!(s.weather.lang, "en");
        assert_eq!(s.weather.refresh, Duration::from_secs(600));
        assert_eq!(s.weather.timeout, Duration::from_secs(10));
        assert_eq!(s.weather.brace_mode, BraceMode::Naive);
        assert_eq!(s.display, DisplaySettings::default());
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn test_layer_precedence() {
        let yaml = r#"
log_level: warn
weather:
  api_key: from-yaml
  lat: 10.0
  lon: 20.0
  units: imperial
  refresh_secs: 300
display:
  clock_color: "255,0,0"
  time_formats: ["%H:%M:%S"]
  sink: frame
"#;
        fn env(key: &str) -> Option<String> {
            match key {
                ENV_API_KEY => Some("from-env".into()),
                ENV_UNITS => Some("kelvin".into()),
                _ => None,
            }
        }
        let cfg = load_yaml(yaml, &["--units", "metric", "-C", "0,0,255", "-d", "%H", "-d", "%M"], env).unwrap();
        let s = cfg.resolve().unwrap();
        // env beats yaml
        assert_eq!(s.weather.api_key, "from-env");
        // cli beats env
        assert_eq!(s.weather.units, Units::Metric);
        assert_eq!(s.display.clock_color, Rgb::new(0, 0, 255));
        assert_eq!(s.display.time_formats, vec!["%H", "%M"]);
        // untouched yaml values survive
        assert_eq!(s.weather.lat, 10.0);
        assert_eq!(s.weather.refresh, Duration::from_secs(300));
        assert_eq!(s.display.sink, SinkKind::Frame);
        assert_eq!(s.log_level, "warn");
    }

    #[test]
    fn test_env_file_under_process_env() {
        let mut env_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(env_file, "WEATHER_API_KEY=file-key\nWEATHER_LAT=1.5\nWEATHER_LON=2.5\nWEATHER_LANG=fr").unwrap();
        let path = env_file.path().to_string_lossy().into_owned();
        let yaml = yaml_file("{}");
        let yaml_path = yaml.path().to_string_lossy().into_owned();
        let cli = Cli::parse_from(["wxclock", "--env-file", path.as_str(), "--config", yaml_path.as_str()]);

        fn env(key: &str) -> Option<String> {
            (key == ENV_LANG).then(|| "de".to_string())
        }
        let s = load_from(&cli, env).unwrap().resolve().unwrap();
        assert_eq!(s.weather.api_key, "file-key");
        assert_eq!(s.weather.lat, 1.5);
        assert_eq!(s.weather.lang, "de");
    }

    #[test]
    fn test_flags_map_to_settings() {
        let cfg = load_yaml(
            "{}",
            &[
                "--weather-refresh", "0", "--timeout", "3", "--details", "--strict-braces",
                "--sink", "frame", "--width", "64", "--height", "64", "-x", "-2", "-y", "4",
                "-s", "1", "-O", "0,0,0", "-W", "255,255,255", "-B", "0,0,255", "-v",
            ],
            base_env,
        )
        .unwrap();
        let s = cfg.resolve().unwrap();
        assert_eq!(s.weather.refresh, Duration::ZERO);
        assert_eq!(s.weather.timeout, Duration::from_secs(3));
        assert_eq!(s.weather.brace_mode, BraceMode::StringAware);
        assert!(s.display.show_details);
        assert_eq!(s.display.sink, SinkKind::Frame);
        assert_eq!((s.display.width, s.display.height), (64, 64));
        assert_eq!((s.display.x, s.display.y, s.display.line_spacing), (-2, 4, 1));
        assert_eq!(s.display.outline, Some(Rgb::BLACK));
        assert_eq!(s.display.weather_color, Rgb::new(255, 255, 255));
        assert_eq!(s.display.background, Rgb::new(0, 0, 255));
        assert_eq!(s.log_level, "debug");
    }

    #[test]
    fn test_validation_failures() {
        let check = |yaml: &str, env: fn(&str) -> Option<String>, needle: &str| {
            let err = load_yaml(yaml, &[], env).unwrap().resolve().unwrap_err();
            assert!(matches!(&err, ConfigError::Validation(m) if m.contains(needle)), "{err}");
        };
        check("{}", no_env, "API key");
        check("weather: {api_key: k, lon: 1.0}", no_env, "latitude required");
        check("weather: {api_key: k, lat: 91.0, lon: 1.0}", no_env, "outside -90");
        check("weather: {api_key: k, lat: 1.0, lon: -181.0}", no_env, "outside -180");
        check("weather: {timeout_secs: 0}", base_env, "timeout");
        check("display: {width: 0}", base_env, "width/height");
        check("display: {time_formats: ['%H:%Q']}", base_env, "strftime");
        check("weather: {fields: {temp: 'main..temp'}}", base_env, "weather.fields");
    }

    #[test]
    fn test_bad_values_rejected_while_loading() {
        assert!(matches!(load_yaml("display: {clock_color: '1,2'}", &[], base_env), Err(ConfigError::Yaml(_))));
        assert!(matches!(load_yaml("weather: {units: rankine}", &[], base_env), Err(ConfigError::Yaml(_))));
        fn bad_lat(key: &str) -> Option<String> {
            (key == ENV_LAT).then(|| "north".to_string())
        }
        assert!(matches!(load_yaml("{}", &[], bad_lat), Err(ConfigError::Validation(_))));
        assert!(Cli::try_parse_from(["wxclock", "-C", "300,0,0"]).is_err());
    }

    #[test]
    fn test_empty_time_formats_fall_back() {
        let s = load_yaml("display: {time_formats: []}", &[], base_env).unwrap().resolve().unwrap();
        assert_eq!(s.display.time_formats, vec![DEFAULT_TIME_FORMAT]);
    }

    #[test]
    fn test_partial_field_paths_keep_defaults() {
        let s = load_yaml("weather: {fields: {temp: current.temp}}", &[], base_env)
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(s.weather.fields.temp, "current.temp");
        assert_eq!(s.weather.fields.humidity, "main.humidity");
    }

    #[test]
    fn test_dump_masks_key() {
        let cfg = load_yaml("weather: {api_key: 0123456789abcdef}", &[], no_env).unwrap();
        let dumped = cfg.dump().unwrap();
        assert!(!dumped.contains("0123456789abcdef"));
        assert!(dumped.contains("****cdef"));
        assert_eq!(mask("short"), "****");
    }
}
