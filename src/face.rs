/*
 *  face.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Clock face: time lines over a weather line
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

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};

use crate::config::DisplaySettings;
use crate::display::{DisplayRecord, Rgb};
use crate::weather::{Units, WeatherData};

/// Shown on the weather line until the first successful fetch.
pub const LOADING: &str = "Loading...";

/// True when chrono understands every specifier in `fmt`.
pub fn is_valid_time_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

/// Turns a moment and the cached weather into a frame.
#[derive(Debug, Clone)]
pub struct ClockFace {
    time_formats: Vec<String>,
    clock_color: Rgb,
    weather_color: Rgb,
    background: Rgb,
    outline: Option<Rgb>,
    show_details: bool,
    units: Units,
}

impl ClockFace {
    pub fn new(display: &DisplaySettings, units: Units) -> Self {
        Self {
            time_formats: display.time_formats.clone(),
            clock_color: display.clock_color,
            weather_color: display.weather_color,
            background: display.background,
            outline: display.outline,
            show_details: display.show_details,
            units,
        }
    }

    pub fn compose<Tz>(&self, at: &DateTime<Tz>, weather: Option<&WeatherData>) -> DisplayRecord
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut record = DisplayRecord::new(self.background);
        record.outline = self.outline;

        for fmt in &self.time_formats {
            record.push(format_time(at, fmt), self.clock_color);
        }

        match weather {
            Some(wd) => {
                record.push(self.summary_line(wd), self.weather_color);
                if self.show_details {
                    record.push(self.detail_line(wd), self.weather_color);
                }
            }
            None => record.push(LOADING, self.weather_color),
        }
        record
    }

    /// e.g. `21C Clouds`
    pub fn summary_line(&self, wd: &WeatherData) -> String {
        format!("{:.0}{} {}", wd.temp, self.units.temp_symbol(), wd.condition_main)
    }

    /// e.g. `Feels +19° Hum 60% Wind 3.1m/s`
    pub fn detail_line(&self, wd: &WeatherData) -> String {
        format!(
            "Feels {:+.0}° Hum {}% Wind {:.1}{}",
            wd.feels_like,
            wd.humidity as i64,
            wd.wind_speed,
            self.units.wind_symbol()
        )
    }
}

// a bad specifier shows the format text itself rather than panicking
fn format_time<Tz>(at: &DateTime<Tz>, fmt: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    match write!(out, "{}", at.format(fmt)) {
        Ok(()) => out,
        Err(_) => fmt.to_string(),
    }
}
