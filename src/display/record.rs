/*
 *  display/record.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  What gets drawn: colored text lines on a background
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fmt;
use std::str::FromStr;

use embedded_graphics::pixelcolor::Rgb888;
use serde::{Deserialize, Serialize};

use crate::display::error::DisplayError;

/// 24-bit color, written `r,g,b` in config and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const CYAN: Rgb = Rgb::new(0, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || DisplayError::InvalidColor(s.to_string());
        let parts: Vec<u8> = s
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| bad())?;
        match parts.as_slice() {
            [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = DisplayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

impl From<Rgb> for Rgb888 {
    fn from(c: Rgb) -> Self {
        Rgb888::new(c.r, c.g, c.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub text: String,
    pub color: Rgb,
}

impl DisplayLine {
    pub fn new(text: impl Into<String>, color: Rgb) -> Self {
        Self { text: text.into(), color }
    }
}

/// One frame's worth of content, top line first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    pub background: Rgb,
    /// Drawn one pixel left of each line, under it, for contrast.
    pub outline: Option<Rgb>,
    pub lines: Vec<DisplayLine>,
}

impl DisplayRecord {
    pub fn new(background: Rgb) -> Self {
        Self { background, outline: None, lines: Vec::new() }
    }

    pub fn push(&mut self, text: impl Into<String>, color: Rgb) {
        self.lines.push(DisplayLine::new(text, color));
    }

    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_parse() {
        assert_eq!("255,255,0".parse::<Rgb>().unwrap(), Rgb::YELLOW);
        assert_eq!(" 1, 2 ,3 ".parse::<Rgb>().unwrap(), Rgb::new(1, 2, 3));
        assert!("256,0,0".parse::<Rgb>().is_err());
        assert!("1,2".parse::<Rgb>().is_err());
        assert!("1,2,3,4".parse::<Rgb>().is_err());
        assert!("red".parse::<Rgb>().is_err());
        assert!("-1,0,0".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_rgb_display_matches_parse() {
        let c = Rgb::new(12, 0, 255);
        assert_eq!(c.to_string(), "12,0,255");
        assert_eq!(c.to_string().parse::<Rgb>().unwrap(), c);
    }

    #[test]
    fn test_rgb_serde_as_string() {
        let yaml = serde_yaml::to_string(&Rgb::CYAN).unwrap();
        assert_eq!(yaml.trim().trim_matches(['\'', '"']), "0,255,255");
        let back: Rgb = serde_yaml::from_str("'9,8,7'").unwrap();
        assert_eq!(back, Rgb::new(9, 8, 7));
        assert!(serde_yaml::from_str::<Rgb>("'9,8'").is_err());
    }
}
