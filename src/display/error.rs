/*
 *  display/error.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for render sinks
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

use core::convert::Infallible;
use thiserror::Error;

/// Unified error type for all display operations
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Color string was not `r,g,b` with each part 0-255
    #[error("invalid color '{0}', expected r,g,b with values 0-255")]
    InvalidColor(String),

    /// Invalid configuration
    #[error("invalid display configuration: {0}")]
    InvalidConfiguration(String),

    /// Present called with nothing staged
    #[error("nothing staged to present")]
    NothingStaged,

    /// Drawing operation failed
    #[error("drawing error: {0}")]
    DrawingError(String),

    /// Console or file output failed
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

// in-memory draw targets never fail
impl From<Infallible> for DisplayError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
