/*
 *  display/mod.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem: frame records and the sinks that show them
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

pub mod drivers;
pub mod error;
pub mod record;
pub mod traits;

// Re-exports for convenience
pub use drivers::{create_sink, ConsoleSink, FrameLayout, FrameSink, MockSink, MockSinkState, SinkKind};
pub use error::DisplayError;
pub use record::{DisplayLine, DisplayRecord, Rgb};
pub use traits::RenderSink;
