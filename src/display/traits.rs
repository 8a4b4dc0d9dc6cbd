/*
 *  display/traits.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  Render sink abstraction
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

use crate::display::error::DisplayError;
use crate::display::record::DisplayRecord;

/// Where frames go.
///
/// Drawing and showing are split so a frame can be staged ahead of its
/// deadline and swapped in right on the second: `draw` renders into an
/// offscreen buffer, `present` makes it visible.
pub trait RenderSink: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Returns the output dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Render `record` offscreen, replacing anything staged before.
    fn draw(&mut self, record: &DisplayRecord) -> Result<(), DisplayError>;

    /// Swap the staged frame onto the output.
    fn present(&mut self) -> Result<(), DisplayError>;

    /// Blank the output
    fn clear(&mut self) -> Result<(), DisplayError>;
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn draw(&mut self, record: &DisplayRecord) -> Result<(), DisplayError> {
        (**self).draw(record)
    }

    fn present(&mut self) -> Result<(), DisplayError> {
        (**self).present()
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        (**self).clear()
    }
}
