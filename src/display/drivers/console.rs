/*
 *  display/drivers/console.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  Text sink: frames go to the log
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

use log::{debug, info};

use crate::display::error::DisplayError;
use crate::display::record::DisplayRecord;
use crate::display::traits::RenderSink;

/// Logs a frame when its text differs from the one already shown, so a
/// `%H:%M` face produces one line a minute rather than one a second.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    width: u32,
    height: u32,
    staged: Option<DisplayRecord>,
    shown: Option<DisplayRecord>,
    presents: u64,
}

impl ConsoleSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, ..Default::default() }
    }

    /// Frame currently "on screen"
    pub fn shown(&self) -> Option<&DisplayRecord> {
        self.shown.as_ref()
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }
}

impl RenderSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw(&mut self, record: &DisplayRecord) -> Result<(), DisplayError> {
        self.staged = Some(record.clone());
        Ok(())
    }

    fn present(&mut self) -> Result<(), DisplayError> {
        let frame = self.staged.take().ok_or(DisplayError::NothingStaged)?;
        self.presents += 1;
        if self.shown.as_ref().map(|s| s.texts()) != Some(frame.texts()) {
            info!("| {} |", frame.texts().join(" | "));
        } else {
            debug!("frame {} unchanged", self.presents);
        }
        self.shown = Some(frame);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.staged = None;
        if self.shown.take().is_some() {
            info!("display cleared");
        }
        Ok(())
    }
}
