/*
 *  display/drivers/mod.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  Render sink implementations and selection
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

pub mod console;
pub mod framebuffer;
pub mod mock;

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::DisplaySettings;
use crate::display::error::DisplayError;
use crate::display::traits::RenderSink;

pub use console::ConsoleSink;
pub use framebuffer::{FrameLayout, FrameSink};
pub use mock::{MockSink, MockSinkState};

/// Sink selection, from config `display.sink` or `--sink`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Log each changed frame as text
    #[default]
    Console,
    /// Rasterize into an in-memory RGB panel buffer
    Frame,
}

/// Build the configured sink
pub fn create_sink(settings: &DisplaySettings) -> Result<Box<dyn RenderSink>, DisplayError> {
    if settings.width == 0 || settings.height == 0 {
        return Err(DisplayError::InvalidConfiguration(format!(
            "panel must be at least 1x1, got {}x{}",
            settings.width, settings.height
        )));
    }
    let sink: Box<dyn RenderSink> = match settings.sink {
        SinkKind::Console => Box::new(ConsoleSink::new(settings.width, settings.height)),
        SinkKind::Frame => {
            let layout = FrameLayout {
                x: settings.x,
                y: settings.y,
                line_spacing: settings.line_spacing,
            };
            let mut sink = FrameSink::new(settings.width, settings.height, layout);
            if let Some(path) = settings.frame_dump.as_ref() {
                sink = sink.with_dump(path.clone());
            }
            Box::new(sink)
        }
    };
    let (w, h) = sink.dimensions();
    info!("render sink: {} {}x{}", sink.name(), w, h);
    Ok(sink)
}
