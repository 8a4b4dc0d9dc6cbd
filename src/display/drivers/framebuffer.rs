/*
 *  display/drivers/framebuffer.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  RGB panel sink backed by an in-memory double buffer
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, iso_8859_1::FONT_6X10};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use log::{debug, warn};

use crate::display::error::DisplayError;
use crate::display::record::DisplayRecord;
use crate::display::traits::RenderSink;
use crate::vframebuf::{DoubleBuffer, VarFrameBuf};

const FONT: MonoFont<'static> = FONT_6X10;

/// Text placement on the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// left edge of every line
    pub x: i32,
    /// top of the first line
    pub y: i32,
    /// extra pixels between lines
    pub line_spacing: i32,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self { x: 0, y: 0, line_spacing: 2 }
    }
}

pub struct FrameSink {
    buffers: DoubleBuffer<Rgb888>,
    layout: FrameLayout,
    staged: bool,
    dump: Option<PathBuf>,
}

impl FrameSink {
    pub fn new(width: u32, height: u32, layout: FrameLayout) -> Self {
        Self {
            buffers: DoubleBuffer::new(width, height, Rgb888::BLACK),
            layout,
            staged: false,
            dump: None,
        }
    }

    /// Also write every presented frame to `path` as a binary PPM.
    pub fn with_dump(mut self, path: PathBuf) -> Self {
        self.dump = Some(path);
        self
    }

    /// The buffer currently shown
    pub fn front(&self) -> &VarFrameBuf<Rgb888> {
        self.buffers.front()
    }

    pub fn line_height(&self) -> i32 {
        FONT.character_size.height as i32 + self.layout.line_spacing
    }

    pub fn write_ppm<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let fb = self.buffers.front();
        write!(out, "P6\n{} {}\n255\n", fb.width(), fb.height())?;
        for px in fb.as_slice() {
            out.write_all(&[px.r(), px.g(), px.b()])?;
        }
        out.flush()
    }

    fn dump_front(&self) {
        let Some(path) = self.dump.as_ref() else { return };
        let result = File::create(path).and_then(|f| self.write_ppm(&mut BufWriter::new(f)));
        if let Err(e) = result {
            warn!("frame dump to {} failed: {}", path.display(), e);
        }
    }
}

impl RenderSink for FrameSink {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn dimensions(&self) -> (u32, u32) {
        let fb = self.buffers.front();
        (fb.width() as u32, fb.height() as u32)
    }

    fn draw(&mut self, record: &DisplayRecord) -> Result<(), DisplayError> {
        let line_height = self.line_height();
        let FrameLayout { x, y, .. } = self.layout;
        let back = self.buffers.back_mut();
        back.clear(record.background.into())?;

        let mut top = y;
        for line in &record.lines {
            if let Some(outline) = record.outline {
                let style = MonoTextStyle::new(&FONT, Rgb888::from(outline));
                Text::with_baseline(&line.text, Point::new(x - 1, top), style, Baseline::Top)
                    .draw(&mut *back)?;
            }
            let style = MonoTextStyle::new(&FONT, Rgb888::from(line.color));
            Text::with_baseline(&line.text, Point::new(x, top), style, Baseline::Top).draw(&mut *back)?;
            top += line_height;
        }
        self.staged = true;
        Ok(())
    }

    fn present(&mut self) -> Result<(), DisplayError> {
        if !self.staged {
            return Err(DisplayError::NothingStaged);
        }
        self.buffers.swap();
        self.staged = false;
        debug!("frame {} presented", self.buffers.swaps());
        self.dump_front();
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.buffers.clear_both(Rgb888::BLACK);
        self.staged = false;
        self.dump_front();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::record::Rgb;

    fn record() -> DisplayRecord {
        let mut r = DisplayRecord::new(Rgb::new(0, 0, 255));
        r.push("12:34", Rgb::YELLOW);
        r.push("21C Clouds", Rgb::CYAN);
        r
    }

    #[test]
    fn test_draw_lands_in_back_buffer_until_present() {
        let mut sink = FrameSink::new(64, 32, FrameLayout::default());
        sink.draw(&record()).unwrap();
        assert_eq!(sink.front().count_matching(Rgb888::BLACK), 64 * 32);

        sink.present().unwrap();
        let fb = sink.front();
        assert!(fb.count_matching(Rgb888::new(0, 0, 255)) > 0);
        assert!(fb.count_matching(Rgb888::new(255, 255, 0)) > 0);
        assert!(fb.count_matching(Rgb888::new(0, 255, 255)) > 0);
    }

    #[test]
    fn test_lines_stack_by_font_height_and_spacing() {
        let mut sink = FrameSink::new(64, 32, FrameLayout { x: 0, y: 0, line_spacing: 2 });
        sink.draw(&record()).unwrap();
        sink.present().unwrap();
        let fb = sink.front();
        let row_has = |y: i32, c: Rgb888| (0..64).any(|x| fb.pixel(x, y) == Some(c));
        // first line occupies rows 0..10, second starts at 12
        assert!((0..10).any(|y| row_has(y, Rgb888::new(255, 255, 0))));
        assert!(!(12..32).any(|y| row_has(y, Rgb888::new(255, 255, 0))));
        assert!((12..22).any(|y| row_has(y, Rgb888::new(0, 255, 255))));
    }

    #[test]
    fn test_outline_drawn_under_text() {
        let mut r = record();
        r.outline = Some(Rgb::new(255, 0, 0));
        let mut sink = FrameSink::new(64, 32, FrameLayout { x: 2, y: 0, line_spacing: 2 });
        sink.draw(&r).unwrap();
        sink.present().unwrap();
        assert!(sink.front().count_matching(Rgb888::new(255, 0, 0)) > 0);
    }

    #[test]
    fn test_present_without_draw_fails() {
        let mut sink = FrameSink::new(8, 8, FrameLayout::default());
        assert!(matches!(sink.present(), Err(DisplayError::NothingStaged)));
    }

    #[test]
    fn test_ppm_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.ppm");
        let mut sink = FrameSink::new(4, 2, FrameLayout::default()).with_dump(path.clone());
        sink.draw(&DisplayRecord::new(Rgb::new(1, 2, 3))).unwrap();
        sink.present().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header = b"P6\n4 2\n255\n";
        assert!(bytes.starts_with(header));
        assert_eq!(bytes.len(), header.len() + 4 * 2 * 3);
        assert_eq!(&bytes[header.len()..header.len() + 3], &[1, 2, 3]);
    }

    #[test]
    fn test_clear_blanks_front() {
        let mut sink = FrameSink::new(16, 16, FrameLayout::default());
        sink.draw(&record()).unwrap();
        sink.present().unwrap();
        sink.clear().unwrap();
        assert_eq!(sink.front().count_matching(Rgb888::BLACK), 16 * 16);
    }
}
