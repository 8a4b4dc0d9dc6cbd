/*
 *  display/drivers/mock.rs
 *
 *  wxclock - clock and weather, once a second
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock render sink for testing
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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::display::error::DisplayError;
use crate::display::record::DisplayRecord;
use crate::display::traits::RenderSink;

/// Mock sink for testing
///
/// Records every frame it is asked to show and counts calls, so tests can
/// check what would have been on the panel and when. Clones share state.
#[derive(Debug, Clone)]
pub struct MockSink {
    width: u32,
    height: u32,
    state: Arc<Mutex<MockSinkState>>,
}

/// Internal state for the mock sink (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MockSinkState {
    /// Number of times draw() was called
    pub draw_count: usize,

    /// Number of times present() succeeded
    pub present_count: usize,

    /// Number of times clear() was called
    pub clear_count: usize,

    /// Frame waiting for present()
    pub staged: Option<DisplayRecord>,

    /// Every presented frame, oldest first
    pub presented: Vec<DisplayRecord>,

    /// Simulate failures (for error testing)
    pub simulate_draw_failure: bool,
    pub simulate_present_failure: bool,
}

impl MockSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, state: Arc::new(Mutex::new(MockSinkState::default())) }
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockSinkState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, MockSinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Text of every presented frame
    pub fn presented_texts(&self) -> Vec<Vec<String>> {
        self.lock()
            .presented
            .iter()
            .map(|r| r.lines.iter().map(|l| l.text.clone()).collect())
            .collect()
    }

    pub fn last_presented(&self) -> Option<DisplayRecord> {
        self.lock().presented.last().cloned()
    }

    pub fn set_fail_draw(&self, fail: bool) {
        self.lock().simulate_draw_failure = fail;
    }

    pub fn set_fail_present(&self, fail: bool) {
        self.lock().simulate_present_failure = fail;
    }
}

impl RenderSink for MockSink {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw(&mut self, record: &DisplayRecord) -> Result<(), DisplayError> {
        let mut state = self.lock();
        state.draw_count += 1;
        if state.simulate_draw_failure {
            return Err(DisplayError::Other("Simulated draw failure".to_string()));
        }
        state.staged = Some(record.clone());
        Ok(())
    }

    fn present(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock();
        if state.simulate_present_failure {
            return Err(DisplayError::Other("Simulated present failure".to_string()));
        }
        let frame = state.staged.take().ok_or(DisplayError::NothingStaged)?;
        state.presented.push(frame);
        state.present_count += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock();
        state.clear_count += 1;
        state.staged = None;
        Ok(())
    }
}
