/*
 *  app.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Glue between the cadence, the weather provider and the sink
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

use anyhow::Context;
use log::{debug, info};

use crate::display::RenderSink;
use crate::face::ClockFace;
use crate::pacer::{RefreshState, Tick, TickHandler};
use crate::weather::{WeatherData, WeatherProvider};

/// The clock itself: fetch through `P`, draw through `S`.
pub struct WeatherClock<P, S> {
    provider: P,
    sink: S,
    face: ClockFace,
    frames: u64,
}

impl<P: WeatherProvider, S: RenderSink> WeatherClock<P, S> {
    pub fn new(provider: P, sink: S, face: ClockFace) -> Self {
        info!("{} -> {} sink", provider.name(), sink.name());
        Self { provider, sink, face, frames: 0 }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Frames actually presented.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<P: WeatherProvider, S: RenderSink> TickHandler for WeatherClock<P, S> {
    type Record = WeatherData;

    async fn on_refresh(&mut self) -> anyhow::Result<WeatherData> {
        self.provider
            .current()
            .await
            .with_context(|| format!("{} fetch", self.provider.name()))
    }

    fn on_tick(&mut self, tick: &Tick, state: &RefreshState<WeatherData>) -> anyhow::Result<()> {
        let record = self.face.compose(&tick.local(), state.record());
        self.sink.draw(&record)?;
        Ok(())
    }

    fn on_present(&mut self, tick: &Tick) -> anyhow::Result<()> {
        self.sink.present()?;
        self.frames += 1;
        debug!("frame {} up at {}", self.frames, tick.deadline);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplaySettings;
    use crate::display::MockSink;
    use crate::face::LOADING;
    use crate::weather::{Units, WeatherApiError};
    use chrono::{TimeZone, Utc};

    struct Fixed(Option<f64>);

    impl WeatherProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn current(&self) -> Result<WeatherData, WeatherApiError> {
            match self.0 {
                Some(temp) => Ok(WeatherData { temp, condition_main: "Clear".into(), ..WeatherData::default() }),
                None => Err(WeatherApiError::MissingData("nothing".into())),
            }
        }
    }

    fn clock(provider: Fixed) -> (WeatherClock<Fixed, MockSink>, MockSink) {
        let sink = MockSink::new(128, 32);
        let face = ClockFace::new(&DisplaySettings::default(), Units::Metric);
        (WeatherClock::new(provider, sink.clone(), face), sink)
    }

    fn tick(seq: u64) -> Tick {
        Tick { seq, deadline: Utc.timestamp_opt(1_700_000_000 + seq as i64, 0).unwrap() }
    }

    #[tokio::test]
    async fn test_refresh_goes_through_provider() {
        let (mut app, _) = clock(Fixed(Some(12.6)));
        assert_eq!(app.on_refresh().await.unwrap().temp, 12.6);

        let (mut app, _) = clock(Fixed(None));
        let err = app.on_refresh().await.unwrap_err();
        assert!(format!("{err:#}").contains("fixed fetch"));
    }

    #[test]
    fn test_tick_then_present() {
        let (mut app, sink) = clock(Fixed(None));
        let state = RefreshState::default();
        app.on_tick(&tick(0), &state).unwrap();
        assert!(sink.presented_texts().is_empty());
        app.on_present(&tick(0)).unwrap();
        assert_eq!(app.frames(), 1);
        assert_eq!(sink.presented_texts()[0][1], LOADING);
    }

    #[test]
    fn test_sink_errors_surface() {
        let (mut app, sink) = clock(Fixed(None));
        sink.set_fail_draw(true);
        assert!(app.on_tick(&tick(0), &RefreshState::default()).is_err());
        assert!(app.on_present(&tick(0)).is_err());
        assert_eq!(app.frames(), 0);
    }
}
