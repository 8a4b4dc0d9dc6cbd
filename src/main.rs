/*
 *  main.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Entry point: load settings, wire provider and sink, tick until signalled
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
use env_logger::Env;
use log::{error, info};

use wxclock::config;
use wxclock::display::{create_sink, RenderSink};
use wxclock::face::ClockFace;
use wxclock::pacer::{Pacer, StopFlag, SystemClock};
use wxclock::shutdown::ShutdownSignals;
use wxclock::weather::OpenWeather;
use wxclock::WeatherClock;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (cfg, cli) = config::load()?;

    if cli.dump_config {
        print!("{}", cfg.dump()?);
        return Ok(());
    }

    let settings = cfg.resolve()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    info!("{} - clock and weather, once a second", env!("CARGO_PKG_NAME"));
    info!("v.{} built {} ({})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_PROFILE);

    let provider = OpenWeather::new(&settings.weather)?;
    let sink = create_sink(&settings.display)?;
    let face = ClockFace::new(&settings.display, settings.weather.units);
    let mut app = WeatherClock::new(provider, sink, face);

    let signals = ShutdownSignals::install().context("installing signal handlers")?;
    let stop = StopFlag::new();
    signals.watch(stop.clone());

    let pacer = Pacer::new(SystemClock, settings.weather.refresh, stop);
    let report = pacer.run(&mut app).await;

    info!(
        "{} frames shown over {} ticks, {} of {} refreshes failed",
        app.frames(),
        report.ticks,
        report.refresh_failures,
        report.refresh_attempts
    );

    if let Err(e) = app.sink_mut().clear() {
        error!("Failed to clear {}: {e}", app.sink().name());
    }
    Ok(())
}
