/*
 *  lib.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Library root, shared by the binary and the integration tests
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

pub mod app;
pub mod config;
pub mod display;
pub mod face;
pub mod jsonpath;
pub mod pacer;
pub mod shutdown;
pub mod vframebuf;
pub mod weather;

pub use app::WeatherClock;
pub use jsonpath::{BraceMode, Extractor, KeyPath, RawValue};
pub use pacer::{CadenceReport, Clock, ManualClock, Pacer, StopFlag, SystemClock, Tick, TickHandler};
