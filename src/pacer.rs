/*
 *  pacer.rs
 *
 *  wxclock - clock and weather, once a second
 *	(c) 2020-26 Stuart Hunter
 *
 *	Absolute-deadline tick loop with a coarse refresh
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
#![allow(async_fn_in_trait)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, SubsecRound, TimeDelta, Utc};
use log::{debug, error, info, warn};

/// Wall-clock source for the tick loop.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Return once `deadline` has been reached. A deadline already in the
    /// past returns at once.
    async fn wait_until(&self, deadline: DateTime<Utc>);
}

/// Real time. Sleeps on tokio, re-reading the wall clock after every nap so
/// a clock step (NTP, RTC sync) is honored instead of drifting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

// upper bound on a single nap so wall-clock steps are noticed
const MAX_NAP: Duration = Duration::from_secs(1);

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn wait_until(&self, deadline: DateTime<Utc>) {
        loop {
            let Ok(remaining) = (deadline - Utc::now()).to_std() else {
                return;
            };
            if remaining.is_zero() {
                return;
            }
            tokio::time::sleep(remaining.min(MAX_NAP)).await;
        }
    }
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    waits: Vec<DateTime<Utc>>,
}

/// Virtual clock: time only moves when told to, or when a wait jumps it
/// forward to the requested deadline. Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { inner: Arc::new(Mutex::new(ManualState { now: start, waits: Vec::new() })) }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate time spent working.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
        self.state().now += delta;
    }

    /// Every deadline passed to `wait_until`, in order.
    pub fn waits(&self) -> Vec<DateTime<Utc>> {
        self.state().waits.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state().now
    }

    async fn wait_until(&self, deadline: DateTime<Utc>) {
        {
            let mut st = self.state();
            st.waits.push(deadline);
            if deadline > st.now {
                st.now = deadline;
            }
        }
        tokio::task::yield_now().await;
    }
}

/// Cooperative stop request, checked once per tick boundary.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One iteration of the cadence, bound to a whole-second deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub seq: u64,
    pub deadline: DateTime<Utc>,
}

impl Tick {
    /// Deadline in the local timezone, for clock faces.
    pub fn local(&self) -> DateTime<Local> {
        self.deadline.with_timezone(&Local)
    }
}

/// Cached result of the last successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshState<R> {
    record: Option<R>,
    updated_at: Option<DateTime<Utc>>,
}

impl<R> Default for RefreshState<R> {
    fn default() -> Self {
        Self { record: None, updated_at: None }
    }
}

impl<R> RefreshState<R> {
    pub fn record(&self) -> Option<&R> {
        self.record.as_ref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn has_data(&self) -> bool {
        self.record.is_some()
    }

    fn store(&mut self, record: R, at: DateTime<Utc>) {
        self.record = Some(record);
        self.updated_at = Some(at);
    }
}

/// The work done inside the cadence.
pub trait TickHandler {
    type Record;

    /// Slow path, run at most once per tick when the refresh interval is up.
    async fn on_refresh(&mut self) -> anyhow::Result<Self::Record>;

    /// Stage this tick's frame.
    fn on_tick(&mut self, tick: &Tick, state: &RefreshState<Self::Record>) -> anyhow::Result<()>;

    /// Called on the deadline itself; swap whatever `on_tick` staged.
    fn on_present(&mut self, _tick: &Tick) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CadenceReport {
    pub ticks: u64,
    pub refresh_attempts: u64,
    pub refresh_failures: u64,
    pub late_ticks: u64,
}

/// Once-a-second driver. Deadlines are absolute: each one is exactly one
/// second after the last no matter how long the tick took, so render and
/// refresh latency never accumulate into drift.
pub struct Pacer<C> {
    clock: C,
    refresh_every: Duration,
    stop: StopFlag,
}

impl<C: Clock> Pacer<C> {
    pub fn new(clock: C, refresh_every: Duration, stop: StopFlag) -> Self {
        Self { clock, refresh_every, stop }
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn refresh_due(&self, last_attempt: Option<DateTime<Utc>>, deadline: DateTime<Utc>) -> bool {
        match last_attempt {
            None => true,
            Some(last) => (deadline - last)
                .to_std()
                .map(|elapsed| elapsed >= self.refresh_every)
                .unwrap_or(false),
        }
    }

    /// Tick until the stop flag is seen at the top of an iteration.
    pub async fn run<H: TickHandler>(&self, handler: &mut H) -> CadenceReport {
        let one_second = TimeDelta::seconds(1);
        let mut report = CadenceReport::default();
        let mut state = RefreshState::<H::Record>::default();
        let mut last_attempt: Option<DateTime<Utc>> = None;
        let mut deadline = self.clock.now().trunc_subsecs(0);

        info!("cadence starting at {}, refresh every {}s", deadline, self.refresh_every.as_secs());

        while !self.stop.is_stopped() {
            let tick = Tick { seq: report.ticks, deadline };

            if self.refresh_due(last_attempt, deadline) {
                // failures count as attempts too, no retry until the next interval
                last_attempt = Some(deadline);
                report.refresh_attempts += 1;
                match handler.on_refresh().await {
                    Ok(record) => {
                        debug!("refresh ok at {deadline}");
                        state.store(record, deadline);
                    }
                    Err(e) => {
                        report.refresh_failures += 1;
                        warn!("refresh failed, keeping previous data: {e:#}");
                    }
                }
            }

            handler
                .on_tick(&tick, &state)
                .unwrap_or_else(|e| error!("Failed to compose tick {}: {e:#}", tick.seq));

            // the first deadline is the current second, already under way
            let now = self.clock.now();
            if tick.seq > 0 && now > deadline {
                report.late_ticks += 1;
                debug!("tick {} late by {}ms", tick.seq, (now - deadline).num_milliseconds());
            }

            self.clock.wait_until(deadline).await;

            handler
                .on_present(&tick)
                .unwrap_or_else(|e| error!("Failed to present tick {}: {e:#}", tick.seq));

            report.ticks += 1;
            deadline += one_second;
        }

        info!(
            "cadence stopped after {} ticks ({} refreshes, {} failed, {} late)",
            report.ticks, report.refresh_attempts, report.refresh_failures, report.late_ticks
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use rand::Rng;
    use std::collections::VecDeque;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    /// Scripted handler: stops after `limit` presented ticks.
    struct Script {
        clock: ManualClock,
        stop: StopFlag,
        limit: usize,
        render_cost: Box<dyn FnMut() -> Duration>,
        refresh_cost: Duration,
        results: VecDeque<anyhow::Result<u32>>,
        deadlines: Vec<DateTime<Utc>>,
        seen: Vec<(Option<u32>, Option<DateTime<Utc>>)>,
        presented: usize,
        refreshes: usize,
        in_flight: usize,
        max_in_flight: usize,
        stop_during_refresh: bool,
        fail_render_on_odd: bool,
    }

    impl Script {
        fn new(clock: &ManualClock, stop: &StopFlag, limit: usize) -> Self {
            Self {
                clock: clock.clone(),
                stop: stop.clone(),
                limit,
                render_cost: Box::new(|| Duration::ZERO),
                refresh_cost: Duration::ZERO,
                results: VecDeque::new(),
                deadlines: Vec::new(),
                seen: Vec::new(),
                presented: 0,
                refreshes: 0,
                in_flight: 0,
                max_in_flight: 0,
                stop_during_refresh: false,
                fail_render_on_odd: false,
            }
        }
    }

    impl TickHandler for Script {
        type Record = u32;

        async fn on_refresh(&mut self) -> anyhow::Result<u32> {
            self.in_flight += 1;
            self.max_in_flight = self.max_in_flight.max(self.in_flight);
            self.refreshes += 1;
            tokio::task::yield_now().await;
            self.clock.advance(self.refresh_cost);
            if self.stop_during_refresh {
                self.stop.stop();
            }
            self.in_flight -= 1;
            self.results.pop_front().unwrap_or(Ok(self.refreshes as u32))
        }

        fn on_tick(&mut self, tick: &Tick, state: &RefreshState<u32>) -> anyhow::Result<()> {
            self.deadlines.push(tick.deadline);
            self.seen.push((state.record().copied(), state.updated_at()));
            let cost = (self.render_cost)();
            self.clock.advance(cost);
            if self.fail_render_on_odd && tick.seq % 2 == 1 {
                return Err(anyhow!("panel went away"));
            }
            Ok(())
        }

        fn on_present(&mut self, _tick: &Tick) -> anyhow::Result<()> {
            self.presented += 1;
            if self.presented >= self.limit {
                self.stop.stop();
            }
            Ok(())
        }
    }

    fn expected(n: usize) -> Vec<DateTime<Utc>> {
        (0..n as i64).map(|i| start() + secs(i)).collect()
    }

    #[tokio::test]
    async fn test_deadlines_do_not_drift_under_render_jitter() {
        let clock = ManualClock::new(start() + TimeDelta::milliseconds(250));
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(600), stop.clone());
        let mut script = Script::new(&clock, &stop, 61);
        script.render_cost = Box::new(|| Duration::from_millis(rand::rng().random_range(0..=900)));

        let report = pacer.run(&mut script).await;

        assert_eq!(report.ticks, 61);
        assert_eq!(script.deadlines, expected(61));
        assert_eq!(clock.waits(), expected(61));
        assert_eq!(report.refresh_attempts, 1);
    }

    #[tokio::test]
    async fn test_slow_refresh_delays_tick_but_not_schedule() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(3), stop.clone());
        let mut script = Script::new(&clock, &stop, 10);
        script.refresh_cost = Duration::from_secs(5);

        let report = pacer.run(&mut script).await;

        assert_eq!(script.deadlines, expected(10));
        assert_eq!(report.refresh_attempts, 4);
        assert!(report.late_ticks > 0);
    }

    #[tokio::test]
    async fn test_refresh_counted_per_interval() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(3), stop.clone());
        let mut script = Script::new(&clock, &stop, 10);

        let report = pacer.run(&mut script).await;

        // ticks 0, 3, 6, 9
        assert_eq!(report.refresh_attempts, 4);
        assert_eq!(report.refresh_failures, 0);
        assert_eq!(report.late_ticks, 0);
    }

    #[tokio::test]
    async fn test_zero_interval_refreshes_every_tick() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::ZERO, stop.clone());
        let mut script = Script::new(&clock, &stop, 5);

        let report = pacer.run(&mut script).await;

        assert_eq!(report.refresh_attempts, 5);
        assert_eq!(script.max_in_flight, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cached_record() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(1), stop.clone());
        let mut script = Script::new(&clock, &stop, 5);
        script.results = VecDeque::from(vec![
            Ok(1),
            Err(anyhow!("timeout")),
            Err(anyhow!("502")),
            Ok(4),
        ]);

        let report = pacer.run(&mut script).await;

        assert_eq!(report.ticks, 5);
        assert_eq!(report.refresh_attempts, 5);
        assert_eq!(report.refresh_failures, 2);
        assert_eq!(script.seen[0], (Some(1), Some(start())));
        assert_eq!(script.seen[1], (Some(1), Some(start())));
        assert_eq!(script.seen[2], (Some(1), Some(start())));
        assert_eq!(script.seen[3], (Some(4), Some(start() + secs(3))));
        assert_eq!(script.deadlines, expected(5));
    }

    #[tokio::test]
    async fn test_no_data_until_first_success() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(2), stop.clone());
        let mut script = Script::new(&clock, &stop, 3);
        script.results = VecDeque::from(vec![Err(anyhow!("dns")), Ok(7)]);

        pacer.run(&mut script).await;

        assert_eq!(script.seen[0], (None, None));
        assert_eq!(script.seen[1], (None, None));
        assert_eq!(script.seen[2], (Some(7), Some(start() + secs(2))));
    }

    #[tokio::test]
    async fn test_stop_before_first_tick() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        stop.stop();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(600), stop.clone());
        let mut script = Script::new(&clock, &stop, 10);

        let report = pacer.run(&mut script).await;

        assert_eq!(report, CadenceReport::default());
        assert_eq!(script.refreshes, 0);
        assert!(clock.waits().is_empty());
    }

    #[tokio::test]
    async fn test_stop_during_refresh_lands_on_tick_boundary() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(600), stop.clone());
        let mut script = Script::new(&clock, &stop, 100);
        script.refresh_cost = Duration::from_secs(30);
        script.stop_during_refresh = true;

        let report = pacer.run(&mut script).await;

        // the tick that was refreshing still renders and presents once
        assert_eq!(report.ticks, 1);
        assert_eq!(script.presented, 1);
        assert_eq!(report.refresh_attempts, 1);
    }

    #[tokio::test]
    async fn test_render_errors_do_not_stop_ticks() {
        let clock = ManualClock::new(start());
        let stop = StopFlag::new();
        let pacer = Pacer::new(clock.clone(), Duration::from_secs(600), stop.clone());
        let mut script = Script::new(&clock, &stop, 6);
        script.fail_render_on_odd = true;

        let report = pacer.run(&mut script).await;

        assert_eq!(report.ticks, 6);
        assert_eq!(script.presented, 6);
        assert_eq!(script.deadlines, expected(6));
    }

    #[tokio::test]
    async fn test_system_clock_past_deadline_returns() {
        let past = Utc::now() - secs(5);
        tokio::time::timeout(Duration::from_secs(1), SystemClock.wait_until(past))
            .await
            .expect("wait on a past deadline should return at once");
    }

    #[tokio::test]
    async fn test_system_clock_waits_for_deadline() {
        let deadline = Utc::now() + TimeDelta::milliseconds(150);
        SystemClock.wait_until(deadline).await;
        assert!(Utc::now() >= deadline);
    }

    #[test]
    fn test_tick_local_matches_deadline() {
        let tick = Tick { seq: 0, deadline: start() };
        assert_eq!(tick.local().timestamp(), 1_700_000_000);
    }
}
