//! Click scheduler: the run state machine and the drift-corrected timing loop.
//!
//! A single worker thread is spawned per scheduler. It stays resident for the
//! scheduler's whole lifetime, parked on a condition variable whenever the
//! phase is not [`Phase::Running`]. Every command takes the same lock the
//! worker holds while it decides and fires, so phase transitions and click
//! counts are linearizable, and a command wakes the worker immediately
//! instead of waiting out the current interval.

use crate::config::ClickConfig;
use crate::error::{ClickError, Result};
use crate::input::{ClickerFactory, MouseClicker};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Upper bound on how long the parked worker sleeps between state checks.
const PARK_TIMEOUT: Duration = Duration::from_millis(50);

/// Consecutive click failures tolerated before the run is stopped.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "Idle",
            Phase::Running => "Running",
            Phase::Paused => "Paused",
            Phase::Stopped => "Stopped",
        })
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopCause {
    Requested,
    DurationElapsed,
    InputUnavailable,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchedulerEvent {
    Clicked { count: u64 },
    PhaseChanged { phase: Phase, cause: Option<StopCause> },
}

/// Receives scheduler events. Called without the state lock held, so it may
/// issue further commands.
pub type EventObserver = Arc<dyn Fn(SchedulerEvent) + Send + Sync>;

/// Snapshot returned by [`ClickScheduler::status`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Status {
    pub phase: Phase,
    pub click_count: u64,
    /// Rate of the schedule actually followed: clicks divided by the sum of
    /// effective intervals used so far. Nominal `1 / interval` before the
    /// first click, 0 without a configuration.
    pub clicks_per_second: f64,
    pub last_stop: Option<StopCause>,
}

struct RunState {
    phase: Phase,
    config: Option<ClickConfig>,
    click_count: u64,
    run_started_at: Option<Instant>,
    next_fire: Option<Instant>,
    scheduled_span: Duration,
    consecutive_failures: u32,
    last_stop: Option<StopCause>,
    shutdown: bool,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            config: None,
            click_count: 0,
            run_started_at: None,
            next_fire: None,
            scheduled_span: Duration::ZERO,
            consecutive_failures: 0,
            last_stop: None,
            shutdown: false,
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Running | Phase::Paused)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.shutdown {
            return Err(ClickError::invalid_operation("scheduler has been shut down"));
        }
        Ok(())
    }

    fn reset_counters(&mut self) {
        self.click_count = 0;
        self.scheduled_span = Duration::ZERO;
    }

    fn begin_run(&mut self, now: Instant) {
        self.reset_counters();
        self.consecutive_failures = 0;
        self.last_stop = None;
        self.run_started_at = Some(now);
        self.next_fire = Some(now);
        self.phase = Phase::Running;
    }

    fn halt(&mut self, cause: StopCause) {
        self.phase = Phase::Stopped;
        self.run_started_at = None;
        self.next_fire = None;
        self.last_stop = Some(cause);
    }

    fn clicks_per_second(&self) -> f64 {
        match self.config {
            Some(_) if self.click_count > 0 && !self.scheduled_span.is_zero() => {
                self.click_count as f64 / self.scheduled_span.as_secs_f64()
            }
            Some(config) => config.nominal_clicks_per_second(),
            None => 0.0,
        }
    }

    fn status(&self) -> Status {
        Status {
            phase: self.phase,
            click_count: self.click_count,
            clicks_per_second: self.clicks_per_second(),
            last_stop: self.last_stop,
        }
    }
}

struct Shared {
    state: Mutex<RunState>,
    wake: Condvar,
    observer: EventObserver,
}

impl Shared {
    /// Wakes the worker, releases the lock and then notifies the observer.
    fn publish(&self, guard: MutexGuard<'_, RunState>, event: Option<SchedulerEvent>) {
        self.wake.notify_all();
        drop(guard);
        if let Some(event) = event {
            (self.observer)(event);
        }
    }
}

fn phase_event(phase: Phase, cause: Option<StopCause>) -> Option<SchedulerEvent> {
    Some(SchedulerEvent::PhaseChanged { phase, cause })
}

/// Owns the run state and the click worker.
pub struct ClickScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ClickScheduler {
    /// Spawns the worker and acquires the clicker on it. Fails with
    /// `InputUnavailable` if the factory cannot produce a clicker.
    pub fn new(factory: ClickerFactory, observer: EventObserver) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(RunState::new()),
            wake: Condvar::new(),
            observer,
        });

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("click-worker".to_string())
            .spawn(move || match factory() {
                Ok(clicker) => {
                    let _ = ready_tx.send(Ok(()));
                    run_worker(&worker_shared, clicker);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                handle.join().ok();
                return Err(e);
            }
            Err(_) => {
                handle.join().ok();
                return Err(ClickError::input_unavailable("click worker exited during startup"));
            }
        }

        debug!("click worker started");
        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Accepts a new configuration and resets the run state to `Idle`.
    pub fn configure(&self, config: ClickConfig) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.ensure_live()?;
        if state.is_active() {
            return Err(ClickError::invalid_operation(format!(
                "cannot change configuration while {}",
                state.phase
            )));
        }
        let changed = state.phase != Phase::Idle;
        state.config = Some(config);
        state.phase = Phase::Idle;
        state.reset_counters();
        state.run_started_at = None;
        state.next_fire = None;
        state.last_stop = None;
        debug!(?config, "configuration accepted");
        let event = if changed { phase_event(Phase::Idle, None) } else { None };
        self.shared.publish(state, event);
        Ok(())
    }

    /// Configures and starts a fresh run in one step.
    pub fn start(&self, config: ClickConfig) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.ensure_live()?;
        if state.is_active() {
            return Err(ClickError::invalid_operation(format!("already {}", state.phase)));
        }
        state.config = Some(config);
        self.begin(state);
        Ok(())
    }

    fn begin(&self, mut state: MutexGuard<'_, RunState>) {
        state.begin_run(Instant::now());
        info!("clicking started");
        self.shared.publish(state, phase_event(Phase::Running, None));
    }

    pub fn pause(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.phase != Phase::Running {
            return Err(ClickError::invalid_operation(format!("cannot pause while {}", state.phase)));
        }
        state.phase = Phase::Paused;
        info!(clicks = state.click_count, "clicking paused");
        self.shared.publish(state, phase_event(Phase::Paused, None));
        Ok(())
    }

    /// Resumes a paused run. The schedule is re-anchored to now so no
    /// catch-up burst fires; the auto-stop clock keeps the original start.
    pub fn resume(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.ensure_live()?;
        if state.phase != Phase::Paused {
            return Err(ClickError::invalid_operation(format!("cannot resume while {}", state.phase)));
        }
        state.phase = Phase::Running;
        state.next_fire = Some(Instant::now());
        info!("clicking resumed");
        self.shared.publish(state, phase_event(Phase::Running, None));
        Ok(())
    }

    /// Ends the run from any phase. Stopping twice is a no-op.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if state.phase == Phase::Stopped {
            return;
        }
        state.halt(StopCause::Requested);
        info!(clicks = state.click_count, "clicking stopped");
        self.shared.publish(state, phase_event(Phase::Stopped, Some(StopCause::Requested)));
    }

    /// `Running -> Paused`, `Paused -> Running`, `Idle | Stopped -> Running`
    /// (a fresh run with the last configuration). Returns the new phase.
    pub fn toggle(&self) -> Result<Phase> {
        let mut state = self.shared.state.lock();
        state.ensure_live()?;
        let phase = state.phase;
        match phase {
            Phase::Running => {
                state.phase = Phase::Paused;
                info!(clicks = state.click_count, "clicking paused");
                self.shared.publish(state, phase_event(Phase::Paused, None));
                Ok(Phase::Paused)
            }
            Phase::Paused => {
                state.phase = Phase::Running;
                state.next_fire = Some(Instant::now());
                info!("clicking resumed");
                self.shared.publish(state, phase_event(Phase::Running, None));
                Ok(Phase::Running)
            }
            Phase::Idle | Phase::Stopped => {
                if state.config.is_none() {
                    return Err(ClickError::invalid_operation("no configuration has been accepted"));
                }
                self.begin(state);
                Ok(Phase::Running)
            }
        }
    }

    /// Zeroes the click count. Not allowed while running.
    pub fn reset_count(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.phase == Phase::Running {
            return Err(ClickError::invalid_operation("cannot reset the click count while running"));
        }
        state.reset_counters();
        self.shared.publish(state, Some(SchedulerEvent::Clicked { count: 0 }));
        Ok(())
    }

    pub fn status(&self) -> Status {
        self.shared.state.lock().status()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Stops any run, terminates the worker and waits for it to release the
    /// clicker. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        let event = if state.is_active() {
            state.halt(StopCause::Requested);
            phase_event(Phase::Stopped, Some(StopCause::Requested))
        } else {
            None
        };
        state.shutdown = true;
        self.shared.publish(state, event);

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // Called from an observer on the worker itself; it exits on its own.
            return;
        }
        if handle.join().is_err() {
            error!("click worker panicked");
        }
        debug!("click worker joined");
    }
}

impl Drop for ClickScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &Shared, mut clicker: Box<dyn MouseClicker>) {
    let mut rng = rand::thread_rng();
    let mut state = shared.state.lock();

    loop {
        if state.shutdown {
            break;
        }
        if state.phase != Phase::Running {
            shared.wake.wait_for(&mut state, PARK_TIMEOUT);
            continue;
        }
        let Some(config) = state.config else {
            state.halt(StopCause::Requested);
            continue;
        };

        let now = Instant::now();
        let deadline = state
            .run_started_at
            .zip(config.duration())
            .and_then(|(started, limit)| auto_stop_deadline(started, limit));

        if deadline.is_some_and(|d| now >= d) {
            state.halt(StopCause::DurationElapsed);
            info!(clicks = state.click_count, "duration reached, stopping");
            let event = phase_event(Phase::Stopped, Some(StopCause::DurationElapsed));
            emit_unlocked(shared, &mut state, event);
            continue;
        }

        let target = state.next_fire.unwrap_or(now);
        if now < target {
            let wake_at = deadline.map_or(target, |d| d.min(target));
            shared.wake.wait_until(&mut state, wake_at);
            continue;
        }

        let effective = config.effective_interval(&mut rng);
        let Some(next) = next_fire_after(target, now, effective, config.interval()) else {
            state.halt(StopCause::Requested);
            error!(?effective, "next click is beyond the clock's range, stopping");
            let event = phase_event(Phase::Stopped, Some(StopCause::Requested));
            emit_unlocked(shared, &mut state, event);
            continue;
        };
        state.next_fire = Some(next);

        match clicker.click(config.button()) {
            Ok(()) => {
                state.click_count += 1;
                state.scheduled_span += effective;
                state.consecutive_failures = 0;
                let event = Some(SchedulerEvent::Clicked { count: state.click_count });
                emit_unlocked(shared, &mut state, event);
            }
            Err(reason) => {
                state.consecutive_failures += 1;
                warn!(
                    attempt = state.consecutive_failures,
                    %reason,
                    "click failed"
                );
                if state.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    state.halt(StopCause::InputUnavailable);
                    error!(
                        failures = state.consecutive_failures,
                        "mouse input unavailable, stopping"
                    );
                    let event = phase_event(Phase::Stopped, Some(StopCause::InputUnavailable));
                    emit_unlocked(shared, &mut state, event);
                }
            }
        }
    }

    drop(state);
    drop(clicker);
    debug!("click worker exiting");
}

/// `None` when the limit lies beyond the clock's range, which means unbounded.
fn auto_stop_deadline(started: Instant, limit: Duration) -> Option<Instant> {
    started.checked_add(limit)
}

/// Advances the schedule by `effective`. A schedule that fell a whole
/// interval behind (host stall) is re-anchored to `now` instead of bursting.
/// `None` when the next fire time is not representable.
fn next_fire_after(target: Instant, now: Instant, effective: Duration, interval: Duration) -> Option<Instant> {
    match target.checked_add(effective) {
        Some(next) if now.saturating_duration_since(next) <= interval => Some(next),
        _ => now.checked_add(effective),
    }
}

fn emit_unlocked(shared: &Shared, state: &mut MutexGuard<'_, RunState>, event: Option<SchedulerEvent>) {
    shared.wake.notify_all();
    if let Some(event) = event {
        MutexGuard::unlocked(state, || (shared.observer)(event));
    }
}
