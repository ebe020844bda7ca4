//! Glue between command sources (hotkeys, window, console) and the scheduler.
//!
//! Presentation adapters implement [`StatusSink`] to receive updates and send
//! [`Command`]s (or call the `on_*` methods) to drive the run. All methods take
//! `&self`; share the controller through an `Arc`.

use crate::config::ClickConfig;
use crate::error::Result;
use crate::input::ClickerFactory;
use crate::scheduler::{ClickScheduler, EventObserver, Phase, SchedulerEvent, Status, StopCause};
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Receives status updates. Called from whichever thread caused the change,
/// sometimes while a command is in flight, so implementations must not call
/// back into the [`Controller`].
pub trait StatusSink: Send + Sync {
    fn clicked(&self, count: u64);
    fn phase_changed(&self, phase: Phase, cause: Option<StopCause>);
}

/// Commands a presentation layer can issue.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Start(ClickConfig),
    Toggle,
    Stop,
    ResetCount,
}

/// Owned form of a status update, for adapters that hop threads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatusUpdate {
    Clicked(u64),
    Phase(Phase, Option<StopCause>),
}

impl StatusSink for Sender<StatusUpdate> {
    fn clicked(&self, count: u64) {
        let _ = self.send(StatusUpdate::Clicked(count));
    }

    fn phase_changed(&self, phase: Phase, cause: Option<StopCause>) {
        let _ = self.send(StatusUpdate::Phase(phase, cause));
    }
}

#[derive(Default)]
struct Fanout {
    sinks: RwLock<Vec<Arc<dyn StatusSink>>>,
}

impl Fanout {
    fn deliver(&self, event: SchedulerEvent) {
        for sink in self.sinks.read().iter() {
            match event {
                SchedulerEvent::Clicked { count } => sink.clicked(count),
                SchedulerEvent::PhaseChanged { phase, cause } => sink.phase_changed(phase, cause),
            }
        }
    }
}

pub struct Controller {
    scheduler: ClickScheduler,
    fanout: Arc<Fanout>,
    // One command at a time across hotkey, signal and presentation threads.
    commands: Mutex<()>,
}

impl Controller {
    pub fn new(factory: ClickerFactory) -> Result<Self> {
        let fanout = Arc::new(Fanout::default());
        let observer: EventObserver = {
            let fanout = Arc::clone(&fanout);
            Arc::new(move |event: SchedulerEvent| fanout.deliver(event))
        };
        let scheduler = ClickScheduler::new(factory, observer)?;
        Ok(Self {
            scheduler,
            fanout,
            commands: Mutex::new(()),
        })
    }

    pub fn subscribe(&self, sink: Arc<dyn StatusSink>) {
        self.fanout.sinks.write().push(sink);
    }

    /// Accepts a configuration without starting; the next toggle starts it.
    pub fn configure(&self, config: ClickConfig) -> Result<()> {
        let _guard = self.commands.lock();
        self.scheduler.configure(config)
    }

    /// Starts a fresh run with `config`. Fails with `InvalidOperation` if a
    /// run is already active.
    pub fn on_start(&self, config: ClickConfig) -> Result<()> {
        let _guard = self.commands.lock();
        self.scheduler.start(config)
    }

    pub fn on_toggle(&self) -> Result<Phase> {
        let _guard = self.commands.lock();
        self.scheduler.toggle()
    }

    pub fn on_stop(&self) {
        let _guard = self.commands.lock();
        self.scheduler.stop();
    }

    pub fn on_reset_count(&self) -> Result<()> {
        let _guard = self.commands.lock();
        self.scheduler.reset_count()
    }

    pub fn on_status_tick(&self) -> Status {
        self.scheduler.status()
    }

    pub fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Start(config) => self.on_start(config),
            Command::Toggle => self.on_toggle().map(|_| ()),
            Command::Stop => {
                self.on_stop();
                Ok(())
            }
            Command::ResetCount => self.on_reset_count(),
        }
    }

    /// Stops the run and joins the click worker.
    pub fn shutdown(&self) {
        let _guard = self.commands.lock();
        self.scheduler.shutdown();
    }
}
