//! # AutoClicky
//!
//! Repeated mouse clicks at a configurable rate, toggled by global hotkeys,
//! with optional human-like timing jitter and an optional auto-stop duration.
//!
//! ## Components
//!
//! - [`ClickScheduler`] owns the run state machine
//!   (`Idle -> Running <-> Paused -> Stopped`) and a resident worker thread
//!   that fires clicks against an absolute, drift-corrected schedule.
//! - [`HotkeyMatcher`] turns raw key press/release events into one callback
//!   per complete combo press.
//! - [`Controller`] serializes commands from hotkeys and the front end and
//!   fans status out to [`StatusSink`]s.
//!
//! Mouse injection (`inject`) and global key hooks (`hooks`) are default
//! features. Built with `--no-default-features` the core still runs against
//! [`DryRunClicker`] and explicit commands.
//!
//! ## Example
//!
//! ```no_run
//! use autoclicky::{input, ClickConfig, Controller};
//! use std::time::Duration;
//!
//! let controller = Controller::new(input::dry_run_clicker()).unwrap();
//! let config = ClickConfig::builder()
//!     .interval(Duration::from_millis(100))
//!     .humanize(true)
//!     .duration(Some(Duration::from_secs(5)))
//!     .build()
//!     .unwrap();
//! controller.on_start(config).unwrap();
//! std::thread::sleep(Duration::from_secs(1));
//! println!("{:?}", controller.on_status_tick());
//! controller.shutdown();
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod hotkey;
pub mod input;
pub mod listener;
pub mod scheduler;

pub use config::{ClickButton, ClickConfig, Jitter};
pub use controller::{Command, Controller, StatusSink, StatusUpdate};
pub use error::{ClickError, Result};
pub use hotkey::{Combo, HotkeyMatcher, KeyIdentifier};
pub use input::{DryRunClicker, MouseClicker, RecordingClicker};
pub use listener::KeyListener;
pub use scheduler::{ClickScheduler, Phase, SchedulerEvent, Status, StopCause};
