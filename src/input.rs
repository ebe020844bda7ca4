//! Mouse injection seam.
//!
//! The scheduler never talks to the OS directly. It asks a [`ClickerFactory`]
//! for a [`MouseClicker`] on its own worker thread, so platform handles that
//! are not `Send` stay on the thread that created them and are dropped when
//! that thread exits.

use crate::config::ClickButton;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Clicks at the current cursor position.
pub trait MouseClicker {
    fn click(&mut self, button: ClickButton) -> std::result::Result<(), String>;
}

/// Builds the clicker on the worker thread.
pub type ClickerFactory = Box<dyn FnOnce() -> Result<Box<dyn MouseClicker>> + Send>;

#[cfg(feature = "inject")]
mod enigo_backend {
    use super::MouseClicker;
    use crate::config::ClickButton;
    use crate::error::Result;
    use enigo::{MouseButton, MouseControllable};

    impl ClickButton {
        fn to_enigo(self) -> MouseButton {
            match self {
                ClickButton::Left => MouseButton::Left,
                ClickButton::Right => MouseButton::Right,
                ClickButton::Middle => MouseButton::Middle,
            }
        }
    }

    /// Real OS mouse injection.
    pub struct EnigoClicker {
        enigo: enigo::Enigo,
    }

    impl EnigoClicker {
        pub fn new() -> Result<Self> {
            Ok(Self { enigo: enigo::Enigo::new() })
        }
    }

    impl MouseClicker for EnigoClicker {
        fn click(&mut self, button: ClickButton) -> std::result::Result<(), String> {
            self.enigo.mouse_click(button.to_enigo());
            Ok(())
        }
    }
}

#[cfg(feature = "inject")]
pub use enigo_backend::EnigoClicker;

/// Factory for the OS clicker. Fails with `InputUnavailable` when the crate
/// was built without the `inject` feature.
pub fn system_clicker() -> ClickerFactory {
    Box::new(|| {
        #[cfg(feature = "inject")]
        {
            Ok(Box::new(EnigoClicker::new()?) as Box<dyn MouseClicker>)
        }
        #[cfg(not(feature = "inject"))]
        {
            Err(crate::error::ClickError::input_unavailable(
                "built without mouse injection support (enable the `inject` feature or use --dry-run)",
            ))
        }
    })
}

/// Logs clicks instead of injecting them.
#[derive(Debug, Default)]
pub struct DryRunClicker {
    clicks: u64,
}

impl MouseClicker for DryRunClicker {
    fn click(&mut self, button: ClickButton) -> std::result::Result<(), String> {
        self.clicks += 1;
        tracing::debug!(%button, n = self.clicks, "dry-run click");
        Ok(())
    }
}

pub fn dry_run_clicker() -> ClickerFactory {
    Box::new(|| Ok(Box::new(DryRunClicker::default()) as Box<dyn MouseClicker>))
}

/// Counts clicks and can be switched into a failing mode. Shared handles
/// observe the same counters, so tests keep one while the worker owns another.
#[derive(Clone, Debug, Default)]
pub struct RecordingClicker {
    inner: Arc<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    clicks: AtomicU64,
    failures: AtomicU64,
    failing: AtomicBool,
    buttons: Mutex<Vec<ClickButton>>,
}

impl RecordingClicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clicks(&self) -> u64 {
        self.inner.clicks.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub fn buttons(&self) -> Vec<ClickButton> {
        self.inner.buttons.lock().clone()
    }

    pub fn factory(&self) -> ClickerFactory {
        let handle = self.clone();
        Box::new(move || Ok(Box::new(handle) as Box<dyn MouseClicker>))
    }
}

impl MouseClicker for RecordingClicker {
    fn click(&mut self, button: ClickButton) -> std::result::Result<(), String> {
        if self.inner.failing.load(Ordering::SeqCst) {
            self.inner.failures.fetch_add(1, Ordering::SeqCst);
            return Err("injected failure".to_string());
        }
        self.inner.buttons.lock().push(button);
        self.inner.clicks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
