//! Global raw key events feeding a shared [`HotkeyMatcher`].
//!
//! Built on `rdev` behind the `hooks` feature. `rdev::listen` blocks its thread
//! forever and cannot be cancelled, so [`KeyListener::stop`] detaches event
//! delivery instead of killing the thread.

use crate::error::{ClickError, Result};
use crate::hotkey::{HotkeyMatcher, KeyIdentifier};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared matcher handed to the listener and to whoever registers bindings.
pub type SharedMatcher = Arc<Mutex<HotkeyMatcher>>;

pub fn shared_matcher(matcher: HotkeyMatcher) -> SharedMatcher {
    Arc::new(Mutex::new(matcher))
}

/// Tracks which physical keys are down so that sided keys sharing one
/// [`KeyIdentifier`] (left and right Ctrl, say) count as held until the
/// last of them is released.
#[derive(Debug)]
pub struct PhysicalKeys<P> {
    held: Vec<(P, KeyIdentifier)>,
}

impl<P> Default for PhysicalKeys<P> {
    fn default() -> Self {
        Self { held: Vec::new() }
    }
}

impl<P: PartialEq + Copy> PhysicalKeys<P> {
    /// Forwards one physical event to `matcher`. Returns how many callbacks fired.
    pub fn route(&mut self, matcher: &mut HotkeyMatcher, physical: P, key: KeyIdentifier, is_press: bool) -> usize {
        if is_press {
            if !self.held.iter().any(|(p, _)| *p == physical) {
                self.held.push((physical, key));
            }
            return matcher.on_key_event(key, true);
        }
        self.held.retain(|(p, _)| *p != physical);
        if self.held.iter().any(|(_, k)| *k == key) {
            return 0;
        }
        matcher.on_key_event(key, false)
    }
}

/// Handle to the background key listener.
pub struct KeyListener {
    active: Arc<AtomicBool>,
    matcher: SharedMatcher,
}

impl KeyListener {
    /// Starts listening. Fails with `ListenerFault` if the platform hook cannot
    /// be installed or the crate was built without the `hooks` feature.
    pub fn spawn(matcher: SharedMatcher) -> Result<Self> {
        let active = Arc::new(AtomicBool::new(true));
        imp::spawn(Arc::clone(&matcher), Arc::clone(&active))?;
        tracing::info!("hotkey listener started");
        Ok(Self { active, matcher })
    }

    /// Stops delivering events to the matcher. Keys still down at this point
    /// will never report a release, so the matcher forgets them.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.matcher.lock().clear_held();
            tracing::debug!("hotkey listener detached");
        }
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(feature = "hooks")]
mod imp {
    use super::{PhysicalKeys, SharedMatcher};
    use crate::error::{ClickError, Result};
    use crate::hotkey::{KeyIdentifier, Modifier, NamedKey};
    use rdev::{listen, Event, EventType, Key};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// How long to wait for `rdev::listen` to fail before assuming it is up.
    const STARTUP_GRACE: Duration = Duration::from_millis(250);

    pub(super) fn spawn(matcher: SharedMatcher, active: Arc<AtomicBool>) -> Result<()> {
        let (fault_tx, fault_rx) = crossbeam_channel::bounded::<String>(1);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                let mut physical = PhysicalKeys::default();
                let callback = move |event: Event| {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    let (key, is_press) = match event.event_type {
                        EventType::KeyPress(key) => (key, true),
                        EventType::KeyRelease(key) => (key, false),
                        _ => return,
                    };
                    if let Some(id) = map_key(key) {
                        physical.route(&mut matcher.lock(), key, id, is_press);
                    }
                };
                if let Err(e) = listen(callback) {
                    tracing::error!(error = ?e, "key listener failed");
                    let _ = fault_tx.send(format!("{e:?}"));
                }
            })?;

        match fault_rx.recv_timeout(STARTUP_GRACE) {
            Ok(reason) => Err(ClickError::listener_fault(reason)),
            Err(_) => Ok(()),
        }
    }

    pub(super) fn map_key(key: Key) -> Option<KeyIdentifier> {
        use KeyIdentifier as K;
        let id = match key {
            Key::ControlLeft | Key::ControlRight => K::Modifier(Modifier::Ctrl),
            Key::Alt | Key::AltGr => K::Modifier(Modifier::Alt),
            Key::ShiftLeft | Key::ShiftRight => K::Modifier(Modifier::Shift),
            Key::MetaLeft | Key::MetaRight => K::Modifier(Modifier::Meta),

            Key::F1 => K::Function(1),
            Key::F2 => K::Function(2),
            Key::F3 => K::Function(3),
            Key::F4 => K::Function(4),
            Key::F5 => K::Function(5),
            Key::F6 => K::Function(6),
            Key::F7 => K::Function(7),
            Key::F8 => K::Function(8),
            Key::F9 => K::Function(9),
            Key::F10 => K::Function(10),
            Key::F11 => K::Function(11),
            Key::F12 => K::Function(12),

            Key::Space => K::Named(NamedKey::Space),
            Key::Return | Key::KpReturn => K::Named(NamedKey::Enter),
            Key::Tab => K::Named(NamedKey::Tab),
            Key::Escape => K::Named(NamedKey::Escape),
            Key::Backspace => K::Named(NamedKey::Backspace),
            Key::Delete => K::Named(NamedKey::Delete),
            Key::Insert => K::Named(NamedKey::Insert),
            Key::Home => K::Named(NamedKey::Home),
            Key::End => K::Named(NamedKey::End),
            Key::PageUp => K::Named(NamedKey::PageUp),
            Key::PageDown => K::Named(NamedKey::PageDown),
            Key::UpArrow => K::Named(NamedKey::Up),
            Key::DownArrow => K::Named(NamedKey::Down),
            Key::LeftArrow => K::Named(NamedKey::Left),
            Key::RightArrow => K::Named(NamedKey::Right),
            Key::CapsLock => K::Named(NamedKey::CapsLock),
            Key::PrintScreen => K::Named(NamedKey::PrintScreen),
            Key::ScrollLock => K::Named(NamedKey::ScrollLock),
            Key::Pause => K::Named(NamedKey::Pause),

            Key::KeyA => K::Char('a'),
            Key::KeyB => K::Char('b'),
            Key::KeyC => K::Char('c'),
            Key::KeyD => K::Char('d'),
            Key::KeyE => K::Char('e'),
            Key::KeyF => K::Char('f'),
            Key::KeyG => K::Char('g'),
            Key::KeyH => K::Char('h'),
            Key::KeyI => K::Char('i'),
            Key::KeyJ => K::Char('j'),
            Key::KeyK => K::Char('k'),
            Key::KeyL => K::Char('l'),
            Key::KeyM => K::Char('m'),
            Key::KeyN => K::Char('n'),
            Key::KeyO => K::Char('o'),
            Key::KeyP => K::Char('p'),
            Key::KeyQ => K::Char('q'),
            Key::KeyR => K::Char('r'),
            Key::KeyS => K::Char('s'),
            Key::KeyT => K::Char('t'),
            Key::KeyU => K::Char('u'),
            Key::KeyV => K::Char('v'),
            Key::KeyW => K::Char('w'),
            Key::KeyX => K::Char('x'),
            Key::KeyY => K::Char('y'),
            Key::KeyZ => K::Char('z'),

            Key::Num0 | Key::Kp0 => K::Char('0'),
            Key::Num1 | Key::Kp1 => K::Char('1'),
            Key::Num2 | Key::Kp2 => K::Char('2'),
            Key::Num3 | Key::Kp3 => K::Char('3'),
            Key::Num4 | Key::Kp4 => K::Char('4'),
            Key::Num5 | Key::Kp5 => K::Char('5'),
            Key::Num6 | Key::Kp6 => K::Char('6'),
            Key::Num7 | Key::Kp7 => K::Char('7'),
            Key::Num8 | Key::Kp8 => K::Char('8'),
            Key::Num9 | Key::Kp9 => K::Char('9'),

            Key::Minus | Key::KpMinus => K::Char('-'),
            Key::Equal => K::Char('='),
            Key::Comma => K::Char(','),
            Key::Dot => K::Char('.'),
            Key::Slash | Key::KpDivide => K::Char('/'),
            Key::SemiColon => K::Char(';'),
            Key::Quote => K::Char('\''),
            Key::BackQuote => K::Char('`'),
            Key::BackSlash => K::Char('\\'),
            Key::LeftBracket => K::Char('['),
            Key::RightBracket => K::Char(']'),
            _ => return None,
        };
        Some(id)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_left_and_right_modifiers_collapse() {
            assert_eq!(map_key(Key::ControlLeft), map_key(Key::ControlRight));
            assert_eq!(map_key(Key::ShiftRight), Some(KeyIdentifier::Modifier(Modifier::Shift)));
            assert_eq!(map_key(Key::F6), Some(KeyIdentifier::Function(6)));
            assert_eq!(map_key(Key::KeyT), Some(KeyIdentifier::Char('t')));
            assert_eq!(map_key(Key::Unknown(999)), None);
        }
    }
}

#[cfg(not(feature = "hooks"))]
mod imp {
    use super::SharedMatcher;
    use crate::error::{ClickError, Result};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    pub(super) fn spawn(_matcher: SharedMatcher, _active: Arc<AtomicBool>) -> Result<()> {
        Err(ClickError::listener_fault(
            "built without global hotkey support (enable the `hooks` feature)",
        ))
    }
}

/// Starts the listener, or logs a warning and returns `None` so callers fall
/// back to explicit commands only.
pub fn spawn_or_degrade(matcher: SharedMatcher) -> Option<KeyListener> {
    match KeyListener::spawn(matcher) {
        Ok(listener) => Some(listener),
        Err(e @ ClickError::ListenerFault(_)) => {
            tracing::warn!(error = %e, "hotkeys disabled");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "hotkeys disabled: listener thread could not start");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::{Combo, Modifier};
    use std::sync::atomic::AtomicUsize;

    const CTRL: KeyIdentifier = KeyIdentifier::Modifier(Modifier::Ctrl);
    const CTRL_LEFT: u32 = 1;
    const CTRL_RIGHT: u32 = 2;
    const KEY_T: u32 = 3;

    #[test]
    fn test_sided_modifier_stays_held_until_last_release() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut matcher = HotkeyMatcher::new();
        {
            let hits = Arc::clone(&hits);
            matcher.register(Combo::parse("ctrl+t").unwrap(), move || {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        let t = KeyIdentifier::char('t');
        let mut keys = PhysicalKeys::default();

        keys.route(&mut matcher, CTRL_LEFT, CTRL, true);
        keys.route(&mut matcher, CTRL_RIGHT, CTRL, true);
        keys.route(&mut matcher, CTRL_RIGHT, CTRL, false);
        assert!(matcher.is_held(&CTRL));

        assert_eq!(keys.route(&mut matcher, KEY_T, t, true), 1);
        keys.route(&mut matcher, KEY_T, t, false);

        keys.route(&mut matcher, CTRL_LEFT, CTRL, false);
        assert!(!matcher.is_held(&CTRL));
        assert_eq!(keys.route(&mut matcher, KEY_T, t, true), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_forgets_held_keys() {
        let mut matcher = HotkeyMatcher::new();
        matcher.on_key_event(CTRL, true);
        let matcher = shared_matcher(matcher);
        let listener = KeyListener {
            active: Arc::new(AtomicBool::new(true)),
            matcher: Arc::clone(&matcher),
        };
        listener.stop();
        assert!(!matcher.lock().is_held(&CTRL));
    }

    #[test]
    fn test_auto_repeat_does_not_double_count() {
        let mut matcher = HotkeyMatcher::new();
        let mut keys = PhysicalKeys::default();
        keys.route(&mut matcher, CTRL_LEFT, CTRL, true);
        keys.route(&mut matcher, CTRL_LEFT, CTRL, true);
        keys.route(&mut matcher, CTRL_LEFT, CTRL, false);
        assert!(!matcher.is_held(&CTRL));
    }

    #[cfg(not(feature = "hooks"))]
    #[test]
    fn test_spawn_without_hooks_is_listener_fault() {
        let err = KeyListener::spawn(shared_matcher(HotkeyMatcher::new())).err().unwrap();
        assert!(matches!(err, ClickError::ListenerFault(_)));
        assert!(spawn_or_degrade(shared_matcher(HotkeyMatcher::new())).is_none());
    }
}
