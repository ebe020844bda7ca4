//! Hotkey combos and edge-triggered matching over raw key events.
//!
//! Keys are modelled independently of any platform key codes. Left and right
//! modifier variants collapse onto one [`Modifier`], so `<ctrl>` matches
//! either control key.

use crate::error::{ClickError, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Default CLI combo that starts and pauses clicking.
pub const DEFAULT_TOGGLE_HOTKEY: &str = "<ctrl>+<alt>+t";
/// Default CLI combo that stops clicking and exits.
pub const DEFAULT_STOP_HOTKEY: &str = "<ctrl>+<alt>+s";
/// Window-mode toggle key.
pub const DEFAULT_UI_HOTKEY: &str = "F6";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    CapsLock,
    PrintScreen,
    ScrollLock,
    Pause,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyIdentifier {
    /// Modifiers sort first so combos render as `Ctrl+Alt+T`.
    Modifier(Modifier),
    /// A printable key, stored lowercase.
    Char(char),
    /// `F1` to `F24`.
    Function(u8),
    Named(NamedKey),
}

impl KeyIdentifier {
    pub fn char(c: char) -> Self {
        KeyIdentifier::Char(c.to_ascii_lowercase())
    }
}

static KEY_NAMES: Lazy<HashMap<&'static str, KeyIdentifier>> = Lazy::new(|| {
    use KeyIdentifier::{Modifier as M, Named as N};
    HashMap::from([
        ("ctrl", M(Modifier::Ctrl)),
        ("control", M(Modifier::Ctrl)),
        ("ctrl_l", M(Modifier::Ctrl)),
        ("ctrl_r", M(Modifier::Ctrl)),
        ("alt", M(Modifier::Alt)),
        ("option", M(Modifier::Alt)),
        ("alt_l", M(Modifier::Alt)),
        ("alt_r", M(Modifier::Alt)),
        ("alt_gr", M(Modifier::Alt)),
        ("shift", M(Modifier::Shift)),
        ("shift_l", M(Modifier::Shift)),
        ("shift_r", M(Modifier::Shift)),
        ("cmd", M(Modifier::Meta)),
        ("cmd_l", M(Modifier::Meta)),
        ("cmd_r", M(Modifier::Meta)),
        ("meta", M(Modifier::Meta)),
        ("super", M(Modifier::Meta)),
        ("win", M(Modifier::Meta)),
        ("space", N(NamedKey::Space)),
        ("enter", N(NamedKey::Enter)),
        ("return", N(NamedKey::Enter)),
        ("tab", N(NamedKey::Tab)),
        ("esc", N(NamedKey::Escape)),
        ("escape", N(NamedKey::Escape)),
        ("backspace", N(NamedKey::Backspace)),
        ("delete", N(NamedKey::Delete)),
        ("insert", N(NamedKey::Insert)),
        ("home", N(NamedKey::Home)),
        ("end", N(NamedKey::End)),
        ("page_up", N(NamedKey::PageUp)),
        ("pageup", N(NamedKey::PageUp)),
        ("page_down", N(NamedKey::PageDown)),
        ("pagedown", N(NamedKey::PageDown)),
        ("up", N(NamedKey::Up)),
        ("down", N(NamedKey::Down)),
        ("left", N(NamedKey::Left)),
        ("right", N(NamedKey::Right)),
        ("caps_lock", N(NamedKey::CapsLock)),
        ("print_screen", N(NamedKey::PrintScreen)),
        ("scroll_lock", N(NamedKey::ScrollLock)),
        ("pause", N(NamedKey::Pause)),
    ])
});

fn parse_key(token: &str) -> Option<KeyIdentifier> {
    let name = token
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(token)
        .to_lowercase();

    if let Some(key) = KEY_NAMES.get(name.as_str()) {
        return Some(*key);
    }
    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&n) {
            return Some(KeyIdentifier::Function(n));
        }
    }
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() => Some(KeyIdentifier::char(c)),
        _ => None,
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyIdentifier::Modifier(m) => write!(f, "{m:?}"),
            KeyIdentifier::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            KeyIdentifier::Function(n) => write!(f, "F{n}"),
            KeyIdentifier::Named(k) => write!(f, "{k:?}"),
        }
    }
}

/// A set of keys that must be held together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Combo {
    keys: BTreeSet<KeyIdentifier>,
}

impl Combo {
    pub fn new(keys: impl IntoIterator<Item = KeyIdentifier>) -> Result<Self> {
        let keys: BTreeSet<_> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(ClickError::invalid_config("hotkey combo is empty"));
        }
        Ok(Self { keys })
    }

    /// Parses `<ctrl>+<alt>+t`, `ctrl+alt+t` or a single key such as `F6`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut keys = BTreeSet::new();
        for token in text.split('+').map(str::trim) {
            if token.is_empty() {
                return Err(ClickError::invalid_config(format!(
                    "invalid hotkey '{text}': empty key"
                )));
            }
            let key = parse_key(token).ok_or_else(|| {
                ClickError::invalid_config(format!("invalid hotkey '{text}': unknown key '{token}'"))
            })?;
            keys.insert(key);
        }
        Self::new(keys)
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyIdentifier> {
        self.keys.iter()
    }

    pub fn contains(&self, key: &KeyIdentifier) -> bool {
        self.keys.contains(key)
    }

    fn is_held(&self, held: &HashSet<KeyIdentifier>) -> bool {
        self.keys.iter().all(|k| held.contains(k))
    }
}

impl FromStr for Combo {
    type Err = ClickError;

    fn from_str(s: &str) -> Result<Self> {
        Combo::parse(s)
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(usize);

pub type HotkeyCallback = Box<dyn FnMut() + Send>;

struct Binding {
    id: BindingId,
    combo: Combo,
    callback: HotkeyCallback,
    armed: bool,
}

/// Turns raw press/release events into one callback per complete press.
///
/// A binding fires when the last of its keys goes down and re-arms once any
/// of its keys is released. Auto-repeat presses of an already held key are
/// not new presses. Bindings are independent, so combos that share keys can
/// both fire on the same event.
#[derive(Default)]
pub struct HotkeyMatcher {
    bindings: Vec<Binding>,
    held: HashSet<KeyIdentifier>,
    next_id: usize,
}

impl HotkeyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, combo: Combo, callback: impl FnMut() + Send + 'static) -> BindingId {
        let id = BindingId(self.next_id);
        self.next_id += 1;
        let armed = !combo.is_held(&self.held);
        tracing::debug!(%combo, "hotkey registered");
        self.bindings.push(Binding {
            id,
            combo,
            callback: Box::new(callback),
            armed,
        });
        id
    }

    pub fn unregister(&mut self, id: BindingId) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.id != id);
        self.bindings.len() != before
    }

    /// Feeds one raw event. Returns how many callbacks fired.
    pub fn on_key_event(&mut self, key: KeyIdentifier, is_press: bool) -> usize {
        if !is_press {
            self.held.remove(&key);
            for binding in self.bindings.iter_mut().filter(|b| b.combo.contains(&key)) {
                binding.armed = true;
            }
            return 0;
        }

        if !self.held.insert(key) {
            return 0;
        }

        let mut fired = 0;
        for binding in &mut self.bindings {
            if binding.armed && binding.combo.contains(&key) && binding.combo.is_held(&self.held) {
                binding.armed = false;
                tracing::debug!(combo = %binding.combo, "hotkey fired");
                (binding.callback)();
                fired += 1;
            }
        }
        fired
    }

    /// Forgets every held key, e.g. after the listener lost focus or restarted.
    pub fn clear_held(&mut self) {
        self.held.clear();
        for binding in &mut self.bindings {
            binding.armed = true;
        }
    }

    pub fn is_held(&self, key: &KeyIdentifier) -> bool {
        self.held.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const CTRL: KeyIdentifier = KeyIdentifier::Modifier(Modifier::Ctrl);
    const ALT: KeyIdentifier = KeyIdentifier::Modifier(Modifier::Alt);

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&hits);
        (hits, move || {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_parse_formats() {
        let angle = Combo::parse("<ctrl>+<alt>+t").unwrap();
        let bare = Combo::parse("Ctrl + Alt + T").unwrap();
        assert_eq!(angle, bare);
        assert!(angle.contains(&KeyIdentifier::char('t')));
        assert_eq!(angle.to_string(), "Ctrl+Alt+T");

        let f6 = Combo::parse(DEFAULT_UI_HOTKEY).unwrap();
        assert_eq!(f6.keys().collect::<Vec<_>>(), vec![&KeyIdentifier::Function(6)]);

        let shift_r = Combo::parse("<shift_r>+<space>").unwrap();
        assert!(shift_r.contains(&KeyIdentifier::Modifier(Modifier::Shift)));
        assert!(shift_r.contains(&KeyIdentifier::Named(NamedKey::Space)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "ctrl+", "<hyper>+x", "f25", "ctrl++t", "ab"] {
            let err = Combo::parse(bad).unwrap_err();
            assert!(err.is_invalid_config(), "'{bad}' should be rejected");
        }
    }

    #[test]
    fn test_fires_once_per_press() {
        let mut matcher = HotkeyMatcher::new();
        let (hits, cb) = counter();
        matcher.register(Combo::parse("<ctrl>+<alt>+t").unwrap(), cb);

        matcher.on_key_event(CTRL, true);
        matcher.on_key_event(ALT, true);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(matcher.on_key_event(KeyIdentifier::char('T'), true), 1);

        // Auto-repeat and unrelated keys while held do not refire.
        matcher.on_key_event(KeyIdentifier::char('t'), true);
        matcher.on_key_event(KeyIdentifier::char('x'), true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Releasing one key re-arms; pressing it again fires again.
        matcher.on_key_event(KeyIdentifier::char('t'), false);
        matcher.on_key_event(KeyIdentifier::char('t'), true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_press_order_does_not_matter() {
        let mut matcher = HotkeyMatcher::new();
        let (hits, cb) = counter();
        matcher.register(Combo::parse("ctrl+alt+s").unwrap(), cb);

        matcher.on_key_event(KeyIdentifier::char('s'), true);
        matcher.on_key_event(ALT, true);
        matcher.on_key_event(CTRL, true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_keys_fire_independently() {
        let mut matcher = HotkeyMatcher::new();
        let (toggle_hits, toggle) = counter();
        let (stop_hits, stop) = counter();
        matcher.register(Combo::parse("ctrl+alt+t").unwrap(), toggle);
        matcher.register(Combo::parse("ctrl+alt+s").unwrap(), stop);

        matcher.on_key_event(CTRL, true);
        matcher.on_key_event(ALT, true);
        matcher.on_key_event(KeyIdentifier::char('t'), true);
        matcher.on_key_event(KeyIdentifier::char('s'), true);
        assert_eq!(toggle_hits.load(Ordering::SeqCst), 1);
        assert_eq!(stop_hits.load(Ordering::SeqCst), 1);

        // Releasing a shared modifier re-arms both.
        matcher.on_key_event(ALT, false);
        assert_eq!(matcher.on_key_event(ALT, true), 2);
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut matcher = HotkeyMatcher::new();
        let (hits, cb) = counter();
        matcher.register(Combo::parse("F6").unwrap(), cb);
        matcher.on_key_event(KeyIdentifier::Function(6), false);
        assert!(!matcher.is_held(&KeyIdentifier::Function(6)));
        matcher.on_key_event(KeyIdentifier::Function(6), true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let mut matcher = HotkeyMatcher::new();
        let (hits, cb) = counter();
        let id = matcher.register(Combo::parse("F6").unwrap(), cb);
        assert!(matcher.unregister(id));
        assert!(!matcher.unregister(id));
        matcher.on_key_event(KeyIdentifier::Function(6), true);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
