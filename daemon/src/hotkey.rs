/// Hotkey model: an immutable (key, modifier set) pair used as the dispatch key.
///
/// Hotkeys are written in the config as `Ctrl+Alt+Shift+Win+Key`, modifiers in any
/// order and case, key last.  Formatting always emits the modifiers in that fixed
/// order, so `format → parse` is lossless.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Set of held modifier keys.  Left and right variants are not distinguished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        win: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.win
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HotkeyParseError {
    #[error("hotkey is empty")]
    Empty,

    #[error("cannot parse hotkey part \"{0}\": expected Ctrl, Alt, Shift or Win")]
    UnknownModifier(String),

    #[error("unknown key name \"{0}\"")]
    UnknownKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey {
    key: Key,
    modifiers: Modifiers,
}

impl Hotkey {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// True when no modifier is part of the hotkey, so the key itself is claimed
    /// in every application.
    pub fn is_bare(&self) -> bool {
        self.modifiers.is_empty()
    }

    pub fn key(&self) -> Key {
        self.key
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, name) in [(m.ctrl, "Ctrl+"), (m.alt, "Alt+"), (m.shift, "Shift+"), (m.win, "Win+")] {
            if held {
                f.write_str(name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(HotkeyParseError::Empty);
        }
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        // `split` always yields at least one element.
        let key_part = parts.pop().unwrap_or_default();

        let mut modifiers = Modifiers::NONE;
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" => modifiers.ctrl = true,
                "alt" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "win" => modifiers.win = true,
                _ => return Err(HotkeyParseError::UnknownModifier(part.to_string())),
            }
        }

        let key = Key::from_name(key_part)
            .ok_or_else(|| HotkeyParseError::UnknownKey(key_part.to_string()))?;
        Ok(Hotkey::new(key, modifiers))
    }
}

impl TryFrom<String> for Hotkey {
    type Error = HotkeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hotkey> for String {
    fn from(hotkey: Hotkey) -> Self {
        hotkey.to_string()
    }
}
