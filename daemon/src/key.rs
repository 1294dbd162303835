/// Virtual-key enumeration used by the hook, the hotkey model and the key-history
/// overlay.
///
/// Codes match the Windows `VK_*` values.  `NumEnter` is not a real virtual key:
/// the hook reports it for the Enter key when the extended-key flag is set.

macro_rules! keys {
    ($($name:ident = $vk:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Key {
            $($name,)*
        }

        impl Key {
            /// Every key, in ascending virtual-key order.
            pub const ALL: &'static [Key] = &[$(Key::$name,)*];

            /// Windows virtual-key code of this key.
            pub fn vk(self) -> u32 {
                match self {
                    $(Key::$name => $vk,)*
                }
            }

            /// Maps a virtual-key code back to a key.  Codes outside the
            /// enumeration (mouse buttons, reserved ranges) return `None`.
            pub fn from_vk(vk: u32) -> Option<Key> {
                match vk {
                    $($vk => Some(Key::$name),)*
                    _ => None,
                }
            }

            /// Canonical name, as written in the config file.
            pub fn name(self) -> &'static str {
                match self {
                    $(Key::$name => stringify!($name),)*
                }
            }
        }
    };
}

keys! {
    Break = 3,
    Backspace = 8,
    Tab = 9,
    LineFeed = 10,
    Clear = 12,
    Enter = 13,
    Shift = 16,
    Ctrl = 17,
    Alt = 18,
    Pause = 19,
    CapsLock = 20,
    KanaMode = 21,
    JunjaMode = 23,
    FinalMode = 24,
    KanjiMode = 25,
    Escape = 27,
    ImeConvert = 28,
    ImeNonconvert = 29,
    ImeAccept = 30,
    ImeModeChange = 31,
    Space = 32,
    PageUp = 33,
    PageDown = 34,
    End = 35,
    Home = 36,
    Left = 37,
    Up = 38,
    Right = 39,
    Down = 40,
    Select = 41,
    Print = 42,
    Execute = 43,
    PrintScreen = 44,
    Insert = 45,
    Delete = 46,
    Help = 47,
    D0 = 48,
    D1 = 49,
    D2 = 50,
    D3 = 51,
    D4 = 52,
    D5 = 53,
    D6 = 54,
    D7 = 55,
    D8 = 56,
    D9 = 57,
    A = 65,
    B = 66,
    C = 67,
    D = 68,
    E = 69,
    F = 70,
    G = 71,
    H = 72,
    I = 73,
    J = 74,
    K = 75,
    L = 76,
    M = 77,
    N = 78,
    O = 79,
    P = 80,
    Q = 81,
    R = 82,
    S = 83,
    T = 84,
    U = 85,
    V = 86,
    W = 87,
    X = 88,
    Y = 89,
    Z = 90,
    LWin = 91,
    RWin = 92,
    Apps = 93,
    Sleep = 95,
    Num0 = 96,
    Num1 = 97,
    Num2 = 98,
    Num3 = 99,
    Num4 = 100,
    Num5 = 101,
    Num6 = 102,
    Num7 = 103,
    Num8 = 104,
    Num9 = 105,
    NumMultiply = 106,
    NumAdd = 107,
    NumSeparator = 108,
    NumSubtract = 109,
    NumDecimal = 110,
    NumDivide = 111,
    F1 = 112,
    F2 = 113,
    F3 = 114,
    F4 = 115,
    F5 = 116,
    F6 = 117,
    F7 = 118,
    F8 = 119,
    F9 = 120,
    F10 = 121,
    F11 = 122,
    F12 = 123,
    F13 = 124,
    F14 = 125,
    F15 = 126,
    F16 = 127,
    F17 = 128,
    F18 = 129,
    F19 = 130,
    F20 = 131,
    F21 = 132,
    F22 = 133,
    F23 = 134,
    F24 = 135,
    NumLock = 144,
    ScrollLock = 145,
    LShift = 160,
    RShift = 161,
    LCtrl = 162,
    RCtrl = 163,
    LAlt = 164,
    RAlt = 165,
    BrowserBack = 166,
    BrowserForward = 167,
    BrowserRefresh = 168,
    BrowserStop = 169,
    BrowserSearch = 170,
    BrowserFavorites = 171,
    BrowserHome = 172,
    VolumeMute = 173,
    VolumeDown = 174,
    VolumeUp = 175,
    MediaNextTrack = 176,
    MediaPreviousTrack = 177,
    MediaStop = 178,
    MediaPlayPause = 179,
    LaunchMail = 180,
    LaunchMedia = 181,
    LaunchApplication1 = 182,
    LaunchCalculator = 183,
    OemSemicolon = 186,
    OemPlus = 187,
    OemComma = 188,
    OemMinus = 189,
    OemPeriod = 190,
    OemQuestion = 191,
    OemTilde = 192,
    OemOpenBracket = 219,
    OemPipe = 220,
    OemCloseBracket = 221,
    OemQuotes = 222,
    OemBacktick = 223,
    OemBackslash = 226,
    ProcessKey = 229,
    Packet = 231,
    Attn = 246,
    Crsel = 247,
    Exsel = 248,
    EraseEof = 249,
    Play = 250,
    Zoom = 251,
    NoName = 252,
    Pa1 = 253,
    OemClear = 254,
    NumEnter = 260,
}

impl Key {
    /// Parses a key name case-insensitively.  A bare digit `0`–`9` names the
    /// corresponding top-row digit key.
    pub fn from_name(name: &str) -> Option<Key> {
        let name = name.trim();
        if let [c @ b'0'..=b'9'] = name.as_bytes() {
            return Key::from_vk(u32::from(*c));
        }
        Key::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Top-row digit value, if this is one of `D0`–`D9`.
    pub fn digit(self) -> Option<u32> {
        let vk = self.vk();
        (Key::D0.vk()..=Key::D9.vk())
            .contains(&vk)
            .then(|| vk - Key::D0.vk())
    }

    /// Short label shown in the key-history overlay.
    pub fn label(self) -> String {
        if let Some(d) = self.digit() {
            return d.to_string();
        }
        let vk = self.vk();
        if (Key::Num0.vk()..=Key::Num9.vk()).contains(&vk) {
            return format!("Num {}", vk - Key::Num0.vk());
        }
        let glyph = match self {
            Key::OemSemicolon => ";",
            Key::OemBacktick => "`",
            Key::OemOpenBracket => "[",
            Key::OemCloseBracket => "]",
            Key::OemPipe => "|",
            Key::OemComma => ",",
            Key::OemPeriod => ".",
            Key::OemQuestion => "?",
            Key::OemMinus => "\u{2212}",
            Key::OemPlus => "+",
            Key::Escape => "Esc",
            Key::Left => "\u{2190}",
            Key::Right => "\u{2192}",
            Key::Up => "\u{2191}",
            Key::Down => "\u{2193}",
            Key::NumDivide => "Num \u{f7}",
            Key::NumMultiply => "Num \u{d7}",
            Key::NumSubtract => "Num \u{2212}",
            Key::NumAdd => "Num +",
            Key::NumDecimal => "Num .",
            _ => self.name(),
        };
        glyph.to_string()
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.digit() {
            Some(d) => write!(f, "{d}"),
            None => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── vk mapping ────────────────────────────────────────────────────────────

    #[test]
    fn from_vk_inverts_vk_for_every_key() {
        for &key in Key::ALL {
            assert_eq!(Key::from_vk(key.vk()), Some(key), "Failed for {key:?}");
        }
    }

    #[test]
    fn all_is_sorted_by_vk_without_duplicates() {
        for pair in Key::ALL.windows(2) {
            assert!(pair[0].vk() < pair[1].vk(), "{:?} vs {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn unknown_vk_codes_return_none() {
        assert_eq!(Key::from_vk(0), None);
        assert_eq!(Key::from_vk(1), None); // left mouse button
        assert_eq!(Key::from_vk(58), None);
        assert_eq!(Key::from_vk(255), None);
    }

    #[test]
    fn letters_and_function_keys_match_windows_codes() {
        assert_eq!(Key::A.vk(), 0x41);
        assert_eq!(Key::Z.vk(), 0x5A);
        assert_eq!(Key::F1.vk(), 0x70);
        assert_eq!(Key::F12.vk(), 0x7B);
        assert_eq!(Key::LCtrl.vk(), 0xA2);
    }

    // ── names ─────────────────────────────────────────────────────────────────

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(Key::from_name("pageup"), Some(Key::PageUp));
        assert_eq!(Key::from_name("PAGEUP"), Some(Key::PageUp));
        assert_eq!(Key::from_name("f12"), Some(Key::F12));
    }

    #[test]
    fn bare_digits_name_the_top_row_keys() {
        for d in 0..=9u32 {
            let key = Key::from_name(&d.to_string()).unwrap();
            assert_eq!(key.digit(), Some(d));
        }
        assert_eq!(Key::from_name("D7"), Some(Key::D7));
    }

    #[test]
    fn unknown_names_return_none() {
        assert_eq!(Key::from_name(""), None);
        assert_eq!(Key::from_name("F25"), None);
        assert_eq!(Key::from_name("10"), None);
        assert_eq!(Key::from_name("Ctrl+A"), None);
    }

    #[test]
    fn display_uses_bare_digits() {
        assert_eq!(Key::D3.to_string(), "3");
        assert_eq!(Key::Num3.to_string(), "Num3");
        assert_eq!(Key::Escape.to_string(), "Escape");
    }

    // ── labels ────────────────────────────────────────────────────────────────

    #[test]
    fn labels_substitute_printed_glyphs() {
        assert_eq!(Key::D5.label(), "5");
        assert_eq!(Key::Num5.label(), "Num 5");
        assert_eq!(Key::Left.label(), "←");
        assert_eq!(Key::Up.label(), "↑");
        assert_eq!(Key::OemComma.label(), ",");
        assert_eq!(Key::OemMinus.label(), "−");
        assert_eq!(Key::NumMultiply.label(), "Num ×");
        assert_eq!(Key::Escape.label(), "Esc");
    }

    #[test]
    fn labels_fall_back_to_key_name() {
        assert_eq!(Key::Q.label(), "Q");
        assert_eq!(Key::PageDown.label(), "PageDown");
        assert_eq!(Key::LShift.label(), "LShift");
    }
}
