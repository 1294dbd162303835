use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::hotkey::{Hotkey, Modifiers};
use crate::key::Key;
use crate::overlay::PopupStyle;

pub const MIN_HISTORY_CAPACITY: usize = 1;
pub const MAX_HISTORY_CAPACITY: usize = 1000;
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
/// Step between generated brightness levels for DDC/CI monitors.
pub const DEFAULT_DDC_STEP: u8 = 10;
pub const DEFAULT_BRIGHTNESS_CAPTION: &str = "Brightness";

/// Root configuration structure. Deserialized from %APPDATA%\KeyHud\config.toml.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Enables `debug` logging and lets `RUST_LOG` override the filter.
    #[serde(default)]
    pub debug_logging: bool,
    /// Handler modules, in dispatch order.
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

impl Config {
    /// What a first run writes to disk: the defaults with the fallback module
    /// spelled out so it can be edited.
    pub fn first_run() -> Self {
        Self {
            modules: Config::default().effective_modules(),
            ..Config::default()
        }
    }

    /// The configured modules, or a single brightness module when none are listed.
    pub fn effective_modules(&self) -> Vec<ModuleConfig> {
        if self.modules.is_empty() {
            vec![ModuleConfig::Brightness(BrightnessConfig::default())]
        } else {
            self.modules.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleConfig {
    Brightness(BrightnessConfig),
    KeyboardLayout(KeyboardLayoutConfig),
    PressedKeyMonitor(PressedKeyMonitorConfig),
}

/// Steps the primary monitor's brightness up or down.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrightnessConfig {
    pub brighter: Hotkey,
    pub darker: Hotkey,
    pub ddc_step: u8,
    pub indicator: IndicatorConfig,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        let win = Modifiers { win: true, ..Modifiers::NONE };
        Self {
            brighter: Hotkey::new(Key::F12, win),
            darker: Hotkey::new(Key::F11, win),
            ddc_step: DEFAULT_DDC_STEP,
            indicator: IndicatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyboardLayoutConfig {
    pub layouts: Vec<LayoutEntryConfig>,
}

/// One layout switch.  An entry without a hotkey is kept (so later entries keep
/// their index) but never fires.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutEntryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<Hotkey>,
    /// Selects the first installed layout whose name matches.  Without it the
    /// entry's position picks the layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_match: Option<NamePattern>,
    /// Caption override; the layout's own name otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator: Option<IndicatorConfig>,
}

/// Records and shows recent key transitions while enabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PressedKeyMonitorConfig {
    pub toggle: Hotkey,
    pub capacity: usize,
    /// Whether the monitor starts enabled.
    pub enabled: bool,
    pub indicator: IndicatorConfig,
}

impl Default for PressedKeyMonitorConfig {
    fn default() -> Self {
        Self {
            toggle: Hotkey::new(Key::K, Modifiers { ctrl: true, alt: true, ..Modifiers::NONE }),
            capacity: DEFAULT_HISTORY_CAPACITY,
            enabled: false,
            indicator: IndicatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Text,
    Bar,
}

/// Popup used by a module: its kind, optional fixed size and caption, and the
/// shared style fields.  Without `kind` each module picks its usual popup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<IndicatorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(flatten)]
    pub style: PopupStyle,
}

/// Regex matched against installed layout names.  Compiled at load time so an
/// invalid pattern fails the load.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamePattern(Regex);

impl NamePattern {
    pub fn is_match(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

impl TryFrom<String> for NamePattern {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Regex::new(&value).map(NamePattern)
    }
}

impl From<NamePattern> for String {
    fn from(pattern: NamePattern) -> Self {
        pattern.0.as_str().to_owned()
    }
}

/// Loads the config file at `path`.  When the file does not exist, writes
/// [`Config::first_run`] there and returns it.
/// Returns an error if the file exists but cannot be read or parsed, including any
/// malformed hotkey, colour or pattern, or if the first-run file cannot be written.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::first_run();
        save(path, &config)?;
        return Ok(config);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Writes `config` to `path`, creating the parent directory if needed.
pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}
