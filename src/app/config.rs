//! Configuration Management

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::action::ActionTiming;
use crate::recognition::MatchThreshold;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Matching settings
    #[serde(default)]
    pub recognition: RecognitionConfig,
    /// Recording settings
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Settle delays and input timings
    #[serde(default)]
    pub timing: TimingConfig,
    /// Control-key bindings
    #[serde(default)]
    pub keybindings: KeyBindingsConfig,
}

/// Recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Minimum confidence (percent) for a match to count
    pub min_match_percent: u8,
    /// Location passes per state during replay
    pub widget_find_retries: u32,
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Width of the region captured around a control-click
    pub default_widget_width: u32,
    /// Height of the region captured around a control-click
    pub default_widget_height: u32,
    /// Directory holding template images
    pub template_dir: PathBuf,
    /// Modifier channel size (power of 2)
    pub modifier_channel_capacity: usize,
}

/// Timing configuration (milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wait between location passes
    pub retry_settle_ms: u64,
    /// Wait after performing an action
    pub action_settle_ms: u64,
    /// Gap between clicks of a multi-click
    pub double_click_gap_ms: u64,
    /// Key hold while typing
    pub key_hold_ms: u64,
    /// Wait before the second click of a menu action
    pub menu_second_click_delay_ms: u64,
}

/// Key bindings, used together with Control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindingsConfig {
    pub left_click: char,
    pub right_click: char,
    pub double_click: char,
    pub type_action: char,
    pub check: char,
    pub perform_widgets: char,
    pub home: char,
    pub previous_state: char,
    pub next_state: char,
    pub menu_action: char,
    pub force_repair: char,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            min_match_percent: 100,
            widget_find_retries: 5,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_widget_width: 150,
            default_widget_height: 150,
            template_dir: PathBuf::from("data").join("images"),
            modifier_channel_capacity: 256,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            retry_settle_ms: 400,
            action_settle_ms: 500,
            double_click_gap_ms: 100,
            key_hold_ms: 50,
            menu_second_click_delay_ms: 1500,
        }
    }
}

impl Default for KeyBindingsConfig {
    fn default() -> Self {
        Self {
            left_click: 'C',
            right_click: 'V',
            double_click: 'B',
            type_action: 'N',
            check: 'M',
            perform_widgets: 'R',
            home: 'H',
            previous_state: 'Q',
            next_state: 'E',
            menu_action: 'X',
            force_repair: 'A',
        }
    }
}

impl RecognitionConfig {
    pub fn threshold(&self) -> MatchThreshold {
        MatchThreshold::new(self.min_match_percent)
    }
}

impl TimingConfig {
    pub fn retry_settle(&self) -> Duration {
        Duration::from_millis(self.retry_settle_ms)
    }

    pub fn action_settle(&self) -> Duration {
        Duration::from_millis(self.action_settle_ms)
    }

    pub fn action_timing(&self) -> ActionTiming {
        ActionTiming {
            double_click_gap: Duration::from_millis(self.double_click_gap_ms),
            key_hold: Duration::from_millis(self.key_hold_ms),
            menu_second_click_delay: Duration::from_millis(self.menu_second_click_delay_ms),
        }
    }
}

impl KeyBindingsConfig {
    /// `(property name, bound key)` pairs
    pub fn entries(&self) -> [(&'static str, char); 11] {
        [
            ("leftclick", self.left_click),
            ("rightclick", self.right_click),
            ("doubleclick", self.double_click),
            ("type", self.type_action),
            ("check", self.check),
            ("performwidgets", self.perform_widgets),
            ("home", self.home),
            ("previousstate", self.previous_state),
            ("nextstate", self.next_state),
            ("menuaction", self.menu_action),
            ("forcerepair", self.force_repair),
        ]
    }

    fn slot_mut(&mut self, property: &str) -> Option<&mut char> {
        let slot = match property {
            "leftclick" => &mut self.left_click,
            "rightclick" => &mut self.right_click,
            "doubleclick" => &mut self.double_click,
            "type" => &mut self.type_action,
            "check" => &mut self.check,
            "performwidgets" => &mut self.perform_widgets,
            "home" => &mut self.home,
            "previousstate" => &mut self.previous_state,
            "nextstate" => &mut self.next_state,
            "menuaction" => &mut self.menu_action,
            "forcerepair" => &mut self.force_repair,
            _ => return None,
        };
        Some(slot)
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.recognition.min_match_percent > 100 {
            return Err(crate::Error::Config(format!(
                "min_match_percent must be in [0, 100], got {}",
                self.recognition.min_match_percent
            )));
        }
        if self.recognition.widget_find_retries == 0 {
            return Err(crate::Error::Config("widget_find_retries must be > 0".to_string()));
        }
        if self.capture.default_widget_width == 0 || self.capture.default_widget_height == 0 {
            return Err(crate::Error::Config(format!(
                "default widget size must be at least 1x1, got {}x{}",
                self.capture.default_widget_width, self.capture.default_widget_height
            )));
        }
        if !self.capture.modifier_channel_capacity.is_power_of_two() {
            return Err(crate::Error::Config(format!(
                "modifier_channel_capacity must be a power of 2, got {}",
                self.capture.modifier_channel_capacity
            )));
        }

        let mut seen = HashSet::new();
        for (name, key) in self.keybindings.entries() {
            if !key.is_ascii_alphanumeric() {
                return Err(crate::Error::Config(format!(
                    "key binding {name} must be a letter or digit, got {key:?}"
                )));
            }
            if !seen.insert(key.to_ascii_uppercase()) {
                return Err(crate::Error::Config(format!(
                    "key {key:?} is bound more than once"
                )));
            }
        }
        Ok(())
    }

    /// Overlay externally loaded key/value settings.
    ///
    /// Malformed numbers fall back to the built-in default with a warning.
    /// Unknown keys are ignored.
    pub fn apply_properties(&mut self, properties: &HashMap<String, String>) {
        let defaults = Config::default();

        for (key, value) in properties {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            match key.as_str() {
                "minmatchpercent" => {
                    self.recognition.min_match_percent = parse_or_default(
                        &key,
                        value,
                        defaults.recognition.min_match_percent,
                    )
                    .min(100);
                }
                "widgetfindretries" => {
                    self.recognition.widget_find_retries =
                        parse_or_default(&key, value, defaults.recognition.widget_find_retries);
                }
                "defaultwidgetwidth" => {
                    self.capture.default_widget_width =
                        parse_or_default(&key, value, defaults.capture.default_widget_width);
                }
                "defaultwidgetheight" => {
                    self.capture.default_widget_height =
                        parse_or_default(&key, value, defaults.capture.default_widget_height);
                }
                other => match self.keybindings.slot_mut(other) {
                    Some(slot) => match value.chars().next() {
                        Some(ch) => *slot = ch.to_ascii_uppercase(),
                        None => warn!(key = other, "Empty key binding ignored"),
                    },
                    None => tracing::debug!(key = other, "Ignoring unknown property"),
                },
            }
        }
    }

    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".widget_scout").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Look up a value by dotted key, e.g. `recognition.min_match_percent`
    pub fn get_value(&self, key: &str) -> Result<Option<toml::Value>, crate::Error> {
        let table = self.to_table()?;
        let (section, leaf) = split_key(key)?;
        Ok(table
            .get(section)
            .and_then(|s| s.get(leaf))
            .cloned())
    }

    /// Set a value by dotted key. The result must still validate.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), crate::Error> {
        let mut table = self.to_table()?;
        let (section, leaf) = split_key(key)?;

        let slot = table
            .get_mut(section)
            .and_then(|s| s.as_table_mut())
            .and_then(|s| s.get_mut(leaf))
            .ok_or_else(|| crate::Error::Config(format!("unknown configuration key: {key}")))?;

        *slot = if slot.is_str() {
            toml::Value::String(raw.trim_matches('"').to_string())
        } else {
            parse_toml_scalar(raw)?
        };

        let updated: Config = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| crate::Error::Config(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn to_table(&self) -> Result<toml::Table, crate::Error> {
        match toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))? {
            toml::Value::Table(table) => Ok(table),
            _ => Err(crate::Error::Config("configuration is not a table".to_string())),
        }
    }
}

fn split_key(key: &str) -> Result<(&str, &str), crate::Error> {
    key.split_once('.')
        .ok_or_else(|| crate::Error::Config(format!("expected section.key, got {key}")))
}

fn parse_toml_scalar(raw: &str) -> Result<toml::Value, crate::Error> {
    let doc: toml::Table = toml::from_str(&format!("value = {raw}"))
        .map_err(|e| crate::Error::Config(format!("invalid value {raw:?}: {e}")))?;
    doc.get("value")
        .cloned()
        .ok_or_else(|| crate::Error::Config(format!("invalid value {raw:?}")))
}

fn parse_or_default<T>(key: &str, value: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(key, value, %default, "Malformed number, using default");
            default
        }
    }
}

/// Parse `key=value` lines in the plain properties format.
///
/// Blank lines and lines starting with `#` or `!` are skipped.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let (key, value) = line.split_once(['=', ':'])?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
