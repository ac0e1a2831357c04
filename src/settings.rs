//! Preference stores and the per-job style snapshot.
//!
//! The pipeline only ever reads preferences through [`ConfigStore`]. Values are
//! resolved once per job into a [`StyleSnapshot`] so a concurrent preference
//! change cannot tear a render in half.

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read-only key/value source of user style preferences.
pub trait ConfigStore: Send + Sync {
    /// Look up a preference by key
    fn get(&self, key: &str) -> Option<Value>;

    /// Whether a preference is present
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Preference keys and their defaults as seeded on first start.
pub const DEFAULTS: &[(&str, DefaultValue)] = &[
    ("platform", DefaultValue::Str("twitch")),
    ("platformColor", DefaultValue::Str("purple")),
    ("channelName", DefaultValue::Str("")),
    ("fullChannelLink", DefaultValue::Bool(false)),
    ("fontName", DefaultValue::Str("")),
    ("backgroundImagePath", DefaultValue::Str("")),
    ("titlesColor", DefaultValue::Str("#FFFFFF")),
    ("dayOnColor", DefaultValue::Str("#FFFFFF")),
    ("dayOffColor", DefaultValue::Str("#FF0000")),
];

/// A default preference value
#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Str(&'static str),
    Bool(bool),
}

impl DefaultValue {
    fn to_value(self) -> Value {
        match self {
            DefaultValue::Str(s) => Value::String(s.to_string()),
            DefaultValue::Bool(b) => Value::Bool(b),
        }
    }
}

/// In-memory store, mostly useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with [`DEFAULTS`]
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        for (key, value) in DEFAULTS {
            store.set(key, value.to_value());
        }
        store
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

/// JSON-file backed preference store.
///
/// Mirrors the desktop settings channel: `has`, `get`, `set`, `delete` and
/// `reset`, every mutation persisted immediately.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl SettingsStore {
    /// Open a settings file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(Error::SettingsError(format!(
                        "{}: top-level value must be an object",
                        path.display()
                    )))
                }
                Err(e) => {
                    return Err(Error::SettingsError(format!("{}: {}", path.display(), e)))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(Error::SettingsError(format!("{}: {}", path.display(), e))),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seed every missing default. Existing values are left alone.
    pub fn init_defaults(&mut self) -> Result<()> {
        let mut changed = false;
        for (key, value) in DEFAULTS {
            if !self.values.contains_key(*key) {
                self.values.insert(key.to_string(), value.to_value());
                changed = true;
            }
        }
        if changed {
            self.save()?;
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Drop every stored preference
    pub fn reset(&mut self) -> Result<()> {
        self.values.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|e| Error::SettingsError(e.to_string()))?;
        std::fs::write(&self.path, text)
            .map_err(|e| Error::SettingsError(format!("{}: {}", self.path.display(), e)))
    }
}

impl ConfigStore for SettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

/// Streaming platform the channel link points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Twitch,
    Youtube,
    Kick,
}

impl Platform {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twitch" => Some(Platform::Twitch),
            "youtube" => Some(Platform::Youtube),
            "kick" => Some(Platform::Kick),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Youtube => "youtube",
            Platform::Kick => "kick",
        }
    }

    /// Channel link for `name`, optionally as a full URL
    pub fn channel_link(self, name: &str, full: bool) -> String {
        let short = match self {
            Platform::Twitch => format!("twitch.tv/{}", name),
            Platform::Youtube => format!("youtube.com/@{}", name),
            Platform::Kick => format!("kick.com/{}", name),
        };
        if full {
            format!("https://www.{}", short)
        } else {
            short
        }
    }
}

/// Style preferences resolved for a single job.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSnapshot {
    pub platform: Platform,
    /// Accent color as `#RRGGBB`
    pub accent_color: String,
    pub channel_name: String,
    pub full_channel_link: bool,
    /// Empty means the default font stack
    pub font_name: String,
    pub background_image: Option<PathBuf>,
    pub titles_color: String,
    pub day_on_color: String,
    pub day_off_color: String,
}

impl StyleSnapshot {
    /// Read and validate every style key once.
    pub fn resolve(store: &dyn ConfigStore) -> Result<Self> {
        let platform_raw = required_str(store, "platform")?;
        let platform = Platform::parse(&platform_raw).ok_or_else(|| {
            Error::ConfigurationError(format!("unknown platform '{}'", platform_raw))
        })?;

        let accent_raw = required_str(store, "platformColor")?;
        let accent_color = named_color(&accent_raw)
            .map(str::to_string)
            .or_else(|| normalize_hex(&accent_raw))
            .ok_or_else(|| {
                Error::ConfigurationError(format!("invalid platformColor '{}'", accent_raw))
            })?;

        let background_image = optional_str(store, "backgroundImagePath")?
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            platform,
            accent_color,
            channel_name: optional_str(store, "channelName")?
                .unwrap_or_default()
                .trim()
                .to_string(),
            full_channel_link: optional_bool(store, "fullChannelLink")?.unwrap_or(false),
            font_name: optional_str(store, "fontName")?
                .unwrap_or_default()
                .trim()
                .to_string(),
            background_image,
            titles_color: required_hex(store, "titlesColor")?,
            day_on_color: required_hex(store, "dayOnColor")?,
            day_off_color: required_hex(store, "dayOffColor")?,
        })
    }

    /// Channel line shown in the footer, if a channel is configured
    pub fn channel_line(&self) -> Option<String> {
        if self.channel_name.is_empty() {
            None
        } else {
            Some(
                self.platform
                    .channel_link(&self.channel_name, self.full_channel_link),
            )
        }
    }
}

fn required_str(store: &dyn ConfigStore, key: &str) -> Result<String> {
    optional_str(store, key)?
        .ok_or_else(|| Error::ConfigurationError(format!("missing style key '{}'", key)))
}

fn optional_str(store: &dyn ConfigStore, key: &str) -> Result<Option<String>> {
    match store.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(Error::ConfigurationError(format!(
            "style key '{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn optional_bool(store: &dyn ConfigStore, key: &str) -> Result<Option<bool>> {
    match store.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(other) => Err(Error::ConfigurationError(format!(
            "style key '{}' must be a boolean, got {}",
            key, other
        ))),
    }
}

fn required_hex(store: &dyn ConfigStore, key: &str) -> Result<String> {
    let raw = required_str(store, key)?;
    normalize_hex(&raw)
        .ok_or_else(|| Error::ConfigurationError(format!("style key '{}' is not a hex color: '{}'", key, raw)))
}

fn named_color(name: &str) -> Option<&'static str> {
    let color = match name.trim().to_ascii_lowercase().as_str() {
        "purple" => "#9146FF",
        "red" => "#FF0000",
        "green" => "#53FC18",
        "blue" => "#1DA1F2",
        "pink" => "#FF69B4",
        "orange" => "#FF8C00",
        "yellow" => "#FFD700",
        "white" => "#FFFFFF",
        "black" => "#000000",
        _ => return None,
    };
    Some(color)
}

/// Normalize `#RGB` / `#RRGGBB` to uppercase `#RRGGBB`.
pub(crate) fn normalize_hex(raw: &str) -> Option<String> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some(format!("#{}", hex.to_ascii_uppercase())),
        3 => {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            Some(format!("#{}", expanded.to_ascii_uppercase()))
        }
        _ => None,
    }
}
