//! User options and their store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dom::css::parse_css_color;
use crate::search::{FlagName, Flags};
use crate::view::highlights::HighlightColors;

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("failed to read options: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed options: {0}")]
    Json(#[from] serde_json::Error),
    #[error("options must be a JSON object")]
    NotAnObject,
    #[error("invalid colour for {name}: {value:?}")]
    Color { name: &'static str, value: String },
}

/// Default state and shortcut of one search flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagOption {
    pub default: bool,
    pub shortkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOption {
    pub shortkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionOptions {
    pub open: ActionOption,
    pub close: ActionOption,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            open: ActionOption { shortkey: "Control+Shift+F".into() },
            close: ActionOption { shortkey: "Escape".into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppOptions {
    pub flags: BTreeMap<FlagName, FlagOption>,
    pub actions: ActionOptions,
    pub max_matches: usize,
    /// Milliseconds.
    pub max_timeout: u64,
    pub colors: HighlightColors,
}

impl Default for AppOptions {
    fn default() -> Self {
        let flag = |shortkey: &str| FlagOption { default: false, shortkey: shortkey.into() };
        Self {
            flags: BTreeMap::from([
                (FlagName::MatchCase, flag("Alt+C")),
                (FlagName::WholeWord, flag("Alt+W")),
                (FlagName::UseRegex, flag("Alt+R")),
                (FlagName::NormalizeDiacritics, flag("Alt+D")),
            ]),
            actions: ActionOptions::default(),
            max_matches: 2000,
            max_timeout: 5000,
            colors: HighlightColors::default(),
        }
    }
}

impl AppOptions {
    /// Parse options JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: AppOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let json = std::fs::read_to_string(path)?;
        let options = Self::from_json(&json)?;
        log::debug!("options loaded from {}", path.display());
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        for (name, value) in [("all", &self.colors.all), ("current", &self.colors.current), ("text", &self.colors.text)] {
            if parse_css_color(value).is_none() {
                return Err(OptionsError::Color { name, value: value.clone() });
            }
        }
        Ok(())
    }

    /// Flags as configured to start out.
    pub fn default_flags(&self) -> Flags {
        let mut flags = Flags::default();
        for (&name, option) in &self.flags {
            flags.set(name, option.default);
        }
        flags
    }

    pub fn shortkey(&self, name: FlagName) -> Option<&str> {
        self.flags.get(&name).map(|f| f.shortkey.as_str())
    }
}

/// Persistent key-value storage for [`AppOptions`].
pub trait OptionsStore {
    /// Stored options, with `defaults` filling every missing key.
    fn get(&self, defaults: &AppOptions) -> Result<AppOptions, OptionsError>;
    /// Merge top-level keys of `partial` into the stored object.
    fn set(&self, partial: Value) -> Result<(), OptionsError>;
    fn clear(&self) -> Result<(), OptionsError>;
}

/// Store backed by a JSON object in memory. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryOptionsStore {
    items: Arc<Mutex<Map<String, Value>>>,
}

impl MemoryOptionsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionsStore for MemoryOptionsStore {
    fn get(&self, defaults: &AppOptions) -> Result<AppOptions, OptionsError> {
        let Value::Object(mut merged) = serde_json::to_value(defaults)? else {
            return Err(OptionsError::NotAnObject);
        };
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        for (k, v) in items.iter() {
            merged.insert(k.clone(), v.clone());
        }
        let options: AppOptions = serde_json::from_value(Value::Object(merged))?;
        options.validate()?;
        Ok(options)
    }

    fn set(&self, partial: Value) -> Result<(), OptionsError> {
        let Value::Object(partial) = partial else {
            return Err(OptionsError::NotAnObject);
        };
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.extend(partial);
        Ok(())
    }

    fn clear(&self) -> Result<(), OptionsError> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}
