//! Per-caller engine toggles
//!
//! The set of toggles is closed: it is exactly the flags the script engine
//! understands, and nothing a caller sends can add to it. Every toggle has
//! a documented default so a caller record never has holes.

pub mod store;
pub mod view;

pub use store::SettingsStore;
pub use view::{ButtonStyle, SettingsButton, SettingsField, SettingsView};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::SettingsError;

/// Environment variable prefix the engine reads toggles from.
pub const ENV_PREFIX: &str = "SETTING_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Toggle {
    HookOp,
    ExploreFuncs,
    SpyExecOnly,
    NoStringLimit,
    Minifier,
    Comments,
    UiDetection,
    NotifyScamblox,
    ConstantCollection,
    DuplicateSearcher,
    NeverNester,
}

impl Toggle {
    /// Every recognized toggle, in display order.
    pub const ALL: [Toggle; 11] = [
        Toggle::HookOp,
        Toggle::ExploreFuncs,
        Toggle::SpyExecOnly,
        Toggle::NoStringLimit,
        Toggle::Minifier,
        Toggle::Comments,
        Toggle::UiDetection,
        Toggle::NotifyScamblox,
        Toggle::ConstantCollection,
        Toggle::DuplicateSearcher,
        Toggle::NeverNester,
    ];

    /// Name as stored on disk and shown to users.
    pub fn name(self) -> &'static str {
        match self {
            Toggle::HookOp => "hookOp",
            Toggle::ExploreFuncs => "explore_funcs",
            Toggle::SpyExecOnly => "spyexeconly",
            Toggle::NoStringLimit => "no_string_limit",
            Toggle::Minifier => "minifier",
            Toggle::Comments => "comments",
            Toggle::UiDetection => "ui_detection",
            Toggle::NotifyScamblox => "notify_scamblox",
            Toggle::ConstantCollection => "constant_collection",
            Toggle::DuplicateSearcher => "duplicate_searcher",
            Toggle::NeverNester => "neverNester",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Toggle::HookOp => "Hook operations (repeat, while, if, comparisons)",
            Toggle::ExploreFuncs => "Show full function bodies",
            Toggle::SpyExecOnly => "Only spy executor variables",
            Toggle::NoStringLimit => "No string truncation",
            Toggle::Minifier => "Minify/inline output",
            Toggle::Comments => "Show helpful comments",
            Toggle::UiDetection => "Detect UI libraries [EXPERIMENTAL]",
            Toggle::NotifyScamblox => "Notify scam detection (Premium only)",
            Toggle::ConstantCollection => "Collect all strings",
            Toggle::DuplicateSearcher => "Search for duplicate files",
            Toggle::NeverNester => "Prevent nested if checks",
        }
    }

    pub fn default_value(self) -> bool {
        matches!(self, Toggle::ExploreFuncs | Toggle::Comments)
    }

    /// `SETTING_<NAME_UPPERCASED>`, e.g. `SETTING_HOOKOP`.
    pub fn env_var(self) -> String {
        format!("{}{}", ENV_PREFIX, self.name().to_uppercase())
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Toggle {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Toggle::ALL
            .iter()
            .copied()
            .find(|toggle| toggle.name() == s)
            .ok_or_else(|| SettingsError::UnknownSetting(s.to_string()))
    }
}

/// One caller's complete toggle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerSettings {
    values: BTreeMap<Toggle, bool>,
}

impl CallerSettings {
    /// Builds a record from a loosely typed map, dropping names outside the
    /// recognized set and filling the rest from defaults.
    pub fn from_raw(raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut settings = Self::default();
        for (key, value) in raw {
            match (key.parse::<Toggle>(), value.as_bool()) {
                (Ok(toggle), Some(enabled)) => settings.set(toggle, enabled),
                (Ok(_), None) => {
                    log::warn!("Ignoring non-boolean value for setting '{}'", key)
                }
                (Err(_), _) => log::warn!("Dropping unrecognized setting '{}'", key),
            }
        }
        settings
    }

    pub fn get(&self, toggle: Toggle) -> bool {
        self.values
            .get(&toggle)
            .copied()
            .unwrap_or_else(|| toggle.default_value())
    }

    pub fn set(&mut self, toggle: Toggle, enabled: bool) {
        self.values.insert(toggle, enabled);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Toggle, bool)> + '_ {
        Toggle::ALL.iter().map(move |toggle| (*toggle, self.get(*toggle)))
    }

    /// Engine environment: one `SETTING_<NAME>` entry per recognized toggle.
    pub fn to_env(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(toggle, enabled)| {
                (
                    toggle.env_var(),
                    if enabled { "1" } else { "0" }.to_string(),
                )
            })
            .collect()
    }
}

impl Default for CallerSettings {
    fn default() -> Self {
        Self {
            values: Toggle::ALL
                .iter()
                .map(|toggle| (*toggle, toggle.default_value()))
                .collect(),
        }
    }
}

impl Serialize for CallerSettings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Toggle::ALL.len()))?;
        for (toggle, enabled) in self.iter() {
            map.serialize_entry(toggle.name(), &enabled)?;
        }
        map.end()
    }
}
