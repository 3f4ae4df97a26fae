//! Presentation of a caller's settings as an embed-style card with one
//! toggle button per setting. Transports decide how to draw it.

use serde::Serialize;

use super::{CallerSettings, Toggle};

pub const SETTINGS_TITLE: &str = "⚙️ Script Logger Settings";
pub const SETTINGS_HINT: &str = "Click buttons below to toggle settings on/off";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingsField {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub status: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    Success,
    Secondary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingsButton {
    /// Setting name; interactions echo this back.
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingsView {
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub fields: Vec<SettingsField>,
    pub buttons: Vec<SettingsButton>,
}

impl SettingsView {
    pub fn new(owner_id: &str, settings: &CallerSettings) -> Self {
        let fields = settings
            .iter()
            .map(|(toggle, enabled)| SettingsField {
                name: toggle.name().to_string(),
                description: toggle.description().to_string(),
                enabled,
                status: status_label(enabled).to_string(),
            })
            .collect();
        let buttons = settings
            .iter()
            .map(|(toggle, enabled)| button_for(toggle, enabled))
            .collect();

        Self {
            owner_id: owner_id.to_string(),
            title: SETTINGS_TITLE.to_string(),
            description: SETTINGS_HINT.to_string(),
            fields,
            buttons,
        }
    }

    /// Plain-text rendering for transports without rich embeds.
    pub fn to_text(&self) -> String {
        let mut out = format!("{}\n{}\n", self.title, self.description);
        for field in &self.fields {
            out.push_str(&format!(
                "\n{}\n{}\nStatus: {}\n",
                field.name, field.description, field.status
            ));
        }
        out
    }
}

fn status_label(enabled: bool) -> &'static str {
    if enabled {
        "✅ Enabled"
    } else {
        "❌ Disabled"
    }
}

fn button_for(toggle: Toggle, enabled: bool) -> SettingsButton {
    SettingsButton {
        custom_id: toggle.name().to_string(),
        label: format!("{} {}", if enabled { "✅" } else { "❌" }, toggle.name()),
        style: if enabled {
            ButtonStyle::Success
        } else {
            ButtonStyle::Secondary
        },
    }
}
