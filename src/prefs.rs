use serde::{Deserialize, Serialize};

/// Bump when a field changes meaning; stored records with another version
/// are discarded.
pub const PREFS_VERSION: u32 = 1;

const MIN_TRACK_WIDTH: f64 = 0.5;
const MIN_ICON_SCALE: f64 = 0.1;

/// User-adjustable display settings, persisted by the host as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayPrefs {
    pub version: u32,
    pub track_color: String,
    pub track_width: f64,
    pub track_opacity: f64,
    pub overlay_opacity: f64,
    pub icon_scale: f64,
}

impl Default for DisplayPrefs {
    fn default() -> Self {
        Self {
            version: PREFS_VERSION,
            track_color: "#ff0000".to_string(),
            track_width: 4.0,
            track_opacity: 0.8,
            overlay_opacity: 1.0,
            icon_scale: 1.0,
        }
    }
}

impl DisplayPrefs {
    /// Load a stored record. Anything unreadable or from another version
    /// yields the defaults.
    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<DisplayPrefs>(text) {
            Ok(prefs) if prefs.version == PREFS_VERSION => prefs.clamped(),
            Ok(prefs) => {
                log::warn!(
                    "discarding display preferences with version {} (expected {PREFS_VERSION})",
                    prefs.version
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("discarding unreadable display preferences: {e}");
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of strings and finite floats always serialises
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Bring every value into its usable range. Non-finite numbers fall back
    /// to the default for that field.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        Self {
            version: PREFS_VERSION,
            track_color: if self.track_color.trim().is_empty() {
                defaults.track_color
            } else {
                self.track_color
            },
            track_width: finite_or(self.track_width, defaults.track_width).max(MIN_TRACK_WIDTH),
            track_opacity: finite_or(self.track_opacity, defaults.track_opacity).clamp(0.0, 1.0),
            overlay_opacity: finite_or(self.overlay_opacity, defaults.overlay_opacity)
                .clamp(0.0, 1.0),
            icon_scale: finite_or(self.icon_scale, defaults.icon_scale).max(MIN_ICON_SCALE),
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}
