use serde::Deserialize;

use crate::error::{KmlError, Result};
use crate::prefs::DisplayPrefs;

/// Pixel size of an unscaled KML icon. KML does not define one; this is the
/// convention the map overlay uses.
pub const DEFAULT_ICON_BASE_SIZE: f64 = 32.0;

/// Options for KML extraction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOptions {
    /// Icon size in pixels at `<scale>1</scale>` (default: 32)
    #[serde(default = "default_icon_base_size")]
    pub icon_base_size: f64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            icon_base_size: DEFAULT_ICON_BASE_SIZE,
        }
    }
}

impl ParseOptions {
    pub fn validate(&self) -> Result<()> {
        if self.icon_base_size.is_finite() && self.icon_base_size > 0.0 {
            Ok(())
        } else {
            Err(KmlError::InvalidOptions(format!(
                "iconBaseSize must be a positive number, got {}",
                self.icon_base_size
            )))
        }
    }
}

/// Options for converting extracted data to GeoJSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Include altitude as the 3rd coordinate value (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Include name, description and styleUrl in properties (default: true)
    #[serde(default = "default_true")]
    pub include_metadata: bool,

    /// Which KML element types to convert (default: all)
    #[serde(default)]
    pub types: Option<Vec<KmlElementType>>,

    /// Tracks with fewer points are not drawn; never below 2 (default: 2)
    #[serde(default = "default_min_track_points")]
    pub min_track_points: usize,

    /// Attach a bounding box over all converted geometry (default: true)
    #[serde(default = "default_true")]
    pub bbox: bool,

    /// User display preferences applied on top of the KML styling
    #[serde(default)]
    pub prefs: Option<DisplayPrefs>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_elevation: true,
            include_metadata: true,
            types: None,
            min_track_points: default_min_track_points(),
            bbox: true,
            prefs: None,
        }
    }
}

impl ConvertOptions {
    pub fn should_include(&self, element_type: KmlElementType) -> bool {
        match &self.types {
            None => true,
            Some(types) => types.contains(&element_type),
        }
    }

    /// A line needs two points whatever the caller asked for.
    pub fn min_track_points(&self) -> usize {
        self.min_track_points.max(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KmlElementType {
    Track,
    Icon,
}

fn default_true() -> bool {
    true
}

fn default_icon_base_size() -> f64 {
    DEFAULT_ICON_BASE_SIZE
}

fn default_min_track_points() -> usize {
    2
}
