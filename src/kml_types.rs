use serde::Serialize;

/// Result of one extraction: every track and icon found in the document.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct KmlData {
    pub tracks: Vec<KmlTrack>,
    pub icons: Vec<KmlIcon>,
}

impl KmlData {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.icons.is_empty()
    }
}

/// A single coordinate. `lat` and `lon` are always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KmlPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl KmlPoint {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }
}

/// A `<LineString>` resolved against its enclosing `<Placemark>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmlTrack {
    pub name: String,
    pub description: Option<String>,
    pub points: Vec<KmlPoint>,
    /// Position among all `<LineString>` elements, including skipped ones.
    pub original_index: usize,
    pub style_reference: Option<String>,
}

/// A `<Point>` placemark with its resolved icon style.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KmlIcon {
    pub name: String,
    pub description: Option<String>,
    pub position: KmlPoint,
    /// Position among all `<Point>` elements, including skipped ones.
    pub original_index: usize,
    pub style_reference: Option<String>,
    pub icon_url: Option<String>,
    pub icon_size: Option<IconSize>,
    pub icon_anchor: Option<IconAnchor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IconSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IconAnchor {
    pub x: f64,
    pub y: f64,
}

impl IconSize {
    /// Square icon of `base * scale` pixels.
    pub fn scaled(base: f64, scale: f64) -> Self {
        let side = base * scale;
        Self {
            width: side,
            height: side,
        }
    }

    /// Anchor at the centre of the icon.
    pub fn center(&self) -> IconAnchor {
        IconAnchor {
            x: self.width / 2.0,
            y: self.height / 2.0,
        }
    }
}
