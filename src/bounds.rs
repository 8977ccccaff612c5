use crate::kml_types::{KmlData, KmlPoint};

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    fn from_point(pt: &KmlPoint) -> Self {
        Self {
            min_lon: pt.lon,
            min_lat: pt.lat,
            max_lon: pt.lon,
            max_lat: pt.lat,
        }
    }

    pub fn extend(&mut self, pt: &KmlPoint) {
        self.min_lon = self.min_lon.min(pt.lon);
        self.min_lat = self.min_lat.min(pt.lat);
        self.max_lon = self.max_lon.max(pt.lon);
        self.max_lat = self.max_lat.max(pt.lat);
    }

    /// Bounds of a point sequence, `None` when empty.
    pub fn of_points<'a>(points: impl IntoIterator<Item = &'a KmlPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for pt in iter {
            bounds.extend(pt);
        }
        Some(bounds)
    }

    /// Bounds over what gets drawn: tracks with at least `min_track_points`
    /// points (never fewer than 2), and every icon.
    pub fn of(data: &KmlData, min_track_points: usize) -> Option<Self> {
        let min_track_points = min_track_points.max(2);
        let track_points = data
            .tracks
            .iter()
            .filter(|trk| trk.points.len() >= min_track_points)
            .flat_map(|trk| trk.points.iter());
        let icon_points = data.icons.iter().map(|icon| &icon.position);
        Self::of_points(track_points.chain(icon_points))
    }

    /// GeoJSON order: `[west, south, east, north]`.
    pub fn to_bbox(&self) -> Vec<f64> {
        vec![self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    pub fn center(&self) -> KmlPoint {
        KmlPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
            0.0,
        )
    }
}
