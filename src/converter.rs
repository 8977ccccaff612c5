use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::bounds::Bounds;
use crate::kml_types::*;
use crate::options::{ConvertOptions, KmlElementType};
use crate::prefs::DisplayPrefs;

/// Convert extracted KML data to a GeoJSON FeatureCollection for the map.
///
/// Tracks shorter than [`ConvertOptions::min_track_points`] are left out since
/// they cannot be drawn as lines.
pub fn to_feature_collection(data: &KmlData, opts: &ConvertOptions) -> FeatureCollection {
    let min_points = opts.min_track_points();
    let mut features = Vec::new();
    let mut drawn: Vec<&KmlPoint> = Vec::new();

    if opts.should_include(KmlElementType::Track) {
        for trk in &data.tracks {
            if trk.points.len() >= min_points {
                features.push(track_to_feature(trk, opts));
                drawn.extend(trk.points.iter());
            } else {
                log::debug!(
                    "not drawing track {:?}: {} point(s)",
                    trk.name,
                    trk.points.len()
                );
            }
        }
    }

    if opts.should_include(KmlElementType::Icon) {
        for icon in &data.icons {
            features.push(icon_to_feature(icon, opts));
            drawn.push(&icon.position);
        }
    }

    let bbox = if opts.bbox {
        Bounds::of_points(drawn).map(|b| b.to_bbox())
    } else {
        None
    };

    FeatureCollection {
        bbox,
        features,
        foreign_members: None,
    }
}

fn track_to_feature(trk: &KmlTrack, opts: &ConvertOptions) -> Feature {
    let coords: Vec<Vec<f64>> = trk
        .points
        .iter()
        .map(|pt| point_coords(pt, opts.include_elevation))
        .collect();
    let geometry = Geometry::new(Value::LineString(coords));

    let mut props = base_props("track", trk.original_index);
    if opts.include_metadata {
        insert_metadata(&mut props, &trk.name, &trk.description, &trk.style_reference);
    }
    if let Some(prefs) = &opts.prefs {
        insert_stroke(&mut props, prefs);
    }

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn icon_to_feature(icon: &KmlIcon, opts: &ConvertOptions) -> Feature {
    let coords = point_coords(&icon.position, opts.include_elevation);
    let geometry = Geometry::new(Value::Point(coords));

    let mut props = base_props("icon", icon.original_index);
    if opts.include_metadata {
        insert_metadata(
            &mut props,
            &icon.name,
            &icon.description,
            &icon.style_reference,
        );
    }
    insert_optional(&mut props, "iconUrl", &icon.icon_url);

    let user_scale = opts.prefs.as_ref().map_or(1.0, |p| p.icon_scale);
    if let Some(size) = icon.icon_size {
        props.insert(
            "iconSize".to_string(),
            number_pair(size.width * user_scale, size.height * user_scale),
        );
    }
    if let Some(anchor) = icon.icon_anchor {
        props.insert(
            "iconAnchor".to_string(),
            number_pair(anchor.x * user_scale, anchor.y * user_scale),
        );
    }
    if let Some(prefs) = &opts.prefs {
        props.insert("opacity".to_string(), number(prefs.overlay_opacity));
    }

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn base_props(kml_type: &str, original_index: usize) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert(
        "kmlType".to_string(),
        JsonValue::String(kml_type.to_string()),
    );
    props.insert(
        "originalIndex".to_string(),
        JsonValue::Number(original_index.into()),
    );
    props
}

/// Build [lon, lat] or [lon, lat, alt] coordinate array.
fn point_coords(pt: &KmlPoint, include_elevation: bool) -> Vec<f64> {
    if include_elevation {
        vec![pt.lon, pt.lat, pt.alt]
    } else {
        vec![pt.lon, pt.lat]
    }
}

fn insert_metadata(
    props: &mut Map<String, JsonValue>,
    name: &str,
    description: &Option<String>,
    style_reference: &Option<String>,
) {
    props.insert("name".to_string(), JsonValue::String(name.to_string()));
    insert_optional(props, "description", description);
    insert_optional(props, "styleUrl", style_reference);
}

/// simplestyle-spec stroke properties.
fn insert_stroke(props: &mut Map<String, JsonValue>, prefs: &DisplayPrefs) {
    props.insert(
        "stroke".to_string(),
        JsonValue::String(prefs.track_color.clone()),
    );
    props.insert("stroke-width".to_string(), number(prefs.track_width));
    props.insert("stroke-opacity".to_string(), number(prefs.track_opacity));
    props.insert("opacity".to_string(), number(prefs.overlay_opacity));
}

fn insert_optional(props: &mut Map<String, JsonValue>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        props.insert(key.to_string(), JsonValue::String(v.clone()));
    }
}

fn number(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
}

fn number_pair(a: f64, b: f64) -> JsonValue {
    JsonValue::Array(vec![number(a), number(b)])
}
