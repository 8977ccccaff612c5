use geojson::{FeatureCollection, Value};
use kml2overlay_wasm::converter::to_feature_collection;
use kml2overlay_wasm::error::KmlError;
use kml2overlay_wasm::extractor::parse_kml;
use kml2overlay_wasm::kml_types::{IconAnchor, IconSize, KmlData, KmlPoint};
use kml2overlay_wasm::options::ConvertOptions;

fn load_fixture(path: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{path}")).unwrap()
}

fn parse(path: &str) -> KmlData {
    parse_kml(&load_fixture(path)).unwrap()
}

fn convert(path: &str) -> FeatureCollection {
    to_feature_collection(&parse(path), &ConvertOptions::default())
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

// ---- basic/ ----

#[test]
fn test_01_complete_extraction() {
    let data = parse("basic/01_complete.kml");
    assert_eq!(data.tracks.len(), 1);
    assert_eq!(data.icons.len(), 2);

    let track = &data.tracks[0];
    assert_eq!(track.name, "Saturday ride");
    assert_eq!(
        track.description.as_deref(),
        Some("Along the <b>Rába</b> & back")
    );
    assert_eq!(track.style_reference.as_deref(), Some("#route"));
    assert_eq!(track.points.len(), 3);
    assert_close(track.points[0].lon, 17.6350);
    assert_close(track.points[0].lat, 47.6875);
    assert_close(track.points[2].alt, 121.0);

    let coffee = &data.icons[0];
    assert_eq!(coffee.name, "Coffee");
    assert_eq!(
        coffee.icon_url.as_deref(),
        Some("https://maps.example.com/icons/cafe.png")
    );
    assert_eq!(
        coffee.icon_size,
        Some(IconSize {
            width: 48.0,
            height: 48.0
        })
    );
    assert_eq!(coffee.icon_anchor, Some(IconAnchor { x: 24.0, y: 24.0 }));

    let bridge = &data.icons[1];
    assert_eq!(bridge.name, "Bridge");
    assert_eq!(bridge.original_index, 1);
    assert!(bridge.icon_url.is_none());
    assert_eq!(bridge.position, KmlPoint::new(47.6875, 17.6350, 0.0));
}

#[test]
fn test_01_complete_geojson() {
    let fc = convert("basic/01_complete.kml");
    assert_eq!(fc.features.len(), 3);

    let types: Vec<&str> = fc
        .features
        .iter()
        .map(|f| {
            f.properties.as_ref().unwrap()["kmlType"]
                .as_str()
                .unwrap()
        })
        .collect();
    assert_eq!(types, vec!["track", "icon", "icon"]);

    let geom = fc.features[0].geometry.as_ref().unwrap();
    if let Value::LineString(coords) = &geom.value {
        assert_eq!(coords.len(), 3);
        assert_close(coords[0][0], 17.6350); // lon
        assert_close(coords[0][1], 47.6875); // lat
        assert_close(coords[0][2], 115.0); // alt
    } else {
        panic!("Expected LineString");
    }

    let bbox = fc.bbox.unwrap();
    assert_eq!(bbox.len(), 4);
    assert_close(bbox[0], 17.6350);
    assert_close(bbox[1], 47.6875);
    assert_close(bbox[2], 17.6455);
    assert_close(bbox[3], 47.6950);
}

#[test]
fn test_01_repeated_parse_is_identical() {
    let xml = load_fixture("basic/01_complete.kml");
    assert_eq!(parse_kml(&xml).unwrap(), parse_kml(&xml).unwrap());
}

// ---- tracks/ ----

#[test]
fn test_02_skipped_geometry_keeps_indices() {
    let data = parse("tracks/02_skipped_geometry.kml");
    assert_eq!(data.tracks.len(), 2);

    let indices: Vec<usize> = data.tracks.iter().map(|t| t.original_index).collect();
    assert_eq!(indices, vec![0, 2]);

    let names: Vec<&str> = data.tracks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Track 1", "Track 3"]);
}

#[test]
fn test_03_bad_tuples_dropped() {
    let data = parse("tracks/03_bad_tuples.kml");
    assert_eq!(
        data.tracks[0].points,
        vec![
            KmlPoint::new(20.0, 10.0, 5.0),
            KmlPoint::new(21.0, 11.0, 0.0),
            KmlPoint::new(24.0, 14.0, 0.0),
        ]
    );
}

// ---- icons/ ----

#[test]
fn test_04_style_resolution() {
    let data = parse("icons/04_styles.kml");
    assert_eq!(data.icons.len(), 4);

    // Inline scale, href from the referenced style
    let mixed = &data.icons[0];
    assert_eq!(mixed.icon_url.as_deref(), Some("icon.png"));
    assert_eq!(mixed.icon_size.map(|s| (s.width, s.height)), Some((64.0, 64.0)));
    assert_eq!(mixed.icon_anchor.map(|a| (a.x, a.y)), Some((32.0, 32.0)));

    // Inline href beats the referenced one
    let over = &data.icons[1];
    assert_eq!(over.icon_url.as_deref(), Some("own.png"));
    assert_eq!(over.icon_size.map(|s| s.width), Some(96.0));

    let mapped = &data.icons[2];
    assert_eq!(mapped.icon_url.as_deref(), Some("icon.png"));
    assert!(mapped.icon_size.is_none());

    let dangling = &data.icons[3];
    assert_eq!(dangling.style_reference.as_deref(), Some("#missing"));
    assert!(dangling.icon_url.is_none());
    assert!(dangling.icon_size.is_none());
}

// ---- edge_cases/ ----

#[test]
fn test_05_no_placemark() {
    let data = parse("edge_cases/05_no_placemark.kml");
    assert_eq!(data.tracks.len(), 1);
    assert_eq!(data.tracks[0].name, "Track 1");
    assert!(data.tracks[0].description.is_none());

    let names: Vec<&str> = data.icons.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Point 1", "Point 3"]);
    assert!(data.icons.iter().all(|i| i.style_reference.is_none()));
}

#[test]
fn test_06_malformed_returns_no_partial_data() {
    let err = parse_kml(&load_fixture("edge_cases/06_malformed.kml")).unwrap_err();
    assert!(matches!(err, KmlError::Malformed { .. }));
    assert_eq!(err.to_string(), "Invalid KML file");
}

#[test]
fn test_07_prefixed_elements_and_entities() {
    let data = parse("edge_cases/07_prefixed.kml");
    assert_eq!(data.icons.len(), 1);
    assert_eq!(data.icons[0].name, "Café & Bar");
    assert_eq!(data.icons[0].position, KmlPoint::new(47.50, 19.04, 96.0));
}
