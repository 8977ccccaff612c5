use crate::kml_types::KmlPoint;

/// Parse the text of a `<coordinates>` element.
///
/// Tuples are whitespace separated, each `lon,lat[,alt]`. A tuple with fewer
/// than two fields or any field that is not a finite number is dropped; the
/// rest keep their document order.
pub fn parse_coordinates(text: &str) -> Vec<KmlPoint> {
    text.split_whitespace().filter_map(parse_tuple).collect()
}

/// Parse a single `lon,lat[,alt]` tuple. Fields past the third are ignored.
pub fn parse_tuple(tuple: &str) -> Option<KmlPoint> {
    let mut fields = tuple.split(',');
    let lon = parse_field(fields.next()?)?;
    let lat = parse_field(fields.next()?)?;
    let alt = match fields.next() {
        Some(field) => parse_field(field)?,
        None => 0.0,
    };
    Some(KmlPoint::new(lat, lon, alt))
}

fn parse_field(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}
