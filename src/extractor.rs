use crate::coords::parse_coordinates;
use crate::dom::{Document, MarkupTree};
use crate::error::Result;
use crate::kml_types::*;
use crate::options::ParseOptions;

/// How many `styleUrl`/`StyleMap` indirections are followed before giving up.
const MAX_STYLE_HOPS: usize = 4;

/// Parse a KML string and extract its tracks and icons with default options.
pub fn parse_kml(xml: &str) -> Result<KmlData> {
    parse_kml_with(xml, &ParseOptions::default())
}

/// Parse a KML string and extract its tracks and icons.
///
/// Fails on invalid `opts` or a document that is not well-formed; missing or
/// broken per-placemark data is skipped or left absent.
pub fn parse_kml_with(xml: &str, opts: &ParseOptions) -> Result<KmlData> {
    opts.validate()?;
    let doc = Document::parse(xml)?;
    Ok(extract(&doc, opts))
}

/// Walk a parsed tree and collect every `<LineString>` as a track and every
/// `<Point>` as an icon, in document order.
pub fn extract<T: MarkupTree>(tree: &T, opts: &ParseOptions) -> KmlData {
    let tracks: Vec<KmlTrack> = tree
        .elements_by_tag(None, "LineString")
        .into_iter()
        .enumerate()
        .filter_map(|(index, node)| extract_track(tree, node, index))
        .collect();

    let icons: Vec<KmlIcon> = tree
        .elements_by_tag(None, "Point")
        .into_iter()
        .enumerate()
        .filter_map(|(index, node)| extract_icon(tree, node, index, opts))
        .collect();

    log::info!("extracted {} tracks and {} icons", tracks.len(), icons.len());
    KmlData { tracks, icons }
}

fn extract_track<T: MarkupTree>(tree: &T, node: T::Node, index: usize) -> Option<KmlTrack> {
    let points = geometry_points(tree, node, "LineString", index)?;
    let placemark = PlacemarkInfo::read(tree, node);

    Some(KmlTrack {
        name: placemark
            .name
            .unwrap_or_else(|| format!("Track {}", index + 1)),
        description: placemark.description,
        points,
        original_index: index,
        style_reference: placemark.style_url,
    })
}

fn extract_icon<T: MarkupTree>(
    tree: &T,
    node: T::Node,
    index: usize,
    opts: &ParseOptions,
) -> Option<KmlIcon> {
    // A KML Point holds one coordinate; anything after the first is ignored
    let position = *geometry_points(tree, node, "Point", index)?.first()?;
    let placemark = PlacemarkInfo::read(tree, node);
    let style = resolve_icon_style(tree, placemark.node, placemark.style_url.as_deref());

    let icon_size = style
        .scale
        .map(|scale| IconSize::scaled(opts.icon_base_size, scale));

    Some(KmlIcon {
        name: placemark
            .name
            .unwrap_or_else(|| format!("Point {}", index + 1)),
        description: placemark.description,
        position,
        original_index: index,
        style_reference: placemark.style_url,
        icon_url: style.href,
        icon_size,
        icon_anchor: icon_size.map(|size| size.center()),
    })
}

/// Coordinates of a geometry element, or `None` when it has none usable.
fn geometry_points<T: MarkupTree>(
    tree: &T,
    node: T::Node,
    kind: &str,
    index: usize,
) -> Option<Vec<KmlPoint>> {
    let Some(coordinates) = first_descendant(tree, node, "coordinates") else {
        log::debug!("skipping {kind} #{index}: no <coordinates>");
        return None;
    };

    let text = tree.text(coordinates);
    if text.is_empty() {
        log::debug!("skipping {kind} #{index}: empty <coordinates>");
        return None;
    }

    let points = parse_coordinates(&text);
    if points.is_empty() {
        log::debug!("skipping {kind} #{index}: no valid coordinate tuples");
        return None;
    }
    Some(points)
}

/// Metadata of the `<Placemark>` enclosing a geometry.
struct PlacemarkInfo<N> {
    node: Option<N>,
    name: Option<String>,
    description: Option<String>,
    style_url: Option<String>,
}

impl<N: Copy> PlacemarkInfo<N> {
    fn read<T: MarkupTree<Node = N>>(tree: &T, geometry: N) -> Self {
        let Some(placemark) = tree.closest(geometry, "Placemark") else {
            return Self {
                node: None,
                name: None,
                description: None,
                style_url: None,
            };
        };

        Self {
            node: Some(placemark),
            name: descendant_text(tree, placemark, "name"),
            description: descendant_text(tree, placemark, "description"),
            style_url: descendant_text(tree, placemark, "styleUrl"),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct IconStyleFields {
    href: Option<String>,
    scale: Option<f64>,
}

impl IconStyleFields {
    fn is_complete(&self) -> bool {
        self.href.is_some() && self.scale.is_some()
    }

    /// Fill fields missing here from `fallback`.
    fn or(self, fallback: IconStyleFields) -> IconStyleFields {
        IconStyleFields {
            href: self.href.or(fallback.href),
            scale: self.scale.or(fallback.scale),
        }
    }
}

/// Inline `<Style>` fields win; whatever they leave unset comes from the
/// style named by `styleUrl`.
fn resolve_icon_style<T: MarkupTree>(
    tree: &T,
    placemark: Option<T::Node>,
    style_url: Option<&str>,
) -> IconStyleFields {
    let inline = placemark
        .and_then(|pm| first_descendant(tree, pm, "Style"))
        .map(|style| icon_style_fields(tree, style))
        .unwrap_or_default();

    if inline.is_complete() {
        return inline;
    }

    let referenced = style_url
        .and_then(|url| referenced_style(tree, url))
        .map(|style| icon_style_fields(tree, style))
        .unwrap_or_default();

    inline.or(referenced)
}

/// Read `<IconStyle><Icon><href>` and `<IconStyle><scale>` under `scope`.
fn icon_style_fields<T: MarkupTree>(tree: &T, scope: T::Node) -> IconStyleFields {
    let Some(icon_style) = first_descendant(tree, scope, "IconStyle") else {
        return IconStyleFields::default();
    };

    let href = first_descendant(tree, icon_style, "Icon")
        .and_then(|icon| descendant_text(tree, icon, "href"));
    let scale = descendant_text(tree, icon_style, "scale")
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|scale| scale.is_finite());

    IconStyleFields { href, scale }
}

/// Follow a `styleUrl` to the element holding the style, resolving
/// `<StyleMap>` to its `normal` pair.
fn referenced_style<T: MarkupTree>(tree: &T, url: &str) -> Option<T::Node> {
    let mut id = url.strip_prefix('#').unwrap_or(url).to_string();

    for _ in 0..MAX_STYLE_HOPS {
        let Some(target) = tree.element_by_id(&id) else {
            log::debug!("styleUrl target #{id} not found");
            return None;
        };
        if tree.tag_name(target) != "StyleMap" {
            return Some(target);
        }

        let pairs = tree.elements_by_tag(Some(target), "Pair");
        let pair = pairs
            .iter()
            .copied()
            .find(|&pair| descendant_text(tree, pair, "key").as_deref() == Some("normal"))
            .or_else(|| pairs.first().copied())?;

        if first_descendant(tree, pair, "IconStyle").is_some() {
            return Some(pair);
        }
        let next = descendant_text(tree, pair, "styleUrl")?;
        id = next.strip_prefix('#').unwrap_or(&next).to_string();
    }

    log::debug!("styleUrl {url} exceeds {MAX_STYLE_HOPS} indirections");
    None
}

fn first_descendant<T: MarkupTree>(tree: &T, scope: T::Node, tag: &str) -> Option<T::Node> {
    tree.elements_by_tag(Some(scope), tag).into_iter().next()
}

/// Trimmed text of the first `tag` under `scope`; empty counts as absent.
fn descendant_text<T: MarkupTree>(tree: &T, scope: T::Node, tag: &str) -> Option<String> {
    first_descendant(tree, scope, tag)
        .map(|node| tree.text(node))
        .filter(|text| !text.is_empty())
}
