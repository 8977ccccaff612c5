pub mod bounds;
pub mod converter;
pub mod coords;
pub mod dom;
pub mod error;
pub mod extractor;
pub mod kml_types;
pub mod loader;
pub mod logging;
pub mod options;
pub mod prefs;

use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::error::KmlError;
use crate::loader::SingleFlight;
use crate::options::{ConvertOptions, ParseOptions};
use crate::prefs::DisplayPrefs;

thread_local! {
    static FETCHES: SingleFlight = SingleFlight::default();
}

/// Extract tracks and icons from a KML string, returned as a JS object.
#[wasm_bindgen(js_name = parseKml)]
pub fn parse_kml_js(kml_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options::<ParseOptions>(options)?;
    let data = extractor::parse_kml_with(kml_string, &opts)?;
    to_js(&data)
}

/// Convert a KML string to GeoJSON, returned as a JS object.
#[wasm_bindgen(js_name = kmlToGeoJson)]
pub fn kml_to_geojson(
    kml_string: &str,
    parse_opts: JsValue,
    convert_opts: JsValue,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let fc = convert(kml_string, parse_opts, convert_opts)?;
    to_js(&fc)
}

/// Convert a KML string to GeoJSON, returned as a JSON string.
#[wasm_bindgen(js_name = kmlToGeoJsonString)]
pub fn kml_to_geojson_string(
    kml_string: &str,
    parse_opts: JsValue,
    convert_opts: JsValue,
) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let fc = convert(kml_string, parse_opts, convert_opts)?;
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Fetch a KML document over HTTP and extract it. Only one fetch may be in
/// flight; a second call rejects until the first settles.
#[wasm_bindgen(js_name = fetchKml)]
pub async fn fetch_kml(url: String, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options::<ParseOptions>(options)?;
    // Reject bad options before going to the network.
    opts.validate()?;
    let _guard = FETCHES.with(|flight| flight.begin())?;

    let text = fetch_text(&url).await?;
    log::debug!("fetched {} bytes from {url}", text.len());
    let data = extractor::parse_kml_with(&text, &opts)?;
    to_js(&data)
}

/// Route `log` output to the browser console at `level` (default `info`).
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: Option<String>) {
    console_error_panic_hook::set_once();
    logging::init(logging::parse_level(level.as_deref()));
}

/// Read stored display preferences, falling back to defaults for anything
/// missing, outdated or out of range.
#[wasm_bindgen(js_name = normalizeDisplayPrefs)]
pub fn normalize_display_prefs(json: Option<String>) -> Result<JsValue, JsValue> {
    let prefs = json
        .as_deref()
        .map(DisplayPrefs::from_json)
        .unwrap_or_default();
    to_js(&prefs)
}

fn convert(
    kml_string: &str,
    parse_opts: JsValue,
    convert_opts: JsValue,
) -> Result<geojson::FeatureCollection, KmlError> {
    let parse_opts = parse_options::<ParseOptions>(parse_opts)?;
    let mut convert_opts = parse_options::<ConvertOptions>(convert_opts)?;
    convert_opts.prefs = convert_opts.prefs.map(DisplayPrefs::clamped);

    let data = extractor::parse_kml_with(kml_string, &parse_opts)?;
    Ok(converter::to_feature_collection(&data, &convert_opts))
}

async fn fetch_text(url: &str) -> Result<String, KmlError> {
    let window = web_sys::window().ok_or_else(|| transport("no window available"))?;
    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| transport(js_reason(&e)))?
        .dyn_into()
        .map_err(|_| transport("fetch did not return a Response"))?;

    if !response.ok() {
        return Err(KmlError::Transport {
            status: Some(response.status()),
            reason: response.status_text(),
        });
    }

    let body = response.text().map_err(|e| transport(js_reason(&e)))?;
    let text = JsFuture::from(body)
        .await
        .map_err(|e| transport(js_reason(&e)))?;
    text.as_string()
        .ok_or_else(|| transport("response body is not text"))
}

fn transport(reason: impl Into<String>) -> KmlError {
    KmlError::Transport {
        status: None,
        reason: reason.into(),
    }
}

fn js_reason(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

fn parse_options<T: DeserializeOwned + Default>(options: JsValue) -> Result<T, KmlError> {
    if options.is_undefined() || options.is_null() {
        Ok(T::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| KmlError::InvalidOptions(e.to_string()))
    }
}

/// Plain objects and arrays rather than JS `Map`s, so GeoJSON properties stay
/// indexable from JS.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
