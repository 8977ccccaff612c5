use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, KmlError>;

#[derive(Debug, Error)]
pub enum KmlError {
    /// The markup is not well-formed. The message is fixed; `detail` says why.
    #[error("Invalid KML file")]
    Malformed { detail: String },

    /// The bytes could not be obtained (unreadable file, failed fetch).
    #[error("Failed to load KML: {reason}{}", status_suffix(.status))]
    Transport { status: Option<u16>, reason: String },

    #[error("Another KML load is already in progress")]
    LoadInProgress,

    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl KmlError {
    pub fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::Malformed {
            detail: detail.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl From<quick_xml::Error> for KmlError {
    fn from(e: quick_xml::Error) -> Self {
        Self::malformed(e)
    }
}

impl From<std::io::Error> for KmlError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport {
            status: None,
            reason: e.to_string(),
        }
    }
}

impl From<KmlError> for JsValue {
    fn from(e: KmlError) -> Self {
        js_sys::Error::new(&e.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_is_fixed() {
        let a = KmlError::malformed("unclosed <Placemark>");
        let b = KmlError::malformed("no root element");
        assert_eq!(a.to_string(), "Invalid KML file");
        assert_eq!(a.to_string(), b.to_string());
        assert!(!a.is_transport());
    }

    #[test]
    fn test_transport_carries_status() {
        let e = KmlError::Transport {
            status: Some(404),
            reason: "Not Found".to_string(),
        };
        assert!(e.is_transport());
        assert_eq!(e.to_string(), "Failed to load KML: Not Found (status 404)");
    }

    #[test]
    fn test_io_error_is_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let e = KmlError::from(io);
        assert!(e.is_transport());
        assert_eq!(e.to_string(), "Failed to load KML: no such file");
    }
}
