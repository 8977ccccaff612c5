use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use crate::bounds::Bounds;
use crate::error::{KmlError, Result};
use crate::extractor::parse_kml_with;
use crate::kml_types::KmlData;
use crate::options::ParseOptions;

/// Decode raw document bytes and extract them.
pub fn parse_bytes(bytes: &[u8], opts: &ParseOptions) -> Result<KmlData> {
    let xml = std::str::from_utf8(bytes).map_err(KmlError::malformed)?;
    parse_kml_with(xml, opts)
}

/// Read a KML file from disk and extract it.
pub fn load_file(path: impl AsRef<Path>, opts: &ParseOptions) -> Result<KmlData> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| KmlError::Transport {
        status: None,
        reason: format!("{}: {e}", path.display()),
    })?;
    log::debug!("read {} bytes from {}", bytes.len(), path.display());
    parse_bytes(&bytes, opts)
}

/// Allows one load at a time. A second `begin` while a guard is alive fails
/// with [`KmlError::LoadInProgress`] instead of interleaving with the first.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Rc<Cell<bool>>,
}

impl SingleFlight {
    pub fn begin(&self) -> Result<FlightGuard> {
        if self.busy.replace(true) {
            return Err(KmlError::LoadInProgress);
        }
        Ok(FlightGuard {
            busy: Rc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }
}

/// Releases its [`SingleFlight`] when dropped. Owns its handle so it can be
/// held across an `.await`.
#[derive(Debug)]
pub struct FlightGuard {
    busy: Rc<Cell<bool>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

/// The currently displayed extraction. A failed load leaves it untouched.
#[derive(Debug, Default)]
pub struct LoadSession {
    options: ParseOptions,
    current: Option<KmlData>,
}

impl LoadSession {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&KmlData> {
        self.current.as_ref()
    }

    pub fn bounds(&self, min_track_points: usize) -> Option<Bounds> {
        self.current
            .as_ref()
            .and_then(|data| Bounds::of(data, min_track_points))
    }

    pub fn load_str(&mut self, xml: &str) -> Result<&KmlData> {
        let result = parse_kml_with(xml, &self.options);
        self.commit(result)
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<&KmlData> {
        let result = parse_bytes(bytes, &self.options);
        self.commit(result)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&KmlData> {
        let result = load_file(path, &self.options);
        self.commit(result)
    }

    fn commit(&mut self, result: Result<KmlData>) -> Result<&KmlData> {
        match result {
            Ok(data) => Ok(&*self.current.insert(data)),
            Err(e) => {
                log::warn!("KML load failed, keeping previous data: {e}");
                Err(e)
            }
        }
    }
}
