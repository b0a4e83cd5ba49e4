//! Versioned JSON document holding a whole cache.
//!
//! ```json
//! {
//!   "format": "eph-cache",
//!   "version": 1,
//!   "created_utc": "2026-01-01T00:00:00+00:00",
//!   "start": 0.0, "end": 10.0, "samples": 10, "method": "spline",
//!   "grid": [{ "epoch": 0.0, "position": [..], "velocity": [..] }, ...],
//!   "splines": [{ "values": [..], "second_derivatives": [..] }, ...]
//! }
//! ```
//!
//! Spline knots are the grid epochs and are not repeated. `splines` is `null`
//! for linear caches.

use std::io::{Read, Write};
use std::path::Path;

use eph_cache::{
    Built, CacheParts, Capabilities, EphemerisCache, SampleGrid, SplineCoefficients,
};
use eph_core::{Epoch, State, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{PersistError, reader_for_path, writer_for_path};

pub const FORMAT_NAME: &str = "eph-cache";
pub const FORMAT_VERSION: u32 = 1;

/// Serialized form of an [`EphemerisCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub format: String,
    pub version: u32,
    pub created_utc: String,
    pub start: Epoch,
    pub end: Epoch,
    pub samples: usize,
    pub method: String,
    pub grid: Vec<GridRecord>,
    #[serde(default)]
    pub splines: Option<Vec<SplineRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub epoch: Epoch,
    pub position: Vector3,
    pub velocity: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineRecord {
    pub values: Vec<f64>,
    pub second_derivatives: Vec<f64>,
}

#[derive(Deserialize)]
struct Header {
    #[serde(default)]
    format: String,
    #[serde(default)]
    version: u64,
}

impl CacheSnapshot {
    pub fn capture(cache: &EphemerisCache) -> Self {
        let parts = cache.to_parts();
        let grid = parts
            .grid
            .iter()
            .map(|(epoch, state)| GridRecord {
                epoch,
                position: state.position,
                velocity: state.velocity,
            })
            .collect();
        let splines = parts.splines.map(|components| {
            components
                .into_iter()
                .map(|c| SplineRecord {
                    values: c.values,
                    second_derivatives: c.second_derivatives,
                })
                .collect()
        });
        Self {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION,
            created_utc: chrono::Utc::now().to_rfc3339(),
            start: parts.start,
            end: parts.end,
            samples: parts.samples,
            method: parts.method,
            grid,
            splines,
        }
    }

    /// Rebuild the cache. The source ephemeris is never needed.
    pub fn restore(self, capabilities: Capabilities) -> Result<Built, PersistError> {
        check_header(&self.format, u64::from(self.version))?;
        let (epochs, states): (Vec<Epoch>, Vec<State>) = self
            .grid
            .into_iter()
            .map(|r| (r.epoch, State::new(r.position, r.velocity)))
            .unzip();
        let grid = SampleGrid::from_parts(epochs, states)?;
        let splines = self.splines.map(|records| {
            records
                .into_iter()
                .map(|r| SplineCoefficients {
                    values: r.values,
                    second_derivatives: r.second_derivatives,
                })
                .collect()
        });
        let parts = CacheParts {
            start: self.start,
            end: self.end,
            samples: self.samples,
            method: self.method,
            grid,
            splines,
        };
        Ok(EphemerisCache::from_parts(parts, capabilities)?)
    }
}

fn check_header(format: &str, version: u64) -> Result<(), PersistError> {
    if format != FORMAT_NAME {
        return Err(PersistError::Format {
            found: format.to_string(),
        });
    }
    if version != u64::from(FORMAT_VERSION) {
        return Err(PersistError::Version {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(())
}

/// Write `cache` as a JSON document.
pub fn to_writer<W: Write>(cache: &EphemerisCache, mut writer: W) -> Result<(), PersistError> {
    serde_json::to_writer(&mut writer, &CacheSnapshot::capture(cache))?;
    writer.flush()?;
    Ok(())
}

/// Read a JSON document and rebuild the cache it describes.
///
/// Format name and version are checked before the body is interpreted, so a
/// document from a newer layout is reported as such rather than as a parse error.
pub fn from_reader<R: Read>(reader: R, capabilities: Capabilities) -> Result<Built, PersistError> {
    let document: Value = serde_json::from_reader(reader)?;
    let header = Header::deserialize(&document)?;
    check_header(&header.format, header.version)?;
    let snapshot: CacheSnapshot = serde_json::from_value(document)?;
    snapshot.restore(capabilities)
}

/// Persist `cache` to `path` (`-` for stdout).
pub fn dump(cache: &EphemerisCache, path: &Path) -> Result<(), PersistError> {
    to_writer(cache, writer_for_path(path)?)?;
    info!(path = %path.display(), points = cache.grid().len(), "ephemeris cache written");
    Ok(())
}

/// Load a cache previously written by [`dump`] (`-` for stdin).
pub fn load(path: &Path, capabilities: Capabilities) -> Result<Built, PersistError> {
    let built = from_reader(reader_for_path(path)?, capabilities)?;
    debug!(path = %path.display(), method = %built.cache.method(), "ephemeris cache loaded");
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eph_cache::{CacheBuilder, CacheError, InterpolationMethod, MethodDowngrade};
    use eph_source::FnSource;

    fn wobble() -> FnSource<impl Fn(Epoch) -> State> {
        FnSource(|t: Epoch| {
            State::new(
                [t.sin() * 1.0e7, t.cos() * 3.0e6, 0.1 * t],
                [t.cos() * 1.0e7, -t.sin() * 3.0e6, 0.1],
            )
        })
    }

    fn spline_cache() -> EphemerisCache {
        CacheBuilder::new(0.0, 12.0)
            .samples(48)
            .method("spline")
            .capabilities(Capabilities::all())
            .build(&wobble())
            .unwrap()
            .cache
    }

    #[cfg(feature = "spline")]
    #[test]
    fn json_round_trip_reproduces_every_answer() {
        let cache = spline_cache();
        let mut buffer = Vec::new();
        to_writer(&cache, &mut buffer).unwrap();
        let restored = from_reader(buffer.as_slice(), Capabilities::all()).unwrap();
        assert!(restored.downgrade.is_none());
        assert_eq!(restored.cache.method(), InterpolationMethod::Spline);
        for i in 0..=500 {
            let t = 12.0 * i as f64 / 500.0;
            assert_eq!(cache.eph(t), restored.cache.eph(t), "epoch {t}");
        }
    }

    #[test]
    fn linear_cache_stores_no_splines() {
        let cache = CacheBuilder::new(0.0, 12.0)
            .samples(6)
            .build(&wobble())
            .unwrap()
            .cache;
        let snapshot = CacheSnapshot::capture(&cache);
        assert!(snapshot.splines.is_none());
        assert_eq!(snapshot.grid.len(), 7);
        assert_eq!(snapshot.method, "linear");
    }

    #[test]
    fn newer_versions_are_rejected_before_parsing_body() {
        let doc = r#"{"format":"eph-cache","version":2,"layout":"unknown"}"#;
        assert!(matches!(
            from_reader(doc.as_bytes(), Capabilities::all()),
            Err(PersistError::Version { found: 2, .. })
        ));
        let doc = r#"{"format":"pickle","version":1}"#;
        assert!(matches!(
            from_reader(doc.as_bytes(), Capabilities::all()),
            Err(PersistError::Format { .. })
        ));
    }

    #[cfg(feature = "spline")]
    #[test]
    fn spline_documents_without_coefficients_degrade_when_backend_missing() {
        let mut snapshot = CacheSnapshot::capture(&spline_cache());
        snapshot.splines = None;
        let built = snapshot.restore(Capabilities::linear_only()).unwrap();
        assert_eq!(built.downgrade, Some(MethodDowngrade::BackendUnavailable));
        assert_eq!(built.cache.method(), InterpolationMethod::Linear);
    }

    #[test]
    fn truncated_grids_are_reported() {
        let mut snapshot = CacheSnapshot::capture(&spline_cache());
        snapshot.grid.pop();
        assert!(matches!(
            snapshot.restore(Capabilities::all()),
            Err(PersistError::Cache(_))
        ));
    }

    fn linear_snapshot(samples: usize) -> CacheSnapshot {
        let cache = CacheBuilder::new(0.0, 12.0)
            .samples(samples)
            .build(&wobble())
            .unwrap()
            .cache;
        CacheSnapshot::capture(&cache)
    }

    fn flat_records(count: usize, len: usize) -> Vec<SplineRecord> {
        vec![
            SplineRecord {
                values: vec![0.0; len],
                second_derivatives: vec![0.0; len],
            };
            count
        ]
    }

    fn reload(snapshot: &CacheSnapshot) -> Result<Built, PersistError> {
        let bytes = serde_json::to_vec(snapshot).unwrap();
        from_reader(bytes.as_slice(), Capabilities::all())
    }

    #[test]
    fn overflowing_sample_count_is_an_error() {
        let mut snapshot = linear_snapshot(2);
        snapshot.samples = usize::MAX;
        assert!(matches!(
            reload(&snapshot),
            Err(PersistError::Cache(CacheError::TooManySamples { samples: usize::MAX }))
        ));
    }

    #[test]
    fn wrong_spline_shapes_are_rejected() {
        let mut snapshot = linear_snapshot(4);
        snapshot.method = "spline".into();

        snapshot.splines = Some(flat_records(5, 5));
        assert!(matches!(
            reload(&snapshot),
            Err(PersistError::Cache(CacheError::SplineCount {
                expected: 6,
                found: 5
            }))
        ));

        let mut records = flat_records(6, 5);
        records[3].values.pop();
        snapshot.splines = Some(records);
        assert!(matches!(
            reload(&snapshot),
            Err(PersistError::Cache(CacheError::SplineLength {
                component: 3,
                expected: 5,
                found: 4
            }))
        ));

        let mut records = flat_records(6, 5);
        records[0].second_derivatives.push(0.0);
        snapshot.splines = Some(records);
        assert!(matches!(
            reload(&snapshot),
            Err(PersistError::Cache(CacheError::SplineLength {
                component: 0,
                found: 6,
                ..
            }))
        ));
    }

    #[test]
    fn unordered_grid_epochs_are_rejected() {
        let mut snapshot = linear_snapshot(4);
        let (first, second) = (snapshot.grid[1].epoch, snapshot.grid[2].epoch);
        snapshot.grid[1].epoch = second;
        snapshot.grid[2].epoch = first;
        assert!(matches!(
            reload(&snapshot),
            Err(PersistError::Cache(CacheError::DegenerateGrid { index: 2 }))
        ));
    }

    #[test]
    fn dump_and_load_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("eph.json");
        let cache = spline_cache();
        dump(&cache, &path).unwrap();
        let loaded = load(&path, Capabilities::all()).unwrap().cache;
        assert_eq!(loaded.grid(), cache.grid());
        assert_eq!(loaded.eph(3.3), cache.eph(3.3));
    }
}
