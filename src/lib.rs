//! Sampled ephemeris cache.
//!
//! Samples an ephemeris provider once over an epoch range, then answers
//! position/velocity queries inside that range by linear or smoothing-spline
//! interpolation. Caches persist to a versioned JSON document and reload without
//! the original provider. The `ephcache` binary drives the same API from the
//! command line.

pub use eph_cache as cache;
pub use eph_config as config;
pub use eph_core as primitives;
pub use eph_export as export;
pub use eph_source as source;

pub use eph_cache::{
    Built, CacheBuilder, Capabilities, EphemerisCache, InterpolationMethod, MethodDowngrade,
    QueryError,
};
pub use eph_core::{Epoch, State};
pub use eph_source::EphemerisSource;

/// Returns the version of the library for smoke tests.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
