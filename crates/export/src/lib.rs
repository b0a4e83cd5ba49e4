//! Persistence and export helpers for ephemeris caches.
//!
//! Caches are stored as a versioned JSON document (see [`snapshot`]); the raw
//! sample grid can also be exported as CSV (see [`grid_csv`]).

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use eph_cache::CacheError;
use thiserror::Error;

pub mod grid_csv;
pub mod snapshot;

pub use snapshot::{
    CacheSnapshot, FORMAT_NAME, FORMAT_VERSION, dump, from_reader, load, to_writer,
};

/// Errors surfaced while persisting or restoring caches.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed cache document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("document format `{found}` is not an ephemeris cache")]
    Format { found: String },
    #[error("cache format version {found} is not supported (expected {supported})")]
    Version { found: u64, supported: u32 },
    #[error("stored cache is inconsistent: {0}")]
    Cache(#[from] CacheError),
}

/// Create a writer for the target path, handling stdout (`-`) by convention.
pub fn writer_for_path(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Open a reader for the source path, handling stdin (`-`) by convention.
pub fn reader_for_path(path: &Path) -> io::Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    Ok(Box::new(BufReader::new(File::open(path)?)))
}
