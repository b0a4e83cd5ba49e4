//! Configuration models and loaders for ephemeris cache builds.

use std::convert::Infallible;
use std::fs::File;
use std::path::Path;

use eph_core::{Epoch, State, Vector3};
use eph_source::{EphemerisSource, FixedPoint, UniformMotion};
use serde::Deserialize;
use thiserror::Error;

/// Parameters for sampling one ephemeris into a cache.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    pub start: Epoch,
    pub end: Epoch,
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Requested interpolation method; unknown names are downgraded at build time.
    #[serde(default = "default_method")]
    pub method: String,
    pub source: SourceConfig,
}

/// Ephemeris provider described in a cache manifest.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SourceConfig {
    #[serde(rename = "fixed")]
    Fixed {
        position: Vector3,
        #[serde(default)]
        velocity: Vector3,
    },
    #[serde(rename = "uniform")]
    Uniform {
        #[serde(default)]
        reference_epoch: Epoch,
        position: Vector3,
        velocity: Vector3,
    },
    #[serde(other)]
    Unsupported,
}

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("ephemeris source type unsupported")]
    UnsupportedSource,
}

fn default_samples() -> usize {
    100
}

fn default_method() -> String {
    "linear".to_string()
}

impl CacheConfig {
    /// Check range and resolution before any sampling happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "range bounds must be finite (start {}, end {})",
                self.start, self.end
            )));
        }
        if self.start >= self.end {
            return Err(ConfigError::Invalid(format!(
                "start {} must be before end {}",
                self.start, self.end
            )));
        }
        if self.samples == 0 {
            return Err(ConfigError::Invalid("samples must be at least 1".into()));
        }
        self.source.to_source().map(|_| ())
    }
}

/// Concrete provider built from a [`SourceConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfiguredSource {
    Fixed(FixedPoint),
    Uniform(UniformMotion),
}

impl EphemerisSource for ConfiguredSource {
    type Error = Infallible;

    fn eph(&self, epoch: Epoch) -> Result<State, Self::Error> {
        match self {
            Self::Fixed(body) => body.eph(epoch),
            Self::Uniform(body) => body.eph(epoch),
        }
    }
}

impl SourceConfig {
    pub fn to_source(&self) -> Result<ConfiguredSource, ConfigError> {
        match self {
            Self::Fixed { position, velocity } => {
                check_finite("position", position)?;
                check_finite("velocity", velocity)?;
                Ok(ConfiguredSource::Fixed(FixedPoint::new(*position, *velocity)))
            }
            Self::Uniform {
                reference_epoch,
                position,
                velocity,
            } => {
                if !reference_epoch.is_finite() {
                    return Err(ConfigError::Invalid(
                        "reference_epoch must be finite".into(),
                    ));
                }
                check_finite("position", position)?;
                check_finite("velocity", velocity)?;
                Ok(ConfiguredSource::Uniform(UniformMotion::new(
                    *reference_epoch,
                    *position,
                    *velocity,
                )))
            }
            Self::Unsupported => Err(ConfigError::UnsupportedSource),
        }
    }
}

fn check_finite(name: &str, v: &Vector3) -> Result<(), ConfigError> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} must be finite, got {v:?}")))
    }
}

/// Load a cache manifest from a YAML or TOML file (chosen by extension).
pub fn load_cache_config<P: AsRef<Path>>(path: P) -> Result<CacheConfig, ConfigError> {
    let config: CacheConfig = load_record(path)?;
    config.validate()?;
    Ok(config)
}

fn load_record<T, P>(path: P) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if path.extension().map(|ext| ext == "toml").unwrap_or(false) {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    } else {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}
