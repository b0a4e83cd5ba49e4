//! Interpolation method selection and the capability flags that gate it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

const SPLINE_COMPILED: bool = cfg!(feature = "spline");

/// Strategy used to answer queries between grid points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Spline,
}

impl InterpolationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Spline => "spline",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name that does not map to any [`InterpolationMethod`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown interpolation method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for InterpolationMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "spline" => Ok(Self::Spline),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Optional numerical backends available to this process.
///
/// Resolve once at startup with [`Capabilities::detect`], or inject explicitly.
/// A flag can only narrow what the build provides: asking for splines in a
/// build without the `spline` feature still downgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub spline: bool,
}

impl Capabilities {
    /// Capabilities compiled into this build.
    pub const fn detect() -> Self {
        Self {
            spline: SPLINE_COMPILED,
        }
    }

    /// `true` when splines are both requested and compiled in.
    pub const fn spline_available(&self) -> bool {
        self.spline && SPLINE_COMPILED
    }

    pub const fn all() -> Self {
        Self { spline: true }
    }

    pub const fn linear_only() -> Self {
        Self { spline: false }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

/// Why a requested method was replaced by linear interpolation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodDowngrade {
    #[error("interpolation method `{requested}` is not supported, using linear")]
    Unsupported { requested: String },
    #[error("spline interpolation backend is unavailable, using linear")]
    BackendUnavailable,
}

/// Effective method plus the downgrade that produced it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSelection {
    pub method: InterpolationMethod,
    pub downgrade: Option<MethodDowngrade>,
}

impl MethodSelection {
    fn accepted(method: InterpolationMethod) -> Self {
        Self {
            method,
            downgrade: None,
        }
    }

    fn downgraded(reason: MethodDowngrade) -> Self {
        warn!(%reason, "interpolation method downgraded");
        Self {
            method: InterpolationMethod::Linear,
            downgrade: Some(reason),
        }
    }
}

/// Resolve a user-supplied method name against the available capabilities.
pub fn select_method(requested: &str, capabilities: Capabilities) -> MethodSelection {
    match requested.parse::<InterpolationMethod>() {
        Ok(method) => select(method, capabilities),
        Err(UnknownMethod(requested)) => {
            MethodSelection::downgraded(MethodDowngrade::Unsupported { requested })
        }
    }
}

/// Same as [`select_method`] for an already-parsed method.
pub fn select(method: InterpolationMethod, capabilities: Capabilities) -> MethodSelection {
    match method {
        InterpolationMethod::Spline if !capabilities.spline_available() => {
            MethodSelection::downgraded(MethodDowngrade::BackendUnavailable)
        }
        method => MethodSelection::accepted(method),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!("linear".parse(), Ok(InterpolationMethod::Linear));
        assert_eq!(" Spline ".parse(), Ok(InterpolationMethod::Spline));
        assert!("cubic".parse::<InterpolationMethod>().is_err());
    }

    #[test]
    fn unknown_method_falls_back_to_linear() {
        let selection = select_method("akima", Capabilities::all());
        assert_eq!(selection.method, InterpolationMethod::Linear);
        assert_eq!(
            selection.downgrade,
            Some(MethodDowngrade::Unsupported {
                requested: "akima".into()
            })
        );
    }

    #[test]
    fn spline_requires_backend() {
        let without = select_method("spline", Capabilities::linear_only());
        assert_eq!(without.method, InterpolationMethod::Linear);
        assert_eq!(without.downgrade, Some(MethodDowngrade::BackendUnavailable));

        let with = select_method("spline", Capabilities::all());
        if cfg!(feature = "spline") {
            assert_eq!(with.method, InterpolationMethod::Spline);
            assert!(with.downgrade.is_none());
        } else {
            assert_eq!(with.downgrade, Some(MethodDowngrade::BackendUnavailable));
        }
    }
}
