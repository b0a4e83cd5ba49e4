//! Sampled ephemeris cache.
//!
//! An [`EphemerisCache`] queries an [`EphemerisSource`] once, at `samples + 1`
//! evenly spaced epochs over `[start, end]`, and afterwards answers `eph`
//! requests inside that range on its own: exact grid epochs return the stored
//! sample, other epochs are interpolated linearly or through six smoothing
//! splines (one per state component). The source is not retained, so a cache
//! can be persisted and reloaded where the original provider is unavailable.
//!
//! Smoothing splines are compiled only with the `spline` feature (on by
//! default). Without it every spline request is answered linearly and reported
//! as [`MethodDowngrade::BackendUnavailable`].

use eph_core::state::STATE_COMPONENTS;
use eph_core::{Epoch, State};
use eph_source::EphemerisSource;
use tracing::warn;

mod error;
pub mod grid;
pub mod method;
#[cfg(feature = "spline")]
pub mod spline;

pub use error::{CacheError, QueryError, SplineError};
pub use grid::SampleGrid;
pub use method::{
    Capabilities, InterpolationMethod, MethodDowngrade, MethodSelection, select, select_method,
};
#[cfg(feature = "spline")]
pub use spline::SmoothingSpline;

/// Grid resolution used when the caller does not pick one.
pub const DEFAULT_SAMPLES: usize = 100;
/// Residual sum-of-squares bound for every component spline.
pub const SPLINE_SMOOTHING: f64 = 1.0;

/// Fitted coefficients of one component spline over the grid epochs.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineCoefficients {
    pub values: Vec<f64>,
    pub second_derivatives: Vec<f64>,
}

/// Reject stored coefficients that cannot belong to `grid`.
fn check_coefficients(
    grid: &SampleGrid,
    coefficients: &[SplineCoefficients],
) -> Result<(), CacheError> {
    if coefficients.len() != STATE_COMPONENTS {
        return Err(CacheError::SplineCount {
            expected: STATE_COMPONENTS,
            found: coefficients.len(),
        });
    }
    for (component, c) in coefficients.iter().enumerate() {
        for found in [c.values.len(), c.second_derivatives.len()] {
            if found != grid.len() {
                return Err(CacheError::SplineLength {
                    component,
                    expected: grid.len(),
                    found,
                });
            }
        }
    }
    Ok(())
}

/// Six component splines, ordered `x, y, z, vx, vy, vz`.
#[cfg(feature = "spline")]
#[derive(Debug, Clone, PartialEq)]
pub struct SplineSet {
    components: Vec<SmoothingSpline>,
}

#[cfg(feature = "spline")]
impl SplineSet {
    /// Fit one smoothing spline per state component over the whole grid.
    pub fn fit(grid: &SampleGrid) -> Result<Self, CacheError> {
        let components = (0..STATE_COMPONENTS)
            .map(|index| {
                SmoothingSpline::fit(grid.epochs(), &grid.component(index), SPLINE_SMOOTHING)
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(points = grid.len(), "component splines fitted");
        Ok(Self { components })
    }

    /// Adopt previously fitted coefficients, with the grid epochs as knots.
    pub fn from_coefficients(
        grid: &SampleGrid,
        coefficients: Vec<SplineCoefficients>,
    ) -> Result<Self, CacheError> {
        check_coefficients(grid, &coefficients)?;
        let components = coefficients
            .into_iter()
            .map(|c| {
                SmoothingSpline::from_parts(grid.epochs().to_vec(), c.values, c.second_derivatives)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    pub fn components(&self) -> &[SmoothingSpline] {
        &self.components
    }

    pub fn coefficients(&self) -> Vec<SplineCoefficients> {
        self.components
            .iter()
            .map(|spline| SplineCoefficients {
                values: spline.values().to_vec(),
                second_derivatives: spline.second_derivatives().to_vec(),
            })
            .collect()
    }

    pub fn evaluate(&self, epoch: Epoch) -> State {
        let mut values = [0.0; STATE_COMPONENTS];
        for (value, spline) in values.iter_mut().zip(&self.components) {
            *value = spline.evaluate(epoch);
        }
        State::from_array(values)
    }
}

/// A constructed cache together with any method downgrade applied on the way.
#[derive(Debug)]
pub struct Built {
    pub cache: EphemerisCache,
    pub downgrade: Option<MethodDowngrade>,
}

/// Configures and builds an [`EphemerisCache`].
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    start: Epoch,
    end: Epoch,
    samples: usize,
    method: String,
    capabilities: Capabilities,
}

impl CacheBuilder {
    pub fn new(start: Epoch, end: Epoch) -> Self {
        Self {
            start,
            end,
            samples: DEFAULT_SAMPLES,
            method: InterpolationMethod::Linear.as_str().to_string(),
            capabilities: Capabilities::detect(),
        }
    }

    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Requested method name; unknown names downgrade to linear.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sample `source` and prepare the interpolants.
    pub fn build<S>(self, source: &S) -> Result<Built, CacheError>
    where
        S: EphemerisSource + ?Sized,
    {
        let grid = SampleGrid::sample(source, self.start, self.end, self.samples)?;
        let mut cache = EphemerisCache {
            start: self.start,
            end: self.end,
            samples: self.samples,
            method: InterpolationMethod::Linear,
            capabilities: self.capabilities,
            grid,
            #[cfg(feature = "spline")]
            splines: None,
        };
        let selection = cache.set_method(&self.method)?;
        Ok(Built {
            cache,
            downgrade: selection.downgrade,
        })
    }
}

/// Stored contents of a cache, used to persist and restore it.
#[derive(Debug, Clone)]
pub struct CacheParts {
    pub start: Epoch,
    pub end: Epoch,
    pub samples: usize,
    pub method: String,
    pub grid: SampleGrid,
    pub splines: Option<Vec<SplineCoefficients>>,
}

/// Ephemeris answered from a fixed sample grid.
#[derive(Debug, Clone, PartialEq)]
pub struct EphemerisCache {
    start: Epoch,
    end: Epoch,
    samples: usize,
    method: InterpolationMethod,
    capabilities: Capabilities,
    grid: SampleGrid,
    #[cfg(feature = "spline")]
    splines: Option<SplineSet>,
}

impl EphemerisCache {
    /// Sample `source` over `[start, end]` using the capabilities of this build.
    pub fn create<S>(
        source: &S,
        [start, end]: [Epoch; 2],
        samples: usize,
        method: &str,
    ) -> Result<Built, CacheError>
    where
        S: EphemerisSource + ?Sized,
    {
        CacheBuilder::new(start, end)
            .samples(samples)
            .method(method)
            .build(source)
    }

    /// Rebuild a cache from stored parts without consulting any source.
    ///
    /// Stored coefficients are always shape-checked. They are reused as-is when
    /// `capabilities` include the spline backend. A spline cache stored without
    /// them is refitted; without the backend it is downgraded to linear.
    pub fn from_parts(parts: CacheParts, capabilities: Capabilities) -> Result<Built, CacheError> {
        let CacheParts {
            start,
            end,
            samples,
            method,
            grid,
            splines,
        } = parts;

        if samples == 0 {
            return Err(CacheError::ZeroSamples);
        }
        let Some(expected) = samples.checked_add(1) else {
            return Err(CacheError::TooManySamples { samples });
        };
        if grid.len() != expected {
            return Err(CacheError::SampleCount {
                samples,
                points: grid.len(),
                expected,
            });
        }
        if grid.first_epoch() != start || grid.last_epoch() != end {
            return Err(CacheError::RangeMismatch {
                start,
                end,
                first: grid.first_epoch(),
                last: grid.last_epoch(),
            });
        }
        if let Some(coefficients) = &splines {
            check_coefficients(&grid, coefficients)?;
        }

        let mut cache = EphemerisCache {
            start,
            end,
            samples,
            method: InterpolationMethod::Linear,
            capabilities,
            grid,
            #[cfg(feature = "spline")]
            splines: None,
        };

        #[cfg(feature = "spline")]
        if let (Ok(InterpolationMethod::Spline), Some(coefficients), true) = (
            method.parse::<InterpolationMethod>(),
            splines,
            capabilities.spline_available(),
        ) {
            cache.splines = Some(SplineSet::from_coefficients(&cache.grid, coefficients)?);
            cache.method = InterpolationMethod::Spline;
            return Ok(Built {
                cache,
                downgrade: None,
            });
        }

        let selection = cache.set_method(&method)?;
        Ok(Built {
            cache,
            downgrade: selection.downgrade,
        })
    }

    /// Split into storable parts.
    pub fn to_parts(&self) -> CacheParts {
        CacheParts {
            start: self.start,
            end: self.end,
            samples: self.samples,
            method: self.method.as_str().to_string(),
            grid: self.grid.clone(),
            splines: self.spline_coefficients(),
        }
    }

    /// Switch interpolation method, downgrading to linear when the request is
    /// unknown or unsupported, and prepare the matching interpolants.
    ///
    /// On error the cache keeps its previous method and interpolants.
    pub fn set_method(&mut self, method: &str) -> Result<MethodSelection, CacheError> {
        let selection = select_method(method, self.capabilities);
        self.prepare(selection.method)?;
        self.method = selection.method;
        Ok(selection)
    }

    #[cfg(feature = "spline")]
    fn prepare(&mut self, method: InterpolationMethod) -> Result<(), CacheError> {
        match method {
            InterpolationMethod::Linear => self.splines = None,
            InterpolationMethod::Spline => {
                if self.splines.is_none() {
                    self.splines = Some(SplineSet::fit(&self.grid)?);
                }
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "spline"))]
    fn prepare(&mut self, _method: InterpolationMethod) -> Result<(), CacheError> {
        Ok(())
    }

    /// State at `epoch`, interpolated from the grid.
    pub fn eph(&self, epoch: Epoch) -> Result<State, QueryError> {
        if !self.contains(epoch) {
            warn!(
                epoch,
                start = self.start,
                end = self.end,
                "requested ephemeris outside of the cached range"
            );
            return Err(self.out_of_range(epoch));
        }
        if let Some(state) = self.grid.exact(epoch) {
            return Ok(*state);
        }
        #[cfg(feature = "spline")]
        if let (InterpolationMethod::Spline, Some(splines)) = (self.method, &self.splines) {
            return Ok(splines.evaluate(epoch));
        }
        self.grid
            .interpolate_linear(epoch)
            .ok_or_else(|| self.out_of_range(epoch))
    }

    /// `true` when `epoch` lies in `[start, end]`.
    pub fn contains(&self, epoch: Epoch) -> bool {
        (self.start..=self.end).contains(&epoch)
    }

    pub fn start(&self) -> Epoch {
        self.start
    }

    pub fn end(&self) -> Epoch {
        self.end
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn grid(&self) -> &SampleGrid {
        &self.grid
    }

    #[cfg(feature = "spline")]
    pub fn splines(&self) -> Option<&SplineSet> {
        self.splines.as_ref()
    }

    /// Coefficients of the fitted splines; `None` when answering linearly.
    pub fn spline_coefficients(&self) -> Option<Vec<SplineCoefficients>> {
        #[cfg(feature = "spline")]
        if let Some(set) = &self.splines {
            return Some(set.coefficients());
        }
        None
    }

    fn out_of_range(&self, epoch: Epoch) -> QueryError {
        QueryError::OutOfRange {
            epoch,
            start: self.start,
            end: self.end,
        }
    }
}

impl EphemerisSource for EphemerisCache {
    type Error = QueryError;

    fn eph(&self, epoch: Epoch) -> Result<State, Self::Error> {
        EphemerisCache::eph(self, epoch)
    }
}
