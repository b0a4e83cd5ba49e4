use eph_core::Epoch;
use thiserror::Error;

/// Errors raised while building or restoring a cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("epoch range bounds must be finite (start {start}, end {end})")]
    NonFiniteRange { start: Epoch, end: Epoch },
    #[error("epoch range is empty: start {start} must be before end {end}")]
    EmptyRange { start: Epoch, end: Epoch },
    #[error("sample count must be at least 1")]
    ZeroSamples,
    #[error("sample count {samples} is too large")]
    TooManySamples { samples: usize },
    #[error("a grid needs at least two points, got {0}")]
    TooFewGridPoints(usize),
    #[error("grid has {epochs} epochs but {states} states")]
    GridShape { epochs: usize, states: usize },
    #[error("grid epochs must be finite and strictly increasing (index {index})")]
    DegenerateGrid { index: usize },
    #[error("grid has {points} points, expected {expected} for {samples} samples")]
    SampleCount {
        samples: usize,
        points: usize,
        expected: usize,
    },
    #[error("grid spans [{first}, {last}] but the cache range is [{start}, {end}]")]
    RangeMismatch {
        start: Epoch,
        end: Epoch,
        first: Epoch,
        last: Epoch,
    },
    #[error("ephemeris source returned a non-finite state at epoch {epoch}")]
    NonFiniteState { epoch: Epoch },
    #[error("ephemeris source failed at epoch {epoch}: {source}")]
    Source {
        epoch: Epoch,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("expected {expected} spline components, got {found}")]
    SplineCount { expected: usize, found: usize },
    #[error("spline component {component} has {found} coefficients, expected {expected}")]
    SplineLength {
        component: usize,
        expected: usize,
        found: usize,
    },
    #[error("spline fit failed: {0}")]
    Spline(#[from] SplineError),
}

/// Errors raised while fitting or rebuilding a spline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplineError {
    #[error("knots and values differ in length ({knots} vs {values})")]
    LengthMismatch { knots: usize, values: usize },
    #[error("at least two knots are required, got {0}")]
    TooFewKnots(usize),
    #[error("knots must be finite and strictly increasing (index {0})")]
    UnorderedKnots(usize),
    #[error("smoothing factor must be finite and non-negative, got {0}")]
    InvalidSmoothing(f64),
    #[error("spline system is not positive definite")]
    Singular,
    #[error("fitted spline is not finite; sample values are too large to smooth")]
    NonFinite,
}

/// Errors raised when answering a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("epoch {epoch} is outside of the cached range [{start}, {end}]")]
    OutOfRange { epoch: Epoch, start: Epoch, end: Epoch },
}
