//! Ephemeris providers: the single capability the cache samples from, plus a few
//! self-contained implementations of it.

use std::convert::Infallible;
use std::fmt;

use eph_core::vector::{self, Vector3};
use eph_core::{Epoch, State};

/// Anything that can report a body's state at an epoch.
///
/// Providers backed by kernels or remote services can fail; in-memory
/// providers use [`Infallible`].
pub trait EphemerisSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn eph(&self, epoch: Epoch) -> Result<State, Self::Error>;
}

impl<T: EphemerisSource + ?Sized> EphemerisSource for &T {
    type Error = T::Error;

    fn eph(&self, epoch: Epoch) -> Result<State, Self::Error> {
        (**self).eph(epoch)
    }
}

impl<T: EphemerisSource + ?Sized> EphemerisSource for Box<T> {
    type Error = T::Error;

    fn eph(&self, epoch: Epoch) -> Result<State, Self::Error> {
        (**self).eph(epoch)
    }
}

/// Body parked at fixed coordinates; every epoch returns the same state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPoint {
    state: State,
}

impl FixedPoint {
    pub fn new(position: Vector3, velocity: Vector3) -> Self {
        Self {
            state: State::new(position, velocity),
        }
    }
}

impl Default for FixedPoint {
    fn default() -> Self {
        Self::new([0.0; 3], [0.0; 3])
    }
}

impl EphemerisSource for FixedPoint {
    type Error = Infallible;

    fn eph(&self, _epoch: Epoch) -> Result<State, Self::Error> {
        Ok(self.state)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fixed coordinates r={:?} v={:?}",
            self.state.position, self.state.velocity
        )
    }
}

/// Straight-line motion at constant velocity: `r(t) = r0 + v (t - t0)`.
///
/// Velocity is expressed per unit of the epoch scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformMotion {
    pub reference_epoch: Epoch,
    pub position: Vector3,
    pub velocity: Vector3,
}

impl UniformMotion {
    pub fn new(reference_epoch: Epoch, position: Vector3, velocity: Vector3) -> Self {
        Self {
            reference_epoch,
            position,
            velocity,
        }
    }
}

impl EphemerisSource for UniformMotion {
    type Error = Infallible;

    fn eph(&self, epoch: Epoch) -> Result<State, Self::Error> {
        let dt = epoch - self.reference_epoch;
        Ok(State::new(
            vector::add(&self.position, &vector::scale(&self.velocity, dt)),
            self.velocity,
        ))
    }
}

impl fmt::Display for UniformMotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uniform motion from r={:?} at t0={} with v={:?}",
            self.position, self.reference_epoch, self.velocity
        )
    }
}

/// Adapts a plain closure into an [`EphemerisSource`].
#[derive(Clone, Copy)]
pub struct FnSource<F>(pub F);

impl<F> EphemerisSource for FnSource<F>
where
    F: Fn(Epoch) -> State,
{
    type Error = Infallible;

    fn eph(&self, epoch: Epoch) -> Result<State, Self::Error> {
        Ok((self.0)(epoch))
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSource(..)")
    }
}
