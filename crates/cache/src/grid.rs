//! Evenly spaced ephemeris samples over a closed epoch range.

use eph_core::{Epoch, State};
use eph_source::EphemerisSource;
use tracing::debug;

use crate::error::CacheError;

/// Ordered epochs and the states sampled at them.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    epochs: Vec<Epoch>,
    states: Vec<State>,
}

impl SampleGrid {
    /// Query `source` at `samples + 1` evenly spaced epochs spanning `[start, end]`.
    ///
    /// The last epoch is pinned to `end` so the grid covers the full range even
    /// when `start + samples * step` rounds short of it.
    pub fn sample<S>(
        source: &S,
        start: Epoch,
        end: Epoch,
        samples: usize,
    ) -> Result<Self, CacheError>
    where
        S: EphemerisSource + ?Sized,
    {
        validate_range(start, end, samples)?;
        let step = (end - start) / samples as f64;
        let mut epochs = Vec::new();
        let mut states = Vec::new();
        for i in 0..=samples {
            let epoch = if i == samples {
                end
            } else {
                start + step * i as f64
            };
            let state = source.eph(epoch).map_err(|err| CacheError::Source {
                epoch,
                source: Box::new(err),
            })?;
            if !state.is_finite() {
                return Err(CacheError::NonFiniteState { epoch });
            }
            epochs.push(epoch);
            states.push(state);
        }
        debug!(start, end, samples, step, "ephemeris grid sampled");
        Self::from_parts(epochs, states)
    }

    /// Assemble a grid from stored samples, checking ordering invariants.
    pub fn from_parts(epochs: Vec<Epoch>, states: Vec<State>) -> Result<Self, CacheError> {
        if epochs.len() != states.len() {
            return Err(CacheError::GridShape {
                epochs: epochs.len(),
                states: states.len(),
            });
        }
        if epochs.len() < 2 {
            return Err(CacheError::TooFewGridPoints(epochs.len()));
        }
        if let Some(index) = epochs.iter().position(|e| !e.is_finite()) {
            return Err(CacheError::DegenerateGrid { index });
        }
        if let Some(i) = epochs.windows(2).position(|w| w[1] <= w[0]) {
            return Err(CacheError::DegenerateGrid { index: i + 1 });
        }
        Ok(Self { epochs, states })
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Number of grid points (`samples + 1`).
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn first_epoch(&self) -> Epoch {
        self.epochs[0]
    }

    pub fn last_epoch(&self) -> Epoch {
        self.epochs[self.epochs.len() - 1]
    }

    /// `(epoch, state)` pairs in ascending time order.
    pub fn iter(&self) -> impl Iterator<Item = (Epoch, &State)> {
        self.epochs.iter().copied().zip(self.states.iter())
    }

    /// Stored state when `epoch` is exactly a grid epoch.
    pub fn exact(&self, epoch: Epoch) -> Option<&State> {
        let index = self.epochs.partition_point(|&e| e < epoch);
        (index < self.epochs.len() && self.epochs[index] == epoch).then(|| &self.states[index])
    }

    /// Indices `(prev, next)` with `epochs[prev] <= epoch < epochs[next]`.
    ///
    /// `next` is the first grid epoch strictly greater than `epoch`. Returns
    /// `None` when `epoch` is not strictly inside the grid span.
    pub fn bracket(&self, epoch: Epoch) -> Option<(usize, usize)> {
        let next = self.epochs.partition_point(|&e| e <= epoch);
        (next > 0 && next < self.epochs.len()).then(|| (next - 1, next))
    }

    /// Blend the two bracketing samples component by component.
    pub fn interpolate_linear(&self, epoch: Epoch) -> Option<State> {
        let (prev, next) = self.bracket(epoch)?;
        let (t0, t1) = (self.epochs[prev], self.epochs[next]);
        let dist = (epoch - t0) / (t1 - t0);
        Some(self.states[prev].lerp(&self.states[next], dist))
    }

    /// Values of one scalar state component across the grid.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|s| s.component(index)).collect()
    }
}

fn validate_range(start: Epoch, end: Epoch, samples: usize) -> Result<(), CacheError> {
    if !start.is_finite() || !end.is_finite() {
        return Err(CacheError::NonFiniteRange { start, end });
    }
    if start >= end {
        return Err(CacheError::EmptyRange { start, end });
    }
    if samples == 0 {
        return Err(CacheError::ZeroSamples);
    }
    if samples.checked_add(1).is_none() {
        return Err(CacheError::TooManySamples { samples });
    }
    Ok(())
}
