//! Core value types and small numeric helpers shared by the ephemeris cache crates.

/// Epoch scale offsets.
pub mod constants {
    /// Offset between Modified Julian Date and MJD2000 (days).
    pub const MJD_TO_MJD2000_DAYS: f64 = 51_544.0;
}

/// Lightweight epoch conversions. The cache itself is unit-agnostic; these exist
/// for front-ends that need to translate user input.
pub mod time {
    use super::constants::MJD_TO_MJD2000_DAYS;

    /// Scalar time value. The scale (MJD, MJD2000, seconds past J2000, ...) is
    /// chosen by the caller and must stay consistent for one cache.
    pub type Epoch = f64;

    /// Convert a Modified Julian Date into MJD2000.
    #[inline]
    pub fn mjd_to_mjd2000(mjd: Epoch) -> Epoch {
        mjd - MJD_TO_MJD2000_DAYS
    }

    /// Convert an MJD2000 epoch into a Modified Julian Date.
    #[inline]
    pub fn mjd2000_to_mjd(mjd2000: Epoch) -> Epoch {
        mjd2000 + MJD_TO_MJD2000_DAYS
    }
}

/// Minimal vector helpers to avoid ad-hoc `[f64; 3]` math everywhere.
pub mod vector {
    /// Alias for a 3D vector; units follow the ephemeris provider.
    pub type Vector3 = [f64; 3];

    /// Vector addition.
    #[inline]
    pub fn add(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    /// Scale a vector by a scalar.
    #[inline]
    pub fn scale(v: &Vector3, s: f64) -> Vector3 {
        [v[0] * s, v[1] * s, v[2] * s]
    }

    /// Component-wise `a + t * (b - a)`.
    ///
    /// Written in this exact form so that `t == 0` returns `a` unchanged.
    #[inline]
    pub fn lerp(a: &Vector3, b: &Vector3, t: f64) -> Vector3 {
        [
            a[0] + t * (b[0] - a[0]),
            a[1] + t * (b[1] - a[1]),
            a[2] + t * (b[2] - a[2]),
        ]
    }
}

pub mod state {
    use super::vector::{self, Vector3};

    /// Number of scalar components in a [`State`].
    pub const STATE_COMPONENTS: usize = 6;

    /// Position and velocity of a body at one epoch.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct State {
        pub position: Vector3,
        pub velocity: Vector3,
    }

    impl State {
        pub fn new(position: Vector3, velocity: Vector3) -> Self {
            Self { position, velocity }
        }

        /// Scalar component by index: 0..3 are position, 3..6 velocity.
        ///
        /// # Panics
        /// Panics if `index >= STATE_COMPONENTS`.
        #[inline]
        pub fn component(&self, index: usize) -> f64 {
            if index < 3 {
                self.position[index]
            } else {
                self.velocity[index - 3]
            }
        }

        /// Flatten into `[x, y, z, vx, vy, vz]`.
        pub fn to_array(&self) -> [f64; STATE_COMPONENTS] {
            let [x, y, z] = self.position;
            let [vx, vy, vz] = self.velocity;
            [x, y, z, vx, vy, vz]
        }

        /// Rebuild from `[x, y, z, vx, vy, vz]`.
        pub fn from_array(values: [f64; STATE_COMPONENTS]) -> Self {
            let [x, y, z, vx, vy, vz] = values;
            Self {
                position: [x, y, z],
                velocity: [vx, vy, vz],
            }
        }

        /// Linear blend of every component between `self` and `other`.
        pub fn lerp(&self, other: &State, t: f64) -> State {
            State {
                position: vector::lerp(&self.position, &other.position, t),
                velocity: vector::lerp(&self.velocity, &other.velocity, t),
            }
        }

        /// `true` when all six components are finite.
        pub fn is_finite(&self) -> bool {
            self.to_array().iter().all(|v| v.is_finite())
        }
    }

    impl From<(Vector3, Vector3)> for State {
        fn from((position, velocity): (Vector3, Vector3)) -> Self {
            Self { position, velocity }
        }
    }

    impl From<State> for (Vector3, Vector3) {
        fn from(state: State) -> Self {
            (state.position, state.velocity)
        }
    }
}

pub use state::State;
pub use time::Epoch;
pub use vector::Vector3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints_are_exact() {
        let a = State::new([1.0, -2.0, 3.5], [0.1, 0.2, 0.3]);
        let b = State::new([4.0, 8.0, -1.0], [1.0, 2.0, 3.0]);
        assert_eq!(a.lerp(&b, 0.0), a);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.position, [2.5, 3.0, 1.25]);
    }

    #[test]
    fn array_round_trip_preserves_component_order() {
        let s = State::new([1.0, 2.0, 3.0], [4.0, 5.0, 6.0]);
        assert_eq!(s.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(State::from_array(s.to_array()), s);
        assert_eq!(s.component(4), 5.0);
    }

    #[test]
    fn mjd_conversions_are_inverse() {
        let mjd = 58_000.25;
        assert_eq!(time::mjd2000_to_mjd(time::mjd_to_mjd2000(mjd)), mjd);
    }
}
