//! Cubic smoothing splines over strictly increasing knots.
//!
//! The fit follows Reinsch's formulation: among all natural cubic splines `g`
//! with `sum (y_i - g(x_i))^2 <= s`, pick the one minimising `integral g''^2`.
//! For a penalty weight `lambda` the second derivatives at the interior knots
//! solve the pentadiagonal system
//!
//! ```text
//! (R + lambda * Q^T Q) gamma = Q^T y,   g = y - lambda * Q gamma
//! ```
//!
//! and `lambda` is searched so that the residual sum of squares meets `s`.
//! `s = 0` yields the interpolating natural spline; a large `s` collapses the
//! fit to the least-squares straight line.

use tracing::debug;

use crate::error::SplineError;

/// Bisection steps on `ln(lambda)` once a bracket is found.
const MAX_BISECTIONS: usize = 200;
/// Decades searched on either side of the initial `lambda` guess.
const MAX_DECADES: usize = 80;
const RELATIVE_TOLERANCE: f64 = 1e-10;

/// Natural cubic spline stored as knot values plus knot second derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    second_derivatives: Vec<f64>,
}

impl SmoothingSpline {
    /// Fit a smoothing spline with residual bound `smoothing`.
    ///
    /// Fails with [`SplineError::NonFinite`] when the values are large enough
    /// for the band system to overflow.
    pub fn fit(knots: &[f64], ys: &[f64], smoothing: f64) -> Result<Self, SplineError> {
        let spline = Self::fit_unchecked(knots, ys, smoothing)?;
        let finite = |v: &[f64]| v.iter().all(|x| x.is_finite());
        if !finite(&spline.values) || !finite(&spline.second_derivatives) {
            return Err(SplineError::NonFinite);
        }
        Ok(spline)
    }

    fn fit_unchecked(knots: &[f64], ys: &[f64], smoothing: f64) -> Result<Self, SplineError> {
        validate_knots(knots, ys.len())?;
        if !smoothing.is_finite() || smoothing < 0.0 {
            return Err(SplineError::InvalidSmoothing(smoothing));
        }

        let system = System::new(knots);
        if smoothing == 0.0 || system.interior() == 0 {
            // two points or an exact fit: nothing to smooth
            return system.solve(ys, 0.0).map(|fit| fit.into_spline(knots));
        }

        let line = least_squares_line(knots, ys);
        if line.rss <= smoothing {
            debug!(rss = line.rss, "smoothing bound met by straight line");
            return Ok(line.into_spline(knots));
        }

        let mut lambda = system.initial_lambda();
        let mut low = None;
        let mut high = None;
        for _ in 0..MAX_DECADES {
            let fit = system.solve(ys, lambda)?;
            if fit.rss <= smoothing {
                low = Some((lambda, fit));
                break;
            }
            high = Some(lambda);
            lambda /= 10.0;
        }
        let Some((mut lo_lambda, mut best)) = low else {
            return system.solve(ys, 0.0).map(|fit| fit.into_spline(knots));
        };

        let mut hi_lambda = match high {
            Some(h) => h,
            None => {
                let mut candidate = lo_lambda * 10.0;
                let mut found = None;
                for _ in 0..MAX_DECADES {
                    let fit = system.solve(ys, candidate)?;
                    if fit.rss > smoothing {
                        found = Some(candidate);
                        break;
                    }
                    lo_lambda = candidate;
                    best = fit;
                    candidate *= 10.0;
                }
                match found {
                    Some(h) => h,
                    None => return Ok(best.into_spline(knots)),
                }
            }
        };

        for _ in 0..MAX_BISECTIONS {
            if (best.rss - smoothing).abs() <= RELATIVE_TOLERANCE * smoothing {
                break;
            }
            let mid = ((lo_lambda.ln() + hi_lambda.ln()) * 0.5).exp();
            if mid <= lo_lambda || mid >= hi_lambda {
                break;
            }
            let fit = system.solve(ys, mid)?;
            if fit.rss <= smoothing {
                lo_lambda = mid;
                best = fit;
            } else {
                hi_lambda = mid;
            }
        }
        debug!(lambda = lo_lambda, rss = best.rss, "smoothing spline fitted");
        Ok(best.into_spline(knots))
    }

    /// Rebuild a spline from previously fitted coefficients.
    pub fn from_parts(
        knots: Vec<f64>,
        values: Vec<f64>,
        second_derivatives: Vec<f64>,
    ) -> Result<Self, SplineError> {
        validate_knots(&knots, values.len())?;
        if second_derivatives.len() != knots.len() {
            return Err(SplineError::LengthMismatch {
                knots: knots.len(),
                values: second_derivatives.len(),
            });
        }
        Ok(Self {
            knots,
            values,
            second_derivatives,
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Fitted spline values at the knots.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Second derivatives at the knots; zero at both ends.
    pub fn second_derivatives(&self) -> &[f64] {
        &self.second_derivatives
    }

    /// Evaluate the spline. Outside the knot span the end cubic is extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.knots.len();
        let upper = self.knots.partition_point(|&k| k <= x).clamp(1, n - 1);
        let i = upper - 1;
        let (x0, x1) = (self.knots[i], self.knots[upper]);
        let h = x1 - x0;
        let a = x - x0;
        let b = x1 - x;
        let linear = (a * self.values[upper] + b * self.values[i]) / h;
        let curvature = (1.0 + a / h) * self.second_derivatives[upper]
            + (1.0 + b / h) * self.second_derivatives[i];
        linear - a * b * curvature / 6.0
    }
}

fn validate_knots(knots: &[f64], values: usize) -> Result<(), SplineError> {
    if knots.len() != values {
        return Err(SplineError::LengthMismatch {
            knots: knots.len(),
            values,
        });
    }
    if knots.len() < 2 {
        return Err(SplineError::TooFewKnots(knots.len()));
    }
    if let Some(i) = knots.iter().position(|k| !k.is_finite()) {
        return Err(SplineError::UnorderedKnots(i));
    }
    if let Some(i) = knots.windows(2).position(|w| w[1] <= w[0]) {
        return Err(SplineError::UnorderedKnots(i + 1));
    }
    Ok(())
}

/// Fitted knot values and second derivatives with their residual.
struct Fit {
    values: Vec<f64>,
    second_derivatives: Vec<f64>,
    rss: f64,
}

impl Fit {
    fn into_spline(self, knots: &[f64]) -> SmoothingSpline {
        SmoothingSpline {
            knots: knots.to_vec(),
            values: self.values,
            second_derivatives: self.second_derivatives,
        }
    }
}

struct Line {
    values: Vec<f64>,
    rss: f64,
}

impl Line {
    fn into_spline(self, knots: &[f64]) -> SmoothingSpline {
        SmoothingSpline {
            knots: knots.to_vec(),
            second_derivatives: vec![0.0; self.values.len()],
            values: self.values,
        }
    }
}

fn least_squares_line(xs: &[f64], ys: &[f64]) -> Line {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (sxy, sxx) = xs
        .iter()
        .zip(ys)
        .fold((0.0, 0.0), |(sxy, sxx), (&x, &y)| {
            let dx = x - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });
    let slope = sxy / sxx;
    let values: Vec<f64> = xs.iter().map(|&x| mean_y + slope * (x - mean_x)).collect();
    let rss = ys.iter().zip(&values).map(|(y, g)| (y - g).powi(2)).sum();
    Line { values, rss }
}

/// Banded matrices `R` and `Q` for one knot layout.
///
/// Interior knot `j` (1..n-1) owns column `j - 1` of `Q`, whose non-zeros sit
/// in rows `j - 1`, `j`, `j + 1` with weights `a`, `b`, `c`.
struct System {
    h: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl System {
    fn new(knots: &[f64]) -> Self {
        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();
        let m = knots.len() - 2;
        let mut a = Vec::with_capacity(m);
        let mut b = Vec::with_capacity(m);
        let mut c = Vec::with_capacity(m);
        for j in 1..=m {
            let left = 1.0 / h[j - 1];
            let right = 1.0 / h[j];
            a.push(left);
            b.push(-left - right);
            c.push(right);
        }
        Self { h, a, b, c }
    }

    fn interior(&self) -> usize {
        self.a.len()
    }

    /// `lambda` where roughness and residual terms have comparable scale.
    fn initial_lambda(&self) -> f64 {
        let mean_h = self.h.iter().sum::<f64>() / self.h.len() as f64;
        mean_h.powi(3)
    }

    fn solve(&self, ys: &[f64], lambda: f64) -> Result<Fit, SplineError> {
        let n = ys.len();
        let m = self.interior();
        let mut second_derivatives = vec![0.0; n];
        if m == 0 {
            return Ok(Fit {
                values: ys.to_vec(),
                second_derivatives,
                rss: 0.0,
            });
        }

        let mut diag = vec![0.0; m];
        let mut off1 = vec![0.0; m];
        let mut off2 = vec![0.0; m];
        let mut rhs = vec![0.0; m];
        for k in 0..m {
            let j = k + 1;
            diag[k] = (self.h[j - 1] + self.h[j]) / 3.0
                + lambda * (self.a[k].powi(2) + self.b[k].powi(2) + self.c[k].powi(2));
            if k + 1 < m {
                off1[k] = self.h[j] / 6.0
                    + lambda * (self.b[k] * self.a[k + 1] + self.c[k] * self.b[k + 1]);
            }
            if k + 2 < m {
                off2[k] = lambda * self.c[k] * self.a[k + 2];
            }
            rhs[k] = self.a[k] * ys[j - 1] + self.b[k] * ys[j] + self.c[k] * ys[j + 1];
        }

        let gamma = solve_pentadiagonal(&diag, &off1, &off2, &rhs)?;

        // residual y - g = lambda * Q gamma
        let mut q_gamma = vec![0.0; n];
        for (k, g) in gamma.iter().enumerate() {
            let j = k + 1;
            q_gamma[j - 1] += self.a[k] * g;
            q_gamma[j] += self.b[k] * g;
            q_gamma[j + 1] += self.c[k] * g;
        }
        let mut rss = 0.0;
        let values = ys
            .iter()
            .zip(&q_gamma)
            .map(|(y, qg)| {
                let residual = lambda * qg;
                rss += residual * residual;
                y - residual
            })
            .collect();
        second_derivatives[1..=m].copy_from_slice(&gamma);
        Ok(Fit {
            values,
            second_derivatives,
            rss,
        })
    }
}

/// Solve a symmetric positive definite pentadiagonal system by `L D L^T`.
///
/// `off1[k]` is entry `(k, k+1)`, `off2[k]` entry `(k, k+2)`.
fn solve_pentadiagonal(
    diag: &[f64],
    off1: &[f64],
    off2: &[f64],
    rhs: &[f64],
) -> Result<Vec<f64>, SplineError> {
    let m = diag.len();
    let mut d = vec![0.0; m];
    let mut u = vec![0.0; m];
    let mut v = vec![0.0; m];
    for k in 0..m {
        let mut dk = diag[k];
        if k >= 1 {
            dk -= u[k - 1] * u[k - 1] * d[k - 1];
        }
        if k >= 2 {
            dk -= v[k - 2] * v[k - 2] * d[k - 2];
        }
        if !dk.is_finite() || dk <= 0.0 {
            return Err(SplineError::Singular);
        }
        d[k] = dk;
        let mut ek = off1[k];
        if k >= 1 {
            ek -= v[k - 1] * d[k - 1] * u[k - 1];
        }
        u[k] = ek / dk;
        v[k] = off2[k] / dk;
    }

    let mut z = vec![0.0; m];
    for k in 0..m {
        let mut zk = rhs[k];
        if k >= 1 {
            zk -= u[k - 1] * z[k - 1];
        }
        if k >= 2 {
            zk -= v[k - 2] * z[k - 2];
        }
        z[k] = zk;
    }

    let mut x = vec![0.0; m];
    for k in (0..m).rev() {
        let mut xk = z[k] / d[k];
        if k + 1 < m {
            xk -= u[k] * x[k + 1];
        }
        if k + 2 < m {
            xk -= v[k] * x[k + 2];
        }
        x[k] = xk;
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn zero_smoothing_interpolates_knots() {
        let xs = grid(9, 0.5);
        let ys: Vec<f64> = xs.iter().map(|x| (x * 1.3).sin() * 4.0).collect();
        let spline = SmoothingSpline::fit(&xs, &ys, 0.0).unwrap();
        for (x, y) in xs.iter().zip(&ys) {
            assert!((spline.evaluate(*x) - y).abs() < 1e-10);
        }
        let first = spline.second_derivatives()[0];
        let last = *spline.second_derivatives().last().unwrap();
        assert_eq!((first, last), (0.0, 0.0));
    }

    #[test]
    fn overflowing_values_are_reported() {
        let xs = grid(5, 1.0);
        let ys: Vec<f64> = (0..5)
            .map(|i| if i % 2 == 0 { f64::MAX } else { -f64::MAX })
            .collect();
        assert_eq!(
            SmoothingSpline::fit(&xs, &ys, 1.0),
            Err(SplineError::NonFinite)
        );
    }

    #[test]
    fn pentadiagonal_solver_matches_dense_product() {
        let diag = [4.0, 5.0, 6.0, 5.0, 4.0];
        let off1 = [1.0, 0.5, -0.5, 1.0, 0.0];
        let off2 = [0.25, 0.3, 0.2, 0.0, 0.0];
        let rhs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let x = solve_pentadiagonal(&diag, &off1, &off2, &rhs).unwrap();
        for k in 0..5 {
            let mut row = diag[k] * x[k];
            if k + 1 < 5 {
                row += off1[k] * x[k + 1];
            }
            if k + 2 < 5 {
                row += off2[k] * x[k + 2];
            }
            if k >= 1 {
                row += off1[k - 1] * x[k - 1];
            }
            if k >= 2 {
                row += off2[k - 2] * x[k - 2];
            }
            assert!((row - rhs[k]).abs() < 1e-12, "row {k}: {row} vs {}", rhs[k]);
        }
    }

    #[test]
    fn linear_data_is_reproduced() {
        let xs = grid(11, 1.0);
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x - 7.0).collect();
        let spline = SmoothingSpline::fit(&xs, &ys, 1.0).unwrap();
        for t in [0.0, 0.25, 3.7, 9.99, 10.0] {
            assert!((spline.evaluate(t) - (3.0 * t - 7.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn residual_respects_smoothing_bound() {
        let xs = grid(41, 0.25);
        let ys: Vec<f64> = xs
            .iter()
            .enumerate()
            .map(|(i, x)| x.sin() * 5.0 + if i % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        let s = 2.0;
        let spline = SmoothingSpline::fit(&xs, &ys, s).unwrap();
        let rss: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (spline.evaluate(*x) - y).powi(2))
            .sum();
        assert!(rss <= s * (1.0 + 1e-6), "rss {rss} exceeds bound");
        assert!(rss > 0.5 * s, "fit should use most of the residual budget, rss {rss}");
    }

    #[test]
    fn large_amplitude_signal_is_nearly_interpolated() {
        let xs = grid(101, 20.0);
        let ys: Vec<f64> = xs
            .iter()
            .map(|t| 1.5e8 * (t * 2.0 * std::f64::consts::PI / 365.25).cos())
            .collect();
        let spline = SmoothingSpline::fit(&xs, &ys, 1.0).unwrap();
        let t = 1010.0;
        let truth = 1.5e8 * (t * 2.0 * std::f64::consts::PI / 365.25).cos();
        assert!(((spline.evaluate(t) - truth) / 1.5e8).abs() < 1e-3);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            SmoothingSpline::fit(&[0.0], &[1.0], 1.0),
            Err(SplineError::TooFewKnots(1))
        );
        assert_eq!(
            SmoothingSpline::fit(&[0.0, 1.0, 1.0], &[1.0, 2.0, 3.0], 1.0),
            Err(SplineError::UnorderedKnots(2))
        );
        assert!(matches!(
            SmoothingSpline::fit(&[0.0, 1.0], &[1.0, 2.0], -1.0),
            Err(SplineError::InvalidSmoothing(_))
        ));
    }

    #[test]
    fn from_parts_round_trips_evaluation() {
        let xs = grid(6, 1.0);
        let ys = [0.0, 1.0, 0.0, -1.0, 0.5, 2.0];
        let spline = SmoothingSpline::fit(&xs, &ys, 0.5).unwrap();
        let rebuilt = SmoothingSpline::from_parts(
            spline.knots().to_vec(),
            spline.values().to_vec(),
            spline.second_derivatives().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt, spline);
        assert_eq!(rebuilt.evaluate(2.5), spline.evaluate(2.5));
    }
}
