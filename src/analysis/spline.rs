use log::trace;

use crate::data::model::Profile;
use crate::error::{AnalysisError, Result};

/// Relative accuracy of the derivative root search.
pub const ROOT_REL_ACCURACY: f64 = 1e-12;
/// Absolute accuracy of the derivative root search.
pub const ROOT_ABS_ACCURACY: f64 = 1e-8;
/// Iteration cap of the derivative root search.
pub const ROOT_MAX_ITERATIONS: usize = 100;

// ---------------------------------------------------------------------------
// CubicSpline – natural cubic interpolant through a profile
// ---------------------------------------------------------------------------

/// Natural cubic spline through every sample of a profile.
///
/// Segment `i` covers `[knots[i], knots[i+1])` and is stored as
/// `a + b·t + c·t² + d·t³` with `t = x - knots[i]`. The end second
/// derivatives are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicSpline {
    /// Interpolate a validated profile.
    pub fn build(profile: &Profile) -> Result<Self> {
        Self::from_samples(profile.positions(), profile.intensities())
    }

    /// Interpolate raw samples, validating them first.
    pub fn from_samples(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(AnalysisError::DegenerateInput(format!(
                "{} knots but {} values",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(AnalysisError::DegenerateInput(format!(
                "need at least 2 distinct positions, got {}",
                x.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(AnalysisError::DegenerateInput(
                "spline samples must be finite".to_string(),
            ));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalysisError::DegenerateInput(
                "spline knots not strictly increasing".to_string(),
            ));
        }

        // n segments, n + 1 knots.
        let n = x.len() - 1;
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

        // Forward sweep of the tridiagonal system for the quadratic coefficients.
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n + 1];
        for i in 1..n {
            let g = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / g;
            let rhs = 3.0 * (y[i + 1] * h[i - 1] - y[i] * (x[i + 1] - x[i - 1]) + y[i - 1] * h[i])
                / (h[i - 1] * h[i]);
            z[i] = (rhs - h[i - 1] * z[i - 1]) / g;
        }

        // Back substitution; c[n] = 0 is the natural end condition.
        let mut c = vec![0.0; n + 1];
        let mut b = vec![0.0; n];
        let mut d = vec![0.0; n];
        for j in (0..n).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            b[j] = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            d[j] = (c[j + 1] - c[j]) / (3.0 * h[j]);
        }
        c.truncate(n);

        Ok(CubicSpline {
            knots: x.to_vec(),
            a: y[..n].to_vec(),
            b,
            c,
            d,
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Bounds of the half-open domain `[min, max)` on which [`evaluate`](Self::evaluate) is defined.
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Interpolated value at `x`; fails outside `[min, max)` rather than extrapolating.
    pub fn evaluate(&self, x: f64) -> Result<f64> {
        let (min, max) = self.domain();
        if x.is_nan() || x < min || x >= max {
            return Err(AnalysisError::OutOfDomain { x, min, max });
        }
        let i = self.segment(x);
        let t = x - self.knots[i];
        Ok(self.a[i] + t * (self.b[i] + t * (self.c[i] + t * self.d[i])))
    }

    /// First derivative at `x`, defined on the closed domain `[min, max]`.
    pub fn derivative(&self, x: f64) -> Result<f64> {
        let (min, max) = self.domain();
        if x.is_nan() || x < min || x > max {
            return Err(AnalysisError::OutOfDomain { x, min, max });
        }
        let i = self.segment(x);
        let t = x - self.knots[i];
        Ok(self.b[i] + t * (2.0 * self.c[i] + 3.0 * t * self.d[i]))
    }

    /// Zero of the first derivative inside `[lo, hi]`, found by bisection.
    pub fn derivative_root_between(&self, lo: f64, hi: f64) -> Result<f64> {
        let (mut lo, mut hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let f_lo = self.derivative(lo)?;
        let f_hi = self.derivative(hi)?;
        if f_lo == 0.0 {
            return Ok(lo);
        }
        if f_hi == 0.0 {
            return Ok(hi);
        }
        if f_lo.signum() == f_hi.signum() {
            return Err(AnalysisError::NoRootInBracket { lo, hi });
        }

        let (start_lo, start_hi) = (lo, hi);
        let mut f_min = f_lo;
        for iteration in 1..=ROOT_MAX_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            let f_mid = self.derivative(mid)?;
            if f_mid * f_min > 0.0 {
                lo = mid;
                f_min = f_mid;
            } else {
                hi = mid;
            }
            let tolerance = ROOT_ABS_ACCURACY.max(ROOT_REL_ACCURACY * mid.abs());
            if (hi - lo).abs() <= tolerance {
                let root = 0.5 * (lo + hi);
                trace!("derivative root {root} after {iteration} iterations");
                return Ok(root);
            }
        }
        Err(AnalysisError::RootNotConverged {
            lo: start_lo,
            hi: start_hi,
            iterations: ROOT_MAX_ITERATIONS,
        })
    }

    /// Sample the spline at `n` evenly spaced points from min to max position.
    ///
    /// The sweep stops at the first point outside the domain, so the result is
    /// the longest valid prefix (the closing `max` itself is never included).
    pub fn sweep(&self, n: usize) -> (Vec<f64>, Vec<f64>) {
        let (min, max) = self.domain();
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        if n == 0 {
            return (xs, ys);
        }
        let step = if n > 1 { (max - min) / (n - 1) as f64 } else { 0.0 };
        for i in 0..n {
            let x = if i == n - 1 { max } else { min + step * i as f64 };
            match self.evaluate(x) {
                Ok(y) => {
                    xs.push(x);
                    ys.push(y);
                }
                Err(_) => break,
            }
        }
        (xs, ys)
    }

    /// Segment containing `x`; the closing knot maps onto the last segment.
    fn segment(&self, x: f64) -> usize {
        let upper = self.knots.partition_point(|&k| k <= x);
        upper.saturating_sub(1).min(self.a.len() - 1)
    }
}
