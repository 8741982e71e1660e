//! The backward-difference table of the BDF solver.
//!
//! Row `0` holds the solution at the current time and row `j` holds its
//! `j`-th backward difference scaled to the current step size. Two extra rows
//! keep the differences needed to estimate the error of the neighbouring
//! orders.

use super::MAX_ORDER;

/// Backward differences of the solution on an equally spaced grid.
#[derive(Debug, Clone, Default)]
pub(super) struct Differences {
    rows: Vec<Vec<f64>>,
}

impl Differences {
    /// Starts a table at `y` with first difference `h * f`.
    pub(super) fn new(y: &[f64], f: &[f64], h: f64) -> Self {
        let mut rows = vec![vec![0.0; y.len()]; MAX_ORDER + 3];
        rows[0].copy_from_slice(y);
        for (row, f) in rows[1].iter_mut().zip(f) {
            *row = h * f;
        }
        Self { rows }
    }

    pub(super) fn row(&self, j: usize) -> &[f64] {
        &self.rows[j]
    }

    /// Predicts the solution one step ahead.
    pub(super) fn predict(&self, order: usize) -> Vec<f64> {
        let mut y = self.rows[0].clone();
        for row in &self.rows[1..=order] {
            for (y, d) in y.iter_mut().zip(row) {
                *y += d;
            }
        }
        y
    }

    /// The history term `sum(gamma[j] * D[j]) / alpha[order]` of the BDF
    /// equation.
    pub(super) fn psi(&self, order: usize, gamma: &[f64], alpha: f64) -> Vec<f64> {
        let mut psi = vec![0.0; self.rows[0].len()];
        for j in 1..=order {
            for (psi, d) in psi.iter_mut().zip(&self.rows[j]) {
                *psi += gamma[j] * d;
            }
        }
        for psi in &mut psi {
            *psi /= alpha;
        }
        psi
    }

    /// Re-expresses the table for a step size `factor` times the current one.
    pub(super) fn rescale(&mut self, order: usize, factor: f64) {
        let r = transform(order, factor);
        let u = transform(order, 1.0);

        // RU = R * U
        let n = order + 1;
        let mut ru = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                ru[i][j] = (0..n).map(|k| r[i][k] * u[k][j]).sum();
            }
        }

        // D[..=order] = RU^T * D[..=order]
        let size = self.rows[0].len();
        let mut rescaled = vec![vec![0.0; size]; n];
        for (i, out) in rescaled.iter_mut().enumerate() {
            for k in 0..n {
                let weight = ru[k][i];
                for (out, d) in out.iter_mut().zip(&self.rows[k]) {
                    *out += weight * d;
                }
            }
        }
        for (row, new) in self.rows.iter_mut().zip(rescaled) {
            *row = new;
        }
    }

    /// Folds the Newton correction `d` of an accepted step into the table.
    pub(super) fn update(&mut self, order: usize, d: &[f64]) {
        let (lower, upper) = self.rows.split_at_mut(order + 2);
        for ((top, previous), d) in upper[0].iter_mut().zip(&lower[order + 1]).zip(d) {
            *top = d - previous;
        }
        self.rows[order + 1].copy_from_slice(d);
        for i in (0..=order).rev() {
            let (lower, upper) = self.rows.split_at_mut(i + 1);
            for (value, next) in lower[i].iter_mut().zip(&upper[0]) {
                *value += next;
            }
        }
    }

    /// Evaluates the interpolating polynomial at `at`.
    ///
    /// `t` is the time of row `0` and `h` the current step size.
    pub(super) fn interpolate(&self, order: usize, t: f64, h: f64, at: f64, out: &mut [f64]) {
        out.copy_from_slice(&self.rows[0]);
        let mut p = 1.0;
        for j in 0..order {
            #[allow(clippy::cast_precision_loss)]
            let j_f = j as f64;
            p *= (at - (t - h * j_f)) / (h * (1.0 + j_f));
            for (out, d) in out.iter_mut().zip(&self.rows[j + 1]) {
                *out += d * p;
            }
        }
    }
}

/// The matrix that maps differences on step `h` to differences on step
/// `factor * h`.
fn transform(order: usize, factor: f64) -> Vec<Vec<f64>> {
    let n = order + 1;
    let mut r = vec![vec![0.0; n]; n];
    r[0].fill(1.0);
    for i in 1..n {
        for j in 0..n {
            #[allow(clippy::cast_precision_loss)]
            let m = if j == 0 {
                0.0
            } else {
                (i as f64 - 1.0 - factor * j as f64) / i as f64
            };
            r[i][j] = r[i - 1][j] * m;
        }
    }
    r
}
