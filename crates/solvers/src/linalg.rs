//! Dense linear algebra shared by the implicit solvers.

use nalgebra::{DMatrix, DVector, Dyn, linalg::LU};

/// An LU factorisation of a non-singular square matrix.
#[derive(Debug, Clone)]
pub(crate) struct Factorization(LU<f64, Dyn, Dyn>);

impl Factorization {
    /// Factorises `matrix`, or returns `None` if it is singular or not finite.
    pub(crate) fn new(matrix: DMatrix<f64>) -> Option<Self> {
        if matrix.iter().any(|value| !value.is_finite()) {
            return None;
        }
        let lu = matrix.lu();
        lu.is_invertible().then_some(Self(lu))
    }

    /// Overwrites `rhs` with the solution of `A x = rhs`.
    ///
    /// Returns `false` if the solve failed or produced non-finite values.
    pub(crate) fn solve_in_place(&self, rhs: &mut [f64]) -> bool {
        let mut x = DVector::from_column_slice(rhs);
        if !self.0.solve_mut(&mut x) || x.iter().any(|value| !value.is_finite()) {
            return false;
        }
        rhs.copy_from_slice(x.as_slice());
        true
    }
}

/// Approximates the Jacobian of `f` at `x` by forward differences.
///
/// `f0` must hold `f(x)`.
pub(crate) fn forward_difference<F, E>(x: &[f64], f0: &[f64], mut f: F) -> Result<DMatrix<f64>, E>
where
    F: FnMut(&[f64], &mut [f64]) -> Result<(), E>,
{
    let n = x.len();
    let m = f0.len();
    let mut jacobian = DMatrix::zeros(m, n);
    let mut perturbed = x.to_vec();
    let mut fp = vec![0.0; m];

    for j in 0..n {
        let delta = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
        perturbed[j] = x[j] + delta;
        let delta = perturbed[j] - x[j];

        f(&perturbed, &mut fp)?;
        for i in 0..m {
            jacobian[(i, j)] = (fp[i] - f0[i]) / delta;
        }

        perturbed[j] = x[j];
    }

    Ok(jacobian)
}

/// Root mean square of `values[i] / scale[i]`.
pub(crate) fn scaled_rms(values: &[f64], scale: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values
        .iter()
        .zip(scale)
        .map(|(value, scale)| (value / scale).powi(2))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    (sum / len).sqrt()
}

/// Largest absolute value, or zero for an empty slice.
pub(crate) fn max_norm(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |norm, value| norm.max(value.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;

    #[test]
    fn solves_a_linear_system() {
        let matrix = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 2.0, 3.0]);
        let lu = Factorization::new(matrix).expect("matrix is invertible");

        let mut rhs = [1.0, 2.0];
        assert!(lu.solve_in_place(&mut rhs));

        assert_relative_eq!(rhs[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(rhs[1], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrices_are_rejected() {
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(Factorization::new(matrix).is_none());

        let matrix = DMatrix::from_row_slice(1, 1, &[f64::NAN]);
        assert!(Factorization::new(matrix).is_none());
    }

    #[test]
    fn jacobian_of_a_quadratic() {
        let f = |x: &[f64], out: &mut [f64]| -> Result<(), Infallible> {
            out[0] = x[0] * x[0] + x[1];
            out[1] = 3.0 * x[1];
            Ok(())
        };

        let x = [2.0, -1.0];
        let mut f0 = [0.0; 2];
        f(&x, &mut f0).unwrap();

        let jacobian = forward_difference(&x, &f0, f).unwrap();

        assert_relative_eq!(jacobian[(0, 0)], 4.0, epsilon = 1e-6);
        assert_relative_eq!(jacobian[(0, 1)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(jacobian[(1, 0)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(jacobian[(1, 1)], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn norms() {
        assert_relative_eq!(scaled_rms(&[3.0, 4.0], &[1.0, 2.0]), (13.0_f64 / 2.0).sqrt());
        assert_relative_eq!(max_norm(&[-3.0, 2.0]), 3.0);
        assert_relative_eq!(max_norm(&[]), 0.0);
    }
}
