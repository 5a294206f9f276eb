//! Linear least-squares helpers.
//!
//! Every damped Levenberg–Marquardt step is a small linear problem
//!
//! ```text
//! minimize || [J; sqrt(λ) D] δ - [r; 0] ||^2
//! ```
//!
//! and the parameter covariance needs `(JᵀJ)⁻¹`. Both go through an SVD:
//! nalgebra's `QR::solve` is intended for square systems and panics on tall
//! matrices, and the SVD lets us detect rank deficiency explicitly.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// `(JᵀJ)⁻¹` for a tall Jacobian, or `None` when `J` is rank deficient.
///
/// A singular value counts as zero below `eps · max(rows, cols) · σ_max`.
pub fn normal_inverse(j: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let (rows, cols) = j.shape();
    if rows < cols || cols == 0 {
        return None;
    }
    if j.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = j.clone().svd(false, true);
    let v_t = svd.v_t?;
    let s = svd.singular_values;

    let s_max = s.max();
    let threshold = f64::EPSILON * rows.max(cols) as f64 * s_max;
    if !(s_max > 0.0) || s.iter().any(|&si| si <= threshold) {
        return None;
    }

    // (JᵀJ)⁻¹ = V Σ⁻² Vᵀ
    let mut scaled = v_t.clone();
    for (i, mut row) in scaled.row_iter_mut().enumerate() {
        row /= s[i] * s[i];
    }
    Some(v_t.transpose() * scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn normal_inverse_matches_direct_inverse() {
        let j = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let direct = (j.transpose() * &j).try_inverse().unwrap();
        let via_svd = normal_inverse(&j).unwrap();
        for (a, b) in direct.iter().zip(via_svd.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn normal_inverse_rejects_rank_deficiency() {
        // Second column is twice the first.
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(normal_inverse(&j).is_none());
    }
}
