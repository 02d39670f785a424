//! Classical Gram-Schmidt re-orthogonalization.
//!
//! Lanczos recurrences lose orthogonality quickly in floating point: once a Ritz value
//! converges, its direction creeps back into every new Krylov vector. Re-projecting each
//! new vector against the basis built so far keeps the computed bases orthonormal to
//! working precision.
//!
//! One classical pass is two matrix-vector products,
//!
//! ```text
//! c = X^T y
//! y = y - X c
//! ```
//!
//! which is far cheaper than modified Gram-Schmidt's `j` sequential updates and maps
//! onto a single pair of BLAS-2 style kernels. No normalization is performed here; the
//! caller measures the residual norm and normalizes.

use faer::{Accum, MatMut, MatRef, Par, linalg::matmul::matmul, prelude::*};

/// Projects `y` onto the orthogonal complement of the columns of `basis`, in place.
///
/// # Arguments
/// * `basis`: the `n x j` orthonormal columns to project against. `j` may be zero.
/// * `y`: the `n x 1` vector to orthogonalize.
/// * `coeffs`: a buffer with at least `j` rows receiving `basis^T y`.
pub fn orthogonalize(basis: MatRef<'_, f64>, mut y: MatMut<'_, f64>, coeffs: MatMut<'_, f64>) {
    let used = basis.ncols();
    if used == 0 {
        return;
    }
    debug_assert_eq!(basis.nrows(), y.nrows());

    let mut c = coeffs.subrows_mut(0, used);
    matmul(
        c.rb_mut(),
        Accum::Replace,
        basis.transpose(),
        y.rb(),
        1.0,
        Par::Seq,
    );
    matmul(y.rb_mut(), Accum::Add, basis, c.rb(), -1.0, Par::Seq);
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    #[test]
    fn test_result_is_orthogonal_to_basis() {
        // DST-I matrix: symmetric and orthogonal.
        let q = Mat::from_fn(5, 5, |i, j| {
            let (i, j) = ((i + 1) as f64, (j + 1) as f64);
            (2.0f64 / 6.0).sqrt() * (i * j * std::f64::consts::PI / 6.0).sin()
        });
        let basis = q.as_ref().subcols(0, 3);

        let mut y = Mat::from_fn(5, 1, |i, _| 1.0 + i as f64);
        let mut coeffs = Mat::zeros(5, 1);
        orthogonalize(basis, y.as_mut(), coeffs.as_mut());

        for j in 0..3 {
            assert!((basis.col(j).transpose() * y.col(0)).abs() < 1e-12);
        }
        // The component in the complement is untouched.
        let rest = q.as_ref().subcols(3, 2);
        let original = Mat::from_fn(5, 1, |i, _| 1.0 + i as f64);
        for j in 0..2 {
            let before = rest.col(j).transpose() * original.col(0);
            let after = rest.col(j).transpose() * y.col(0);
            assert!((before - after).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_basis_is_noop() {
        let basis = Mat::<f64>::zeros(4, 0);
        let mut y = Mat::from_fn(4, 1, |i, _| i as f64);
        let mut coeffs = Mat::zeros(4, 1);
        orthogonalize(basis.as_ref(), y.as_mut(), coeffs.as_mut());
        assert_eq!(y, Mat::from_fn(4, 1, |i, _| i as f64));
    }
}
