//! Building blocks of the implicitly restarted Lanczos bidiagonalization.
//!
//! ** NOTE: We recommend using the high-level method [`crate::solvers::compute_truncated_svd`]
//! instead. This module is intended for use cases where the workspace must be reused across
//! calls or the computation must be resumed.
//!
//! - [`orthogonalize`]: classical Gram-Schmidt re-projection against a basis.
//! - [`convergence`]: residual test of the Ritz triplets and restart truncation.
//! - [`bidiag`]: the driver, [`bidiag::irlb`].
//!
//! The types shared between the driver and its callers live here.

pub mod bidiag;
pub mod convergence;
pub mod orthogonalize;

use crate::error::{IrlbError, IrlbErrorKind, Status};
use faer::{Mat, MatRef};

/// Where the Krylov process starts.
#[derive(Debug, Clone, Copy)]
pub enum Start<'a> {
    /// An explicit `n x 1` starting vector. It does not need to be normalized.
    Vector(MatRef<'a, f64>),
    /// A uniformly distributed random vector drawn from `IrlbOptions::seed`.
    Random,
    /// Continue a run that stopped without converging.
    ///
    /// The sweep count carries on from [`RestartState::sweeps`] instead of restarting at
    /// zero, so the left basis keeps the full re-orthogonalization it had reached and a
    /// chain of resumed calls reproduces a single uninterrupted run. `options.maxit`
    /// bounds the sweeps of this call only.
    Resume(&'a RestartState),
}

/// The state of an unconverged run, sufficient to continue it exactly.
///
/// With `k` the retained dimension, the right basis holds the `k` Ritz vectors followed
/// by the normalized residual direction, and the projected matrix is
///
/// ```text
/// B = [ diag(values)  residuals ]
///     [      0          ...     ]
/// ```
///
/// with the residual estimates in column `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartState {
    /// Right basis, `n x (k + 1)`.
    pub v: Mat<f64>,
    /// Left basis, `m x k`.
    pub w: Mat<f64>,
    /// Retained Ritz values, length `k`.
    pub values: Vec<f64>,
    /// Residual estimates of the retained Ritz triplets, length `k`.
    pub residuals: Vec<f64>,
    /// Outer iterations performed so far, across all previous calls.
    pub sweeps: usize,
    /// Largest Ritz value observed so far.
    pub smax: f64,
}

impl RestartState {
    /// Retained dimension `k`.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn validate(&self, m: usize, n: usize, work: usize) -> Result<(), IrlbError> {
        let k = self.dim();
        if k == 0 || k >= work {
            return Err(IrlbErrorKind::InvalidDimension(format!(
                "restart dimension {k} must satisfy 1 <= k < work = {work}"
            ))
            .into());
        }
        if self.residuals.len() != k
            || (self.v.nrows(), self.v.ncols()) != (n, k + 1)
            || (self.w.nrows(), self.w.ncols()) != (m, k)
        {
            return Err(IrlbErrorKind::InvalidDimension(format!(
                "restart buffers must be V: {n}x{}, W: {m}x{k}, values/residuals: {k}; \
                 got V: {}x{}, W: {}x{}, residuals: {}",
                k + 1,
                self.v.nrows(),
                self.v.ncols(),
                self.w.nrows(),
                self.w.ncols(),
                self.residuals.len()
            ))
            .into());
        }
        Ok(())
    }
}

/// A truncated singular value decomposition `A ~ U diag(values) V^T`.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// The `nu` leading singular values, nonincreasing.
    pub values: Vec<f64>,
    /// Left singular vectors, `m x nu`.
    pub u: Mat<f64>,
    /// Right singular vectors, `n x nu`.
    pub v: Mat<f64>,
    /// Outer iterations performed by this call.
    pub iterations: usize,
    /// Operator products performed by this call.
    pub multiplies: usize,
    /// [`Status::Success`] or [`Status::NotConverged`].
    pub status: Status,
    /// Present when the run stopped without converging; pass it back through
    /// [`Start::Resume`] to continue.
    pub restart: Option<RestartState>,
}

impl TruncatedSvd {
    #[inline]
    pub fn converged(&self) -> bool {
        self.status == Status::Success
    }

    /// Rank-`nu` approximation `U diag(values) V^T`.
    pub fn reconstruct(&self) -> Mat<f64> {
        let us = Mat::from_fn(self.u.nrows(), self.u.ncols(), |i, l| {
            self.u[(i, l)] * self.values[l]
        });
        us.as_ref() * self.v.as_ref().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn test_reconstruct_rank_one() {
        let svd = TruncatedSvd {
            values: vec![2.0],
            u: mat![[1.0], [0.0]],
            v: mat![[0.0], [1.0], [0.0]],
            iterations: 1,
            multiplies: 2,
            status: Status::Success,
            restart: None,
        };
        let expected: Mat<f64> = mat![[0.0, 2.0, 0.0], [0.0, 0.0, 0.0]];
        assert_eq!(svd.reconstruct(), expected);
        assert!(svd.converged());
    }

    #[test]
    fn test_restart_state_validation() {
        let state = RestartState {
            v: Mat::zeros(6, 3),
            w: Mat::zeros(7, 2),
            values: vec![3.0, 1.0],
            residuals: vec![0.1, 0.2],
            sweeps: 1,
            smax: 3.0,
        };
        assert!(state.validate(7, 6, 5).is_ok());
        // k must stay below work.
        assert!(state.validate(7, 6, 2).is_err());
        // Shapes must match the operator.
        assert!(state.validate(6, 7, 5).is_err());
    }
}
