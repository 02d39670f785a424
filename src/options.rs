//! Configuration of a truncated SVD run.

use crate::error::{IrlbError, IrlbErrorKind};
use serde::{Deserialize, Serialize};

/// Extra Krylov directions kept on top of `nu` when no working dimension is given.
pub const DEFAULT_EXTRA_WORK: usize = 7;

/// Parameters of the implicitly restarted Lanczos bidiagonalization.
///
/// The defaults mirror common practice for IRLB: a working subspace seven vectors
/// larger than the number of requested triplets, up to 100 restarts, and a
/// relative residual tolerance of `1e-5`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrlbOptions {
    /// Number of singular triplets to compute.
    pub nu: usize,
    /// Dimension of the working Krylov subspace (columns of V and W).
    pub work: usize,
    /// Maximum number of outer iterations (restarts).
    pub maxit: usize,
    /// Convergence tolerance, relative to the largest singular value seen so far.
    pub tol: f64,
    /// Machine epsilon used for breakdown detection.
    pub eps: f64,
    /// Seed for the random starting vector when the caller does not supply one.
    pub seed: u64,
}

impl Default for IrlbOptions {
    fn default() -> Self {
        Self::new(5)
    }
}

impl IrlbOptions {
    /// Options for `nu` triplets with a working dimension of `nu + 7`.
    pub fn new(nu: usize) -> Self {
        Self {
            nu,
            work: nu + DEFAULT_EXTRA_WORK,
            maxit: 100,
            tol: 1e-5,
            eps: f64::EPSILON,
            seed: 42,
        }
    }

    pub fn with_work(mut self, work: usize) -> Self {
        self.work = work;
        self
    }

    pub fn with_maxit(mut self, maxit: usize) -> Self {
        self.maxit = maxit;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks the options against an `m x n` operator.
    pub fn validate(&self, m: usize, n: usize) -> Result<(), IrlbError> {
        if m < 4 || n < 4 {
            return Err(IrlbErrorKind::InvalidDimension(format!(
                "operator is {m}x{n}, both dimensions must be at least 4"
            ))
            .into());
        }
        if self.work < 4 || self.work >= m.min(n) {
            return Err(IrlbErrorKind::InvalidDimension(format!(
                "work = {} must satisfy 4 <= work < min(m, n) = {}",
                self.work,
                m.min(n)
            ))
            .into());
        }
        if self.nu == 0 || self.nu >= self.work {
            return Err(IrlbErrorKind::InvalidDimension(format!(
                "nu = {} must satisfy 1 <= nu < work = {}",
                self.nu, self.work
            ))
            .into());
        }
        if self.maxit == 0 {
            return Err(IrlbErrorKind::InputError("maxit must be at least 1".to_string()).into());
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(IrlbErrorKind::InputError(format!(
                "tol must be positive and finite, got {}",
                self.tol
            ))
            .into());
        }
        if !(self.eps > 0.0 && self.eps.is_finite()) {
            return Err(IrlbErrorKind::InputError(format!(
                "eps must be positive and finite, got {}",
                self.eps
            ))
            .into());
        }
        Ok(())
    }
}
