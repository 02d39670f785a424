//! Convergence test and restart truncation for the outer iteration.
//!
//! After each sweep the projected matrix `B` is factored as `B = U_B S_B V_B^T`. The
//! residual of the `i`-th Ritz triplet is bounded by `|r_F * U_B[j-1, i]|`, where `r_F`
//! is the norm of the pending residual direction. A triplet is accepted once this bound
//! falls below `tol * Smax`, `Smax` being the largest Ritz value ever observed.

use faer::MatRef;

/// Outcome of one convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Dimension of the subspace retained on restart.
    pub k: usize,
    /// Number of Ritz triplets (among all `j`) whose residual passes the test.
    pub n_converged: usize,
    /// `true` when the leading `nu` triplets have all converged.
    pub converged: bool,
}

/// Stateful convergence evaluator carrying the running maximum Ritz value.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceEvaluator {
    nu: usize,
    tol: f64,
    eps: f64,
    smax: f64,
}

impl ConvergenceEvaluator {
    pub fn new(nu: usize, tol: f64, eps: f64) -> Self {
        Self::with_smax(nu, tol, eps, 0.0)
    }

    /// Resumes with a previously observed `Smax`.
    pub fn with_smax(nu: usize, tol: f64, eps: f64, smax: f64) -> Self {
        Self { nu, tol, eps, smax }
    }

    /// The largest Ritz value observed so far. Never decreases.
    #[inline]
    pub fn smax(&self) -> f64 {
        self.smax
    }

    /// Tests the `j` Ritz triplets of the current sweep.
    ///
    /// # Arguments
    /// * `values`: Ritz values in nonincreasing order, at least `j` rows.
    /// * `residuals`: residual-norm estimates, at least `j` rows.
    /// * `j`: number of bidiagonal columns generated in this sweep.
    /// * `k`: the retained dimension from the previous restart (0 on a fresh start).
    pub fn evaluate(
        &mut self,
        values: MatRef<'_, f64>,
        residuals: MatRef<'_, f64>,
        j: usize,
        k: usize,
    ) -> Verdict {
        for i in 0..j {
            if values[(i, 0)] > self.smax {
                self.smax = values[(i, 0)];
            }
        }

        let threshold = self.tol * self.smax.max(self.eps);
        let passes = |i: usize| residuals[(i, 0)].abs() <= threshold;

        let n_converged = (0..j).filter(|&i| passes(i)).count();
        let converged = (0..self.nu.min(j)).all(passes);

        // Keep every converged triplet plus `nu` fresh directions, leave at least three
        // slots for new Krylov vectors, and never drop below `nu`.
        let mut k = k.max(self.nu + n_converged);
        k = k.min(j.saturating_sub(3));
        k = k.max(self.nu).min(j.saturating_sub(1));

        Verdict {
            k,
            n_converged,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::{Mat, mat};

    #[test]
    fn test_converged_when_leading_residuals_small() {
        let values: Mat<f64> = mat![[10.0], [5.0], [2.0], [1.0], [0.5], [0.1], [0.05]];
        let residuals: Mat<f64> = mat![[1e-9], [1e-8], [1e-7], [1.0], [1.0], [1.0], [1.0]];
        let mut eval = ConvergenceEvaluator::new(3, 1e-6, f64::EPSILON);

        let verdict = eval.evaluate(values.as_ref(), residuals.as_ref(), 7, 0);
        assert!(verdict.converged);
        assert_eq!(verdict.n_converged, 3);
        assert_eq!(eval.smax(), 10.0);
    }

    #[test]
    fn test_not_converged_picks_restart_dimension() {
        let values: Mat<f64> = mat![[10.0], [5.0], [2.0], [1.0], [0.5], [0.1], [0.05], [0.01], [0.0], [0.0]];
        let residuals: Mat<f64> = mat![[1e-9], [1.0], [1.0], [1.0], [1.0], [1.0], [1.0], [1.0], [1.0], [1.0]];
        let mut eval = ConvergenceEvaluator::new(3, 1e-6, f64::EPSILON);

        let verdict = eval.evaluate(values.as_ref(), residuals.as_ref(), 10, 0);
        assert!(!verdict.converged);
        assert_eq!(verdict.n_converged, 1);
        // nu + converged = 4, below the cap j - 3 = 7.
        assert_eq!(verdict.k, 4);

        // A larger previous k is kept.
        let verdict = eval.evaluate(values.as_ref(), residuals.as_ref(), 10, 6);
        assert_eq!(verdict.k, 6);

        // ... but capped at j - 3.
        let verdict = eval.evaluate(values.as_ref(), residuals.as_ref(), 10, 9);
        assert_eq!(verdict.k, 7);
    }

    #[test]
    fn test_restart_dimension_never_below_nu() {
        let values: Mat<f64> = mat![[4.0], [3.0], [2.0], [1.0], [0.5], [0.25]];
        let residuals: Mat<f64> = mat![[1.0], [1.0], [1.0], [1.0], [1.0], [1.0]];
        let mut eval = ConvergenceEvaluator::new(5, 1e-6, f64::EPSILON);

        let verdict = eval.evaluate(values.as_ref(), residuals.as_ref(), 6, 0);
        assert!(!verdict.converged);
        assert_eq!(verdict.k, 5);
    }

    #[test]
    fn test_smax_is_monotone() {
        let mut eval = ConvergenceEvaluator::new(1, 1e-6, f64::EPSILON);
        let residuals: Mat<f64> = mat![[1.0], [1.0], [1.0], [1.0], [1.0]];

        let big: Mat<f64> = mat![[8.0], [1.0], [1.0], [1.0], [1.0]];
        eval.evaluate(big.as_ref(), residuals.as_ref(), 5, 0);
        let small: Mat<f64> = mat![[3.0], [1.0], [1.0], [1.0], [1.0]];
        eval.evaluate(small.as_ref(), residuals.as_ref(), 5, 0);
        assert_eq!(eval.smax(), 8.0);
    }

    #[test]
    fn test_zero_operator_uses_eps_floor() {
        let values = Mat::<f64>::zeros(5, 1);
        let residuals = Mat::<f64>::zeros(5, 1);
        let mut eval = ConvergenceEvaluator::new(2, 1e-6, f64::EPSILON);
        assert!(eval.evaluate(values.as_ref(), residuals.as_ref(), 5, 0).converged);
    }
}
