//! This module provides a high-level, user-friendly API for computing truncated SVDs.
//!
//! The functions here allocate an [`IrlbWorkspace`] sized for the problem and run the
//! driver [`irlb`] once. Callers that solve many problems of the same shape, or that
//! need to hand the workspace in from elsewhere, should use [`irlb`] directly.

use crate::{
    algorithms::{RestartState, Start, TruncatedSvd, bidiag::irlb},
    cancel::CancellationToken,
    error::IrlbError,
    operator::Operator,
    options::IrlbOptions,
    workspace::IrlbWorkspace,
};

/// Computes the `options.nu` largest singular triplets of `operator`.
///
/// # Arguments
/// * `operator`: a dense or sparse [`Operator`], possibly scaled, shifted or centered.
/// * `options`: iteration parameters.
/// * `start`: [`Start::Vector`], [`Start::Random`] or [`Start::Resume`].
/// * `cancel`: optional token polled after every operator product.
///
/// # Returns
/// A [`TruncatedSvd`]. Check [`TruncatedSvd::status`] or [`TruncatedSvd::converged`]:
/// running out of iterations is reported there rather than as an error.
pub fn compute_truncated_svd(
    operator: &Operator<'_>,
    options: &IrlbOptions,
    start: Start<'_>,
    cancel: Option<&CancellationToken>,
) -> Result<TruncatedSvd, IrlbError> {
    options.validate(operator.nrows(), operator.ncols())?;
    let mut workspace = IrlbWorkspace::new(operator, options.work)?;
    log::debug!(
        "IRLB on a {}x{} operator: nu = {}, work = {}, maxit = {}, tol = {:e}",
        operator.nrows(),
        operator.ncols(),
        options.nu,
        options.work,
        options.maxit,
        options.tol
    );
    irlb(operator, options, start, &mut workspace, cancel)
}

/// Continues an unconverged run from its [`RestartState`].
///
/// Equivalent to calling [`compute_truncated_svd`] with [`Start::Resume`].
pub fn resume(
    operator: &Operator<'_>,
    options: &IrlbOptions,
    state: &RestartState,
    cancel: Option<&CancellationToken>,
) -> Result<TruncatedSvd, IrlbError> {
    compute_truncated_svd(operator, options, Start::Resume(state), cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use faer::Mat;

    #[test]
    fn test_diagonal_operator() {
        let a = Mat::from_fn(20, 15, |i, j| if i == j { (15 - j) as f64 } else { 0.0 });
        let op = Operator::dense(a.as_ref());
        let options = IrlbOptions::new(4).with_work(10).with_maxit(1000).with_tol(1e-10);

        let out = compute_truncated_svd(&op, &options, Start::Random, None).unwrap();
        assert_eq!(out.status, Status::Success);
        for (i, value) in out.values.iter().enumerate() {
            assert!((value - (15 - i) as f64).abs() < 1e-8);
        }
        assert_eq!((out.u.nrows(), out.u.ncols()), (20, 4));
        assert_eq!((out.v.nrows(), out.v.ncols()), (15, 4));
    }

    #[test]
    fn test_resume_rejects_foreign_state() {
        let a = Mat::from_fn(20, 15, |i, j| ((i * j) % 7) as f64);
        let op = Operator::dense(a.as_ref());
        let options = IrlbOptions::new(4).with_work(10);
        let state = RestartState {
            v: Mat::zeros(14, 5),
            w: Mat::zeros(20, 4),
            values: vec![1.0; 4],
            residuals: vec![0.0; 4],
            sweeps: 1,
            smax: 1.0,
        };
        let err = resume(&op, &options, &state, None).map(|_| ()).unwrap_err();
        assert_eq!(err.code(), -1);
    }
}
