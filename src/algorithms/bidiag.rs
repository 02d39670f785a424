//! The implicitly restarted Lanczos bidiagonalization driver.
//!
//! Each outer iteration (a *sweep*) extends the bases from the retained dimension `k` to
//! the working dimension `work` with the Golub-Kahan recurrence
//!
//! ```text
//! A   V_j = W_j B_j
//! A^T W_j = V_j B_j^T + f e_j^T
//! ```
//!
//! where `B_j` is upper bidiagonal (plus one dense column after a restart). Once the
//! bases are full, the small matrix `B` is factored with a dense SVD, the Ritz triplets
//! are tested for convergence, and, if more work is needed, the bases are compressed
//! onto the `k` most useful Ritz directions and the recurrence resumes from there.
//!
//! Every buffer comes from an [`IrlbWorkspace`]; the loop itself does not allocate.

use super::{
    RestartState, Start, TruncatedSvd,
    convergence::{ConvergenceEvaluator, Verdict},
    orthogonalize::orthogonalize,
};
use crate::{
    cancel::CancellationToken,
    error::{IrlbError, IrlbErrorKind, Status},
    operator::{Direction, Operator},
    options::IrlbOptions,
    workspace::IrlbWorkspace,
};
use faer::{
    Accum, Mat, MatMut, MatRef, Par,
    dyn_stack::MemStack,
    linalg::{matmul::matmul, svd::svd},
    prelude::*,
    unzip, zip,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Counts operator products and polls for cancellation after each of them.
struct Multiplier<'a, 'op> {
    operator: &'a Operator<'op>,
    cancel: Option<&'a CancellationToken>,
    count: usize,
}

impl Multiplier<'_, '_> {
    fn apply(
        &mut self,
        direction: Direction,
        out: MatMut<'_, f64>,
        input: MatRef<'_, f64>,
        scaled: MatMut<'_, f64>,
        stack: &mut MemStack,
    ) -> Result<(), IrlbError> {
        self.operator.multiply(direction, out, input, scaled, stack);
        self.count += 1;
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            log::info!("IRLB cancelled after {} products.", self.count);
            return Err(IrlbErrorKind::Aborted {
                multiplies: self.count,
            }
            .into());
        }
        Ok(())
    }
}

/// Computes the `options.nu` largest singular triplets of `operator`.
///
/// # Arguments
/// * `operator`: the `m x n` operator.
/// * `options`: iteration parameters, validated against the operator's shape.
/// * `start`: starting vector, random start, or a previous [`RestartState`].
/// * `workspace`: preallocated buffers for `(m, n, options.work)`.
/// * `cancel`: optional token polled after every operator product.
///
/// # Returns
/// A [`TruncatedSvd`] whose status is [`Status::Success`] on convergence or
/// [`Status::NotConverged`] when `options.maxit` sweeps were not enough. In the latter
/// case the result holds the current best estimate and a [`RestartState`].
///
/// # Errors
/// Invalid dimensions, a starting vector in the null space of the operator, a basis
/// breakdown, a failure of the projected SVD, or cancellation.
pub fn irlb(
    operator: &Operator<'_>,
    options: &IrlbOptions,
    start: Start<'_>,
    workspace: &mut IrlbWorkspace,
    cancel: Option<&CancellationToken>,
) -> Result<TruncatedSvd, IrlbError> {
    let (m, n) = (operator.nrows(), operator.ncols());
    options.validate(m, n)?;
    let IrlbOptions {
        nu,
        work,
        maxit,
        tol,
        eps,
        seed,
    } = *options;

    if !workspace.fits(operator, work) {
        return Err(IrlbErrorKind::InvalidDimension(format!(
            "workspace was allocated for a {}x{} operator with work = {}, \
             but the run needs {m}x{n} with work = {work}",
            workspace.m, workspace.n, workspace.work
        ))
        .into());
    }

    let IrlbWorkspace {
        v,
        w,
        v1,
        u1,
        f,
        b,
        bu,
        bv,
        bs,
        res,
        coeffs,
        scaled,
        mem,
        ..
    } = workspace;
    let stack = MemStack::new(mem);

    b.as_mut().fill(0.0);

    // Init: either a fresh normalized start vector, or the state of a previous run.
    let (mut k, sweeps_before, smax) = match start {
        Start::Vector(x) => {
            if (x.nrows(), x.ncols()) != (n, 1) {
                return Err(IrlbErrorKind::InvalidDimension(format!(
                    "starting vector must be {n}x1, got {}x{}",
                    x.nrows(),
                    x.ncols()
                ))
                .into());
            }
            v.as_mut().subcols_mut(0, 1).copy_from(x);
            (0, 0, 0.0)
        }
        Start::Random => {
            let mut rng = StdRng::seed_from_u64(seed);
            for i in 0..n {
                v[(i, 0)] = rng.random_range(-1.0..1.0);
            }
            (0, 0, 0.0)
        }
        Start::Resume(state) => {
            state.validate(m, n, work)?;
            let k = state.dim();
            v.as_mut().subcols_mut(0, k + 1).copy_from(state.v.as_ref());
            w.as_mut().subcols_mut(0, k).copy_from(state.w.as_ref());
            for i in 0..k {
                b[(i, i)] = state.values[i];
                b[(i, k)] = state.residuals[i];
            }
            (k, state.sweeps, state.smax)
        }
    };

    if k == 0 {
        let d = v.as_ref().subcols(0, 1).norm_l2();
        if !(d >= 2.0 * eps) {
            return Err(IrlbErrorKind::NearNullSpace { step: 0 }.into());
        }
        let mut v0 = v.as_mut().subcols_mut(0, 1);
        v0 *= Scale(1.0 / d);
    }

    let mut mult = Multiplier {
        operator,
        cancel,
        count: 0,
    };
    let mut evaluator = ConvergenceEvaluator::with_smax(nu, tol, eps, smax);
    let mut iter = 0;
    let mut converged = false;
    let mut r_f = 0.0;

    while iter < maxit {
        let sweep = sweeps_before + iter;
        let mut j = k;
        // Running estimate of ||A|| for this sweep, the scale of the collapse test.
        let mut anorm = evaluator.smax();

        // W[:, j] = A V[:, j], orthogonalized against the retained left vectors.
        let (w_prev, w_rest) = w.as_mut().split_at_col_mut(j);
        let mut w_j = w_rest.subcols_mut(0, 1);
        mult.apply(
            Direction::Forward,
            w_j.rb_mut(),
            v.as_ref().subcols(j, 1),
            scaled.as_mut(),
            stack,
        )?;
        if sweep > 0 {
            orthogonalize(w_prev.rb(), w_j.rb_mut(), coeffs.as_mut());
        }
        let mut s = w_j.rb().norm_l2();
        if collapsed(s, anorm, eps) {
            return Err(breakdown(sweep, j));
        }
        anorm = anorm.max(s);
        w_j *= Scale(1.0 / s);

        // BuildBasis
        while j < work {
            // F = A^T W[:, j] - s V[:, j], orthogonalized against V[:, ..=j].
            mult.apply(
                Direction::Transpose,
                f.as_mut(),
                w.as_ref().subcols(j, 1),
                scaled.as_mut(),
                stack,
            )?;
            zip!(f.as_mut(), v.as_ref().subcols(j, 1)).for_each(|unzip!(y, x)| *y -= s * *x);
            orthogonalize(v.as_ref().subcols(0, j + 1), f.as_mut(), coeffs.as_mut());
            r_f = f.norm_l2();

            if j + 1 < work {
                if collapsed(r_f, anorm, eps) {
                    return Err(breakdown(sweep, j + 1));
                }
                anorm = anorm.max(r_f);
                let mut v_next = v.as_mut().subcols_mut(j + 1, 1);
                v_next.copy_from(f.as_ref());
                v_next *= Scale(1.0 / r_f);
                b[(j, j)] = s;
                b[(j, j + 1)] = r_f;

                // W[:, j+1] = A V[:, j+1] - r_f W[:, j]
                let (w_prev, w_rest) = w.as_mut().split_at_col_mut(j + 1);
                let mut w_next = w_rest.subcols_mut(0, 1);
                mult.apply(
                    Direction::Forward,
                    w_next.rb_mut(),
                    v.as_ref().subcols(j + 1, 1),
                    scaled.as_mut(),
                    stack,
                )?;
                zip!(w_next.rb_mut(), w_prev.rb().subcols(j, 1))
                    .for_each(|unzip!(y, x)| *y -= r_f * *x);
                // The first two sweeps rely on the short recurrence for W.
                if sweep > 1 {
                    orthogonalize(w_prev.rb(), w_next.rb_mut(), coeffs.as_mut());
                }
                s = w_next.rb().norm_l2();
                if collapsed(s, anorm, eps) {
                    return Err(breakdown(sweep, j + 1));
                }
                anorm = anorm.max(s);
                w_next *= Scale(1.0 / s);
            } else {
                b[(j, j)] = s;
            }
            j += 1;
        }

        // SmallSVD
        svd(
            b.as_ref(),
            bs.as_mut().col_mut(0).as_diagonal_mut(),
            Some(bu.as_mut()),
            Some(bv.as_mut()),
            Par::Seq,
            stack,
            Default::default(),
        )
        .map_err(IrlbErrorKind::SvdError)?;
        for i in 0..j {
            res[(i, 0)] = r_f * bu[(j - 1, i)];
        }

        // CheckConvergence
        let Verdict {
            k: k_next,
            n_converged,
            converged: done,
        } = evaluator.evaluate(bs.as_ref(), res.as_ref(), j, k);
        log::debug!(
            "sweep {sweep}: {n_converged}/{j} Ritz values converged, k = {k_next}, smax = {:.6e}",
            evaluator.smax()
        );
        if done {
            iter += 1;
            converged = true;
            break;
        }
        k = k_next;

        // RestartTruncate
        if collapsed(r_f, anorm, eps) {
            return Err(breakdown(sweep, j));
        }
        let mut f_col = f.as_mut();
        f_col *= Scale(1.0 / r_f);

        // V <- [V V_B[:, ..k], f]
        matmul(
            v1.as_mut().subcols_mut(0, k),
            Accum::Replace,
            v.as_ref().subcols(0, j),
            bv.as_ref().subcols(0, k),
            1.0,
            Par::Seq,
        );
        v.as_mut().subcols_mut(0, k).copy_from(v1.as_ref().subcols(0, k));
        v.as_mut().subcols_mut(k, 1).copy_from(f.as_ref());

        b.as_mut().fill(0.0);
        for i in 0..k {
            b[(i, i)] = bs[(i, 0)];
            b[(i, k)] = res[(i, 0)];
        }

        // W <- W U_B[:, ..k]
        matmul(
            u1.as_mut().subcols_mut(0, k),
            Accum::Replace,
            w.as_ref().subcols(0, j),
            bu.as_ref().subcols(0, k),
            1.0,
            Par::Seq,
        );
        w.as_mut().subcols_mut(0, k).copy_from(u1.as_ref().subcols(0, k));
        iter += 1;
    }

    // Finalize
    let values = (0..nu).map(|i| bs[(i, 0)]).collect();
    let (u_out, v_out, status, restart) = if converged {
        let mut u_out = Mat::zeros(m, nu);
        let mut v_out = Mat::zeros(n, nu);
        matmul(
            u_out.as_mut(),
            Accum::Replace,
            w.as_ref(),
            bu.as_ref().subcols(0, nu),
            1.0,
            Par::Seq,
        );
        matmul(
            v_out.as_mut(),
            Accum::Replace,
            v.as_ref(),
            bv.as_ref().subcols(0, nu),
            1.0,
            Par::Seq,
        );
        (u_out, v_out, Status::Success, None)
    } else {
        log::warn!(
            "IRLB did not converge within {maxit} iterations ({} products); returning the current estimate.",
            mult.count
        );
        // The bases were compressed onto the Ritz directions by the last restart.
        let restart = RestartState {
            v: v.as_ref().subcols(0, k + 1).to_owned(),
            w: w.as_ref().subcols(0, k).to_owned(),
            values: (0..k).map(|i| bs[(i, 0)]).collect(),
            residuals: (0..k).map(|i| res[(i, 0)]).collect(),
            sweeps: sweeps_before + iter,
            smax: evaluator.smax(),
        };
        (
            w.as_ref().subcols(0, nu).to_owned(),
            v.as_ref().subcols(0, nu).to_owned(),
            Status::NotConverged,
            Some(restart),
        )
    };

    Ok(TruncatedSvd {
        values,
        u: u_out,
        v: v_out,
        iterations: iter,
        multiplies: mult.count,
        status,
        restart,
    })
}

/// Whether a freshly orthogonalized direction of norm `norm` is numerically dependent on
/// the basis built so far. Once any product has been seen the test is relative to the
/// running estimate `anorm` of the operator norm; before that only exact collapse (below
/// `eps`) counts.
#[inline]
fn collapsed(norm: f64, anorm: f64, eps: f64) -> bool {
    !(norm >= eps.max(eps.sqrt() * anorm))
}

/// A vanishing normalization norm: the very first one means the start vector is in the
/// null space of the operator, any later one is a generic linear dependence.
fn breakdown(sweep: usize, step: usize) -> IrlbError {
    if sweep == 0 && step == 0 {
        IrlbErrorKind::NearNullSpace { step }.into()
    } else {
        IrlbErrorKind::LinearDependence { step, sweep }.into()
    }
}
