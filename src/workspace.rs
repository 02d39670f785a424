//! Preallocated working memory for the bidiagonalization driver.
//!
//! Every buffer the driver touches is sized once from `(m, n, work)` and owned by an
//! [`IrlbWorkspace`]. The iteration loop only ever takes views into these buffers, so a
//! run performs no heap allocation between its first and last operator product. A
//! workspace can be reused across calls on operators of the same shape.
//!
//! The single [`MemBuffer`] held here plays the role of the multiply context: it is
//! sized for the operator's own scratch requirements (relevant for sparse operators)
//! and for the dense SVD of the projected matrix, whichever is larger.

use crate::{
    error::{IrlbError, IrlbErrorKind},
    operator::Operator,
};
use faer::{
    Mat, Par,
    dyn_stack::{MemBuffer, StackReq},
    linalg::svd::{ComputeSvdVectors, svd_scratch},
};

/// Owned storage for one bidiagonalization run.
pub struct IrlbWorkspace {
    pub(crate) m: usize,
    pub(crate) n: usize,
    pub(crate) work: usize,
    /// Right Krylov basis, `n x work`.
    pub(crate) v: Mat<f64>,
    /// Left Krylov basis, `m x work`.
    pub(crate) w: Mat<f64>,
    /// Restart product `V V_B`, `n x work`.
    pub(crate) v1: Mat<f64>,
    /// Restart product `W U_B`, `m x work`.
    pub(crate) u1: Mat<f64>,
    /// Pending residual direction, `n x 1`.
    pub(crate) f: Mat<f64>,
    /// Projected matrix, `work x work`.
    pub(crate) b: Mat<f64>,
    /// Left singular vectors of `B`, `work x work`.
    pub(crate) bu: Mat<f64>,
    /// Right singular vectors of `B`, `work x work`.
    pub(crate) bv: Mat<f64>,
    /// Singular values of `B`, `work x 1`.
    pub(crate) bs: Mat<f64>,
    /// Residual estimates of the Ritz triplets, `work x 1`.
    pub(crate) res: Mat<f64>,
    /// Gram-Schmidt coefficients, `work x 1`.
    pub(crate) coeffs: Mat<f64>,
    /// Scaled input of forward products, `n x 1`.
    pub(crate) scaled: Mat<f64>,
    pub(crate) mem: MemBuffer,
    scratch: StackReq,
}

impl IrlbWorkspace {
    /// Allocates a workspace for `operator` with a working dimension of `work`.
    ///
    /// Returns [`Status::ResourceExhaustion`](crate::error::Status::ResourceExhaustion)
    /// if any buffer cannot be allocated.
    pub fn new(operator: &Operator<'_>, work: usize) -> Result<Self, IrlbError> {
        let (m, n) = (operator.nrows(), operator.ncols());
        if work == 0 {
            return Err(IrlbErrorKind::InvalidDimension("work must be positive".into()).into());
        }

        let scratch = operator.scratch_req().or(Self::svd_scratch(work));
        let mem = MemBuffer::try_new(scratch)
            .map_err(|_| IrlbErrorKind::ResourceExhaustion { what: "scratch" })?;

        Ok(Self {
            m,
            n,
            work,
            v: try_zeros(n, work, "V")?,
            w: try_zeros(m, work, "W")?,
            v1: try_zeros(n, work, "V1")?,
            u1: try_zeros(m, work, "U1")?,
            f: try_zeros(n, 1, "F")?,
            b: try_zeros(work, work, "B")?,
            bu: try_zeros(work, work, "BU")?,
            bv: try_zeros(work, work, "BV")?,
            bs: try_zeros(work, 1, "BS")?,
            res: try_zeros(work, 1, "res")?,
            coeffs: try_zeros(work, 1, "T")?,
            scaled: try_zeros(n, 1, "scale")?,
            mem,
            scratch,
        })
    }

    fn svd_scratch(work: usize) -> StackReq {
        svd_scratch::<f64>(
            work,
            work,
            ComputeSvdVectors::Full,
            ComputeSvdVectors::Full,
            Par::Seq,
            Default::default(),
        )
    }

    /// Whether this workspace can serve a run on `operator` with working dimension `work`.
    pub fn fits(&self, operator: &Operator<'_>, work: usize) -> bool {
        self.m == operator.nrows()
            && self.n == operator.ncols()
            && self.work == work
            && self.scratch.or(operator.scratch_req()) == self.scratch
    }

    pub fn work(&self) -> usize {
        self.work
    }
}

/// Allocates an `nrows x ncols` zero matrix, reporting allocation failure as an error.
fn try_zeros(nrows: usize, ncols: usize, what: &'static str) -> Result<Mat<f64>, IrlbError> {
    let mut mat = Mat::new();
    mat.try_reserve(nrows, ncols)
        .map_err(|_| IrlbErrorKind::ResourceExhaustion { what })?;
    mat.resize_with(nrows, ncols, |_, _| 0.0);
    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_shapes() {
        let a = Mat::<f64>::zeros(12, 9);
        let op = Operator::dense(a.as_ref());
        let ws = IrlbWorkspace::new(&op, 6).unwrap();

        assert_eq!((ws.v.nrows(), ws.v.ncols()), (9, 6));
        assert_eq!((ws.w.nrows(), ws.w.ncols()), (12, 6));
        assert_eq!((ws.b.nrows(), ws.b.ncols()), (6, 6));
        assert_eq!((ws.f.nrows(), ws.scaled.nrows()), (9, 9));
        assert_eq!(ws.bs.nrows(), 6);
        assert!(ws.fits(&op, 6));
        assert!(!ws.fits(&op, 5));
    }

    #[test]
    fn test_zero_work_rejected() {
        let a = Mat::<f64>::zeros(8, 8);
        let op = Operator::dense(a.as_ref());
        assert_eq!(IrlbWorkspace::new(&op, 0).err().map(|e| e.code()), Some(-1));
    }
}
