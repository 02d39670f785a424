//! This module defines the linear operator whose leading singular triplets are sought.
//!
//! The bidiagonalization never needs the entries of the matrix: it only multiplies by
//! it, forwards (`A x`) and transposed (`A^T y`). An [`Operator`] wraps either a dense
//! column-major matrix or an opaque sparse matrix whose products are delegated to the
//! [`faer::matrix_free::BiLinOp`] implementation it carries.
//!
//! On top of the raw product the operator can apply three implicit corrections, none of
//! which materializes a modified matrix:
//!
//! *   **scale**: multiplication by `A diag(1/scale)`. The forward product divides the
//!     input entrywise by `scale`; the transpose product divides its output.
//! *   **shift**: multiplication by `A + shift * I` (square operators only).
//! *   **center**: the forward product subtracts `x^T center` from every output entry,
//!     which is the product with a column-centered matrix when `center` holds the
//!     column means. The transposed product is left uncorrected.

use crate::error::{IrlbError, IrlbErrorKind};
use faer::{
    Accum, MatMut, MatRef, Par,
    dyn_stack::{MemStack, StackReq},
    linalg::matmul::matmul,
    matrix_free::BiLinOp,
    prelude::*,
    unzip, zip,
};

/// Which product to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `out = A x`, with `x` of length `n` and `out` of length `m`.
    Forward,
    /// `out = A^T y`, with `y` of length `m` and `out` of length `n`.
    Transpose,
}

/// Storage of the underlying matrix.
#[derive(Debug, Clone, Copy)]
pub enum Matrix<'a> {
    /// A dense matrix stored column-major.
    Dense(MatRef<'a, f64>),
    /// A sparse (or otherwise matrix-free) operator. Its internal representation is
    /// never inspected; only its forward and transpose products are used.
    Sparse(&'a dyn BiLinOp<f64>),
}

/// An `m x n` linear operator with optional scaling, shifting and centering.
///
/// # Example
///
/// ```rust
/// use faer::Mat;
/// use irlb::operator::Operator;
///
/// let a = Mat::from_fn(6, 6, |i, j| (i + 2 * j) as f64);
/// let scale = Mat::from_fn(6, 1, |i, _| 1.0 + i as f64);
///
/// let op = Operator::dense(a.as_ref())
///     .with_scale(scale.as_ref())
///     .unwrap()
///     .with_shift(0.5)
///     .unwrap();
/// assert_eq!(op.nrows(), 6);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Operator<'a> {
    matrix: Matrix<'a>,
    scale: Option<MatRef<'a, f64>>,
    shift: Option<f64>,
    center: Option<MatRef<'a, f64>>,
}

impl<'a> Operator<'a> {
    /// Wraps a dense column-major matrix.
    pub fn dense(a: MatRef<'a, f64>) -> Self {
        Self::from_matrix(Matrix::Dense(a))
    }

    /// Wraps a sparse operator, e.g. `&a.as_ref()` for a `SparseColMat<usize, f64>`.
    pub fn sparse(a: &'a dyn BiLinOp<f64>) -> Self {
        Self::from_matrix(Matrix::Sparse(a))
    }

    fn from_matrix(matrix: Matrix<'a>) -> Self {
        Self {
            matrix,
            scale: None,
            shift: None,
            center: None,
        }
    }

    /// Attaches a column scaling; `scale` must be `n x 1` with strictly positive entries.
    pub fn with_scale(mut self, scale: MatRef<'a, f64>) -> Result<Self, IrlbError> {
        self.check_vector("scale", scale)?;
        for i in 0..scale.nrows() {
            let s = scale[(i, 0)];
            if !(s > 0.0 && s.is_finite()) {
                return Err(IrlbErrorKind::InputError(format!(
                    "scale entries must be positive and finite, found {s} at index {i}"
                ))
                .into());
            }
        }
        self.scale = Some(scale);
        Ok(self)
    }

    /// Attaches a diagonal shift; only valid for square operators.
    pub fn with_shift(mut self, shift: f64) -> Result<Self, IrlbError> {
        if self.nrows() != self.ncols() {
            return Err(IrlbErrorKind::InvalidDimension(format!(
                "shift requires a square operator, got {}x{}",
                self.nrows(),
                self.ncols()
            ))
            .into());
        }
        self.shift = Some(shift);
        Ok(self)
    }

    /// Attaches a centering vector; `center` must be `n x 1`.
    pub fn with_center(mut self, center: MatRef<'a, f64>) -> Result<Self, IrlbError> {
        self.check_vector("center", center)?;
        self.center = Some(center);
        Ok(self)
    }

    fn check_vector(&self, name: &str, v: MatRef<'_, f64>) -> Result<(), IrlbError> {
        if v.nrows() != self.ncols() || v.ncols() != 1 {
            return Err(IrlbErrorKind::InvalidDimension(format!(
                "{name} must be {}x1, got {}x{}",
                self.ncols(),
                v.nrows(),
                v.ncols()
            ))
            .into());
        }
        Ok(())
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        match self.matrix {
            Matrix::Dense(a) => a.nrows(),
            Matrix::Sparse(a) => a.nrows(),
        }
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        match self.matrix {
            Matrix::Dense(a) => a.ncols(),
            Matrix::Sparse(a) => a.ncols(),
        }
    }

    /// Scratch memory needed by [`Operator::multiply`] for a single right-hand side.
    pub fn scratch_req(&self) -> StackReq {
        match self.matrix {
            Matrix::Dense(_) => StackReq::EMPTY,
            Matrix::Sparse(a) => a
                .apply_scratch(1, Par::Seq)
                .or(a.transpose_apply_scratch(1, Par::Seq)),
        }
    }

    /// Computes one product with the operator.
    ///
    /// # Arguments
    /// * `direction`: forward (`n -> m`) or transpose (`m -> n`).
    /// * `out`: destination, overwritten.
    /// * `input`: the vector to multiply.
    /// * `scaled`: an `n x 1` buffer receiving `input / scale` on scaled forward products.
    /// * `stack`: scratch for the sparse kernel, see [`Operator::scratch_req`].
    ///
    /// # Panics
    ///
    /// Panics if the vector dimensions do not match the operator.
    pub fn multiply(
        &self,
        direction: Direction,
        out: MatMut<'_, f64>,
        input: MatRef<'_, f64>,
        scaled: MatMut<'_, f64>,
        stack: &mut MemStack,
    ) {
        match direction {
            Direction::Forward => self.forward(out, input, scaled, stack),
            Direction::Transpose => self.transpose(out, input, stack),
        }
    }

    fn forward(
        &self,
        mut out: MatMut<'_, f64>,
        input: MatRef<'_, f64>,
        mut scaled: MatMut<'_, f64>,
        stack: &mut MemStack,
    ) {
        assert_eq!(
            input.nrows(),
            self.ncols(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            input.nrows(),
        );
        assert_eq!(out.nrows(), self.nrows());

        let x = match self.scale {
            Some(scale) => {
                zip!(scaled.rb_mut(), input, scale)
                    .for_each(|unzip!(dst, x, s)| *dst = *x / *s);
                scaled.rb()
            }
            None => input,
        };

        match self.matrix {
            Matrix::Dense(a) => matmul(out.rb_mut(), Accum::Replace, a, x, 1.0, Par::Seq),
            Matrix::Sparse(a) => a.apply(out.rb_mut(), x, Par::Seq, stack),
        }

        // The shift acts on the scaled input, i.e. on (A diag(1/scale) + shift I) x.
        if let Some(shift) = self.shift {
            zip!(out.rb_mut(), x).for_each(|unzip!(y, x)| *y += shift * *x);
        }
        if let Some(center) = self.center {
            let beta = x.col(0).transpose() * center.col(0);
            zip!(out.rb_mut()).for_each(|unzip!(y)| *y -= beta);
        }
    }

    fn transpose(&self, mut out: MatMut<'_, f64>, input: MatRef<'_, f64>, stack: &mut MemStack) {
        assert_eq!(
            input.nrows(),
            self.nrows(),
            "Dimension mismatch: operator rows ({}) do not match vector rows ({}).",
            self.nrows(),
            input.nrows(),
        );
        assert_eq!(out.nrows(), self.ncols());

        match self.matrix {
            Matrix::Dense(a) => matmul(
                out.rb_mut(),
                Accum::Replace,
                a.transpose(),
                input,
                1.0,
                Par::Seq,
            ),
            Matrix::Sparse(a) => a.transpose_apply(out.rb_mut(), input, Par::Seq, stack),
        }

        if let Some(shift) = self.shift {
            zip!(out.rb_mut(), input).for_each(|unzip!(y, x)| *y += shift * *x);
        }
        if let Some(scale) = self.scale {
            zip!(out.rb_mut(), scale).for_each(|unzip!(y, s)| *y /= *s);
        }
    }
}
