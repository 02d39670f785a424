//! Implicitly restarted Lanczos bidiagonalization (IRLB) for truncated SVDs.
//!
//! This crate computes a few of the largest singular values and vectors of a large
//! `m x n` linear operator without forming a full decomposition. The cost of a run is
//! governed by a small working subspace dimension `work`, not by `min(m, n)`: the
//! operator is only ever multiplied by vectors, forwards and transposed.
//!
//! Built on the [`faer`] linear algebra framework, the algorithm accepts dense matrices
//! ([`faer::MatRef`]) as well as any sparse or matrix-free operator implementing
//! [`faer::matrix_free::BiLinOp`], with optional implicit column scaling, diagonal shift
//! and mean-centering (see [`operator`]).
//!
//! ## Algorithm
//!
//! Golub-Kahan bidiagonalization builds orthonormal bases `V` (right) and `W` (left)
//! and a small upper-bidiagonal projection `B` with `A V = W B`. Once `work` columns are
//! available, the SVD of `B` yields Ritz approximations of the singular triplets of `A`.
//! Converged triplets are kept, the bases are compressed onto the most useful Ritz
//! directions, and the recurrence restarts from there until the `nu` leading triplets
//! have converged or the iteration budget is exhausted.
//!
//! Numerical orthogonality of the bases is maintained by classical Gram-Schmidt
//! re-orthogonalization ([`algorithms::orthogonalize`]).
//!
//! ## Example Usage
//!
//! ```rust
//! use faer::Mat;
//! use irlb::{IrlbOptions, Operator, Start, Status, compute_truncated_svd};
//!
//! // A 40 x 30 matrix with singular values 30, 29, ..., 1.
//! let a = Mat::from_fn(40, 30, |i, j| if i == j { (30 - j) as f64 } else { 0.0 });
//! let op = Operator::dense(a.as_ref());
//!
//! let options = IrlbOptions::new(3).with_maxit(1000).with_tol(1e-8);
//! let svd = compute_truncated_svd(&op, &options, Start::Random, None).unwrap();
//!
//! assert_eq!(svd.status, Status::Success);
//! assert!((svd.values[0] - 30.0).abs() < 1e-6);
//! assert!((svd.values[2] - 28.0).abs() < 1e-6);
//! ```
//!
//! ## Memory
//!
//! All working memory lives in an [`IrlbWorkspace`] allocated once per problem shape.
//! The driver ([`algorithms::bidiag::irlb`]) takes it by mutable reference and performs no
//! allocation inside its iteration loop.

pub mod algorithms;
pub mod cancel;
pub mod error;
pub mod operator;
pub mod options;
pub mod solvers;
pub mod utils;
pub mod workspace;

pub use algorithms::{RestartState, Start, TruncatedSvd, bidiag::irlb};
pub use cancel::CancellationToken;
pub use error::{IrlbError, Status};
pub use operator::{Direction, Matrix, Operator};
pub use options::IrlbOptions;
pub use solvers::{compute_truncated_svd, resume};
pub use workspace::IrlbWorkspace;
