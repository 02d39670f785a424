//! This module defines the error types and status codes for the library.
//!
//! Every terminal failure of the bidiagonalization driver is represented by a single
//! opaque error, [`IrlbError`], whose kind can be mapped onto the stable integer
//! [`Status`] codes used by callers that speak the numeric contract (bindings,
//! experiment runners, logs).
//!
//! Running out of iterations is *not* an error: a best-effort estimate is still
//! produced, and it is reported through [`Status::NotConverged`] on the result.
//!
//! Using the [`thiserror`] crate allows us to create idiomatic error types with minimal
//! boilerplate. Note that [`faer::linalg::svd::SvdError`] does not implement the standard
//! [`std::error::Error`] trait, so we wrap it manually to provide a compatible error type.
use thiserror::Error;

/// Represents all possible errors that can occur during a bidiagonalization run.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct IrlbError(#[from] IrlbErrorKind);

impl IrlbError {
    /// Returns the status code associated with this failure.
    pub fn status(&self) -> Status {
        match &self.0 {
            IrlbErrorKind::InvalidDimension(_)
            | IrlbErrorKind::InputError(_)
            | IrlbErrorKind::SvdError(_) => Status::InvalidDimension,
            IrlbErrorKind::NearNullSpace { .. } => Status::NearNullSpace,
            IrlbErrorKind::LinearDependence { .. } => Status::LinearDependence,
            IrlbErrorKind::ResourceExhaustion { .. } => Status::ResourceExhaustion,
            IrlbErrorKind::Aborted { .. } => Status::Aborted,
        }
    }

    /// Shorthand for `self.status().code()`.
    pub fn code(&self) -> i32 {
        self.status().code()
    }
}

/// Private enum containing the distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum IrlbErrorKind {
    /// The operator, basis or restart buffers have unusable dimensions.
    #[error("Invalid dimensions: {0}")]
    InvalidDimension(String),

    /// A parameter is outside of its admissible range.
    #[error("Invalid input parameter: {0}")]
    InputError(String),

    /// The starting vector is zero or lies (numerically) in the null space of the operator.
    #[error("Starting vector is near the null space of the operator (inner step {step}).")]
    NearNullSpace { step: usize },

    /// A basis vector collapsed during normalization; the Krylov subspace is invariant.
    #[error("Linear dependence detected at inner step {step} of sweep {sweep}.")]
    LinearDependence { step: usize, sweep: usize },

    /// A workspace buffer could not be allocated.
    #[error("Failed to allocate workspace buffer `{what}`.")]
    ResourceExhaustion { what: &'static str },

    /// The cancellation token fired.
    #[error("Computation aborted after {multiplies} operator products.")]
    Aborted { multiplies: usize },

    /// Wraps an error originating from [`faer`]'s SVD module.
    #[error("A numerical error occurred during the SVD of the projected matrix: {0:?}")]
    SvdError(faer::linalg::svd::SvdError),
}

// Manually implement PartialEq for the public error type.
impl PartialEq for IrlbError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Stable status codes reported by the driver.
///
/// The numeric values are part of the public contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    /// Invalid dimensions, degenerate parameters, or a failed projected SVD.
    InvalidDimension = -1,
    /// The iteration budget was exhausted; the result is a best-effort estimate.
    NotConverged = -2,
    /// A buffer could not be allocated.
    ResourceExhaustion = -3,
    NearNullSpace = -4,
    LinearDependence = -5,
    /// The caller requested cancellation.
    Aborted = -6,
}

impl Status {
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> i32 {
        status.code()
    }
}
