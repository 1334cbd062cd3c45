//! Errors reported by the partial assembly kernels.
use std::fmt;
use std::fmt::{Display, Formatter};

/// Library-wide error type.
///
/// With the exception of [`KernelError::UnknownKernel`], every variant is a precondition
/// violation ("verification error") detected before any work is started. No kernel ever
/// fails halfway through: if a call returns an error, its output buffers are untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KernelError {
    /// Only two- and three-dimensional elements are supported.
    UnsupportedDimension { dim: usize },
    /// The number of 1D degrees of freedom exceeds what the kernel was compiled for.
    DofsExceedMaximum { d1d: usize, max: usize },
    /// The number of 1D quadrature points exceeds what the kernel was compiled for.
    QuadratureExceedsMaximum { q1d: usize, max: usize },
    /// Only spatially constant coefficients are supported.
    NonConstantCoefficient,
    /// A buffer does not have the length implied by the problem dimensions.
    BufferSizeMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The basis has no dofs or no quadrature points.
    EmptyBasis,
    /// The basis tables are inconsistent with each other or with the requested sizes.
    BasisShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// The 1D quadrature rule or basis could not be constructed.
    Basis(fenris_pa_basis::Error),
    /// The collocated gradient requires at least as many quadrature points as dofs.
    InsufficientQuadrature { d1d: usize, q1d: usize },
    /// The collocated gradient kernel is only available for a fixed set of sizes.
    UnsupportedCollocatedPair { d1d: usize, q1d: usize },
    /// A third-party accelerator rejected a call.
    AcceleratorFailure(String),
    /// No kernel matches the requested configuration and no fallback is permitted.
    UnknownKernel { dim: usize, d1d: usize, q1d: usize },
}

impl KernelError {
    /// Whether the error is a failed precondition check, as opposed to an unreachable
    /// dispatch.
    pub fn is_verification(&self) -> bool {
        !matches!(self, Self::UnknownKernel { .. } | Self::AcceleratorFailure(_))
    }
}

impl Display for KernelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDimension { dim } => {
                write!(f, "dimension {dim} is not supported, only 2D and 3D elements are")
            }
            Self::DofsExceedMaximum { d1d, max } => {
                write!(f, "number of 1D dofs ({d1d}) exceeds the supported maximum ({max})")
            }
            Self::QuadratureExceedsMaximum { q1d, max } => write!(
                f,
                "number of 1D quadrature points ({q1d}) exceeds the supported maximum ({max})"
            ),
            Self::NonConstantCoefficient => write!(f, "only constant coefficients are supported"),
            Self::BufferSizeMismatch {
                buffer,
                expected,
                actual,
            } => write!(f, "buffer `{buffer}` has length {actual}, expected {expected}"),
            Self::EmptyBasis => write!(f, "basis must have at least one dof and one quadrature point"),
            Self::BasisShapeMismatch { expected, actual } => write!(
                f,
                "basis table has shape {}x{}, expected {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            Self::InsufficientQuadrature { d1d, q1d } => write!(
                f,
                "collocated gradient needs at least as many quadrature points as dofs (D1D = {d1d}, Q1D = {q1d})"
            ),
            Self::UnsupportedCollocatedPair { d1d, q1d } => write!(
                f,
                "no collocated gradient kernel is available for D1D = {d1d}, Q1D = {q1d}"
            ),
            Self::Basis(err) => write!(f, "failed to construct basis tables: {err}"),
            Self::AcceleratorFailure(msg) => write!(f, "accelerator failure: {msg}"),
            Self::UnknownKernel { dim, d1d, q1d } => {
                write!(f, "unknown kernel for dim = {dim}, D1D = {d1d}, Q1D = {q1d}")
            }
        }
    }
}

impl std::error::Error for KernelError {}

impl From<fenris_pa_basis::Error> for KernelError {
    fn from(err: fenris_pa_basis::Error) -> Self {
        Self::Basis(err)
    }
}

/// Checks that a buffer has exactly the expected length.
pub(crate) fn check_len(buffer: &'static str, expected: usize, actual: usize) -> Result<(), KernelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(KernelError::BufferSizeMismatch {
            buffer,
            expected,
            actual,
        })
    }
}
