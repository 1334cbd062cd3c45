//! Apply kernels: the action of the diffusion operator by sum factorization.
//!
//! Every kernel computes `y += A x` element by element, where `A` is the element stiffness
//! matrix implied by the basis tables and the metric tensor produced by Setup. No element
//! matrix is ever formed. Instead, each element goes through three stages:
//!
//! 1. nodal values are turned into reference gradients at the quadrature points by
//!    successive 1D contractions, interpolating (`B`) along inactive axes and
//!    differentiating (`G`) along the active one,
//! 2. the gradient at each point is multiplied by the local metric tensor,
//! 3. the result is contracted back to the dofs with `B^T` and `G^T`, axis by axis, and
//!    added to the output.
//!
//! Two execution strategies compute the same result:
//!
//! - [`generic`]: one unit of work per element with private, stack-allocated scratch.
//! - [`tiled`]: cooperative thread blocks over groups of elements, staging basis tables
//!   and intermediate tensors in a shared scratch arena separated by barriers.
//!
//! Each strategy comes in size-specialized variants (dofs and quadrature points fixed at
//! compile time) and a runtime-sized variant bounded by [`MAX_D1D`] and [`MAX_Q1D`].
//!
//! Field buffers have shape `(D1D, D1D[, D1D], NE)` and the metric buffer has shape
//! `(NQ, S, NE)`, see [`crate::setup`].
use crate::basis::BasisTables;
use crate::error::{check_len, KernelError};
use crate::{symmetric_entries, Real};

pub mod generic;
pub mod scratch;
pub mod thread_block;
pub mod tiled;

/// Maximum number of 1D dofs supported by the runtime-sized kernels.
pub const MAX_D1D: usize = 14;

/// Maximum number of 1D quadrature points supported by the runtime-sized kernels.
pub const MAX_Q1D: usize = 14;

/// Signature shared by every Apply kernel.
///
/// The output is accumulated into, never overwritten.
pub type ApplyKernel<T> = fn(&ApplyProblem<T>, &mut [T]) -> Result<(), KernelError>;

/// The inputs of an Apply call.
#[derive(Debug, Clone, Copy)]
pub struct ApplyProblem<'a, T: Real> {
    pub dim: usize,
    pub d1d: usize,
    pub q1d: usize,
    pub num_elements: usize,
    pub basis: &'a BasisTables<T>,
    /// Metric tensor, shape `(NQ, S, NE)`.
    pub metric: &'a [T],
    /// Input field, shape `(D1D, ..., NE)`.
    pub input: &'a [T],
    /// Number of elements per block of the tiled 2D kernels. Ignored by other kernels.
    pub batch_size: Option<usize>,
}

impl<'a, T: Real> ApplyProblem<'a, T> {
    /// Creates a problem, taking the 1D sizes from the basis tables.
    pub fn new(dim: usize, num_elements: usize, basis: &'a BasisTables<T>, metric: &'a [T], input: &'a [T]) -> Self {
        Self {
            dim,
            d1d: basis.dofs_1d(),
            q1d: basis.quadrature_points_1d(),
            num_elements,
            basis,
            metric,
            input,
            batch_size: None,
        }
    }

    pub fn with_batch_size(self, batch_size: Option<usize>) -> Self {
        Self { batch_size, ..self }
    }

    pub fn element_dofs(&self) -> usize {
        self.d1d.pow(self.dim as u32)
    }

    pub fn num_points(&self) -> usize {
        self.q1d.pow(self.dim as u32)
    }

    /// Verifies dimension, table shapes and buffer sizes, including the output length.
    pub fn check(&self, output_len: usize) -> Result<(), KernelError> {
        if !(2..=3).contains(&self.dim) {
            return Err(KernelError::UnsupportedDimension { dim: self.dim });
        }
        if self.d1d == 0 || self.q1d == 0 {
            return Err(KernelError::EmptyBasis);
        }
        self.basis.check_shape(self.d1d, self.q1d)?;
        let ne = self.num_elements;
        check_len(
            "metric",
            self.num_points() * symmetric_entries(self.dim) * ne,
            self.metric.len(),
        )?;
        check_len("input", self.element_dofs() * ne, self.input.len())?;
        check_len("output", self.element_dofs() * ne, output_len)
    }
}

pub(crate) fn require_dim<T: Real>(problem: &ApplyProblem<T>, dim: usize) -> Result<(), KernelError> {
    if problem.dim == dim {
        Ok(())
    } else {
        Err(KernelError::UnsupportedDimension { dim: problem.dim })
    }
}

/// Verifies that the problem fits into storage sized for `MD` dofs and `MQ` points.
pub(crate) fn check_capacity<const MD: usize, const MQ: usize>(d1d: usize, q1d: usize) -> Result<(), KernelError> {
    if d1d > MD {
        return Err(KernelError::DofsExceedMaximum { d1d, max: MD });
    }
    if q1d > MQ {
        return Err(KernelError::QuadratureExceedsMaximum { q1d, max: MQ });
    }
    Ok(())
}

/// Verifies that a specialized kernel is called with exactly the sizes it was built for.
pub(crate) fn check_exact<const D: usize, const Q: usize>(
    problem: &ApplyProblem<impl Real>,
) -> Result<(), KernelError> {
    if problem.d1d == D && problem.q1d == Q {
        Ok(())
    } else {
        Err(KernelError::UnknownKernel {
            dim: problem.dim,
            d1d: problem.d1d,
            q1d: problem.q1d,
        })
    }
}
