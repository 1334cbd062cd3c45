//! Integration point for third-party accelerated kernels.
//!
//! No accelerator ships with this crate. An implementation wraps an external kernel library
//! and is registered with [`crate::dispatch::KernelDispatcher::with_accelerator`]. It is only
//! used when [`crate::config::Backend::Accelerated`] is requested, the accelerator reports
//! itself available and it supports the problem sizes; otherwise the CPU kernels run.
use crate::apply::ApplyProblem;
use crate::error::KernelError;
use crate::setup::SetupProblem;
use crate::Real;

pub trait Accelerator<T: Real>: Send + Sync {
    /// A short name used in log messages.
    fn name(&self) -> &str;

    /// Whether the accelerator can currently run kernels.
    fn is_available(&self) -> bool;

    /// Whether kernels exist for the given dimension and 1D sizes.
    fn supports(&self, dim: usize, d1d: usize, q1d: usize) -> bool;

    /// Computes the metric tensor, overwriting `metric`.
    fn setup(&self, problem: &SetupProblem<T>, metric: &mut [T]) -> Result<(), KernelError>;

    /// Accumulates the operator action into `y`.
    fn apply(&self, problem: &ApplyProblem<T>, y: &mut [T]) -> Result<(), KernelError>;
}
