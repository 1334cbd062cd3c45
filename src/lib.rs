//! Matrix-free ("partial assembly") evaluation of the diffusion operator
//! $-\nabla \cdot (c \nabla u)$ on tensor-product finite elements.
//!
//! Evaluation is split into two phases:
//!
//! - **Setup** ([`setup`]) precomputes, at every quadrature point of every element, the
//!   symmetric metric tensor $w_q \, c \, \det(J) J^{-1} J^{-T}$ from the element Jacobians.
//! - **Apply** ([`apply`], [`collocated`]) computes the action of the operator on a field with
//!   sum factorization, without ever forming an element matrix.
//!
//! The [`dispatch`] module routes both phases to a size- and backend-specialized kernel, and
//! [`operator::DiffusionOperator`] ties everything together.
//!
//! All buffers are flat slices with the first index running fastest. See [`view`] for the
//! accessors and the individual modules for the exact shapes.

pub mod accelerator;
pub mod apply;
pub mod basis;
pub mod coefficient;
pub mod collocated;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod operator;
pub mod qr;
pub mod setup;
pub mod view;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

pub use error::KernelError;

use nalgebra::RealField;

/// Scalar type supported by the kernels.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Number of independent entries of a symmetric `dim x dim` tensor.
///
/// This is the number of metric tensor slots stored per quadrature point: 3 in 2D, 6 in 3D.
pub const fn symmetric_entries(dim: usize) -> usize {
    (dim * (dim + 1)) / 2
}
