//! Strategies for property-based testing with `proptest`.
use crate::dispatch::SPECIALIZED_PAIRS;
use crate::geometry::QuadratureJacobians;
use crate::nalgebra::DMatrix;
use ::proptest::collection::vec;
use ::proptest::prelude::*;

/// A `dim x dim` Jacobian close to a scaled identity, with positive determinant.
///
/// Off-diagonal and diagonal perturbations are small enough that the matrix is strictly
/// diagonally dominant with a positive diagonal.
pub fn well_conditioned_jacobian(dim: usize) -> impl Strategy<Value = DMatrix<f64>> {
    let perturbation = vec(-0.25..0.25, dim * dim);
    (0.5..2.0, perturbation).prop_map(move |(scale, perturbation)| {
        let p = DMatrix::from_vec(dim, dim, perturbation);
        (DMatrix::identity(dim, dim) + p) * scale
    })
}

/// Independent well-conditioned Jacobians at every point of every element.
///
/// The Jacobians vary from point to point, so they do not correspond to an affine map.
pub fn quadrature_jacobians(
    dim: usize,
    num_points: usize,
    num_elements: usize,
) -> impl Strategy<Value = QuadratureJacobians<f64>> {
    vec(well_conditioned_jacobian(dim), num_points * num_elements).prop_map(move |jacobians| {
        QuadratureJacobians::from_fn(dim, num_points, num_elements, |e, q| {
            jacobians[q + num_points * e].clone()
        })
    })
}

/// Element-local nodal values with entries in `[-1, 1]`.
pub fn nodal_field(len: usize) -> impl Strategy<Value = Vec<f64>> {
    vec(-1.0..=1.0, len)
}

/// `(dim, D1D, Q1D)` triplets with a size-specialized kernel.
pub fn specialized_sizes() -> impl Strategy<Value = (usize, usize, usize)> {
    (2..=3usize, 0..SPECIALIZED_PAIRS.len()).prop_map(|(dim, i)| {
        let (d1d, q1d) = SPECIALIZED_PAIRS[i];
        (dim, d1d, q1d)
    })
}
