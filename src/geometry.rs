//! Per-quadrature-point Jacobians of the element maps.
use crate::error::{check_len, KernelError};
use crate::nalgebra::{DMatrix, Scalar};
use crate::view::View4;
use crate::Real;

/// Jacobians `J = dx/dxi` of the reference-to-physical map at every quadrature point of
/// every element.
///
/// The buffer has shape `(NQ, dim, dim, NE)` with the first index running fastest, so
/// `J(q, r, c, e)` is the derivative of physical coordinate `r` with respect to reference
/// coordinate `c` at point `q` of element `e`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureJacobians<T> {
    dim: usize,
    num_points: usize,
    num_elements: usize,
    data: Vec<T>,
}

impl<T: Scalar> QuadratureJacobians<T> {
    pub fn from_vec(dim: usize, num_points: usize, num_elements: usize, data: Vec<T>) -> Result<Self, KernelError> {
        check_len("jacobians", num_points * dim * dim * num_elements, data.len())?;
        Ok(Self {
            dim,
            num_points,
            num_elements,
            data,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn view(&self) -> View4<T> {
        View4::new(&self.data, [self.num_points, self.dim, self.dim, self.num_elements])
    }

    /// The Jacobian at point `q` of element `e`.
    pub fn jacobian(&self, element: usize, point: usize) -> DMatrix<T> {
        let view = self.view();
        DMatrix::from_fn(self.dim, self.dim, |r, c| view[[point, r, c, element]].clone())
    }
}

impl<T: Real> QuadratureJacobians<T> {
    /// Collects Jacobians from a function of `(element, point)`.
    ///
    /// # Panics
    ///
    /// Panics if the function returns a matrix that is not `dim x dim`.
    pub fn from_fn(
        dim: usize,
        num_points: usize,
        num_elements: usize,
        mut jacobian: impl FnMut(usize, usize) -> DMatrix<T>,
    ) -> Self {
        let mut data = vec![T::zero(); num_points * dim * dim * num_elements];
        for e in 0..num_elements {
            for q in 0..num_points {
                let j = jacobian(e, q);
                assert_eq!(j.shape(), (dim, dim), "Jacobian must be a dim x dim matrix");
                for c in 0..dim {
                    for r in 0..dim {
                        data[q + num_points * (r + dim * (c + dim * e))] = j[(r, c)];
                    }
                }
            }
        }
        Self {
            dim,
            num_points,
            num_elements,
            data,
        }
    }

    /// The same (affine) Jacobian at every point of every element.
    pub fn from_affine(dim: usize, num_points: usize, num_elements: usize, jacobian: &DMatrix<T>) -> Self {
        Self::from_fn(dim, num_points, num_elements, |_, _| jacobian.clone())
    }
}
