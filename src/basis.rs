//! One-dimensional basis tables shared by every element.
//!
//! The kernels assume a single tensor-product topology: every element uses the same 1D
//! interpolation matrix `B` and derivative matrix `G`, both of shape `Q1D x D1D` with
//! `B(q, d) = phi_d(xi_q)` and `G(q, d) = phi_d'(xi_q)`.
//!
//! Tables are stored as column-major [`DMatrix`], so the underlying slices are exactly the
//! "quadrature index fastest" layout consumed by the kernels.
use crate::error::KernelError;
use crate::nalgebra::{convert, DMatrix, Scalar};
use crate::view::View2;
use crate::Real;
use fenris_pa_basis::lagrange::LagrangeBasis1d;
use fenris_pa_basis::tensor::tensor_weights;
use fenris_pa_basis::univariate::{try_gauss, try_gauss_lobatto};
use fenris_pa_basis::{to_unit_interval, Rule1d};

pub use fenris_pa_basis::Error as BasisError;

/// Interpolation and derivative tables together with their transposes.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisTables<T: Scalar> {
    b: DMatrix<T>,
    g: DMatrix<T>,
    bt: DMatrix<T>,
    gt: DMatrix<T>,
}

impl<T: Real> BasisTables<T> {
    /// Creates tables from `Q1D x D1D` interpolation and derivative matrices.
    pub fn from_matrices(b: DMatrix<T>, g: DMatrix<T>) -> Result<Self, KernelError> {
        if b.shape() != g.shape() {
            return Err(KernelError::BasisShapeMismatch {
                expected: b.shape(),
                actual: g.shape(),
            });
        }
        let bt = b.transpose();
        let gt = g.transpose();
        Ok(Self { b, g, bt, gt })
    }

    /// Lagrange basis with `d1d` Gauss-Lobatto nodes, tabulated at `q1d` Gauss points of the
    /// unit interval.
    ///
    /// This is the customary choice for high-order continuous elements.
    pub fn gauss_lobatto_gauss(d1d: usize, q1d: usize) -> Result<Self, KernelError> {
        let (_, nodes) = to_unit_interval(try_gauss_lobatto(d1d)?);
        let (_, points) = to_unit_interval(try_gauss(q1d)?);
        Self::lagrange(nodes, &points)
    }

    /// Lagrange basis with the given nodes, tabulated at the given points.
    pub fn lagrange(nodes: Vec<f64>, points: &[f64]) -> Result<Self, KernelError> {
        let d1d = nodes.len();
        let q1d = points.len();
        let basis = LagrangeBasis1d::from_nodes(nodes)?;
        let (b, g) = basis.tables(points);
        let b = DMatrix::from_iterator(q1d, d1d, b.into_iter().map(convert));
        let g = DMatrix::from_iterator(q1d, d1d, g.into_iter().map(convert));
        Self::from_matrices(b, g)
    }
}

impl<T: Scalar> BasisTables<T> {
    pub fn dofs_1d(&self) -> usize {
        self.b.ncols()
    }

    pub fn quadrature_points_1d(&self) -> usize {
        self.b.nrows()
    }

    pub fn b(&self) -> &DMatrix<T> {
        &self.b
    }

    pub fn g(&self) -> &DMatrix<T> {
        &self.g
    }

    pub fn bt(&self) -> &DMatrix<T> {
        &self.bt
    }

    pub fn gt(&self) -> &DMatrix<T> {
        &self.gt
    }

    /// `B` as a `(Q1D, D1D)` view.
    pub fn b_view(&self) -> View2<T> {
        View2::new(self.b.as_slice(), [self.b.nrows(), self.b.ncols()])
    }

    /// `G` as a `(Q1D, D1D)` view.
    pub fn g_view(&self) -> View2<T> {
        View2::new(self.g.as_slice(), [self.g.nrows(), self.g.ncols()])
    }

    /// `B^T` as a `(D1D, Q1D)` view.
    pub fn bt_view(&self) -> View2<T> {
        View2::new(self.bt.as_slice(), [self.bt.nrows(), self.bt.ncols()])
    }

    /// `G^T` as a `(D1D, Q1D)` view.
    pub fn gt_view(&self) -> View2<T> {
        View2::new(self.gt.as_slice(), [self.gt.nrows(), self.gt.ncols()])
    }

    /// Checks that the tables have the given sizes.
    pub fn check_shape(&self, d1d: usize, q1d: usize) -> Result<(), KernelError> {
        if self.b.shape() == (q1d, d1d) {
            Ok(())
        } else {
            Err(KernelError::BasisShapeMismatch {
                expected: (q1d, d1d),
                actual: self.b.shape(),
            })
        }
    }
}

fn convert_rule<T: Real>(rule: Rule1d) -> (Vec<T>, Vec<T>) {
    let (weights, points) = rule;
    (
        weights.into_iter().map(convert).collect(),
        points.into_iter().map(convert).collect(),
    )
}

/// Gauss rule with `q1d` points on the unit interval, as `(weights, points)`.
pub fn gauss_unit_interval<T: Real>(q1d: usize) -> Result<(Vec<T>, Vec<T>), KernelError> {
    Ok(convert_rule(to_unit_interval(try_gauss(q1d)?)))
}

/// Tensor-product Gauss weights for the unit square (`dim == 2`) or cube (`dim == 3`).
///
/// Weights are ordered as `q = qx + Q1D * (qy + Q1D * qz)`.
pub fn quadrature_weights<T: Real>(dim: usize, q1d: usize) -> Result<Vec<T>, KernelError> {
    if !(2..=3).contains(&dim) {
        return Err(KernelError::UnsupportedDimension { dim });
    }
    let (w1d, _) = to_unit_interval(try_gauss(q1d)?);
    Ok(tensor_weights(&w1d, dim).into_iter().map(convert).collect())
}
