//! Test helpers: dense reference computations that do not rely on sum factorization.
use nalgebra::{DMatrix, DVector};

/// Asserts that two slices agree entrywise up to an absolute tolerance.
#[macro_export]
macro_rules! assert_slices_approx_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let x: &[f64] = &$x;
        let y: &[f64] = &$y;
        assert_eq!(x.len(), y.len(), "slices have different lengths");
        let max_absdiff = x
            .iter()
            .zip(y)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        if !(max_absdiff <= $tol) {
            panic!(
                "slices differ by {:e} (abstol {:e})\nleft: {:?}\nright: {:?}",
                max_absdiff, $tol, x, y
            );
        }
    }};
}

/// Decomposes a tensor-product index `i = i0 + n * (i1 + n * i2)` into per-axis indices.
pub fn tensor_index(dim: usize, n: usize, mut i: usize) -> [usize; 3] {
    let mut index = [0; 3];
    for k in 0..dim {
        index[k] = i % n;
        i /= n;
    }
    index
}

/// Reference gradients of all tensor-product basis functions at quadrature point `q`.
///
/// Returns a `dim x D1D^dim` matrix whose column `i` is the gradient of basis function `i`.
pub fn reference_gradients(dim: usize, b: &DMatrix<f64>, g: &DMatrix<f64>, q: usize) -> DMatrix<f64> {
    let (q1d, d1d) = b.shape();
    let nd = d1d.pow(dim as u32);
    let qi = tensor_index(dim, q1d, q);
    DMatrix::from_fn(dim, nd, |axis, i| {
        let di = tensor_index(dim, d1d, i);
        (0..dim)
            .map(|k| {
                if k == axis {
                    g[(qi[k], di[k])]
                } else {
                    b[(qi[k], di[k])]
                }
            })
            .product()
    })
}

/// Expands the packed metric of a point (slot orders `11, 12, 22` and
/// `11, 12, 13, 22, 23, 33`) into a full symmetric matrix.
pub fn full_metric(dim: usize, entries: &[f64]) -> DMatrix<f64> {
    let slots: &[(usize, usize)] = if dim == 2 {
        &[(0, 0), (0, 1), (1, 1)]
    } else {
        &[(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]
    };
    let mut d = DMatrix::zeros(dim, dim);
    for (&value, &(r, c)) in entries.iter().zip(slots) {
        d[(r, c)] = value;
        d[(c, r)] = value;
    }
    d
}

/// The metric `w c det(J) J^{-1} J^{-T}` computed with a general matrix inverse.
pub fn dense_metric(weight: f64, coefficient: f64, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
    let det = jacobian.determinant();
    let j_inv = jacobian
        .clone()
        .try_inverse()
        .expect("reference metric requires an invertible Jacobian");
    &j_inv * j_inv.transpose() * (weight * coefficient * det)
}

/// The dense stiffness matrix of element `e`, `A_ij = sum_q grad phi_i^T D_q grad phi_j`.
///
/// `metric` has shape `(NQ, S, NE)`.
pub fn dense_element_matrix(dim: usize, b: &DMatrix<f64>, g: &DMatrix<f64>, metric: &[f64], e: usize) -> DMatrix<f64> {
    let (q1d, d1d) = b.shape();
    let nq = q1d.pow(dim as u32);
    let nd = d1d.pow(dim as u32);
    let s = dim * (dim + 1) / 2;
    let mut a = DMatrix::zeros(nd, nd);
    for q in 0..nq {
        let entries: Vec<f64> = (0..s).map(|slot| metric[q + nq * (slot + s * e)]).collect();
        let d = full_metric(dim, &entries);
        let grads = reference_gradients(dim, b, g, q);
        a += grads.transpose() * d * &grads;
    }
    a
}

/// Accumulates the dense reference action of every element into `y`.
pub fn dense_apply(dim: usize, b: &DMatrix<f64>, g: &DMatrix<f64>, metric: &[f64], x: &[f64], y: &mut [f64]) {
    let nd = b.ncols().pow(dim as u32);
    for (e, (x, y)) in x.chunks(nd).zip(y.chunks_mut(nd)).enumerate() {
        let a = dense_element_matrix(dim, b, g, metric, e);
        let ax = a * DVector::from_column_slice(x);
        for (y_i, ax_i) in y.iter_mut().zip(ax.iter()) {
            *y_i += ax_i;
        }
    }
}

pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len());
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// A deterministic, well-spread sequence of values in `[-1, 1]`.
pub fn pseudo_random(i: usize, seed: usize) -> f64 {
    let t = (i as f64 + 1.0) * 12.9898 + (seed as f64 + 1.0) * 78.233;
    let s = t.sin() * 43758.5453;
    2.0 * (s - s.floor()) - 1.0
}

/// A field of `len` pseudo-random values.
pub fn pseudo_random_field(len: usize, seed: usize) -> Vec<f64> {
    (0..len).map(|i| pseudo_random(i, seed)).collect()
}

/// A non-affine, invertible Jacobian that varies with the element and the point.
///
/// The perturbation of the identity is small enough for the matrix to stay diagonally
/// dominant.
pub fn distorted_jacobian(dim: usize, element: usize, point: usize) -> DMatrix<f64> {
    let scale = 1.0 + 0.25 * pseudo_random(element, 7);
    DMatrix::from_fn(dim, dim, |r, c| {
        let perturbation = 0.2 * pseudo_random(point * dim * dim + r + dim * c, element + 11);
        if r == c {
            scale * (1.0 + perturbation)
        } else {
            scale * perturbation
        }
    })
}
