//! Setup kernels: geometry to metric tensor.
//!
//! At every quadrature point `q` of every element, Setup computes the symmetric tensor
//!
//! <div>$$
//! D_q = w_q \, c \, \det(J) \, J^{-1} J^{-T} = \frac{w_q \, c}{\det(J)} \operatorname{adj}(J) \operatorname{adj}(J)^T,
//! $$</div>
//!
//! and stores its upper triangle compactly. The slot order is fixed by
//! [`METRIC_SLOTS_2D`] and [`METRIC_SLOTS_3D`] and shared with every Apply kernel.
//!
//! The metric buffer has shape `(NQ, S, NE)` with `S = 3` in 2D and `S = 6` in 3D.
//!
//! Mesh quality is not validated: a (near-)singular Jacobian produces non-finite entries.
use crate::coefficient::Coefficient;
use crate::error::{check_len, KernelError};
use crate::nalgebra::DMatrix;
use crate::symmetric_entries;
use crate::view::{View2Mut, View3};
use crate::Real;
use itertools::izip;
use log::debug;
use rayon::prelude::*;

/// `(row, col)` of each stored metric entry in 2D.
pub const METRIC_SLOTS_2D: [(usize, usize); 3] = [(0, 0), (0, 1), (1, 1)];

/// `(row, col)` of each stored metric entry in 3D.
pub const METRIC_SLOTS_3D: [(usize, usize); 6] = [(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)];

/// The inputs of a Setup call.
#[derive(Debug, Clone, Copy)]
pub struct SetupProblem<'a, T> {
    pub dim: usize,
    pub q1d: usize,
    pub num_elements: usize,
    /// Quadrature weights, `Q1D^dim` entries.
    pub weights: &'a [T],
    /// Jacobians, shape `(NQ, dim, dim, NE)`.
    pub jacobians: &'a [T],
    /// The (constant) coefficient.
    pub coefficient: T,
}

impl<'a, T: Real> SetupProblem<'a, T> {
    /// Assembles a problem, resolving the coefficient to its constant value.
    pub fn new(
        dim: usize,
        q1d: usize,
        num_elements: usize,
        weights: &'a [T],
        jacobians: &'a [T],
        coefficient: &impl Coefficient<T>,
    ) -> Result<Self, KernelError> {
        let coefficient = coefficient
            .constant_value()
            .ok_or(KernelError::NonConstantCoefficient)?;
        Ok(Self {
            dim,
            q1d,
            num_elements,
            weights,
            jacobians,
            coefficient,
        })
    }

    pub fn num_points(&self) -> usize {
        self.q1d.pow(self.dim as u32)
    }

    /// Length of the metric buffer produced by this problem.
    pub fn metric_len(&self) -> usize {
        self.num_points() * symmetric_entries(self.dim) * self.num_elements
    }

    /// Verifies dimension and buffer sizes, including the output buffer length.
    pub fn check(&self, metric_len: usize) -> Result<(), KernelError> {
        if !(2..=3).contains(&self.dim) {
            return Err(KernelError::UnsupportedDimension { dim: self.dim });
        }
        if self.q1d == 0 {
            return Err(KernelError::EmptyBasis);
        }
        let nq = self.num_points();
        check_len("weights", nq, self.weights.len())?;
        check_len("jacobians", nq * self.dim * self.dim * self.num_elements, self.jacobians.len())?;
        check_len("metric", self.metric_len(), metric_len)
    }
}

/// Runs the CPU Setup kernel matching the problem dimension.
///
/// The metric buffer is overwritten, not accumulated into.
pub fn setup<T: Real>(problem: &SetupProblem<T>, metric: &mut [T]) -> Result<(), KernelError> {
    problem.check(metric.len())?;
    debug!(
        "Running {}D diffusion setup for {} elements with Q1D = {}",
        problem.dim, problem.num_elements, problem.q1d
    );
    match problem.dim {
        2 => setup_2d(problem, metric),
        3 => setup_3d(problem, metric),
        dim => return Err(KernelError::UnsupportedDimension { dim }),
    }
    Ok(())
}

fn setup_2d<T: Real>(problem: &SetupProblem<T>, metric: &mut [T]) {
    let nq = problem.num_points();
    let coeff = problem.coefficient;
    let weights = problem.weights;
    metric
        .par_chunks_mut(3 * nq)
        .zip(problem.jacobians.par_chunks(4 * nq))
        .for_each(|(y, j)| {
            let j = View3::new(j, [nq, 2, 2]);
            let mut y = View2Mut::new(y, [nq, 3]);
            for (q, &w) in weights.iter().enumerate() {
                let j11 = j[[q, 0, 0]];
                let j21 = j[[q, 1, 0]];
                let j12 = j[[q, 0, 1]];
                let j22 = j[[q, 1, 1]];
                let c_det_j = w * coeff / (j11 * j22 - j21 * j12);
                y[[q, 0]] = c_det_j * (j12 * j12 + j22 * j22);
                y[[q, 1]] = -c_det_j * (j12 * j11 + j22 * j21);
                y[[q, 2]] = c_det_j * (j11 * j11 + j21 * j21);
            }
        });
}

fn setup_3d<T: Real>(problem: &SetupProblem<T>, metric: &mut [T]) {
    let nq = problem.num_points();
    let coeff = problem.coefficient;
    let weights = problem.weights;
    metric
        .par_chunks_mut(6 * nq)
        .zip(problem.jacobians.par_chunks(9 * nq))
        .for_each(|(y, j)| {
            let j = View3::new(j, [nq, 3, 3]);
            let mut y = View2Mut::new(y, [nq, 6]);
            for (q, &w) in weights.iter().enumerate() {
                let j11 = j[[q, 0, 0]];
                let j21 = j[[q, 1, 0]];
                let j31 = j[[q, 2, 0]];
                let j12 = j[[q, 0, 1]];
                let j22 = j[[q, 1, 1]];
                let j32 = j[[q, 2, 1]];
                let j13 = j[[q, 0, 2]];
                let j23 = j[[q, 1, 2]];
                let j33 = j[[q, 2, 2]];
                let det_j = j11 * (j22 * j33 - j32 * j23) - j21 * (j12 * j33 - j32 * j13)
                    + j31 * (j12 * j23 - j22 * j13);
                let c_det_j = w * coeff / det_j;
                // adj(J)
                let a11 = j22 * j33 - j23 * j32;
                let a12 = j32 * j13 - j12 * j33;
                let a13 = j12 * j23 - j22 * j13;
                let a21 = j31 * j23 - j21 * j33;
                let a22 = j11 * j33 - j13 * j31;
                let a23 = j21 * j13 - j11 * j23;
                let a31 = j21 * j32 - j31 * j22;
                let a32 = j31 * j12 - j11 * j32;
                let a33 = j11 * j22 - j12 * j21;
                // det(J) J^{-1} J^{-T} = adj(J) adj(J)^T / det(J)
                let rows = [[a11, a12, a13], [a21, a22, a23], [a31, a32, a33]];
                for (slot, &(r, c)) in METRIC_SLOTS_3D.iter().enumerate() {
                    let (u, v) = (&rows[r], &rows[c]);
                    y[[q, slot]] = c_det_j * (u[0] * v[0] + u[1] * v[1] + u[2] * v[2]);
                }
            }
        });
}

/// Expands the packed metric entries of a single quadrature point into a full symmetric
/// matrix.
///
/// # Panics
///
/// Panics if the number of entries is neither 3 nor 6.
pub fn unpack_metric<T: Real>(entries: &[T]) -> DMatrix<T> {
    let slots: &[(usize, usize)] = match entries.len() {
        3 => &METRIC_SLOTS_2D,
        6 => &METRIC_SLOTS_3D,
        n => panic!("{n} is not a valid number of symmetric metric entries"),
    };
    let dim = if entries.len() == 3 { 2 } else { 3 };
    let mut matrix = DMatrix::zeros(dim, dim);
    for (&value, &(r, c)) in izip!(entries, slots) {
        matrix[(r, c)] = value;
        matrix[(c, r)] = value;
    }
    matrix
}

/// Gathers the packed metric entries at point `q` of element `e` from a metric buffer.
pub fn metric_entries_at<T: Real>(dim: usize, num_points: usize, metric: &[T], element: usize, q: usize) -> Vec<T> {
    let s = symmetric_entries(dim);
    let view = View3::new(metric, [num_points, s, metric.len() / (num_points * s)]);
    (0..s).map(|slot| view[[q, slot, element]]).collect()
}
