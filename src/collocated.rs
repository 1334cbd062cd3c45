//! The collocated-gradient formulation of the 3D Apply phase.
//!
//! Instead of differentiating nodal values directly, the field is first interpolated to the
//! quadrature points, where a square `Q1D x Q1D` differentiation matrix `C` (the collocated
//! gradient) takes the place of `G`. It is constructed from the basis tables so that
//! `C B = G`, which makes both formulations compute the same operator.
//!
//! Only a fixed set of `(D1D, Q1D)` pairs is compiled, see [`COLLOCATED_PAIRS`].
use crate::apply::thread_block::ThreadBlock;
use crate::apply::{check_exact, require_dim, ApplyProblem};
use crate::basis::BasisTables;
use crate::dispatch::kernel_key;
use crate::error::KernelError;
use crate::nalgebra::DMatrix;
use crate::qr::HouseholderQr;
use crate::view::{View2, View3, View3Mut};
use crate::Real;
use log::trace;
use rayon::prelude::*;

/// Signature of a collocated Apply kernel. The output is accumulated into.
pub type CollocatedKernel<T> = fn(&ApplyProblem<T>, &DMatrix<T>, &mut [T]) -> Result<(), KernelError>;

/// `(D1D, Q1D)` pairs for which a collocated kernel exists.
pub const COLLOCATED_PAIRS: [(usize, usize); 8] = [(2, 3), (3, 4), (4, 5), (5, 6), (6, 7), (7, 8), (8, 9), (14, 15)];

/// Builds the `Q1D x Q1D` collocated gradient `C` with `C B = G`.
///
/// With `B = Q [R; 0]`, the matrix `[G R^{-1}, 0] Q^T` satisfies the identity. `R` is
/// inverted by forward substitution row by row.
pub fn collocated_gradient<T: Real>(basis: &BasisTables<T>) -> Result<DMatrix<T>, KernelError> {
    let (q1d, d1d) = basis.b().shape();
    if d1d == 0 || q1d == 0 {
        return Err(KernelError::EmptyBasis);
    }
    let qr = HouseholderQr::factor(basis.b().clone())?;
    let r = qr.packed();
    let g = basis.g();

    let mut colograd = DMatrix::zeros(q1d, q1d);
    for i in 0..q1d {
        for j in 0..d1d {
            let mut value = g[(i, j)];
            for k in 0..j {
                value -= r[(k, j)] * colograd[(i, k)];
            }
            colograd[(i, j)] = value / r[(j, j)];
        }
    }
    qr.mul_q_transpose_right(&mut colograd);

    trace!("Built {q1d}x{q1d} collocated gradient for D1D = {d1d}");
    Ok(colograd)
}

/// Whether a collocated kernel is compiled for the given sizes.
pub fn is_supported(d1d: usize, q1d: usize) -> bool {
    COLLOCATED_PAIRS.contains(&(d1d, q1d))
}

/// Looks up the collocated kernel for the given sizes.
pub fn collocated_kernel<T: Real>(d1d: usize, q1d: usize) -> Option<CollocatedKernel<T>> {
    let kernel: CollocatedKernel<T> = match kernel_key(d1d, q1d)? {
        0x23 => apply_3d::<T, 2, 3>,
        0x34 => apply_3d::<T, 3, 4>,
        0x45 => apply_3d::<T, 4, 5>,
        0x56 => apply_3d::<T, 5, 6>,
        0x67 => apply_3d::<T, 6, 7>,
        0x78 => apply_3d::<T, 7, 8>,
        0x89 => apply_3d::<T, 8, 9>,
        0xEF => apply_3d::<T, 14, 15>,
        _ => return None,
    };
    Some(kernel)
}

/// Collocated 3D kernel for exactly `D` dofs and `Q` points per direction.
pub fn apply_3d<T: Real, const D: usize, const Q: usize>(
    problem: &ApplyProblem<T>,
    colograd: &DMatrix<T>,
    y: &mut [T],
) -> Result<(), KernelError> {
    problem.check(y.len())?;
    require_dim(problem, 3)?;
    check_exact::<D, Q>(problem)?;
    if colograd.shape() != (Q, Q) {
        return Err(KernelError::BasisShapeMismatch {
            expected: (Q, Q),
            actual: colograd.shape(),
        });
    }
    trace!(
        "Collocated 3D apply (D1D = {}, Q1D = {}) on {} elements",
        D,
        Q,
        problem.num_elements
    );

    let interp = problem.basis.b_view();
    y.par_chunks_mut(D * D * D)
        .zip(problem.input.par_chunks(D * D * D))
        .zip(problem.metric.par_chunks(6 * Q * Q * Q))
        .for_each(|((y, x), op)| apply_element::<T, D, Q>(interp, colograd, x, op, y));
    Ok(())
}

fn apply_element<T: Real, const D: usize, const Q: usize>(
    interp: View2<T>,
    colograd: &DMatrix<T>,
    x: &[T],
    op: &[T],
    y: &mut [T],
) {
    let x = View3::new(x, [D, D, D]);
    let op = View2::new(op, [Q * Q * Q, 6]);
    let mut y = View3Mut::new(y, [D, D, D]);
    let mut block = ThreadBlock::new([Q, Q, 1]);

    // Shared: s_d[a][b] = C(a, b), s_i[q][d] = B(q, d), s_iq[k][j][i]
    let mut s_d = [[T::zero(); Q]; Q];
    let mut s_i = [[T::zero(); D]; Q];
    let mut s_iq = [[[T::zero(); Q]; Q]; Q];
    let mut s_gqr = [[T::zero(); Q]; Q];
    let mut s_gqs = [[T::zero(); Q]; Q];
    // Per worker (i, j), indexed [j][i]
    let mut r_q = [[[T::zero(); D]; Q]; Q];
    let mut r_aq = [[[T::zero(); Q]; Q]; Q];
    let mut r_qt = [[T::zero(); Q]; Q];

    block.foreach_xy(Q, Q, |i, j| {
        s_d[j][i] = colograd[(j, i)];
        if i < D {
            s_i[j][i] = interp[[j, i]];
        }
        if i < D && j < D {
            for k in 0..D {
                r_q[j][i][k] = x[[i, j, k]];
            }
        }
    });
    block.sync();

    // Interpolate to the quadrature points along z, y, then x
    block.foreach_xy(Q, Q, |a, b| {
        if a < D && b < D {
            for k in 0..Q {
                let mut res = T::zero();
                for c in 0..D {
                    res += s_i[k][c] * r_q[b][a][c];
                }
                s_iq[k][b][a] = res;
            }
        }
    });
    block.sync();

    block.foreach_xy(Q, Q, |a, k| {
        if a < D {
            let mut column = [T::zero(); D];
            for b in 0..D {
                column[b] = s_iq[k][b][a];
            }
            for j in 0..Q {
                let mut res = T::zero();
                for b in 0..D {
                    res += s_i[j][b] * column[b];
                }
                s_iq[k][j][a] = res;
            }
        }
    });
    block.sync();

    block.foreach_xy(Q, Q, |j, k| {
        let mut row = [T::zero(); D];
        row.copy_from_slice(&s_iq[k][j][..D]);
        for i in 0..Q {
            let mut res = T::zero();
            for a in 0..D {
                res += s_i[i][a] * row[a];
            }
            s_iq[k][j][i] = res;
        }
    });

    // Layer by layer: differentiate, apply the metric, and accumulate the transposed
    // derivatives into the per-worker column r_aq
    for k in 0..Q {
        block.sync();
        block.foreach_xy(Q, Q, |i, j| {
            let mut qr = T::zero();
            let mut qs = T::zero();
            let mut qt = T::zero();
            for m in 0..Q {
                qr += s_d[i][m] * s_iq[k][j][m];
                qs += s_d[j][m] * s_iq[k][m][i];
                qt += s_d[k][m] * s_iq[m][j][i];
            }
            let q = i + Q * (j + Q * k);
            let g00 = op[[q, 0]];
            let g01 = op[[q, 1]];
            let g02 = op[[q, 2]];
            let g11 = op[[q, 3]];
            let g12 = op[[q, 4]];
            let g22 = op[[q, 5]];
            s_gqr[j][i] = g00 * qr + g01 * qs + g02 * qt;
            s_gqs[j][i] = g01 * qr + g11 * qs + g12 * qt;
            r_qt[j][i] = g02 * qr + g12 * qs + g22 * qt;
        });
        block.sync();
        block.foreach_xy(Q, Q, |i, j| {
            let mut aq = T::zero();
            for m in 0..Q {
                aq += s_d[m][i] * s_gqr[j][m];
                aq += s_d[m][j] * s_gqs[m][i];
                r_aq[j][i][m] += s_d[k][m] * r_qt[j][i];
            }
            r_aq[j][i][k] += aq;
        });
    }
    block.sync();

    // Project back to the dofs along z, y, then x
    block.foreach_xy(Q, Q, |i, j| {
        for c in 0..D {
            let mut res = T::zero();
            for k in 0..Q {
                res += s_i[k][c] * r_aq[j][i][k];
            }
            s_iq[c][j][i] = res;
        }
    });
    block.sync();

    block.foreach_xy(Q, Q, |i, c| {
        if c < D {
            let mut column = [T::zero(); Q];
            for j in 0..Q {
                column[j] = s_iq[c][j][i];
            }
            for b in 0..D {
                let mut res = T::zero();
                for j in 0..Q {
                    res += s_i[j][b] * column[j];
                }
                s_iq[c][b][i] = res;
            }
        }
    });
    block.sync();

    block.foreach_xy(Q, Q, |b, c| {
        if b < D && c < D {
            let row = s_iq[c][b];
            for a in 0..D {
                let mut res = T::zero();
                for i in 0..Q {
                    res += s_i[i][a] * row[i];
                }
                s_iq[c][b][a] = res;
            }
        }
    });
    block.sync();

    block.foreach_xy(D, D, |i, j| {
        for k in 0..D {
            y[[i, j, k]] += s_iq[k][j][i];
        }
    });
}
