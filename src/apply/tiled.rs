//! Apply kernels built from cooperative thread blocks with a shared scratch arena.
//!
//! In 2D, a block of `Q1D x Q1D x NB` workers handles a batch of `NB` elements. In 3D, a
//! block of `Q1D x Q1D` workers handles a single element, each worker looping over the
//! third axis. Every contraction is a separate phase followed by a barrier, and the basis
//! tables are staged in the arena: `B` and `G` for the forward contractions, then `B^T` and
//! `G^T` in the same slots for the backward ones.
//!
//! Results agree with [`super::generic`] up to floating-point reassociation.
use super::scratch::{TiledScratch2d, TiledScratch3d, MAX_BATCH_2D};
use super::thread_block::ThreadBlock;
use super::{check_capacity, check_exact, require_dim, ApplyProblem, MAX_D1D, MAX_Q1D};
use crate::error::KernelError;
use crate::view::{View2, View3, View3Mut};
use crate::Real;
use davenport::{define_thread_local_workspace, with_thread_local_workspace};
use log::trace;
use rayon::prelude::*;

define_thread_local_workspace!(WORKSPACE);

/// Number of 2D elements processed by one block, given the number of 1D quadrature points.
///
/// Smaller elements are batched so that a block keeps a comparable number of workers busy.
/// A requested batch size is clamped to [`MAX_BATCH_2D`].
pub fn default_batch_size_2d(q1d: usize) -> usize {
    match q1d {
        0..=3 => 16,
        4..=5 => 8,
        6..=7 => 4,
        8..=9 => 2,
        _ => 1,
    }
}

/// Runtime-sized 2D kernel, supporting up to [`MAX_D1D`] dofs and [`MAX_Q1D`] points.
pub fn apply_2d<T: Real>(problem: &ApplyProblem<T>, y: &mut [T]) -> Result<(), KernelError> {
    check_capacity::<MAX_D1D, MAX_Q1D>(problem.d1d, problem.q1d)?;
    apply_2d_impl(problem, y, problem.d1d, problem.q1d)
}

/// Runtime-sized 3D kernel, supporting up to [`MAX_D1D`] dofs and [`MAX_Q1D`] points.
pub fn apply_3d<T: Real>(problem: &ApplyProblem<T>, y: &mut [T]) -> Result<(), KernelError> {
    check_capacity::<MAX_D1D, MAX_Q1D>(problem.d1d, problem.q1d)?;
    apply_3d_impl(problem, y, problem.d1d, problem.q1d)
}

/// 2D kernel specialized for exactly `D` dofs and `Q` points per direction.
///
/// The arena is the same fixed-capacity workspace the runtime-sized kernel uses. The sizes
/// reach the loops as constants through the always-inlined implementation, which lets the
/// compiler unroll the contractions.
pub fn apply_2d_fixed<T: Real, const D: usize, const Q: usize>(
    problem: &ApplyProblem<T>,
    y: &mut [T],
) -> Result<(), KernelError> {
    check_exact::<D, Q>(problem)?;
    apply_2d_impl(problem, y, D, Q)
}

/// 3D kernel specialized for exactly `D` dofs and `Q` points per direction.
///
/// The arena is the same fixed-capacity workspace the runtime-sized kernel uses. The sizes
/// reach the loops as constants through the always-inlined implementation, which lets the
/// compiler unroll the contractions.
pub fn apply_3d_fixed<T: Real, const D: usize, const Q: usize>(
    problem: &ApplyProblem<T>,
    y: &mut [T],
) -> Result<(), KernelError> {
    check_exact::<D, Q>(problem)?;
    apply_3d_impl(problem, y, D, Q)
}

#[inline(always)]
fn apply_2d_impl<T: Real>(problem: &ApplyProblem<T>, y: &mut [T], d1d: usize, q1d: usize) -> Result<(), KernelError> {
    problem.check(y.len())?;
    require_dim(problem, 2)?;
    let batch = problem
        .batch_size
        .unwrap_or_else(|| default_batch_size_2d(q1d))
        .clamp(1, MAX_BATCH_2D);
    trace!(
        "Tiled 2D apply (D1D = {}, Q1D = {}, batch = {}) on {} elements",
        d1d,
        q1d,
        batch,
        problem.num_elements
    );

    let nd = d1d * d1d;
    let nq = q1d * q1d;
    y.par_chunks_mut(batch * nd)
        .zip(problem.input.par_chunks(batch * nd))
        .zip(problem.metric.par_chunks(batch * 3 * nq))
        .for_each(|((y, x), op)| {
            with_thread_local_workspace(&WORKSPACE, |scratch: &mut TiledScratch2d<T>| {
                let mut block = ThreadBlock::new([q1d, q1d, batch]);
                apply_batch_2d(problem, &mut block, scratch, x, op, y, d1d, q1d);
            })
        });
    Ok(())
}

#[allow(clippy::too_many_arguments)]
#[inline(always)]
fn apply_batch_2d<T: Real>(
    problem: &ApplyProblem<T>,
    block: &mut ThreadBlock,
    scratch: &mut TiledScratch2d<T>,
    x: &[T],
    op: &[T],
    y: &mut [T],
    d1d: usize,
    q1d: usize,
) {
    // The last batch may be incomplete
    let nb = x.len() / (d1d * d1d);
    scratch.prepare(d1d, q1d, nb);
    let x = View3::new(x, [d1d, d1d, nb]);
    let op = View3::new(op, [q1d * q1d, 3, nb]);
    let mut y = View3Mut::new(y, [d1d, d1d, nb]);

    {
        let mut xs = scratch.input_mut();
        block.foreach_xyz(d1d, d1d, nb, |dx, dy, e| xs[[dx, dy, e]] = x[[dx, dy, e]]);
        let [mut bs, mut gs] = scratch.basis_mut();
        let (b, g) = (problem.basis.b_view(), problem.basis.g_view());
        block.foreach_xy(q1d, d1d, |q, d| {
            bs[[q, d]] = b[[q, d]];
            gs[[q, d]] = g[[q, d]];
        });
    }
    block.sync();

    {
        let ([b, g], xs, [mut dq0, mut dq1]) = scratch.contract_x();
        block.foreach_xyz(q1d, d1d, nb, |qx, dy, e| {
            let mut u = T::zero();
            let mut v = T::zero();
            for dx in 0..d1d {
                let coords = xs[[dx, dy, e]];
                u += b[[qx, dx]] * coords;
                v += g[[qx, dx]] * coords;
            }
            dq0[[qx, dy, e]] = u;
            dq1[[qx, dy, e]] = v;
        });
    }
    block.sync();

    {
        let ([b, g], [dq0, dq1], [mut qq0, mut qq1]) = scratch.contract_y();
        block.foreach_xyz(q1d, q1d, nb, |qx, qy, e| {
            let mut u = T::zero();
            let mut v = T::zero();
            for dy in 0..d1d {
                u += dq1[[qx, dy, e]] * b[[qy, dy]];
                v += dq0[[qx, dy, e]] * g[[qy, dy]];
            }
            qq0[[qx, qy, e]] = u;
            qq1[[qx, qy, e]] = v;
        });
    }
    block.sync();

    {
        let [mut qq0, mut qq1] = scratch.quadrature_gradients_mut();
        block.foreach_xyz(q1d, q1d, nb, |qx, qy, e| {
            let q = qx + qy * q1d;
            let o11 = op[[q, 0, e]];
            let o12 = op[[q, 1, e]];
            let o22 = op[[q, 2, e]];
            let gx = qq0[[qx, qy, e]];
            let gy = qq1[[qx, qy, e]];
            qq0[[qx, qy, e]] = o11 * gx + o12 * gy;
            qq1[[qx, qy, e]] = o12 * gx + o22 * gy;
        });
    }
    block.sync();

    {
        let [mut bts, mut gts] = scratch.basis_transposed_mut();
        let (bt, gt) = (problem.basis.bt_view(), problem.basis.gt_view());
        block.foreach_xy(q1d, d1d, |q, d| {
            bts[[d, q]] = bt[[d, q]];
            gts[[d, q]] = gt[[d, q]];
        });
    }
    block.sync();

    {
        let ([bt, gt], [qq0, qq1], [mut qd0, mut qd1]) = scratch.project_x();
        block.foreach_xyz(d1d, q1d, nb, |dx, qy, e| {
            let mut u = T::zero();
            let mut v = T::zero();
            for qx in 0..q1d {
                u += gt[[dx, qx]] * qq0[[qx, qy, e]];
                v += bt[[dx, qx]] * qq1[[qx, qy, e]];
            }
            qd0[[dx, qy, e]] = u;
            qd1[[dx, qy, e]] = v;
        });
    }
    block.sync();

    let ([bt, gt], [qd0, qd1]) = scratch.project_y();
    block.foreach_xyz(d1d, d1d, nb, |dx, dy, e| {
        let mut u = T::zero();
        let mut v = T::zero();
        for qy in 0..q1d {
            u += qd0[[dx, qy, e]] * bt[[dy, qy]];
            v += qd1[[dx, qy, e]] * gt[[dy, qy]];
        }
        y[[dx, dy, e]] += u + v;
    });
}

#[inline(always)]
fn apply_3d_impl<T: Real>(problem: &ApplyProblem<T>, y: &mut [T], d1d: usize, q1d: usize) -> Result<(), KernelError> {
    problem.check(y.len())?;
    require_dim(problem, 3)?;
    trace!(
        "Tiled 3D apply (D1D = {}, Q1D = {}) on {} elements",
        d1d,
        q1d,
        problem.num_elements
    );

    let nd = d1d * d1d * d1d;
    let nq = q1d * q1d * q1d;
    y.par_chunks_mut(nd)
        .zip(problem.input.par_chunks(nd))
        .zip(problem.metric.par_chunks(6 * nq))
        .for_each(|((y, x), op)| {
            with_thread_local_workspace(&WORKSPACE, |scratch: &mut TiledScratch3d<T>| {
                let mut block = ThreadBlock::new([q1d, q1d, 1]);
                apply_element_3d(problem, &mut block, scratch, x, op, y, d1d, q1d);
            })
        });
    Ok(())
}

#[allow(clippy::too_many_arguments)]
#[inline(always)]
fn apply_element_3d<T: Real>(
    problem: &ApplyProblem<T>,
    block: &mut ThreadBlock,
    scratch: &mut TiledScratch3d<T>,
    x: &[T],
    op: &[T],
    y: &mut [T],
    d1d: usize,
    q1d: usize,
) {
    scratch.prepare(d1d, q1d);
    let x = View3::new(x, [d1d, d1d, d1d]);
    let op = View2::new(op, [q1d * q1d * q1d, 6]);
    let mut y = View3Mut::new(y, [d1d, d1d, d1d]);

    {
        let mut xs = scratch.input_mut();
        block.foreach_xy(d1d, d1d, |dx, dy| {
            for dz in 0..d1d {
                xs[[dx, dy, dz]] = x[[dx, dy, dz]];
            }
        });
        let [mut bs, mut gs] = scratch.basis_mut();
        let (b, g) = (problem.basis.b_view(), problem.basis.g_view());
        block.foreach_xy(q1d, d1d, |q, d| {
            bs[[q, d]] = b[[q, d]];
            gs[[q, d]] = g[[q, d]];
        });
    }
    block.sync();

    {
        let ([b, g], xs, [mut ddq0, mut ddq1]) = scratch.contract_x();
        block.foreach_xy(q1d, d1d, |qx, dy| {
            for dz in 0..d1d {
                let mut u = T::zero();
                let mut v = T::zero();
                for dx in 0..d1d {
                    let coords = xs[[dx, dy, dz]];
                    u += coords * b[[qx, dx]];
                    v += coords * g[[qx, dx]];
                }
                ddq0[[qx, dy, dz]] = u;
                ddq1[[qx, dy, dz]] = v;
            }
        });
    }
    block.sync();

    {
        let ([b, g], [ddq0, ddq1], [mut dqq0, mut dqq1, mut dqq2]) = scratch.contract_y();
        block.foreach_xy(q1d, q1d, |qx, qy| {
            for dz in 0..d1d {
                let mut u = T::zero();
                let mut v = T::zero();
                let mut w = T::zero();
                for dy in 0..d1d {
                    u += ddq1[[qx, dy, dz]] * b[[qy, dy]];
                    v += ddq0[[qx, dy, dz]] * g[[qy, dy]];
                    w += ddq0[[qx, dy, dz]] * b[[qy, dy]];
                }
                dqq0[[qx, qy, dz]] = u;
                dqq1[[qx, qy, dz]] = v;
                dqq2[[qx, qy, dz]] = w;
            }
        });
    }
    block.sync();

    {
        let ([b, g], [dqq0, dqq1, dqq2], [mut qqq0, mut qqq1, mut qqq2]) = scratch.contract_z();
        block.foreach_xy(q1d, q1d, |qx, qy| {
            for qz in 0..q1d {
                let mut gx = T::zero();
                let mut gy = T::zero();
                let mut gz = T::zero();
                for dz in 0..d1d {
                    gx += dqq0[[qx, qy, dz]] * b[[qz, dz]];
                    gy += dqq1[[qx, qy, dz]] * b[[qz, dz]];
                    gz += dqq2[[qx, qy, dz]] * g[[qz, dz]];
                }
                let q = qx + q1d * (qy + q1d * qz);
                let o11 = op[[q, 0]];
                let o12 = op[[q, 1]];
                let o13 = op[[q, 2]];
                let o22 = op[[q, 3]];
                let o23 = op[[q, 4]];
                let o33 = op[[q, 5]];
                qqq0[[qx, qy, qz]] = o11 * gx + o12 * gy + o13 * gz;
                qqq1[[qx, qy, qz]] = o12 * gx + o22 * gy + o23 * gz;
                qqq2[[qx, qy, qz]] = o13 * gx + o23 * gy + o33 * gz;
            }
        });
    }
    block.sync();

    {
        let [mut bts, mut gts] = scratch.basis_transposed_mut();
        let (bt, gt) = (problem.basis.bt_view(), problem.basis.gt_view());
        block.foreach_xy(q1d, d1d, |q, d| {
            bts[[d, q]] = bt[[d, q]];
            gts[[d, q]] = gt[[d, q]];
        });
    }
    block.sync();

    {
        let ([bt, gt], [qqq0, qqq1, qqq2], [mut qqd0, mut qqd1, mut qqd2]) = scratch.project_x();
        block.foreach_xy(d1d, q1d, |dx, qy| {
            for qz in 0..q1d {
                let mut u = T::zero();
                let mut v = T::zero();
                let mut w = T::zero();
                for qx in 0..q1d {
                    u += qqq0[[qx, qy, qz]] * gt[[dx, qx]];
                    v += qqq1[[qx, qy, qz]] * bt[[dx, qx]];
                    w += qqq2[[qx, qy, qz]] * bt[[dx, qx]];
                }
                qqd0[[dx, qy, qz]] = u;
                qqd1[[dx, qy, qz]] = v;
                qqd2[[dx, qy, qz]] = w;
            }
        });
    }
    block.sync();

    {
        let ([bt, gt], [qqd0, qqd1, qqd2], [mut qdd0, mut qdd1, mut qdd2]) = scratch.project_y();
        block.foreach_xy(d1d, d1d, |dx, dy| {
            for qz in 0..q1d {
                let mut u = T::zero();
                let mut v = T::zero();
                let mut w = T::zero();
                for qy in 0..q1d {
                    u += qqd0[[dx, qy, qz]] * bt[[dy, qy]];
                    v += qqd1[[dx, qy, qz]] * gt[[dy, qy]];
                    w += qqd2[[dx, qy, qz]] * bt[[dy, qy]];
                }
                qdd0[[dx, dy, qz]] = u;
                qdd1[[dx, dy, qz]] = v;
                qdd2[[dx, dy, qz]] = w;
            }
        });
    }
    block.sync();

    let ([bt, gt], [qdd0, qdd1, qdd2]) = scratch.project_z();
    block.foreach_xy(d1d, d1d, |dx, dy| {
        for dz in 0..d1d {
            let mut u = T::zero();
            let mut v = T::zero();
            let mut w = T::zero();
            for qz in 0..q1d {
                u += qdd0[[dx, dy, qz]] * bt[[dz, qz]];
                v += qdd1[[dx, dy, qz]] * bt[[dz, qz]];
                w += qdd2[[dx, dy, qz]] * gt[[dz, qz]];
            }
            y[[dx, dy, dz]] += u + v + w;
        }
    });
}
