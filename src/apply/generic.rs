//! Apply kernels with private per-element scratch.
//!
//! Each element is an independent unit of work. Intermediate tensors live on the stack in
//! arrays sized by the const parameters `MD` and `MQ`, which are either the exact sizes of a
//! specialized kernel or [`MAX_D1D`] and [`MAX_Q1D`] for the runtime-sized fallback.
use super::{check_capacity, check_exact, require_dim, ApplyProblem, MAX_D1D, MAX_Q1D};
use crate::error::KernelError;
use crate::view::{View2, View2Mut, View3, View3Mut};
use crate::Real;
use log::trace;
use rayon::prelude::*;

/// Runtime-sized 2D kernel, supporting up to [`MAX_D1D`] dofs and [`MAX_Q1D`] points.
pub fn apply_2d<T: Real>(problem: &ApplyProblem<T>, y: &mut [T]) -> Result<(), KernelError> {
    apply_2d_bounded::<T, MAX_D1D, MAX_Q1D>(problem, y)
}

/// Runtime-sized 3D kernel, supporting up to [`MAX_D1D`] dofs and [`MAX_Q1D`] points.
pub fn apply_3d<T: Real>(problem: &ApplyProblem<T>, y: &mut [T]) -> Result<(), KernelError> {
    apply_3d_bounded::<T, MAX_D1D, MAX_Q1D>(problem, y)
}

/// 2D kernel specialized for exactly `D` dofs and `Q` points per direction.
pub fn apply_2d_fixed<T: Real, const D: usize, const Q: usize>(
    problem: &ApplyProblem<T>,
    y: &mut [T],
) -> Result<(), KernelError> {
    check_exact::<D, Q>(problem)?;
    apply_2d_bounded::<T, D, Q>(problem, y)
}

/// 3D kernel specialized for exactly `D` dofs and `Q` points per direction.
pub fn apply_3d_fixed<T: Real, const D: usize, const Q: usize>(
    problem: &ApplyProblem<T>,
    y: &mut [T],
) -> Result<(), KernelError> {
    check_exact::<D, Q>(problem)?;
    apply_3d_bounded::<T, D, Q>(problem, y)
}

fn apply_2d_bounded<T: Real, const MD: usize, const MQ: usize>(
    problem: &ApplyProblem<T>,
    y: &mut [T],
) -> Result<(), KernelError> {
    problem.check(y.len())?;
    require_dim(problem, 2)?;
    check_capacity::<MD, MQ>(problem.d1d, problem.q1d)?;
    trace!(
        "Generic 2D apply (D1D = {}, Q1D = {}) on {} elements",
        problem.d1d,
        problem.q1d,
        problem.num_elements
    );

    let nd = problem.element_dofs();
    let nq = problem.num_points();
    y.par_chunks_mut(nd)
        .zip(problem.input.par_chunks(nd))
        .zip(problem.metric.par_chunks(3 * nq))
        .for_each(|((y, x), op)| apply_element_2d::<T, MD, MQ>(problem, x, op, y));
    Ok(())
}

fn apply_element_2d<T: Real, const MD: usize, const MQ: usize>(
    problem: &ApplyProblem<T>,
    x: &[T],
    op: &[T],
    y: &mut [T],
) {
    let (d1d, q1d) = (problem.d1d, problem.q1d);
    let b = problem.basis.b_view();
    let g = problem.basis.g_view();
    let bt = problem.basis.bt_view();
    let gt = problem.basis.gt_view();
    let x = View2::new(x, [d1d, d1d]);
    let op = View2::new(op, [q1d * q1d, 3]);
    let mut y = View2Mut::new(y, [d1d, d1d]);

    // Reference gradient at the quadrature points, [qy][qx][component]
    let mut grad = [[[T::zero(); 2]; MQ]; MQ];
    for dy in 0..d1d {
        let mut grad_x = [[T::zero(); 2]; MQ];
        for dx in 0..d1d {
            let s = x[[dx, dy]];
            for qx in 0..q1d {
                grad_x[qx][0] += s * b[[qx, dx]];
                grad_x[qx][1] += s * g[[qx, dx]];
            }
        }
        for qy in 0..q1d {
            let wy = b[[qy, dy]];
            let wdy = g[[qy, dy]];
            for qx in 0..q1d {
                grad[qy][qx][0] += grad_x[qx][1] * wy;
                grad[qy][qx][1] += grad_x[qx][0] * wdy;
            }
        }
    }

    for qy in 0..q1d {
        for qx in 0..q1d {
            let q = qx + qy * q1d;
            let o11 = op[[q, 0]];
            let o12 = op[[q, 1]];
            let o22 = op[[q, 2]];
            let [gx, gy] = grad[qy][qx];
            grad[qy][qx][0] = o11 * gx + o12 * gy;
            grad[qy][qx][1] = o12 * gx + o22 * gy;
        }
    }

    for qy in 0..q1d {
        let mut grad_x = [[T::zero(); 2]; MD];
        for qx in 0..q1d {
            let [gx, gy] = grad[qy][qx];
            for dx in 0..d1d {
                grad_x[dx][0] += gx * gt[[dx, qx]];
                grad_x[dx][1] += gy * bt[[dx, qx]];
            }
        }
        for dy in 0..d1d {
            let wy = bt[[dy, qy]];
            let wdy = gt[[dy, qy]];
            for dx in 0..d1d {
                y[[dx, dy]] += grad_x[dx][0] * wy + grad_x[dx][1] * wdy;
            }
        }
    }
}

fn apply_3d_bounded<T: Real, const MD: usize, const MQ: usize>(
    problem: &ApplyProblem<T>,
    y: &mut [T],
) -> Result<(), KernelError> {
    problem.check(y.len())?;
    require_dim(problem, 3)?;
    check_capacity::<MD, MQ>(problem.d1d, problem.q1d)?;
    trace!(
        "Generic 3D apply (D1D = {}, Q1D = {}) on {} elements",
        problem.d1d,
        problem.q1d,
        problem.num_elements
    );

    let nd = problem.element_dofs();
    let nq = problem.num_points();
    y.par_chunks_mut(nd)
        .zip(problem.input.par_chunks(nd))
        .zip(problem.metric.par_chunks(6 * nq))
        .for_each(|((y, x), op)| apply_element_3d::<T, MD, MQ>(problem, x, op, y));
    Ok(())
}

fn apply_element_3d<T: Real, const MD: usize, const MQ: usize>(
    problem: &ApplyProblem<T>,
    x: &[T],
    op: &[T],
    y: &mut [T],
) {
    let (d1d, q1d) = (problem.d1d, problem.q1d);
    let b = problem.basis.b_view();
    let g = problem.basis.g_view();
    let bt = problem.basis.bt_view();
    let gt = problem.basis.gt_view();
    let x = View3::new(x, [d1d, d1d, d1d]);
    let op = View2::new(op, [q1d * q1d * q1d, 6]);
    let mut y = View3Mut::new(y, [d1d, d1d, d1d]);

    // [qz][qy][qx][component]
    let mut grad = [[[[T::zero(); 3]; MQ]; MQ]; MQ];
    for dz in 0..d1d {
        let mut grad_xy = [[[T::zero(); 3]; MQ]; MQ];
        for dy in 0..d1d {
            let mut grad_x = [[T::zero(); 2]; MQ];
            for dx in 0..d1d {
                let s = x[[dx, dy, dz]];
                for qx in 0..q1d {
                    grad_x[qx][0] += s * b[[qx, dx]];
                    grad_x[qx][1] += s * g[[qx, dx]];
                }
            }
            for qy in 0..q1d {
                let wy = b[[qy, dy]];
                let wdy = g[[qy, dy]];
                for qx in 0..q1d {
                    let [wx, wdx] = grad_x[qx];
                    grad_xy[qy][qx][0] += wdx * wy;
                    grad_xy[qy][qx][1] += wx * wdy;
                    grad_xy[qy][qx][2] += wx * wy;
                }
            }
        }
        for qz in 0..q1d {
            let wz = b[[qz, dz]];
            let wdz = g[[qz, dz]];
            for qy in 0..q1d {
                for qx in 0..q1d {
                    grad[qz][qy][qx][0] += grad_xy[qy][qx][0] * wz;
                    grad[qz][qy][qx][1] += grad_xy[qy][qx][1] * wz;
                    grad[qz][qy][qx][2] += grad_xy[qy][qx][2] * wdz;
                }
            }
        }
    }

    for qz in 0..q1d {
        for qy in 0..q1d {
            for qx in 0..q1d {
                let q = qx + q1d * (qy + q1d * qz);
                let o11 = op[[q, 0]];
                let o12 = op[[q, 1]];
                let o13 = op[[q, 2]];
                let o22 = op[[q, 3]];
                let o23 = op[[q, 4]];
                let o33 = op[[q, 5]];
                let [gx, gy, gz] = grad[qz][qy][qx];
                grad[qz][qy][qx][0] = o11 * gx + o12 * gy + o13 * gz;
                grad[qz][qy][qx][1] = o12 * gx + o22 * gy + o23 * gz;
                grad[qz][qy][qx][2] = o13 * gx + o23 * gy + o33 * gz;
            }
        }
    }

    for qz in 0..q1d {
        let mut grad_xy = [[[T::zero(); 3]; MD]; MD];
        for qy in 0..q1d {
            let mut grad_x = [[T::zero(); 3]; MD];
            for qx in 0..q1d {
                let [gx, gy, gz] = grad[qz][qy][qx];
                for dx in 0..d1d {
                    let wx = bt[[dx, qx]];
                    let wdx = gt[[dx, qx]];
                    grad_x[dx][0] += gx * wdx;
                    grad_x[dx][1] += gy * wx;
                    grad_x[dx][2] += gz * wx;
                }
            }
            for dy in 0..d1d {
                let wy = bt[[dy, qy]];
                let wdy = gt[[dy, qy]];
                for dx in 0..d1d {
                    grad_xy[dy][dx][0] += grad_x[dx][0] * wy;
                    grad_xy[dy][dx][1] += grad_x[dx][1] * wdy;
                    grad_xy[dy][dx][2] += grad_x[dx][2] * wy;
                }
            }
        }
        for dz in 0..d1d {
            let wz = bt[[dz, qz]];
            let wdz = gt[[dz, qz]];
            for dy in 0..d1d {
                for dx in 0..d1d {
                    y[[dx, dy, dz]] +=
                        grad_xy[dy][dx][0] * wz + grad_xy[dy][dx][1] * wz + grad_xy[dy][dx][2] * wdz;
                }
            }
        }
    }
}
