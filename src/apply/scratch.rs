//! Shared scratch arenas for the tiled kernels.
//!
//! A tiled kernel stages the basis tables and every intermediate tensor of a block in one
//! arena. Buffers are reused across phases, so the same storage is reinterpreted with
//! different shapes as the computation progresses. The accessors below hand out exactly
//! the views a phase needs: tensors read by the phase as immutable views, tensors written
//! by it as mutable views. Which storage backs which tensor is noted on each accessor.
//!
//! Arenas have a fixed capacity, sized for [`MAX_D1D`] dofs and [`MAX_Q1D`] points per
//! direction (and [`MAX_BATCH_2D`] elements per 2D block). They are kept in thread-local
//! workspaces, so a worker thread allocates its arena once and reuses it for every problem.
use super::{MAX_D1D, MAX_Q1D};
use crate::view::{View2, View2Mut, View3, View3Mut};
use crate::Real;

/// Largest number of 2D elements a tiled block processes at once.
pub const MAX_BATCH_2D: usize = 16;

fn views<T, const N: usize>(buffers: &[Vec<T>; N], shape: [usize; 3]) -> [View3<T>; N] {
    buffers.each_ref().map(|buffer| View3::new(buffer, shape))
}

fn views_mut<T, const N: usize>(buffers: &mut [Vec<T>; N], shape: [usize; 3]) -> [View3Mut<T>; N] {
    buffers.each_mut().map(|buffer| View3Mut::new(buffer, shape))
}

fn tables<T>(basis: &[Vec<T>; 2], shape: [usize; 2]) -> [View2<T>; 2] {
    basis.each_ref().map(|buffer| View2::new(buffer, shape))
}

fn check_sizes(d1d: usize, q1d: usize) {
    assert!(
        d1d <= MAX_D1D && q1d <= MAX_Q1D,
        "arena cannot hold D1D = {}, Q1D = {}",
        d1d,
        q1d
    );
}

/// Scratch arena of the 2D tiled kernel.
///
/// A block processes a batch of `NB` elements at once, and every per-element tensor has a
/// trailing batch axis.
#[derive(Debug)]
pub struct TiledScratch2d<T> {
    basis: [Vec<T>; 2],
    x: Vec<T>,
    dq: [Vec<T>; 2],
    qq: [Vec<T>; 2],
    d1d: usize,
    q1d: usize,
    batch: usize,
}

impl<T: Real> Default for TiledScratch2d<T> {
    fn default() -> Self {
        let zeros = |len: usize| vec![T::zero(); len];
        let table = MAX_Q1D * MAX_D1D;
        let mdq = MAX_D1D.max(MAX_Q1D);
        Self {
            basis: [zeros(table), zeros(table)],
            x: zeros(MAX_D1D * MAX_D1D * MAX_BATCH_2D),
            dq: [zeros(table * MAX_BATCH_2D), zeros(table * MAX_BATCH_2D)],
            qq: [zeros(mdq * mdq * MAX_BATCH_2D), zeros(mdq * mdq * MAX_BATCH_2D)],
            d1d: 0,
            q1d: 0,
            batch: 0,
        }
    }
}

impl<T> TiledScratch2d<T> {
    /// Sets the shape of the views handed out for a batch of `batch` elements.
    ///
    /// # Panics
    ///
    /// Panics if the sizes exceed the fixed capacity of the arena.
    pub fn prepare(&mut self, d1d: usize, q1d: usize, batch: usize) {
        check_sizes(d1d, q1d);
        assert!(batch <= MAX_BATCH_2D, "arena cannot hold a batch of {} elements", batch);
        self.d1d = d1d;
        self.q1d = q1d;
        self.batch = batch;
    }

    pub fn capacity(&self) -> usize {
        self.basis.iter().chain(&self.dq).chain(&self.qq).map(Vec::len).sum::<usize>() + self.x.len()
    }

    /// The staged input `X`, indexed `[dx, dy, e]`.
    pub fn input_mut(&mut self) -> View3Mut<T> {
        View3Mut::new(&mut self.x, [self.d1d, self.d1d, self.batch])
    }

    /// `B` and `G`, indexed `[q, d]`.
    pub fn basis_mut(&mut self) -> [View2Mut<T>; 2] {
        let shape = [self.q1d, self.d1d];
        self.basis.each_mut().map(|buffer| View2Mut::new(buffer, shape))
    }

    /// `B^T` and `G^T`, indexed `[d, q]`. Shares storage with [`Self::basis_mut`].
    pub fn basis_transposed_mut(&mut self) -> [View2Mut<T>; 2] {
        let shape = [self.d1d, self.q1d];
        self.basis.each_mut().map(|buffer| View2Mut::new(buffer, shape))
    }

    /// Contraction over `dx`: reads `X` and the tables, writes `DQ0`, `DQ1` indexed `[qx, dy, e]`.
    pub fn contract_x(&mut self) -> ([View2<T>; 2], View3<T>, [View3Mut<T>; 2]) {
        let x = View3::new(&self.x, [self.d1d, self.d1d, self.batch]);
        let dq = views_mut(&mut self.dq, [self.q1d, self.d1d, self.batch]);
        (tables(&self.basis, [self.q1d, self.d1d]), x, dq)
    }

    /// Contraction over `dy`: reads `DQ0`, `DQ1`, writes `QQ0`, `QQ1` indexed `[qx, qy, e]`.
    pub fn contract_y(&mut self) -> ([View2<T>; 2], [View3<T>; 2], [View3Mut<T>; 2]) {
        let dq = views(&self.dq, [self.q1d, self.d1d, self.batch]);
        let qq = views_mut(&mut self.qq, [self.q1d, self.q1d, self.batch]);
        (tables(&self.basis, [self.q1d, self.d1d]), dq, qq)
    }

    /// Gradient components `QQ0`, `QQ1` at the quadrature points, updated in place.
    pub fn quadrature_gradients_mut(&mut self) -> [View3Mut<T>; 2] {
        views_mut(&mut self.qq, [self.q1d, self.q1d, self.batch])
    }

    /// Back-contraction over `qx`: reads `QQ0`, `QQ1`, writes `QD0`, `QD1` indexed
    /// `[dx, qy, e]`. `QD` reuses the storage of `DQ`.
    pub fn project_x(&mut self) -> ([View2<T>; 2], [View3<T>; 2], [View3Mut<T>; 2]) {
        let qq = views(&self.qq, [self.q1d, self.q1d, self.batch]);
        let qd = views_mut(&mut self.dq, [self.d1d, self.q1d, self.batch]);
        (tables(&self.basis, [self.d1d, self.q1d]), qq, qd)
    }

    /// Back-contraction over `qy`: reads `QD0`, `QD1`.
    pub fn project_y(&self) -> ([View2<T>; 2], [View3<T>; 2]) {
        let qd = views(&self.dq, [self.d1d, self.q1d, self.batch]);
        (tables(&self.basis, [self.d1d, self.q1d]), qd)
    }
}

/// Scratch arena of the 3D tiled kernel, holding a single element.
///
/// Besides the two basis slots, the arena consists of two banks `sm0` and `sm1` of three
/// cubes each, large enough for `max(D1D, Q1D)^3` entries. Each phase reads one bank and
/// writes the other, except for the first contraction, which reads `X` from `sm0[2]` and
/// writes `sm0[0]` and `sm0[1]`.
#[derive(Debug)]
pub struct TiledScratch3d<T> {
    basis: [Vec<T>; 2],
    sm0: [Vec<T>; 3],
    sm1: [Vec<T>; 3],
    d1d: usize,
    q1d: usize,
}

impl<T: Real> Default for TiledScratch3d<T> {
    fn default() -> Self {
        let table = vec![T::zero(); MAX_Q1D * MAX_D1D];
        let mdq = MAX_D1D.max(MAX_Q1D);
        let cube = vec![T::zero(); mdq * mdq * mdq];
        Self {
            basis: [table.clone(), table],
            sm0: [cube.clone(), cube.clone(), cube.clone()],
            sm1: [cube.clone(), cube.clone(), cube],
            d1d: 0,
            q1d: 0,
        }
    }
}

impl<T> TiledScratch3d<T> {
    /// Sets the shape of the views handed out for one element.
    ///
    /// # Panics
    ///
    /// Panics if the sizes exceed the fixed capacity of the arena.
    pub fn prepare(&mut self, d1d: usize, q1d: usize) {
        check_sizes(d1d, q1d);
        self.d1d = d1d;
        self.q1d = q1d;
    }

    pub fn capacity(&self) -> usize {
        self.basis.iter().chain(&self.sm0).chain(&self.sm1).map(Vec::len).sum()
    }

    /// The staged input `X` in `sm0[2]`, indexed `[dx, dy, dz]`.
    pub fn input_mut(&mut self) -> View3Mut<T> {
        let d = self.d1d;
        View3Mut::new(&mut self.sm0[2], [d, d, d])
    }

    /// `B` and `G`, indexed `[q, d]`.
    pub fn basis_mut(&mut self) -> [View2Mut<T>; 2] {
        let shape = [self.q1d, self.d1d];
        self.basis.each_mut().map(|buffer| View2Mut::new(buffer, shape))
    }

    /// `B^T` and `G^T`, indexed `[d, q]`. Shares storage with [`Self::basis_mut`].
    pub fn basis_transposed_mut(&mut self) -> [View2Mut<T>; 2] {
        let shape = [self.d1d, self.q1d];
        self.basis.each_mut().map(|buffer| View2Mut::new(buffer, shape))
    }

    /// Contraction over `dx`: reads `X` (`sm0[2]`), writes `DDQ0`, `DDQ1` (`sm0[0]`, `sm0[1]`)
    /// indexed `[qx, dy, dz]`.
    pub fn contract_x(&mut self) -> ([View2<T>; 2], View3<T>, [View3Mut<T>; 2]) {
        let (d, q) = (self.d1d, self.q1d);
        let [s0, s1, s2] = &mut self.sm0;
        let x = View3::new(s2, [d, d, d]);
        let ddq = [View3Mut::new(s0, [q, d, d]), View3Mut::new(s1, [q, d, d])];
        (tables(&self.basis, [self.q1d, self.d1d]), x, ddq)
    }

    /// Contraction over `dy`: reads `DDQ0`, `DDQ1`, writes `DQQ0..2` (`sm1`) indexed `[qx, qy, dz]`.
    pub fn contract_y(&mut self) -> ([View2<T>; 2], [View3<T>; 2], [View3Mut<T>; 3]) {
        let (d, q) = (self.d1d, self.q1d);
        let [s0, s1, _] = &self.sm0;
        let ddq = [View3::new(s0, [q, d, d]), View3::new(s1, [q, d, d])];
        let dqq = views_mut(&mut self.sm1, [q, q, d]);
        (tables(&self.basis, [self.q1d, self.d1d]), ddq, dqq)
    }

    /// Contraction over `dz`: reads `DQQ0..2`, writes `QQQ0..2` (`sm0`) indexed `[qx, qy, qz]`.
    pub fn contract_z(&mut self) -> ([View2<T>; 2], [View3<T>; 3], [View3Mut<T>; 3]) {
        let (d, q) = (self.d1d, self.q1d);
        let dqq = views(&self.sm1, [q, q, d]);
        let qqq = views_mut(&mut self.sm0, [q, q, q]);
        (tables(&self.basis, [self.q1d, self.d1d]), dqq, qqq)
    }

    /// Back-contraction over `qx`: reads `QQQ0..2`, writes `QQD0..2` (`sm1`) indexed `[dx, qy, qz]`.
    pub fn project_x(&mut self) -> ([View2<T>; 2], [View3<T>; 3], [View3Mut<T>; 3]) {
        let (d, q) = (self.d1d, self.q1d);
        let qqq = views(&self.sm0, [q, q, q]);
        let qqd = views_mut(&mut self.sm1, [d, q, q]);
        (tables(&self.basis, [self.d1d, self.q1d]), qqq, qqd)
    }

    /// Back-contraction over `qy`: reads `QQD0..2`, writes `QDD0..2` (`sm0`) indexed `[dx, dy, qz]`.
    pub fn project_y(&mut self) -> ([View2<T>; 2], [View3<T>; 3], [View3Mut<T>; 3]) {
        let (d, q) = (self.d1d, self.q1d);
        let qqd = views(&self.sm1, [d, q, q]);
        let qdd = views_mut(&mut self.sm0, [d, d, q]);
        (tables(&self.basis, [self.d1d, self.q1d]), qqd, qdd)
    }

    /// Back-contraction over `qz`: reads `QDD0..2`.
    pub fn project_z(&self) -> ([View2<T>; 2], [View3<T>; 3]) {
        let (d, q) = (self.d1d, self.q1d);
        (tables(&self.basis, [self.d1d, self.q1d]), views(&self.sm0, [d, d, q]))
    }
}
