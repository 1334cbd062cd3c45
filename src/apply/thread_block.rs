//! Cooperative thread blocks for the tiled kernels.
//!
//! A [`ThreadBlock`] models a grid of up to `nx x ny x nz` cooperating workers that share a
//! scratch arena. Work inside a phase is distributed over the workers with strided loops:
//! worker `(tx, ty)` visits every index `(x, y)` with `x = tx + k * nx` and `y = ty + l * ny`.
//! Phases are separated by [`ThreadBlock::sync`], after which every write of the previous
//! phase is visible to every worker.
//!
//! On the CPU the workers of a block run one after another, so a barrier is a sequence
//! point and the block only records how many were crossed. Parallelism comes from running
//! many blocks at once.

/// A block of cooperating workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadBlock {
    dims: [usize; 3],
    barriers: usize,
}

impl ThreadBlock {
    /// Creates a block with the given number of workers along each axis.
    ///
    /// Zero extents are raised to one.
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims: dims.map(|n| n.max(1)),
            barriers: 0,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn num_workers(&self) -> usize {
        self.dims.iter().product()
    }

    /// Number of barriers crossed so far.
    pub fn barriers(&self) -> usize {
        self.barriers
    }

    /// Runs `f(x, y)` for every `x < nx`, `y < ny`, using the workers of a single z-layer.
    pub fn foreach_xy(&self, nx: usize, ny: usize, mut f: impl FnMut(usize, usize)) {
        let [bx, by, _] = self.dims;
        for ty in 0..by {
            for tx in 0..bx {
                for y in (ty..ny).step_by(by) {
                    for x in (tx..nx).step_by(bx) {
                        f(x, y);
                    }
                }
            }
        }
    }

    /// Runs `f(x, y, z)` for every `x < nx`, `y < ny`, `z < nz`, using every worker of the
    /// block.
    pub fn foreach_xyz(&self, nx: usize, ny: usize, nz: usize, mut f: impl FnMut(usize, usize, usize)) {
        let bz = self.dims[2];
        for tz in 0..bz {
            for z in (tz..nz).step_by(bz) {
                self.foreach_xy(nx, ny, |x, y| f(x, y, z));
            }
        }
    }

    /// Block-wide barrier.
    pub fn sync(&mut self) {
        self.barriers += 1;
    }
}
