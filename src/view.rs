//! Multi-dimensional views of flat buffers.
//!
//! Every buffer consumed or produced by the kernels is a flat slice. A [`TensorView`] or
//! [`TensorViewMut`] interprets such a slice as an `N`-dimensional tensor whose shape is
//! fixed at construction. The axis order is always "first index fastest": the entry
//! `[i0, i1, ..., iN-1]` lives at offset `i0 + s0 * (i1 + s1 * (i2 + ...))`, where `sk` is
//! the extent of axis `k`.
//!
//! Views never own data, and a view may be constructed over a slice that is *longer* than
//! the tensor. This is how phase-scoped views over the fixed-capacity scratch arenas are
//! created: the arena is sized for the largest supported problem, while the view only
//! covers the part in use.
use std::ops::{Index, IndexMut};

fn strides_for<const N: usize>(shape: &[usize; N]) -> [usize; N] {
    let mut strides = [0; N];
    let mut stride = 1;
    for (s, extent) in strides.iter_mut().zip(shape) {
        *s = stride;
        stride *= extent;
    }
    strides
}

#[inline(always)]
fn offset<const N: usize>(shape: &[usize; N], strides: &[usize; N], index: &[usize; N]) -> usize {
    let mut offset = 0;
    for k in 0..N {
        debug_assert!(
            index[k] < shape[k],
            "index {} out of bounds for axis {} of extent {}",
            index[k],
            k,
            shape[k]
        );
        offset += index[k] * strides[k];
    }
    offset
}

/// An immutable `N`-dimensional view of a slice.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a, T, const N: usize> {
    data: &'a [T],
    shape: [usize; N],
    strides: [usize; N],
}

/// A mutable `N`-dimensional view of a slice.
#[derive(Debug)]
pub struct TensorViewMut<'a, T, const N: usize> {
    data: &'a mut [T],
    shape: [usize; N],
    strides: [usize; N],
}

pub type View2<'a, T> = TensorView<'a, T, 2>;
pub type View3<'a, T> = TensorView<'a, T, 3>;
pub type View4<'a, T> = TensorView<'a, T, 4>;
pub type View2Mut<'a, T> = TensorViewMut<'a, T, 2>;
pub type View3Mut<'a, T> = TensorViewMut<'a, T, 3>;

impl<'a, T, const N: usize> TensorView<'a, T, N> {
    /// Creates a view with the given shape.
    ///
    /// # Panics
    ///
    /// Panics if the slice holds fewer entries than the product of the extents.
    pub fn new(data: &'a [T], shape: [usize; N]) -> Self {
        let len: usize = shape.iter().product();
        assert!(
            data.len() >= len,
            "slice of length {} is too short for a view of shape {:?}",
            data.len(),
            shape
        );
        Self {
            data: &data[..len],
            shape,
            strides: strides_for(&shape),
        }
    }

    pub fn shape(&self) -> [usize; N] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a, T, const N: usize> Index<[usize; N]> for TensorView<'a, T, N> {
    type Output = T;

    #[inline(always)]
    fn index(&self, index: [usize; N]) -> &T {
        &self.data[offset(&self.shape, &self.strides, &index)]
    }
}

impl<'a, T, const N: usize> TensorViewMut<'a, T, N> {
    /// Creates a mutable view with the given shape.
    ///
    /// # Panics
    ///
    /// Panics if the slice holds fewer entries than the product of the extents.
    pub fn new(data: &'a mut [T], shape: [usize; N]) -> Self {
        let len: usize = shape.iter().product();
        assert!(
            data.len() >= len,
            "slice of length {} is too short for a view of shape {:?}",
            data.len(),
            shape
        );
        Self {
            data: &mut data[..len],
            shape,
            strides: strides_for(&shape),
        }
    }

    pub fn shape(&self) -> [usize; N] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a, T, const N: usize> Index<[usize; N]> for TensorViewMut<'a, T, N> {
    type Output = T;

    #[inline(always)]
    fn index(&self, index: [usize; N]) -> &T {
        &self.data[offset(&self.shape, &self.strides, &index)]
    }
}

impl<'a, T, const N: usize> IndexMut<[usize; N]> for TensorViewMut<'a, T, N> {
    #[inline(always)]
    fn index_mut(&mut self, index: [usize; N]) -> &mut T {
        let offset = offset(&self.shape, &self.strides, &index);
        &mut self.data[offset]
    }
}
