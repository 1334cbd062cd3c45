//! Householder QR factorization of tall basis tables.
//!
//! The factorization is stored compactly, LAPACK style: the upper triangle of the factored
//! matrix holds `R`, and the entries below the diagonal hold the Householder vectors, whose
//! leading entry is implicitly one. The orthogonal factor is
//! `Q = H_0 H_1 ... H_{n-1}` with `H_i = I - tau_i v_i v_i^T`.
use crate::error::KernelError;
use crate::nalgebra::{DMatrix, DVector, Scalar};
use crate::Real;
use numeric_literals::replace_float_literals;

/// A compact Householder QR factorization of an `m x n` matrix with `m >= n`.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholderQr<T: Scalar> {
    packed: DMatrix<T>,
    tau: Vec<T>,
}

/// Applies the reflector `I - tau v v^T` to the rows `offset..offset + v.len()` of every
/// column in `cols`.
///
/// The first entry of `v` is taken to be one regardless of its stored value.
fn reflect_columns<T: Real>(a: &mut DMatrix<T>, v: &[T], tau: T, offset: usize, cols: std::ops::Range<usize>) {
    for c in cols {
        let mut w = a[(offset, c)];
        for (k, &vk) in v.iter().enumerate().skip(1) {
            w += vk * a[(offset + k, c)];
        }
        a[(offset, c)] -= tau * w;
        for (k, &vk) in v.iter().enumerate().skip(1) {
            a[(offset + k, c)] -= tau * w * vk;
        }
    }
}

/// Applies the reflector `I - tau v v^T` from the right, acting on columns
/// `offset..offset + v.len()` of every row.
fn reflect_rows<T: Real>(a: &mut DMatrix<T>, v: &[T], tau: T, offset: usize) {
    for r in 0..a.nrows() {
        let mut w = a[(r, offset)];
        for (k, &vk) in v.iter().enumerate().skip(1) {
            w += vk * a[(r, offset + k)];
        }
        a[(r, offset)] -= tau * w;
        for (k, &vk) in v.iter().enumerate().skip(1) {
            a[(r, offset + k)] -= tau * w * vk;
        }
    }
}

impl<T: Real> HouseholderQr<T> {
    /// Factors `matrix` in place.
    ///
    /// Fails with [`KernelError::InsufficientQuadrature`] if the matrix has more columns than
    /// rows.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn factor(matrix: DMatrix<T>) -> Result<Self, KernelError> {
        let (m, n) = matrix.shape();
        if n > m {
            return Err(KernelError::InsufficientQuadrature { d1d: n, q1d: m });
        }

        let mut a = matrix;
        let mut tau = Vec::with_capacity(n);
        let mut v = vec![T::zero(); m];
        for i in 0..n {
            let pivot = a[(i, i)];
            let mut sigma = T::zero();
            for j in i + 1..m {
                v[j] = a[(j, i)];
                sigma += v[j] * v[j];
            }
            let norm = (pivot * pivot + sigma).sqrt();
            // Opposite sign to the pivot avoids cancellation in v_i
            let r_ii = -norm.copysign(pivot);
            v[i] = pivot - r_ii;
            let tau_i = 2.0 * v[i] * v[i] / (v[i] * v[i] + sigma);
            let vi = v[i];
            for j in i + 1..m {
                v[j] /= vi;
            }

            reflect_columns(&mut a, &v[i..], tau_i, i, i + 1..n);
            a[(i, i)] = r_ii;
            for j in i + 1..m {
                a[(j, i)] = v[j];
            }
            tau.push(tau_i);
        }

        Ok(Self { packed: a, tau })
    }

    /// The packed factorization: `R` on and above the diagonal, reflectors below.
    pub fn packed(&self) -> &DMatrix<T> {
        &self.packed
    }

    pub fn tau(&self) -> &[T] {
        &self.tau
    }

    /// The `n x n` upper triangular factor.
    pub fn r(&self) -> DMatrix<T> {
        let n = self.packed.ncols();
        DMatrix::from_fn(n, n, |i, j| if i <= j { self.packed[(i, j)] } else { T::zero() })
    }

    /// The tail `(1, v_{i+1}, ..., v_{m-1})` of the `i`-th Householder vector.
    fn reflector(&self, i: usize) -> Vec<T> {
        let m = self.packed.nrows();
        std::iter::once(T::one())
            .chain((i + 1..m).map(|j| self.packed[(j, i)]))
            .collect()
    }

    /// The `i`-th Householder vector, with zeros above position `i`.
    pub fn householder_vector(&self, i: usize) -> DVector<T> {
        let m = self.packed.nrows();
        let mut v = DVector::zeros(m);
        v.rows_mut(i, m - i).copy_from_slice(&self.reflector(i));
        v
    }

    /// The full `m x m` orthogonal factor.
    pub fn q(&self) -> DMatrix<T> {
        let mut q = DMatrix::identity(self.packed.nrows(), self.packed.nrows());
        for (i, &tau) in self.tau.iter().enumerate() {
            reflect_rows(&mut q, &self.reflector(i), tau, i);
        }
        q
    }

    /// Multiplies the factors back together, `Q [R; 0]`.
    pub fn reconstruct(&self) -> DMatrix<T> {
        let (m, n) = self.packed.shape();
        let mut r = DMatrix::zeros(m, n);
        r.rows_mut(0, n).copy_from(&self.r());
        for (i, &tau) in self.tau.iter().enumerate().rev() {
            reflect_columns(&mut r, &self.reflector(i), tau, i, 0..n);
        }
        r
    }

    /// Replaces `c` with `c Q^T`.
    ///
    /// `Q^T = H_{n-1} ... H_0`, so the reflectors are applied from the right starting with
    /// the last one.
    ///
    /// # Panics
    ///
    /// Panics if `c` does not have `m` columns.
    pub fn mul_q_transpose_right(&self, c: &mut DMatrix<T>) {
        assert_eq!(c.ncols(), self.packed.nrows(), "column count must match the row count of Q");
        for (i, &tau) in self.tau.iter().enumerate().rev() {
            reflect_rows(c, &self.reflector(i), tau, i);
        }
    }
}
