//! Tensor-product quadrature weights for quadrilaterals and hexahedra.
//!
//! Points of a tensor-product rule are numbered with the first coordinate running fastest,
//! i.e. `q = qx + n * (qy + n * qz)`, which is the layout expected by the partial assembly
//! kernels.

/// Tensor-product weights `w[qx] * w[qy] (* w[qz])` for a `dim`-dimensional rule.
///
/// # Panics
///
/// Panics if `dim` is zero.
pub fn tensor_weights(weights1d: &[f64], dim: usize) -> Vec<f64> {
    assert!(dim > 0, "dimension must be positive");
    let n = weights1d.len();
    let num_points = n.pow(dim as u32);
    (0..num_points)
        .map(|mut q| {
            let mut w = 1.0;
            for _ in 0..dim {
                w *= weights1d[q % n];
                q /= n;
            }
            w
        })
        .collect()
}

/// Tensor-product points for a `dim`-dimensional rule, in the same order as
/// [`tensor_weights`].
pub fn tensor_points(points1d: &[f64], dim: usize) -> Vec<Vec<f64>> {
    assert!(dim > 0, "dimension must be positive");
    let n = points1d.len();
    let num_points = n.pow(dim as u32);
    (0..num_points)
        .map(|mut q| {
            let mut point = Vec::with_capacity(dim);
            for _ in 0..dim {
                point.push(points1d[q % n]);
                q /= n;
            }
            point
        })
        .collect()
}
