//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::{Error, Rule1d};
use std::f64::consts::PI;

const MAX_NEWTON_ITERATIONS: usize = 100;

/// Values of the Legendre polynomials $P_n(x)$ and $P_{n - 1}(x)$, computed by the
/// three-term recurrence.
#[derive(Debug, Default, Clone, Copy)]
struct LegendrePair {
    n: usize,
    x: f64,
    // p_n(x)
    current: f64,
    // p_{n - 1}(x)
    previous: f64,
}

impl LegendrePair {
    fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut current = 1.0;
        let mut previous = 0.0;
        for m in 1..=n {
            let m = m as f64;
            let next = ((2.0 * m - 1.0) * x * current - (m - 1.0) * previous) / m;
            previous = current;
            current = next;
        }
        Self { n, x, current, previous }
    }

    /// Derivative of $P_n$. Not defined at `|x| == 1`.
    fn derivative(&self) -> f64 {
        let n = self.n as f64;
        n * (self.x * self.current - self.previous) / (self.x * self.x - 1.0)
    }
}

/// Gauss quadrature for the reference interval `[-1, 1]`.
///
/// Given `n` points, the rule integrates polynomials of degree up to `2 n - 1` exactly.
/// Points are returned in ascending order.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule1d {
    try_gauss(num_points).expect("number of points must be positive")
}

/// Same as [`gauss`], but returns an error instead of panicking when `num_points == 0`.
pub fn try_gauss(num_points: usize) -> Result<Rule1d, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    // Roots are symmetric about the origin, so we only search for the positive half
    // (Numerical Recipes, 3rd ed., section 4.6)
    let m = (n + 1) / 2;
    let mut positive_roots = Vec::with_capacity(m);
    for i in 0..m {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = LegendrePair::evaluate(n, x).derivative();
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let legendre = LegendrePair::evaluate(n, x);
            dp = legendre.derivative();
            let dx = -legendre.current / dp;
            x += dx;
            if dx.abs() <= 1e-15 {
                dp = LegendrePair::evaluate(n, x).derivative();
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        positive_roots.push((x, w));
    }

    // The roots were found in descending order, mirror them to obtain ascending order
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for &(x, w) in &positive_roots {
        points.push(-x);
        weights.push(w);
    }
    let skip_center = n % 2;
    for &(x, w) in positive_roots.iter().rev().skip(skip_center) {
        points.push(x);
        weights.push(w);
    }
    // The middle root of an odd rule is exactly zero
    if skip_center == 1 {
        points[m - 1] = 0.0;
    }

    assert_eq!(points.len(), n, "Internal error: incorrect number of points produced");
    Ok((weights, points))
}

/// Gauss-Lobatto-Legendre quadrature for the reference interval `[-1, 1]`.
///
/// The rule contains both end points and integrates polynomials of degree up to `2 n - 3`
/// exactly. The points are the customary nodes of high-order Lagrange elements.
/// Returns an error if fewer than two points are requested.
pub fn try_gauss_lobatto(num_points: usize) -> Result<Rule1d, Error> {
    let n = num_points;
    if n < 2 {
        return Err(Error::NoRuleAvailable);
    }
    let degree = n - 1;

    // Newton iteration on (1 - x^2) P'_{n-1}(x), started from the Chebyshev-Gauss-Lobatto
    // points. The end points are fixed points of the update.
    let mut points: Vec<f64> = (0..n)
        .map(|i| -(PI * i as f64 / degree as f64).cos())
        .collect();
    let mut weights = vec![0.0; n];
    for (x, w) in points.iter_mut().zip(weights.iter_mut()) {
        if x.abs() > 1.0 - 1e-14 {
            *x = x.signum();
        }
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let legendre = LegendrePair::evaluate(degree, *x);
            let dx = (*x * legendre.current - legendre.previous) / (n as f64 * legendre.current);
            *x -= dx;
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let p = LegendrePair::evaluate(degree, *x).current;
        *w = 2.0 / ((degree * n) as f64 * p * p);
    }

    // Exact symmetry, including an exactly zero center point for odd rules
    for i in 0..n / 2 {
        let j = n - 1 - i;
        let x = 0.5 * (points[j] - points[i]);
        let w = 0.5 * (weights[i] + weights[j]);
        points[i] = -x;
        points[j] = x;
        weights[i] = w;
        weights[j] = w;
    }
    if n % 2 == 1 {
        points[n / 2] = 0.0;
    }

    Ok((weights, points))
}

/// Same as [`try_gauss_lobatto`], but panics if fewer than two points are requested.
pub fn gauss_lobatto(num_points: usize) -> Rule1d {
    try_gauss_lobatto(num_points).expect("Gauss-Lobatto rules need at least two points")
}
