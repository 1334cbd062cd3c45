//! One-dimensional building blocks for tensor-product finite elements.
//!
//! The partial assembly kernels in `fenris-pa` never evaluate basis functions themselves.
//! Instead they consume 1D tables: the values and derivatives of every nodal basis function
//! at every quadrature point of the reference interval. This crate produces those tables,
//! together with the 1D quadrature rules they are evaluated at.
//!
//! Everything here works with `f64`. Conversion to other scalar types happens in `fenris-pa`.
//!
//! Rules are constructed on the interval `[-1, 1]` and can be mapped to the unit interval
//! `[0, 1]` with [`to_unit_interval`], which is the reference interval used by `fenris-pa`.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod lagrange;
pub mod tensor;
pub mod univariate;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable,
    /// Two interpolation nodes coincide, so no Lagrange basis exists.
    DuplicateNodes,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable => {
                write!(f, "There is no quadrature rule satisfying the requirements available")
            }
            Self::DuplicateNodes => write!(f, "Lagrange interpolation nodes must be distinct"),
        }
    }
}

impl std::error::Error for Error {}

/// A one-dimensional rule, consisting of weights and points.
pub type Rule1d = (Vec<f64>, Vec<f64>);

/// Maps a rule on `[-1, 1]` to the unit interval `[0, 1]`.
///
/// Points are mapped by `x -> (x + 1) / 2` and weights are halved, so that the weights of the
/// mapped rule sum to one.
pub fn to_unit_interval(rule: Rule1d) -> Rule1d {
    let (weights, points) = rule;
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|x| 0.5 * (x + 1.0)).collect();
    (weights, points)
}

/// Approximates the integral of `f` with the given rule.
pub fn integrate(rule: &Rule1d, f: impl Fn(f64) -> f64) -> f64 {
    let (weights, points) = rule;
    weights.iter().zip(points).map(|(w, x)| w * f(*x)).sum()
}
