//! Scalar diffusion coefficients.
use crate::Real;

/// A scalar coefficient of the diffusion operator.
///
/// The partial assembly kernels fold the coefficient into the metric tensor during Setup and
/// only support coefficients that are constant in space. Coefficients that vary are still
/// representable, so that callers can hand them over and receive a proper error.
pub trait Coefficient<T: Real> {
    /// The value of the coefficient, if it is the same everywhere.
    fn constant_value(&self) -> Option<T>;
}

macro_rules! impl_constant_coefficient_for_scalar {
    ($($scalar:ty),*) => {
        $(
            impl Coefficient<$scalar> for $scalar {
                fn constant_value(&self) -> Option<$scalar> {
                    Some(*self)
                }
            }
        )*
    };
}

impl_constant_coefficient_for_scalar!(f32, f64);

/// A coefficient with the same value everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantCoefficient<T>(pub T);

impl<T: Real> Coefficient<T> for ConstantCoefficient<T> {
    fn constant_value(&self) -> Option<T> {
        Some(self.0)
    }
}

impl<T: Real> Default for ConstantCoefficient<T> {
    fn default() -> Self {
        Self(T::one())
    }
}

/// A coefficient given by its values at every quadrature point of every element.
///
/// Never treated as constant, even if all values happen to coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureCoefficient<T> {
    /// Values laid out as `(NQ, NE)`.
    pub values: Vec<T>,
}

impl<T> QuadratureCoefficient<T> {
    pub fn from_values(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T: Real> Coefficient<T> for QuadratureCoefficient<T> {
    fn constant_value(&self) -> Option<T> {
        None
    }
}

impl<'a, T: Real, C: Coefficient<T> + ?Sized> Coefficient<T> for &'a C {
    fn constant_value(&self) -> Option<T> {
        (**self).constant_value()
    }
}
