//! High-level diffusion operator.
//!
//! [`DiffusionOperator`] owns the basis tables and the metric tensor of a mesh, and computes
//! the action of the element stiffness matrices on element-local fields. Gathering global
//! dofs into element-local fields (and scattering the result back) is left to the caller.
//!
//! ```
//! use fenris_pa::basis::BasisTables;
//! use fenris_pa::geometry::QuadratureJacobians;
//! use fenris_pa::nalgebra::DMatrix;
//! use fenris_pa::operator::DiffusionOperatorBuilder;
//!
//! # fn main() -> eyre::Result<()> {
//! let basis = BasisTables::<f64>::gauss_lobatto_gauss(3, 4)?;
//! let jacobians = QuadratureJacobians::from_affine(2, 16, 1, &DMatrix::identity(2, 2));
//! let operator = DiffusionOperatorBuilder::new()
//!     .with_basis(basis)
//!     .with_jacobians(&jacobians)
//!     .with_coefficient(1.0)
//!     .build()?;
//!
//! // A constant field is in the null space of the operator
//! let y = operator.apply(&vec![1.0; operator.element_dofs()])?;
//! assert!(y.iter().all(|y_i| y_i.abs() < 1e-12));
//! # Ok(())
//! # }
//! ```
use crate::accelerator::Accelerator;
use crate::apply::ApplyProblem;
use crate::basis::{quadrature_weights, BasisTables};
use crate::coefficient::Coefficient;
use crate::collocated::collocated_gradient;
use crate::config::DispatchConfig;
use crate::dispatch::{ApplyVariant, KernelDispatcher};
use crate::error::KernelError;
use crate::geometry::QuadratureJacobians;
use crate::nalgebra::DMatrix;
use crate::setup::SetupProblem;
use crate::{symmetric_entries, Real};
use eyre::{eyre, WrapErr};
use std::sync::Arc;

/// Builder for [`DiffusionOperator`].
///
/// The basis, the Jacobians and the coefficient are required. Quadrature weights default to
/// the tensor-product Gauss rule matching the number of quadrature points of the basis.
pub struct DiffusionOperatorBuilder<T: Real, Basis, Jacobians, Coeff> {
    basis: Basis,
    jacobians: Jacobians,
    coefficient: Coeff,
    weights: Option<Vec<T>>,
    config: DispatchConfig,
    accelerator: Option<Arc<dyn Accelerator<T>>>,
}

impl<T: Real> DiffusionOperatorBuilder<T, (), (), ()> {
    pub fn new() -> Self {
        Self {
            basis: (),
            jacobians: (),
            coefficient: (),
            weights: None,
            config: DispatchConfig::default(),
            accelerator: None,
        }
    }
}

impl<T: Real> Default for DiffusionOperatorBuilder<T, (), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real, Jacobians, Coeff> DiffusionOperatorBuilder<T, (), Jacobians, Coeff> {
    pub fn with_basis(self, basis: BasisTables<T>) -> DiffusionOperatorBuilder<T, BasisTables<T>, Jacobians, Coeff> {
        DiffusionOperatorBuilder {
            basis,
            jacobians: self.jacobians,
            coefficient: self.coefficient,
            weights: self.weights,
            config: self.config,
            accelerator: self.accelerator,
        }
    }
}

impl<T: Real, Basis, Coeff> DiffusionOperatorBuilder<T, Basis, (), Coeff> {
    pub fn with_jacobians(
        self,
        jacobians: &QuadratureJacobians<T>,
    ) -> DiffusionOperatorBuilder<T, Basis, &QuadratureJacobians<T>, Coeff> {
        DiffusionOperatorBuilder {
            basis: self.basis,
            jacobians,
            coefficient: self.coefficient,
            weights: self.weights,
            config: self.config,
            accelerator: self.accelerator,
        }
    }
}

impl<T: Real, Basis, Jacobians> DiffusionOperatorBuilder<T, Basis, Jacobians, ()> {
    pub fn with_coefficient<C: Coefficient<T>>(
        self,
        coefficient: C,
    ) -> DiffusionOperatorBuilder<T, Basis, Jacobians, C> {
        DiffusionOperatorBuilder {
            basis: self.basis,
            jacobians: self.jacobians,
            coefficient,
            weights: self.weights,
            config: self.config,
            accelerator: self.accelerator,
        }
    }
}

impl<T: Real, Basis, Jacobians, Coeff> DiffusionOperatorBuilder<T, Basis, Jacobians, Coeff> {
    /// Overrides the quadrature weights, ordered as `q = qx + Q1D * (qy + Q1D * qz)`.
    pub fn with_quadrature_weights(self, weights: Vec<T>) -> Self {
        Self {
            weights: Some(weights),
            ..self
        }
    }

    pub fn with_config(self, config: DispatchConfig) -> Self {
        Self { config, ..self }
    }

    pub fn with_accelerator(self, accelerator: Arc<dyn Accelerator<T>>) -> Self {
        Self {
            accelerator: Some(accelerator),
            ..self
        }
    }
}

impl<'a, T: Real, C: Coefficient<T>> DiffusionOperatorBuilder<T, BasisTables<T>, &'a QuadratureJacobians<T>, C> {
    /// Selects the kernels and runs Setup.
    ///
    /// Fails if the sizes are inconsistent or no kernel can handle them, so that a built
    /// operator can always be applied.
    pub fn build(self) -> eyre::Result<DiffusionOperator<T>> {
        let basis = self.basis;
        let jacobians = self.jacobians;
        let dim = jacobians.dim();
        let q1d = basis.quadrature_points_1d();
        let d1d = basis.dofs_1d();

        let mut dispatcher = KernelDispatcher::new(self.config);
        if let Some(accelerator) = self.accelerator {
            dispatcher = dispatcher.with_accelerator(accelerator);
        }
        let variant = dispatcher
            .select_apply(dim, d1d, q1d)
            .wrap_err("no apply kernel is available for the operator")?;

        let weights = match self.weights {
            Some(weights) => weights,
            None => quadrature_weights(dim, q1d)?,
        };
        let colograd = if variant == ApplyVariant::Collocated {
            Some(collocated_gradient(&basis).wrap_err("failed to build collocated gradient")?)
        } else {
            None
        };

        let mut operator = DiffusionOperator {
            dim,
            num_elements: 0,
            basis,
            weights,
            metric: Vec::new(),
            colograd,
            dispatcher,
            variant,
        };
        operator.reassemble(jacobians, &self.coefficient)?;
        Ok(operator)
    }
}

/// The diffusion operator of a mesh of tensor-product elements, in partially assembled form.
#[derive(Debug, Clone)]
pub struct DiffusionOperator<T: Real> {
    dim: usize,
    num_elements: usize,
    basis: BasisTables<T>,
    weights: Vec<T>,
    metric: Vec<T>,
    colograd: Option<DMatrix<T>>,
    dispatcher: KernelDispatcher<T>,
    variant: ApplyVariant,
}

impl<T: Real> DiffusionOperator<T> {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Number of dofs of a single element, `D1D^dim`.
    pub fn element_dofs(&self) -> usize {
        self.basis.dofs_1d().pow(self.dim as u32)
    }

    pub fn basis(&self) -> &BasisTables<T> {
        &self.basis
    }

    /// The metric tensor, shape `(NQ, S, NE)`.
    pub fn metric(&self) -> &[T] {
        &self.metric
    }

    /// The Apply variant chosen when the operator was built.
    pub fn variant(&self) -> ApplyVariant {
        self.variant
    }

    /// The collocated gradient, present if the operator uses the collocated kernels.
    pub fn collocated_gradient(&self) -> Option<&DMatrix<T>> {
        self.colograd.as_ref()
    }

    pub fn config(&self) -> &DispatchConfig {
        self.dispatcher.config()
    }

    /// Recomputes the metric tensor for new geometry or a new coefficient.
    ///
    /// The number of elements may change, the dimension and the number of quadrature points
    /// may not.
    pub fn reassemble(
        &mut self,
        jacobians: &QuadratureJacobians<T>,
        coefficient: &impl Coefficient<T>,
    ) -> eyre::Result<()> {
        let q1d = self.basis.quadrature_points_1d();
        if jacobians.dim() != self.dim {
            return Err(eyre!(
                "Jacobians are {}-dimensional, but the operator is {}-dimensional",
                jacobians.dim(),
                self.dim
            ));
        }
        if jacobians.num_points() != q1d.pow(self.dim as u32) {
            return Err(KernelError::BufferSizeMismatch {
                buffer: "jacobians",
                expected: q1d.pow(self.dim as u32),
                actual: jacobians.num_points(),
            })
            .wrap_err("number of quadrature points does not match the basis");
        }

        let num_elements = jacobians.num_elements();
        let problem = SetupProblem::new(
            self.dim,
            q1d,
            num_elements,
            &self.weights,
            jacobians.as_slice(),
            coefficient,
        )?;
        let mut metric = vec![T::zero(); problem.num_points() * symmetric_entries(self.dim) * num_elements];
        self.dispatcher
            .setup(&problem, &mut metric)
            .wrap_err("failed to compute metric tensor")?;
        self.metric = metric;
        self.num_elements = num_elements;
        Ok(())
    }

    /// Accumulates the action of the operator on the element-local field `x` into `y`.
    ///
    /// Both fields have shape `(D1D, ..., NE)`.
    pub fn apply_into(&self, x: &[T], y: &mut [T]) -> eyre::Result<()> {
        let problem = ApplyProblem::new(self.dim, self.num_elements, &self.basis, &self.metric, x);
        self.dispatcher
            .apply(&problem, self.colograd.as_ref(), y)
            .wrap_err("failed to apply diffusion operator")?;
        Ok(())
    }

    /// Computes the action of the operator on the element-local field `x`.
    pub fn apply(&self, x: &[T]) -> eyre::Result<Vec<T>> {
        let mut y = vec![T::zero(); self.element_dofs() * self.num_elements];
        self.apply_into(x, &mut y)?;
        Ok(y)
    }
}
