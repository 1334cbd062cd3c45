//! Kernel selection.
//!
//! Selection is a pure function of the problem sizes, the [`DispatchConfig`] and the
//! availability of an accelerator. Checks are made in a fixed order:
//!
//! 1. the dimension must be 2 or 3,
//! 2. with the collocated toggle on, 3D problems must use a collocated kernel (the toggle
//!    has no effect in 2D),
//! 3. an accelerator is used if requested, available and supporting the sizes,
//! 4. size-specialized kernels are looked up by the packed key `(D1D << 4) | Q1D`,
//! 5. otherwise the runtime-sized kernels run if permitted and the sizes are within bounds.
use crate::accelerator::Accelerator;
use crate::apply::{generic, tiled, ApplyKernel, ApplyProblem, MAX_D1D, MAX_Q1D};
use crate::collocated::{collocated_gradient, collocated_kernel, is_supported as collocated_supported};
use crate::config::{Backend, DispatchConfig};
use crate::error::KernelError;
use crate::nalgebra::DMatrix;
use crate::setup::{setup, SetupProblem};
use crate::Real;
use log::{debug, warn};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// `(D1D, Q1D)` pairs with size-specialized generic and tiled kernels, in 2D and 3D.
pub const SPECIALIZED_PAIRS: [(usize, usize); 8] = [(2, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 7), (7, 8), (8, 9)];

/// Packs a size pair into the lookup key `(D1D << 4) | Q1D`.
///
/// Returns `None` if either size does not fit into four bits.
pub fn kernel_key(d1d: usize, q1d: usize) -> Option<usize> {
    (d1d < 16 && q1d < 16).then_some((d1d << 4) | q1d)
}

macro_rules! kernel_table {
    ($module:ident, $dim:expr, $key:expr; $(($d:literal, $q:literal) => $k:literal),* $(,)?) => {
        match ($dim, $key) {
            $((2, $k) => Some($module::apply_2d_fixed::<T, $d, $q> as ApplyKernel<T>),)*
            $((3, $k) => Some($module::apply_3d_fixed::<T, $d, $q> as ApplyKernel<T>),)*
            _ => None,
        }
    };
}

macro_rules! specialized_table {
    ($module:ident, $dim:expr, $key:expr) => {
        kernel_table!($module, $dim, $key;
            (2, 2) => 0x22,
            (2, 3) => 0x23,
            (3, 4) => 0x34,
            (4, 5) => 0x45,
            (5, 6) => 0x56,
            (6, 7) => 0x67,
            (7, 8) => 0x78,
            (8, 9) => 0x89,
        )
    };
}

/// Looks up a size-specialized kernel, tiled if `cooperative` is set.
pub fn specialized_kernel<T: Real>(cooperative: bool, dim: usize, d1d: usize, q1d: usize) -> Option<ApplyKernel<T>> {
    let key = kernel_key(d1d, q1d)?;
    if cooperative {
        specialized_table!(tiled, dim, key)
    } else {
        specialized_table!(generic, dim, key)
    }
}

/// The runtime-sized kernel of a strategy.
pub fn fallback_kernel<T: Real>(cooperative: bool, dim: usize) -> Option<ApplyKernel<T>> {
    let kernel: ApplyKernel<T> = match (cooperative, dim) {
        (false, 2) => generic::apply_2d,
        (false, 3) => generic::apply_3d,
        (true, 2) => tiled::apply_2d,
        (true, 3) => tiled::apply_3d,
        _ => return None,
    };
    Some(kernel)
}

/// The Setup implementation chosen for a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupVariant {
    Cpu,
    Accelerated,
}

/// The Apply implementation chosen for a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyVariant {
    /// Size-specialized private-scratch kernel.
    Generic,
    /// Runtime-sized private-scratch kernel.
    GenericFallback,
    /// Size-specialized tiled kernel.
    Tiled,
    /// Runtime-sized tiled kernel.
    TiledFallback,
    /// Collocated-gradient kernel (3D only).
    Collocated,
    /// Third-party accelerator.
    Accelerated,
}

impl Display for ApplyVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generic => "generic",
            Self::GenericFallback => "generic (runtime-sized)",
            Self::Tiled => "tiled",
            Self::TiledFallback => "tiled (runtime-sized)",
            Self::Collocated => "collocated",
            Self::Accelerated => "accelerated",
        };
        write!(f, "{name}")
    }
}

fn check_dim(dim: usize) -> Result<(), KernelError> {
    if (2..=3).contains(&dim) {
        Ok(())
    } else {
        Err(KernelError::UnsupportedDimension { dim })
    }
}

fn accelerator_usable<T: Real>(accelerator: Option<&dyn Accelerator<T>>) -> Option<&dyn Accelerator<T>> {
    accelerator.filter(|accelerator| accelerator.is_available())
}

/// Chooses the Setup implementation.
pub fn select_setup<T: Real>(
    dim: usize,
    config: &DispatchConfig,
    accelerator: Option<&dyn Accelerator<T>>,
) -> Result<SetupVariant, KernelError> {
    check_dim(dim)?;
    if config.backend == Backend::Accelerated && accelerator_usable(accelerator).is_some() {
        Ok(SetupVariant::Accelerated)
    } else {
        Ok(SetupVariant::Cpu)
    }
}

/// Chooses the Apply implementation.
pub fn select_apply<T: Real>(
    dim: usize,
    d1d: usize,
    q1d: usize,
    config: &DispatchConfig,
    accelerator: Option<&dyn Accelerator<T>>,
) -> Result<ApplyVariant, KernelError> {
    check_dim(dim)?;

    if config.collocated_gradient && dim == 3 {
        return if collocated_supported(d1d, q1d) {
            Ok(ApplyVariant::Collocated)
        } else {
            Err(KernelError::UnsupportedCollocatedPair { d1d, q1d })
        };
    }

    if config.backend == Backend::Accelerated {
        if let Some(accelerator) = accelerator_usable(accelerator) {
            if accelerator.supports(dim, d1d, q1d) {
                return Ok(ApplyVariant::Accelerated);
            }
        }
    }

    let cooperative = config.backend != Backend::Generic;
    if specialized_kernel::<T>(cooperative, dim, d1d, q1d).is_some() {
        return Ok(if cooperative {
            ApplyVariant::Tiled
        } else {
            ApplyVariant::Generic
        });
    }

    if !config.runtime_fallback {
        return Err(KernelError::UnknownKernel { dim, d1d, q1d });
    }
    if d1d > MAX_D1D {
        return Err(KernelError::DofsExceedMaximum { d1d, max: MAX_D1D });
    }
    if q1d > MAX_Q1D {
        return Err(KernelError::QuadratureExceedsMaximum { q1d, max: MAX_Q1D });
    }
    Ok(if cooperative {
        ApplyVariant::TiledFallback
    } else {
        ApplyVariant::GenericFallback
    })
}

/// Runs Setup and Apply on the kernels chosen by [`select_setup`] and [`select_apply`].
pub struct KernelDispatcher<T: Real> {
    config: DispatchConfig,
    accelerator: Option<Arc<dyn Accelerator<T>>>,
}

impl<T: Real> Clone for KernelDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            accelerator: self.accelerator.clone(),
        }
    }
}

impl<T: Real> fmt::Debug for KernelDispatcher<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelDispatcher")
            .field("config", &self.config)
            .field("accelerator", &self.accelerator.as_ref().map(|a| a.name().to_string()))
            .finish()
    }
}

impl<T: Real> Default for KernelDispatcher<T> {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl<T: Real> KernelDispatcher<T> {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            accelerator: None,
        }
    }

    pub fn with_accelerator(self, accelerator: Arc<dyn Accelerator<T>>) -> Self {
        Self {
            accelerator: Some(accelerator),
            ..self
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn accelerator(&self) -> Option<&dyn Accelerator<T>> {
        self.accelerator.as_deref()
    }

    fn warn_ignored_options(&self, dim: usize) {
        if self.config.backend == Backend::Accelerated && accelerator_usable(self.accelerator()).is_none() {
            warn!("Accelerated backend requested, but no accelerator is available. Using CPU kernels.");
        }
        if self.config.collocated_gradient && dim == 2 {
            warn!("Collocated gradient is only available in 3D, ignoring it for a 2D problem.");
        }
    }

    pub fn select_setup(&self, dim: usize) -> Result<SetupVariant, KernelError> {
        select_setup(dim, &self.config, self.accelerator())
    }

    pub fn select_apply(&self, dim: usize, d1d: usize, q1d: usize) -> Result<ApplyVariant, KernelError> {
        select_apply(dim, d1d, q1d, &self.config, self.accelerator())
    }

    /// Computes the metric tensor, overwriting `metric`.
    pub fn setup(&self, problem: &SetupProblem<T>, metric: &mut [T]) -> Result<SetupVariant, KernelError> {
        let variant = self.select_setup(problem.dim)?;
        debug!("Dispatching {}D setup to {:?}", problem.dim, variant);
        match (variant, self.accelerator()) {
            (SetupVariant::Accelerated, Some(accelerator)) => {
                problem.check(metric.len())?;
                accelerator.setup(problem, metric)?
            }
            _ => setup(problem, metric)?,
        }
        Ok(variant)
    }

    /// Accumulates the operator action into `y`.
    ///
    /// The collocated kernels need the collocated gradient of the basis. If none is given,
    /// it is built for this call.
    pub fn apply(
        &self,
        problem: &ApplyProblem<T>,
        colograd: Option<&DMatrix<T>>,
        y: &mut [T],
    ) -> Result<ApplyVariant, KernelError> {
        let (dim, d1d, q1d) = (problem.dim, problem.d1d, problem.q1d);
        self.warn_ignored_options(dim);
        let variant = self.select_apply(dim, d1d, q1d)?;
        debug!(
            "Dispatching {}D apply (D1D = {}, Q1D = {}) to {} kernel",
            dim, d1d, q1d, variant
        );
        let problem = problem.with_batch_size(problem.batch_size.or(self.config.batch_size));
        let problem = &problem;

        let cooperative = matches!(variant, ApplyVariant::Tiled | ApplyVariant::TiledFallback);
        let unknown = KernelError::UnknownKernel { dim, d1d, q1d };
        match variant {
            ApplyVariant::Generic | ApplyVariant::Tiled => {
                let kernel = specialized_kernel(cooperative, dim, d1d, q1d).ok_or(unknown)?;
                kernel(problem, y)?;
            }
            ApplyVariant::GenericFallback | ApplyVariant::TiledFallback => {
                let kernel = fallback_kernel(cooperative, dim).ok_or(unknown)?;
                kernel(problem, y)?;
            }
            ApplyVariant::Collocated => {
                let kernel = collocated_kernel(d1d, q1d).ok_or(unknown)?;
                match colograd {
                    Some(colograd) => kernel(problem, colograd, y)?,
                    None => kernel(problem, &collocated_gradient(problem.basis)?, y)?,
                }
            }
            ApplyVariant::Accelerated => {
                let accelerator = self.accelerator().ok_or(unknown)?;
                problem.check(y.len())?;
                accelerator.apply(problem, y)?;
            }
        }
        Ok(variant)
    }
}
