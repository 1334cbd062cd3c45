use crate::{distorted_mesh, reference_action};
use fenris_pa::accelerator::Accelerator;
use fenris_pa::apply::{generic, ApplyProblem, MAX_D1D, MAX_Q1D};
use fenris_pa::basis::quadrature_weights;
use fenris_pa::collocated::collocated_gradient;
use fenris_pa::config::{Backend, DispatchConfig};
use fenris_pa::dispatch::{
    fallback_kernel, kernel_key, select_apply, select_setup, specialized_kernel, ApplyVariant, KernelDispatcher,
    SetupVariant, SPECIALIZED_PAIRS,
};
use fenris_pa::setup::{setup, SetupProblem};
use fenris_pa::KernelError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use util::{assert_slices_approx_eq, pseudo_random_field};

/// Runs the CPU kernels behind the accelerator interface and counts the calls.
#[derive(Debug, Default)]
struct CountingAccelerator {
    unavailable: bool,
    max_d1d: usize,
    setup_calls: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl CountingAccelerator {
    fn new(max_d1d: usize) -> Self {
        Self {
            max_d1d,
            ..Default::default()
        }
    }

    fn unavailable() -> Self {
        Self {
            unavailable: true,
            max_d1d: usize::MAX,
            ..Default::default()
        }
    }
}

impl Accelerator<f64> for CountingAccelerator {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn supports(&self, _dim: usize, d1d: usize, _q1d: usize) -> bool {
        d1d <= self.max_d1d
    }

    fn setup(&self, problem: &SetupProblem<f64>, metric: &mut [f64]) -> Result<(), KernelError> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        setup(problem, metric)
    }

    fn apply(&self, problem: &ApplyProblem<f64>, y: &mut [f64]) -> Result<(), KernelError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        match problem.dim {
            2 => generic::apply_2d(problem, y),
            _ => generic::apply_3d(problem, y),
        }
    }
}

fn select(dim: usize, d1d: usize, q1d: usize, config: &DispatchConfig) -> Result<ApplyVariant, KernelError> {
    select_apply::<f64>(dim, d1d, q1d, config, None)
}

#[test]
fn kernel_keys() {
    assert_eq!(kernel_key(3, 4), Some(0x34));
    assert_eq!(kernel_key(2, 2), Some(0x22));
    assert_eq!(kernel_key(14, 15), Some(0xEF));
    assert_eq!(kernel_key(16, 2), None);
    assert_eq!(kernel_key(2, 16), None);
}

#[test]
fn specialized_kernels_exist_for_every_pair() {
    for cooperative in [false, true] {
        for dim in [2, 3] {
            for &(d1d, q1d) in &SPECIALIZED_PAIRS {
                assert!(specialized_kernel::<f64>(cooperative, dim, d1d, q1d).is_some());
            }
            assert!(specialized_kernel::<f64>(cooperative, dim, 3, 3).is_none());
            assert!(specialized_kernel::<f64>(cooperative, dim, 9, 10).is_none());
            assert!(fallback_kernel::<f64>(cooperative, dim).is_some());
        }
        assert!(specialized_kernel::<f64>(cooperative, 4, 2, 2).is_none());
        assert!(fallback_kernel::<f64>(cooperative, 1).is_none());
    }
}

#[test]
fn unsupported_dimensions_are_rejected() {
    let config = DispatchConfig::default();
    for dim in [0, 1, 4] {
        assert_eq!(select(dim, 3, 4, &config), Err(KernelError::UnsupportedDimension { dim }));
        assert_eq!(
            select_setup::<f64>(dim, &config, None),
            Err(KernelError::UnsupportedDimension { dim })
        );
    }
}

#[test]
fn specialized_kernels_take_precedence_over_fallback() {
    let tiled = DispatchConfig::default();
    let generic = DispatchConfig::default().with_backend(Backend::Generic);
    for dim in [2, 3] {
        assert_eq!(select(dim, 3, 4, &tiled), Ok(ApplyVariant::Tiled));
        assert_eq!(select(dim, 3, 4, &generic), Ok(ApplyVariant::Generic));
        assert_eq!(select(dim, 3, 3, &tiled), Ok(ApplyVariant::TiledFallback));
        assert_eq!(select(dim, 3, 3, &generic), Ok(ApplyVariant::GenericFallback));
        assert_eq!(
            select(dim, MAX_D1D, MAX_Q1D, &generic),
            Ok(ApplyVariant::GenericFallback)
        );
    }
}

#[test]
fn fallback_can_be_disabled() {
    let config = DispatchConfig::default().with_runtime_fallback(false);
    assert_eq!(select(2, 2, 3, &config), Ok(ApplyVariant::Tiled));
    assert_eq!(
        select(2, 3, 3, &config),
        Err(KernelError::UnknownKernel { dim: 2, d1d: 3, q1d: 3 })
    );
    assert_eq!(
        select(3, 20, 20, &config),
        Err(KernelError::UnknownKernel { dim: 3, d1d: 20, q1d: 20 })
    );
}

#[test]
fn fallback_sizes_are_bounded() {
    let config = DispatchConfig::default();
    assert_eq!(
        select(2, 15, 16, &config),
        Err(KernelError::DofsExceedMaximum { d1d: 15, max: MAX_D1D })
    );
    assert_eq!(
        select(3, 4, 15, &config),
        Err(KernelError::QuadratureExceedsMaximum { q1d: 15, max: MAX_Q1D })
    );
}

#[test]
fn collocated_toggle_applies_to_3d_only() {
    let config = DispatchConfig::default().with_collocated_gradient(true);
    assert_eq!(select(3, 3, 4, &config), Ok(ApplyVariant::Collocated));
    assert_eq!(select(3, 14, 15, &config), Ok(ApplyVariant::Collocated));
    assert_eq!(
        select(3, 2, 2, &config),
        Err(KernelError::UnsupportedCollocatedPair { d1d: 2, q1d: 2 })
    );
    assert_eq!(
        select(3, 3, 3, &config.clone().with_runtime_fallback(true)),
        Err(KernelError::UnsupportedCollocatedPair { d1d: 3, q1d: 3 })
    );
    assert_eq!(select(2, 3, 4, &config), Ok(ApplyVariant::Tiled));
    assert_eq!(select(2, 2, 2, &config), Ok(ApplyVariant::Tiled));
}

#[test]
fn accelerator_is_used_only_when_requested_available_and_supporting() {
    let accelerated = DispatchConfig::default().with_backend(Backend::Accelerated);
    let accelerator = CountingAccelerator::new(4);
    let unavailable = CountingAccelerator::unavailable();

    let select_with = |dim, d1d, q1d, config: &DispatchConfig, accelerator: Option<&dyn Accelerator<f64>>| {
        select_apply(dim, d1d, q1d, config, accelerator)
    };

    assert_eq!(
        select_with(2, 3, 4, &accelerated, Some(&accelerator)),
        Ok(ApplyVariant::Accelerated)
    );
    assert_eq!(
        select_with(3, 3, 3, &accelerated, Some(&accelerator)),
        Ok(ApplyVariant::Accelerated)
    );
    // Unsupported sizes fall through to the tiled kernels
    assert_eq!(select_with(2, 5, 6, &accelerated, Some(&accelerator)), Ok(ApplyVariant::Tiled));
    assert_eq!(select_with(2, 3, 4, &accelerated, Some(&unavailable)), Ok(ApplyVariant::Tiled));
    assert_eq!(select_with(2, 3, 4, &accelerated, None), Ok(ApplyVariant::Tiled));
    assert_eq!(
        select_with(2, 3, 4, &DispatchConfig::default(), Some(&accelerator)),
        Ok(ApplyVariant::Tiled)
    );
    // The collocated toggle is checked first
    assert_eq!(
        select_with(3, 3, 4, &accelerated.clone().with_collocated_gradient(true), Some(&accelerator)),
        Ok(ApplyVariant::Collocated)
    );

    assert_eq!(
        select_setup(2, &accelerated, Some(&accelerator as &dyn Accelerator<f64>)),
        Ok(SetupVariant::Accelerated)
    );
    assert_eq!(
        select_setup(2, &accelerated, Some(&unavailable as &dyn Accelerator<f64>)),
        Ok(SetupVariant::Cpu)
    );
    assert_eq!(select_setup::<f64>(3, &accelerated, None), Ok(SetupVariant::Cpu));
}

#[test]
fn dispatcher_runs_every_cpu_variant() {
    let configs = [
        (DispatchConfig::default(), 2, 3, 4, ApplyVariant::Tiled),
        (DispatchConfig::default(), 3, 3, 3, ApplyVariant::TiledFallback),
        (
            DispatchConfig::default().with_backend(Backend::Generic),
            3,
            2,
            3,
            ApplyVariant::Generic,
        ),
        (
            DispatchConfig::default().with_backend(Backend::Generic),
            2,
            4,
            4,
            ApplyVariant::GenericFallback,
        ),
        (
            DispatchConfig::default().with_collocated_gradient(true),
            3,
            3,
            4,
            ApplyVariant::Collocated,
        ),
        (
            DispatchConfig::default().with_batch_size(Some(3)),
            2,
            4,
            5,
            ApplyVariant::Tiled,
        ),
    ];

    for (config, dim, d1d, q1d, expected_variant) in configs {
        let mesh = distorted_mesh(dim, d1d, q1d, 5);
        let x = pseudo_random_field(mesh.field_len(), 11);
        let expected = reference_action(&mesh, &x);

        let dispatcher = KernelDispatcher::new(config);
        let problem = ApplyProblem::new(dim, mesh.num_elements, &mesh.basis, &mesh.metric, &x);
        let mut y = vec![0.0; x.len()];
        let variant = dispatcher.apply(&problem, None, &mut y).unwrap();
        assert_eq!(variant, expected_variant);
        assert_slices_approx_eq!(y, expected, abstol = 1e-11);

        // Repeated calls are bit-for-bit reproducible
        let mut z = vec![0.0; x.len()];
        dispatcher.apply(&problem, None, &mut z).unwrap();
        assert_eq!(y, z);
    }
}

#[test]
fn dispatcher_runs_collocated_kernels_for_larger_pairs() {
    let dispatcher = KernelDispatcher::<f64>::new(DispatchConfig::default().with_collocated_gradient(true));
    for (d1d, q1d) in [(5, 6), (6, 7)] {
        let mesh = distorted_mesh(3, d1d, q1d, 1);
        let x = pseudo_random_field(mesh.field_len(), 5);
        let expected = reference_action(&mesh, &x);

        let problem = ApplyProblem::new(3, mesh.num_elements, &mesh.basis, &mesh.metric, &x);
        let mut y = vec![0.0; x.len()];
        let variant = dispatcher.apply(&problem, None, &mut y).unwrap();
        assert_eq!(variant, ApplyVariant::Collocated);
        let scale = expected.iter().fold(1.0f64, |m, e| m.max(e.abs()));
        assert_slices_approx_eq!(y, expected, abstol = 1e-10 * scale);
    }
}

#[test]
fn dispatcher_uses_given_collocated_gradient() {
    let mesh = distorted_mesh(3, 4, 5, 2);
    let x = pseudo_random_field(mesh.field_len(), 2);
    let dispatcher = KernelDispatcher::<f64>::new(DispatchConfig::default().with_collocated_gradient(true));
    let problem = ApplyProblem::new(3, 2, &mesh.basis, &mesh.metric, &x);

    let colograd = collocated_gradient(&mesh.basis).unwrap();
    let mut with = vec![0.0; x.len()];
    let mut without = vec![0.0; x.len()];
    dispatcher.apply(&problem, Some(&colograd), &mut with).unwrap();
    dispatcher.apply(&problem, None, &mut without).unwrap();
    assert_eq!(with, without);
}

#[test]
fn dispatcher_delegates_to_accelerator() {
    let accelerator = Arc::new(CountingAccelerator::new(3));
    let config = DispatchConfig::default().with_backend(Backend::Accelerated);
    let dispatcher = KernelDispatcher::new(config).with_accelerator(accelerator.clone());
    assert_eq!(dispatcher.accelerator().map(|a| a.name()), Some("counting"));

    let mesh = distorted_mesh(2, 3, 4, 4);
    let weights = quadrature_weights(2, 4).unwrap();
    let problem = SetupProblem::new(2, 4, 4, &weights, mesh.jacobians.as_slice(), &1.0).unwrap();
    let mut metric = vec![0.0; problem.metric_len()];
    assert_eq!(dispatcher.setup(&problem, &mut metric), Ok(SetupVariant::Accelerated));
    assert_eq!(metric, mesh.metric);

    let x = pseudo_random_field(mesh.field_len(), 4);
    let problem = ApplyProblem::new(2, 4, &mesh.basis, &metric, &x);
    let mut y = vec![0.0; x.len()];
    assert_eq!(dispatcher.apply(&problem, None, &mut y), Ok(ApplyVariant::Accelerated));
    assert_slices_approx_eq!(y, reference_action(&mesh, &x), abstol = 1e-12);

    // Sizes the accelerator does not support run on the CPU
    let large = distorted_mesh(2, 4, 5, 1);
    let x = pseudo_random_field(large.field_len(), 4);
    let problem = ApplyProblem::new(2, 1, &large.basis, &large.metric, &x);
    let mut y = vec![0.0; x.len()];
    assert_eq!(dispatcher.apply(&problem, None, &mut y), Ok(ApplyVariant::Tiled));

    assert_eq!(accelerator.setup_calls.load(Ordering::SeqCst), 1);
    assert_eq!(accelerator.apply_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn dispatcher_verifies_buffers_before_accelerating() {
    let accelerator = Arc::new(CountingAccelerator::new(8));
    let config = DispatchConfig::default().with_backend(Backend::Accelerated);
    let dispatcher = KernelDispatcher::new(config).with_accelerator(accelerator.clone());

    let mesh = distorted_mesh(3, 2, 3, 2);
    let x = pseudo_random_field(mesh.field_len(), 4);
    let problem = ApplyProblem::new(3, 2, &mesh.basis, &mesh.metric, &x);
    let mut y = vec![0.0; x.len() - 1];
    assert!(matches!(
        dispatcher.apply(&problem, None, &mut y),
        Err(KernelError::BufferSizeMismatch { buffer: "output", .. })
    ));
    assert_eq!(accelerator.apply_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn dispatcher_falls_back_without_accelerator() {
    let config = DispatchConfig::default().with_backend(Backend::Accelerated);
    let dispatcher = KernelDispatcher::<f64>::new(config);
    assert_eq!(dispatcher.select_setup(3), Ok(SetupVariant::Cpu));
    assert_eq!(dispatcher.select_apply(3, 2, 3), Ok(ApplyVariant::Tiled));

    let mesh = distorted_mesh(3, 2, 3, 2);
    let weights = quadrature_weights(3, 3).unwrap();
    let problem = SetupProblem::new(3, 3, 2, &weights, mesh.jacobians.as_slice(), &1.0).unwrap();
    let mut metric = vec![0.0; problem.metric_len()];
    assert_eq!(dispatcher.setup(&problem, &mut metric), Ok(SetupVariant::Cpu));
    assert_eq!(metric, mesh.metric);
}
