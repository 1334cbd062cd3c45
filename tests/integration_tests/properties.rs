use crate::{assemble_metric, basis, cpu_configs};
use fenris_pa::apply::{generic, tiled, ApplyKernel, ApplyProblem};
use fenris_pa::basis::BasisTables;
use fenris_pa::dispatch::{specialized_kernel, KernelDispatcher};
use fenris_pa::geometry::QuadratureJacobians;
use fenris_pa::proptest::{nodal_field, quadrature_jacobians, specialized_sizes};
use proptest::prelude::*;
use util::{dense_apply, dot};

/// A small mesh with arbitrary geometry together with two element-local fields.
#[derive(Debug)]
struct Case {
    dim: usize,
    basis: BasisTables<f64>,
    jacobians: QuadratureJacobians<f64>,
    metric: Vec<f64>,
    x: Vec<f64>,
    z: Vec<f64>,
}

impl Case {
    fn problem<'a>(&'a self, input: &'a [f64]) -> ApplyProblem<'a, f64> {
        ApplyProblem::new(self.dim, self.jacobians.num_elements(), &self.basis, &self.metric, input)
    }

    fn apply(&self, kernel: ApplyKernel<f64>, input: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; input.len()];
        kernel(&self.problem(input), &mut y).unwrap();
        y
    }
}

fn case() -> impl Strategy<Value = Case> {
    let sizes = specialized_sizes().prop_filter("dense reference is too slow for large elements", |&(dim, d1d, _)| {
        d1d <= if dim == 2 { 6 } else { 4 }
    });
    (sizes, 1..=3usize).prop_flat_map(|((dim, d1d, q1d), num_elements)| {
        let len = d1d.pow(dim as u32) * num_elements;
        (
            quadrature_jacobians(dim, q1d.pow(dim as u32), num_elements),
            nodal_field(len),
            nodal_field(len),
        )
            .prop_map(move |(jacobians, x, z)| {
                let metric = assemble_metric(&jacobians, q1d);
                Case {
                    dim,
                    basis: basis(d1d, q1d),
                    jacobians,
                    metric,
                    x,
                    z,
                }
            })
    })
}

fn runtime_kernel(dim: usize, cooperative: bool) -> ApplyKernel<f64> {
    match (dim, cooperative) {
        (2, false) => generic::apply_2d,
        (2, true) => tiled::apply_2d,
        (_, false) => generic::apply_3d,
        (_, true) => tiled::apply_3d,
    }
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |m, v| m.max(v.abs()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn kernels_agree_with_dense_reference(case in case()) {
        let mut expected = vec![0.0; case.x.len()];
        dense_apply(case.dim, case.basis.b(), case.basis.g(), &case.metric, &case.x, &mut expected);
        let tol = 1e-12 * (1.0 + max_abs(&expected));

        let (d1d, q1d) = (case.basis.dofs_1d(), case.basis.quadrature_points_1d());
        for cooperative in [false, true] {
            let specialized = specialized_kernel(cooperative, case.dim, d1d, q1d).unwrap();
            for kernel in [specialized, runtime_kernel(case.dim, cooperative)] {
                let y = case.apply(kernel, &case.x);
                for (y_i, e_i) in y.iter().zip(&expected) {
                    prop_assert!((y_i - e_i).abs() <= tol, "{} vs {}", y_i, e_i);
                }
            }
        }
    }

    #[test]
    fn operator_is_symmetric(case in case()) {
        let kernel = runtime_kernel(case.dim, true);
        let ax = case.apply(kernel, &case.x);
        let az = case.apply(kernel, &case.z);
        let (xaz, zax) = (dot(&case.x, &az), dot(&case.z, &ax));
        prop_assert!((xaz - zax).abs() <= 1e-11 * (1.0 + xaz.abs()));
    }

    #[test]
    fn operator_is_positive_semidefinite(case in case()) {
        let ax = case.apply(runtime_kernel(case.dim, false), &case.x);
        prop_assert!(dot(&case.x, &ax) >= -1e-12);
    }

    #[test]
    fn operator_is_linear(case in case(), alpha in -2.0f64..2.0, beta in -2.0f64..2.0) {
        let kernel = runtime_kernel(case.dim, true);
        let combined: Vec<f64> = case.x.iter().zip(&case.z).map(|(x, z)| alpha * x + beta * z).collect();
        let ax = case.apply(kernel, &case.x);
        let az = case.apply(kernel, &case.z);
        let a_combined = case.apply(kernel, &combined);
        let tol = 1e-11 * (1.0 + max_abs(&ax) + max_abs(&az));
        for i in 0..combined.len() {
            prop_assert!((a_combined[i] - (alpha * ax[i] + beta * az[i])).abs() <= tol);
        }
    }

    #[test]
    fn constants_are_in_the_null_space(case in case(), c in -10.0f64..10.0) {
        let constant = vec![c; case.x.len()];
        for cooperative in [false, true] {
            let y = case.apply(runtime_kernel(case.dim, cooperative), &constant);
            prop_assert!(max_abs(&y) <= 1e-11 * (1.0 + c.abs()) * (1.0 + max_abs(&case.metric)));
        }
    }

    #[test]
    fn dispatch_is_deterministic(case in case()) {
        for (name, config) in cpu_configs() {
            let dispatcher = KernelDispatcher::new(config);
            let problem = case.problem(&case.x);
            let mut first = vec![0.0; case.x.len()];
            let mut second = vec![0.0; case.x.len()];
            // Not every configuration supports every size
            if dispatcher.apply(&problem, None, &mut first).is_ok() {
                dispatcher.apply(&problem, None, &mut second).unwrap();
                prop_assert_eq!(&first, &second, "{}", name);
            }
        }
    }
}
