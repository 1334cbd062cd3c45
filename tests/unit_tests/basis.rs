use fenris_pa::basis::{gauss_unit_interval, quadrature_weights, BasisError, BasisTables};
use fenris_pa::nalgebra::DMatrix;
use fenris_pa::KernelError;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};

#[test]
fn tables_have_expected_shapes() {
    let basis = BasisTables::<f64>::gauss_lobatto_gauss(3, 5).unwrap();
    assert_eq!(basis.dofs_1d(), 3);
    assert_eq!(basis.quadrature_points_1d(), 5);
    assert_eq!(basis.b().shape(), (5, 3));
    assert_eq!(basis.g().shape(), (5, 3));
    assert_matrix_eq!(basis.bt().clone(), basis.b().transpose());
    assert_matrix_eq!(basis.gt().clone(), basis.g().transpose());
    assert_eq!(basis.b_view().shape(), [5, 3]);
    assert_eq!(basis.gt_view().shape(), [3, 5]);
    assert_eq!(basis.b_view()[[4, 1]], basis.b()[(4, 1)]);
    assert_eq!(basis.gt_view()[[2, 3]], basis.g()[(3, 2)]);
    assert!(basis.check_shape(3, 5).is_ok());
    assert_eq!(
        basis.check_shape(5, 3),
        Err(KernelError::BasisShapeMismatch {
            expected: (3, 5),
            actual: (5, 3)
        })
    );
}

#[test]
fn tables_reproduce_constants() {
    let basis = BasisTables::<f64>::gauss_lobatto_gauss(5, 6).unwrap();
    for q in 0..6 {
        let b_sum: f64 = basis.b().row(q).sum();
        let g_sum: f64 = basis.g().row(q).sum();
        assert_scalar_eq!(b_sum, 1.0, comp = abs, tol = 1e-13);
        assert_scalar_eq!(g_sum, 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn tables_differentiate_linear_functions() {
    let basis = BasisTables::<f64>::lagrange(vec![0.0, 0.25, 1.0], &[0.1, 0.6]).unwrap();
    let nodes = [0.0, 0.25, 1.0];
    let points = [0.1, 0.6];
    for q in 0..2 {
        let value: f64 = (0..3).map(|d| basis.b()[(q, d)] * nodes[d]).sum();
        let derivative: f64 = (0..3).map(|d| basis.g()[(q, d)] * nodes[d]).sum();
        assert_scalar_eq!(value, points[q], comp = abs, tol = 1e-14);
        assert_scalar_eq!(derivative, 1.0, comp = abs, tol = 1e-13);
    }
}

#[test]
fn mismatched_tables_are_rejected() {
    let b = DMatrix::<f64>::zeros(3, 2);
    let g = DMatrix::<f64>::zeros(2, 3);
    assert_eq!(
        BasisTables::from_matrices(b, g),
        Err(KernelError::BasisShapeMismatch {
            expected: (3, 2),
            actual: (2, 3)
        })
    );
}

#[test]
fn duplicate_nodes_are_rejected() {
    let result = BasisTables::<f64>::lagrange(vec![0.0, 0.5, 0.5], &[0.25]);
    assert_eq!(result, Err(KernelError::Basis(BasisError::DuplicateNodes)));
}

#[test]
fn quadrature_weights_sum_to_unit_volume() {
    for dim in [2, 3] {
        for q1d in 1..=6 {
            let weights = quadrature_weights::<f64>(dim, q1d).unwrap();
            assert_eq!(weights.len(), q1d.pow(dim as u32));
            assert_scalar_eq!(weights.iter().sum::<f64>(), 1.0, comp = abs, tol = 1e-14);
        }
    }
    assert_eq!(
        quadrature_weights::<f64>(1, 3),
        Err(KernelError::UnsupportedDimension { dim: 1 })
    );
}

#[test]
fn weights_are_tensor_products() {
    let (w1d, _) = gauss_unit_interval::<f64>(3).unwrap();
    let weights = quadrature_weights::<f64>(3, 3).unwrap();
    for qz in 0..3 {
        for qy in 0..3 {
            for qx in 0..3 {
                let q = qx + 3 * (qy + 3 * qz);
                assert_scalar_eq!(weights[q], w1d[qx] * w1d[qy] * w1d[qz], comp = abs, tol = 1e-15);
            }
        }
    }
}
