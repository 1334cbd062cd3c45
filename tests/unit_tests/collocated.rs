use crate::{distorted_mesh, reference_action};
use fenris_pa::apply::ApplyProblem;
use fenris_pa::basis::BasisTables;
use fenris_pa::collocated::{apply_3d, collocated_gradient, collocated_kernel, is_supported, COLLOCATED_PAIRS};
use fenris_pa::nalgebra::DMatrix;
use fenris_pa::qr::HouseholderQr;
use fenris_pa::KernelError;
use matrixcompare::assert_matrix_eq;
use util::{assert_slices_approx_eq, pseudo_random_field};

#[test]
fn qr_reconstructs_basis_tables() {
    for &(d1d, q1d) in &[(2, 3), (3, 4), (4, 5), (5, 6)] {
        let basis = BasisTables::<f64>::gauss_lobatto_gauss(d1d, q1d).unwrap();
        let qr = HouseholderQr::factor(basis.b().clone()).unwrap();
        assert_eq!(qr.tau().len(), d1d);
        assert_matrix_eq!(qr.reconstruct(), basis.b().clone(), comp = abs, tol = 1e-14);

        let q = qr.q();
        assert_matrix_eq!(q.transpose() * &q, DMatrix::<f64>::identity(q1d, q1d), comp = abs, tol = 1e-14);
        let r = qr.r();
        assert_matrix_eq!(&q.columns(0, d1d) * &r, basis.b().clone(), comp = abs, tol = 1e-14);
        for i in 0..d1d {
            for j in 0..i {
                assert_eq!(r[(i, j)], 0.0);
            }
        }
    }
}

#[test]
fn householder_vectors_have_unit_leading_entry() {
    let a = DMatrix::from_row_slice(4, 2, &[1.0, 2.0, -3.0, 0.5, 2.0, 1.0, 0.0, 4.0]);
    let qr = HouseholderQr::factor(a.clone()).unwrap();
    for i in 0..2 {
        let v = qr.householder_vector(i);
        assert_eq!(v[i], 1.0);
        for j in 0..i {
            assert_eq!(v[j], 0.0);
        }
        // Each reflector is orthogonal, which pins down tau
        let tau: f64 = qr.tau()[i];
        assert!((tau * v.norm_squared() - 2.0).abs() < 1e-14);
    }
    assert_matrix_eq!(qr.reconstruct(), a, comp = abs, tol = 1e-14);
}

#[test]
fn applying_q_transpose_inverts_q() {
    let a = DMatrix::from_fn(5, 3, |i, j| util::pseudo_random(i + 5 * j, 3));
    let qr = HouseholderQr::factor(a).unwrap();
    let mut c = qr.q();
    qr.mul_q_transpose_right(&mut c);
    assert_matrix_eq!(c, DMatrix::<f64>::identity(5, 5), comp = abs, tol = 1e-14);
}

#[test]
fn wide_matrices_cannot_be_factored() {
    let a = DMatrix::<f64>::zeros(2, 3);
    assert_eq!(
        HouseholderQr::factor(a).unwrap_err(),
        KernelError::InsufficientQuadrature { d1d: 3, q1d: 2 }
    );
}

#[test]
fn collocated_gradient_interpolates_derivative() {
    for &(d1d, q1d) in &[(2, 3), (3, 4), (4, 5), (5, 6), (3, 3), (14, 15)] {
        let basis = BasisTables::<f64>::gauss_lobatto_gauss(d1d, q1d).unwrap();
        let colograd = collocated_gradient(&basis).unwrap();
        assert_eq!(colograd.shape(), (q1d, q1d));
        let tol = 1e-12 * basis.g().amax().max(1.0) * (q1d * q1d) as f64;
        assert_matrix_eq!(&colograd * basis.b(), basis.g().clone(), comp = abs, tol = tol);
    }
}

#[test]
fn collocated_gradient_needs_enough_points() {
    let basis = BasisTables::<f64>::gauss_lobatto_gauss(4, 3).unwrap();
    assert_eq!(
        collocated_gradient(&basis).unwrap_err(),
        KernelError::InsufficientQuadrature { d1d: 4, q1d: 3 }
    );
}

#[test]
fn kernels_exist_exactly_for_collocated_pairs() {
    for &(d1d, q1d) in &COLLOCATED_PAIRS {
        assert!(is_supported(d1d, q1d));
        assert!(collocated_kernel::<f64>(d1d, q1d).is_some());
    }
    for &(d1d, q1d) in &[(2, 2), (3, 3), (9, 10), (14, 14), (16, 17)] {
        assert!(!is_supported(d1d, q1d));
        assert!(collocated_kernel::<f64>(d1d, q1d).is_none());
    }
}

#[test]
fn collocated_kernel_matches_dense_reference() {
    for &(d1d, q1d) in &[(2, 3), (3, 4), (4, 5)] {
        let mesh = distorted_mesh(3, d1d, q1d, 3);
        let x = pseudo_random_field(mesh.field_len(), 5);
        let expected = reference_action(&mesh, &x);

        let colograd = collocated_gradient(&mesh.basis).unwrap();
        let kernel = collocated_kernel::<f64>(d1d, q1d).unwrap();
        let problem = ApplyProblem::new(3, 3, &mesh.basis, &mesh.metric, &x);
        let mut y = vec![0.0; x.len()];
        kernel(&problem, &colograd, &mut y).unwrap();
        assert_slices_approx_eq!(y, expected, abstol = 1e-11);

        // Accumulates
        kernel(&problem, &colograd, &mut y).unwrap();
        let doubled: Vec<f64> = expected.iter().map(|e| 2.0 * e).collect();
        assert_slices_approx_eq!(y, doubled, abstol = 1e-11);
    }
}

#[test]
fn collocated_kernel_verifies_inputs() {
    let mesh = distorted_mesh(3, 3, 4, 1);
    let x = vec![0.0; mesh.field_len()];
    let mut y = vec![0.0; x.len()];
    let problem = ApplyProblem::new(3, 1, &mesh.basis, &mesh.metric, &x);

    let wrong = DMatrix::<f64>::zeros(3, 3);
    assert_eq!(
        apply_3d::<f64, 3, 4>(&problem, &wrong, &mut y),
        Err(KernelError::BasisShapeMismatch {
            expected: (4, 4),
            actual: (3, 3)
        })
    );

    let colograd = collocated_gradient(&mesh.basis).unwrap();
    assert_eq!(
        apply_3d::<f64, 4, 5>(&problem, &colograd, &mut y),
        Err(KernelError::UnknownKernel { dim: 3, d1d: 3, q1d: 4 })
    );
}
