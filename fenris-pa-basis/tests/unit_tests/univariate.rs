use fenris_pa_basis::univariate::{gauss, try_gauss, try_gauss_lobatto};
use fenris_pa_basis::{integrate, to_unit_interval, Error};

use matrixcompare::assert_scalar_eq;

fn monomial_integral(alpha: i32) -> f64 {
    (1.0 - (-1.0f64).powi(alpha + 1)) / (alpha as f64 + 1.0)
}

#[test]
fn gauss_rules_satisfy_expected_accuracy() {
    for n in 1..=40 {
        let expected_polynomial_degree = 2 * n - 1;
        let rule = gauss(n);

        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|pair| pair[0] < pair[1]));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x.powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn gauss_without_points_is_an_error() {
    assert_eq!(try_gauss(0), Err(Error::NoRuleAvailable));
}

#[test]
fn gauss_lobatto_rules_satisfy_expected_accuracy() {
    assert_eq!(try_gauss_lobatto(0), Err(Error::NoRuleAvailable));
    assert_eq!(try_gauss_lobatto(1), Err(Error::NoRuleAvailable));

    for n in 2..=20 {
        let expected_polynomial_degree = 2 * n - 3;
        let rule = try_gauss_lobatto(n).unwrap();

        assert_eq!(rule.1.first().unwrap(), &-1.0);
        assert_eq!(rule.1.last().unwrap(), &1.0);
        assert!(rule.0.iter().all(|&w| w > 0.0));
        assert!(rule.1.windows(2).all(|pair| pair[0] < pair[1]));

        for alpha in 0..=expected_polynomial_degree as i32 {
            let estimated_integral = integrate(&rule, |x| x.powi(alpha));
            assert_scalar_eq!(estimated_integral, monomial_integral(alpha), comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn gauss_lobatto_three_points_are_simpson() {
    let (weights, points) = try_gauss_lobatto(3).unwrap();
    assert_eq!(points, vec![-1.0, 0.0, 1.0]);
    assert_scalar_eq!(weights[0], 1.0 / 3.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(weights[1], 4.0 / 3.0, comp = abs, tol = 1e-15);
    assert_scalar_eq!(weights[2], 1.0 / 3.0, comp = abs, tol = 1e-15);
}

#[test]
fn unit_interval_rule_integrates_on_unit_interval() {
    let rule = to_unit_interval(gauss(4));
    assert!(rule.1.iter().all(|&x| x > 0.0 && x < 1.0));
    assert_scalar_eq!(rule.0.iter().sum::<f64>(), 1.0, comp = abs, tol = 1e-14);
    // int_0^1 x^5 dx = 1 / 6
    assert_scalar_eq!(integrate(&rule, |x| x.powi(5)), 1.0 / 6.0, comp = abs, tol = 1e-14);
}
