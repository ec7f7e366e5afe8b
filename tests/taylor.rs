use approx::assert_relative_eq;
use num_traits::Float;
use tapir::{record, record_multi, Var};

/// Taylor-seed helper: one variable input at `x0` (unit first coefficient),
/// the rest constant.
fn seed(xs: &[f64], var: usize, k: usize) -> Vec<f64> {
    let mut t = vec![0.0; xs.len() * k];
    for (j, &x) in xs.iter().enumerate() {
        t[j * k] = x;
    }
    t[var * k + 1] = 1.0;
    t
}

#[test]
fn exp_taylor_series() {
    // exp(x) around x=0: coeffs = [1, 1, 1/2, 1/6, 1/24]
    let (tape, _) = record(|v: &[Var<f64>]| v[0].exp(), &[0.0]);

    let mut work = Vec::new();
    let mut y = Vec::new();
    tape.forward_taylor(4, &seed(&[0.0], 0, 5), &mut work, &mut y);

    let expected = [1.0, 1.0, 0.5, 1.0 / 6.0, 1.0 / 24.0];
    for (k, &e) in expected.iter().enumerate() {
        assert_relative_eq!(y[k], e, epsilon = 1e-12);
    }
}

#[test]
fn sin_taylor_series() {
    // sin(x) around x=0: [0, 1, 0, -1/6, 0]
    let (tape, _) = record(|v: &[Var<f64>]| v[0].sin(), &[0.0]);

    let mut work = Vec::new();
    let mut y = Vec::new();
    tape.forward_taylor(4, &seed(&[0.0], 0, 5), &mut work, &mut y);

    let expected = [0.0, 1.0, 0.0, -1.0 / 6.0, 0.0];
    for (k, &e) in expected.iter().enumerate() {
        assert_relative_eq!(y[k], e, epsilon = 1e-12);
    }
}

#[test]
fn geometric_series() {
    // 1/(1-x) around x=0: [1, 1, 1, 1, 1]
    let (tape, _) = record(|v: &[Var<f64>]| 1.0 / (1.0 - v[0]), &[0.0]);

    let mut work = Vec::new();
    let mut y = Vec::new();
    tape.forward_taylor(4, &seed(&[0.0], 0, 5), &mut work, &mut y);

    for k in 0..5 {
        assert_relative_eq!(y[k], 1.0, epsilon = 1e-12);
    }
}

#[test]
fn first_order_matches_analytic_gradient() {
    // f(x, y) = sin(x)·y + x³
    let f = |x: f64, y: f64| x.sin() * y + x.powi(3);
    let dfdx = |x: f64, y: f64| x.cos() * y + 3.0 * x * x;
    let dfdy = |x: f64, _y: f64| x.sin();

    let (tape, _) = record(
        |v: &[Var<f64>]| v[0].sin() * v[1] + v[0].powi(3),
        &[1.0, 2.0],
    );

    let xs = [0.8, -1.4];
    let mut work = Vec::new();
    let mut y = Vec::new();

    tape.forward_taylor(1, &seed(&xs, 0, 2), &mut work, &mut y);
    assert_relative_eq!(y[0], f(xs[0], xs[1]), epsilon = 1e-12);
    assert_relative_eq!(y[1], dfdx(xs[0], xs[1]), epsilon = 1e-12);

    tape.forward_taylor(1, &seed(&xs, 1, 2), &mut work, &mut y);
    assert_relative_eq!(y[1], dfdy(xs[0], xs[1]), epsilon = 1e-12);
}

#[test]
fn second_order_coefficient() {
    // f(x) = x³: c₂ = f''(x₀)/2 = 3·x₀
    let (tape, _) = record(|v: &[Var<f64>]| v[0].powi(3), &[1.0]);

    let x0 = 1.7;
    let mut work = Vec::new();
    let mut y = Vec::new();
    tape.forward_taylor(2, &seed(&[x0], 0, 3), &mut work, &mut y);

    assert_relative_eq!(y[0], x0.powi(3), epsilon = 1e-12);
    assert_relative_eq!(y[1], 3.0 * x0 * x0, epsilon = 1e-12);
    assert_relative_eq!(y[2], 3.0 * x0, epsilon = 1e-12);
}

#[test]
fn division_and_sqrt_higher_orders() {
    // f(x) = sqrt(x) / (1 + x) at x0 = 4: compare against finite-difference
    // free analytic coefficients.
    let (tape, _) = record(|v: &[Var<f64>]| v[0].sqrt() / (1.0 + v[0]), &[4.0]);

    let x0 = 4.0_f64;
    let mut work = Vec::new();
    let mut y = Vec::new();
    tape.forward_taylor(2, &seed(&[x0], 0, 3), &mut work, &mut y);

    // f = sqrt(x)/(1+x); f' = (1 - x) / (2 sqrt(x) (1+x)²)
    let f0 = x0.sqrt() / (1.0 + x0);
    let f1 = (1.0 - x0) / (2.0 * x0.sqrt() * (1.0 + x0).powi(2));
    assert_relative_eq!(y[0], f0, epsilon = 1e-12);
    assert_relative_eq!(y[1], f1, epsilon = 1e-12);

    // Second coefficient cross-checked by central differences of f'.
    let h = 1e-5;
    let fp = |x: f64| (1.0 - x) / (2.0 * x.sqrt() * (1.0 + x).powi(2));
    let f2 = (fp(x0 + h) - fp(x0 - h)) / (2.0 * h) / 2.0;
    assert_relative_eq!(y[2], f2, epsilon = 1e-6);
}

#[test]
fn multi_output_taylor_rows() {
    let (tape, _) = record_multi(
        |v: &[Var<f64>]| vec![v[0] * v[1], v[0] + v[1]],
        &[1.0, 2.0],
    );

    let xs = [3.0, 5.0];
    let mut work = Vec::new();
    let mut y = Vec::new();
    tape.forward_taylor(1, &seed(&xs, 0, 2), &mut work, &mut y);

    // Row 0: x·y, d/dx = y. Row 1: x+y, d/dx = 1.
    assert_relative_eq!(y[0], 15.0, epsilon = 1e-12);
    assert_relative_eq!(y[1], 5.0, epsilon = 1e-12);
    assert_relative_eq!(y[2], 8.0, epsilon = 1e-12);
    assert_relative_eq!(y[3], 1.0, epsilon = 1e-12);
}

#[test]
fn tanh_and_atan_series_against_known_values() {
    // tanh'(x) = 1 - tanh²(x); atan'(x) = 1/(1+x²)
    let (tape, _) = record_multi(|v: &[Var<f64>]| vec![v[0].tanh(), v[0].atan()], &[0.5]);

    let x0 = 0.5_f64;
    let mut work = Vec::new();
    let mut y = Vec::new();
    tape.forward_taylor(1, &seed(&[x0], 0, 2), &mut work, &mut y);

    assert_relative_eq!(y[0], x0.tanh(), epsilon = 1e-12);
    assert_relative_eq!(y[1], 1.0 - x0.tanh().powi(2), epsilon = 1e-12);
    assert_relative_eq!(y[2], x0.atan(), epsilon = 1e-12);
    assert_relative_eq!(y[3], 1.0 / (1.0 + x0 * x0), epsilon = 1e-12);
}
