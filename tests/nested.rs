use approx::assert_relative_eq;
use num_traits::Float;
use tapir::{record, ArgKind, AtomicFn, Checkpoint, CheckpointOptions, Dual, Var};

fn options_nested() -> CheckpointOptions {
    CheckpointOptions {
        nested: true,
        ..CheckpointOptions::default()
    }
}

#[test]
fn nested_variant_is_declined_without_support() {
    let (ckpt, _) = Checkpoint::record(
        "plain",
        |x: &[Var<f64>]| vec![x[0] * x[0]],
        &[1.0],
        CheckpointOptions::default(),
    );
    assert!(!ckpt.supports_nested());

    let taylor_x = [Dual::variable(2.0)];
    let mut taylor_y: Vec<Dual<f64>> = Vec::new();
    let ok = ckpt.forward_nested(
        &[ArgKind::Variable],
        &[true],
        0,
        0,
        &taylor_x,
        &mut taylor_y,
    );
    assert!(!ok);
    assert!(taylor_y.is_empty());
}

#[test]
fn nested_variant_succeeds_when_enabled() {
    let (ckpt, _) = Checkpoint::record(
        "square",
        |x: &[Var<f64>]| vec![x[0] * x[0]],
        &[1.0],
        options_nested(),
    );
    assert!(ckpt.supports_nested());

    let x0 = 3.0;
    let taylor_x = [Dual::variable(x0)];
    let mut taylor_y: Vec<Dual<f64>> = Vec::new();
    let ok = ckpt.forward_nested(
        &[ArgKind::Variable],
        &[true],
        0,
        0,
        &taylor_x,
        &mut taylor_y,
    );
    assert!(ok);
    assert_eq!(taylor_y.len(), 1);
    assert_relative_eq!(taylor_y[0].re, x0 * x0, epsilon = 1e-12);
    // The dual tangent carries d(x²)/dx.
    assert_relative_eq!(taylor_y[0].eps, 2.0 * x0, epsilon = 1e-12);
}

#[test]
fn second_derivative_through_nested_recording() {
    // f(x) = x²·sin(x), checkpointed with nested support, then recorded
    // into an outer tape whose scalars are Dual<f64>. A first-order Taylor
    // sweep of that tape with dual coefficients yields f' in the order-1
    // real part and f'' in its tangent.
    let f = |x: f64| x * x * x.sin();
    let df = |x: f64| 2.0 * x * x.sin() + x * x * x.cos();
    let ddf = |x: f64| 2.0 * x.sin() + 4.0 * x * x.cos() - x * x * x.sin();

    let (ckpt, _) = Checkpoint::record(
        "x2sinx",
        |x: &[Var<f64>]| vec![x[0] * x[0] * x[0].sin()],
        &[1.0],
        options_nested(),
    );

    let x0 = 0.9_f64;
    let (outer, _) = record(
        |x: &[Var<Dual<f64>>]| ckpt.call(&[x[0]])[0],
        &[Dual::variable(x0)],
    );

    let taylor_x = [Dual::variable(x0), Dual::constant(1.0)];
    let mut work = Vec::new();
    let mut y: Vec<Dual<f64>> = Vec::new();
    outer.forward_taylor(1, &taylor_x, &mut work, &mut y);

    assert_relative_eq!(y[0].re, f(x0), epsilon = 1e-12);
    assert_relative_eq!(y[0].eps, df(x0), epsilon = 1e-12);
    assert_relative_eq!(y[1].re, df(x0), epsilon = 1e-12);
    assert_relative_eq!(y[1].eps, ddf(x0), epsilon = 1e-12);
}

#[test]
fn nested_matches_uncheckpointed_reference() {
    // The same outer computation recorded with and without the checkpoint
    // must agree at every dual Taylor coefficient.
    let (ckpt, _) = Checkpoint::record(
        "poly",
        |x: &[Var<f64>]| vec![x[0] * x[0] + x[0].exp()],
        &[0.5],
        options_nested(),
    );

    let x0 = 1.3_f64;
    let (with_ckpt, _) = record(
        |x: &[Var<Dual<f64>>]| ckpt.call(&[x[0]])[0] * x[0],
        &[Dual::variable(x0)],
    );
    let (reference, _) = record(
        |x: &[Var<Dual<f64>>]| (x[0] * x[0] + x[0].exp()) * x[0],
        &[Dual::variable(x0)],
    );

    let taylor_x = [Dual::variable(x0), Dual::constant(1.0)];
    let mut work = Vec::new();
    let (mut ya, mut yb): (Vec<Dual<f64>>, Vec<Dual<f64>>) = (Vec::new(), Vec::new());
    with_ckpt.forward_taylor(1, &taylor_x, &mut work, &mut ya);
    reference.forward_taylor(1, &taylor_x, &mut work, &mut yb);

    for (a, b) in ya.iter().zip(yb.iter()) {
        assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
        assert_relative_eq!(a.eps, b.eps, epsilon = 1e-12);
    }
}

#[test]
#[should_panic(expected = "without nested support")]
fn recording_at_dual_level_requires_nested_support() {
    let (ckpt, _) = Checkpoint::record(
        "plain",
        |x: &[Var<f64>]| vec![x[0] + x[0]],
        &[1.0],
        CheckpointOptions::default(),
    );

    let _ = record(
        |x: &[Var<Dual<f64>>]| ckpt.call(&[x[0]])[0],
        &[Dual::variable(1.0)],
    );
}
