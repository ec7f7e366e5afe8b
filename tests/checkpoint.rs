use std::sync::Arc;

use approx::assert_relative_eq;
use tapir::{
    record, record_multi, ArgKind, AtomicFn, Checkpoint, CheckpointOptions, Scalar, Var,
};

fn inner<T: Scalar>(x: &[T]) -> Vec<T> {
    vec![x[0] * x[1].sin(), x[0] + x[1] * x[1]]
}

fn make_checkpoint(options: CheckpointOptions) -> Arc<Checkpoint<f64>> {
    Checkpoint::record("inner", |x: &[Var<f64>]| inner(x), &[1.0, 2.0], options).0
}

#[test]
fn construction_reports_recorded_outputs() {
    let (ckpt, y) = Checkpoint::record(
        "inner",
        |x: &[Var<f64>]| inner(x),
        &[1.0, 2.0],
        CheckpointOptions::default(),
    );
    let direct = inner(&[1.0, 2.0]);
    assert_eq!(y, direct);
    assert_eq!(ckpt.recorded_outputs(), &direct[..]);
    assert_eq!(ckpt.domain(), 2);
    assert_eq!(ckpt.range(), 2);
    assert_eq!(ckpt.name(), "inner");
    assert!(!ckpt.supports_nested());
}

#[test]
fn eval_replays_at_new_inputs() {
    let ckpt = make_checkpoint(CheckpointOptions::default());
    for xs in [[0.5, 1.0], [3.0, -2.0], [0.0, 0.0]] {
        let out = ckpt.eval(&xs);
        let want = inner(&xs);
        assert_relative_eq!(out[0], want[0], epsilon = 1e-12);
        assert_relative_eq!(out[1], want[1], epsilon = 1e-12);
    }
}

#[test]
fn optimizer_shrinks_the_frozen_tape() {
    let with = make_checkpoint(CheckpointOptions::default());
    let without = make_checkpoint(CheckpointOptions {
        optimize: false,
        ..CheckpointOptions::default()
    });
    assert!(with.num_tape_entries() <= without.num_tape_entries());

    let xs = [1.3, -0.4];
    assert_eq!(with.eval(&xs), without.eval(&xs));
}

#[test]
fn zero_order_forward_matches_eval() {
    let ckpt = make_checkpoint(CheckpointOptions::default());
    let xs = [1.1, 0.7];

    let mut y = Vec::new();
    let ok = ckpt.forward(
        &[ArgKind::Variable, ArgKind::Variable],
        &[true, true],
        0,
        0,
        &xs,
        &mut y,
    );
    assert!(ok);
    assert_eq!(y, ckpt.eval(&xs));
}

#[test]
fn call_records_single_atomic_entry() {
    let ckpt = make_checkpoint(CheckpointOptions::default());

    let (outer, y) = record(
        |x: &[Var<f64>]| {
            let inner_out = ckpt.call(&[x[0], x[1]]);
            inner_out[0] + inner_out[1] * x[2]
        },
        &[1.0, 2.0, 3.0],
    );
    assert_eq!(outer.num_atomic_calls(), 1);

    let composed = |xs: &[f64]| {
        let i = inner(&xs[..2]);
        i[0] + i[1] * xs[2]
    };
    assert_relative_eq!(y, composed(&[1.0, 2.0, 3.0]), epsilon = 1e-12);

    for xs in [[0.4, 1.9, -0.5], [2.0, 0.0, 1.0]] {
        assert_relative_eq!(outer.eval(&xs)[0], composed(&xs), epsilon = 1e-12);
    }
}

#[test]
fn checkpointed_derivatives_match_direct_recording() {
    let ckpt = make_checkpoint(CheckpointOptions::default());

    let (with_ckpt, _) = record(
        |x: &[Var<f64>]| {
            let i = ckpt.call(&[x[0], x[1]]);
            i[0] * i[1]
        },
        &[1.0, 2.0],
    );
    let (direct, _) = record(
        |x: &[Var<f64>]| {
            let i = inner(x);
            i[0] * i[1]
        },
        &[1.0, 2.0],
    );

    let xs = [0.9, 1.4];
    let k = 3;
    let mut taylor_x = vec![0.0; 2 * k];
    taylor_x[0] = xs[0];
    taylor_x[1] = 1.0;
    taylor_x[k] = xs[1];

    let mut work = Vec::new();
    let (mut ya, mut yb) = (Vec::new(), Vec::new());
    with_ckpt.forward_taylor(2, &taylor_x, &mut work, &mut ya);
    direct.forward_taylor(2, &taylor_x, &mut work, &mut yb);

    for (a, b) in ya.iter().zip(yb.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn repeated_forward_is_bit_identical() {
    let ckpt = make_checkpoint(CheckpointOptions::default());
    let k = 4;
    let mut taylor_x = vec![0.0; 2 * k];
    taylor_x[0] = 1.2;
    taylor_x[1] = 1.0;
    taylor_x[k] = -0.3;
    taylor_x[k + 1] = 0.5;

    let type_x = [ArgKind::Variable, ArgKind::Variable];
    let need_y = [true, true];
    let mut first = Vec::new();
    let mut second = Vec::new();
    assert!(ckpt.forward(&type_x, &need_y, 0, 3, &taylor_x, &mut first));
    assert!(ckpt.forward(&type_x, &need_y, 0, 3, &taylor_x, &mut second));
    assert_eq!(first, second);
}

#[test]
fn checkpoint_inside_checkpoint() {
    let leaf = Checkpoint::record(
        "leaf",
        |x: &[Var<f64>]| vec![x[0] * x[0]],
        &[2.0],
        CheckpointOptions::default(),
    )
    .0;

    let (mid, _) = Checkpoint::record(
        "mid",
        |x: &[Var<f64>]| {
            let sq = leaf.call(&[x[0]]);
            vec![sq[0] + x[1]]
        },
        &[2.0, 1.0],
        CheckpointOptions::default(),
    );

    assert_relative_eq!(mid.eval(&[3.0, 4.0])[0], 13.0, epsilon = 1e-12);

    let (outer, _) = record(|x: &[Var<f64>]| mid.call(&[x[0], x[1]])[0] * 2.0, &[1.0, 1.0]);
    assert_relative_eq!(outer.eval(&[3.0, 4.0])[0], 26.0, epsilon = 1e-12);
}

#[test]
fn same_checkpoint_called_twice_in_one_recording() {
    let ckpt = make_checkpoint(CheckpointOptions::default());

    let (outer, _) = record(
        |x: &[Var<f64>]| {
            let a = ckpt.call(&[x[0], x[1]]);
            let b = ckpt.call(&[x[1], x[0]]);
            a[0] + b[0]
        },
        &[1.0, 2.0],
    );
    assert_eq!(outer.num_atomic_calls(), 2);

    let xs = [0.6, 1.1];
    let ia = inner(&xs);
    let ib = inner(&[xs[1], xs[0]]);
    assert_relative_eq!(outer.eval(&xs)[0], ia[0] + ib[0], epsilon = 1e-12);
}

#[test]
fn constant_arguments_are_classified() {
    let ckpt = make_checkpoint(CheckpointOptions::default());

    // One tracked argument, one literal: the call still records and
    // replays correctly.
    let (outer, _) = record(
        |x: &[Var<f64>]| {
            let i = ckpt.call(&[x[0], Var::constant(2.0)]);
            i[0] + i[1]
        },
        &[1.0],
    );
    let composed = |x: f64| {
        let i = inner(&[x, 2.0]);
        i[0] + i[1]
    };
    assert_relative_eq!(outer.eval(&[1.8])[0], composed(1.8), epsilon = 1e-12);
}

#[test]
fn multi_output_checkpoint_taylor_through_outer_tape() {
    let ckpt = make_checkpoint(CheckpointOptions::default());

    let (outer, _) = record_multi(
        |x: &[Var<f64>]| ckpt.call(&[x[0], x[1]]),
        &[1.0, 2.0],
    );

    // First-order sweep in the x0 direction, cross-checked analytically:
    // y0 = x0·sin(x1), dy0/dx0 = sin(x1); y1 = x0 + x1², dy1/dx0 = 1.
    let xs = [1.5, 0.8];
    let k = 2;
    let mut taylor_x = vec![0.0; 2 * k];
    taylor_x[0] = xs[0];
    taylor_x[1] = 1.0;
    taylor_x[k] = xs[1];

    let mut work = Vec::new();
    let mut y = Vec::new();
    outer.forward_taylor(1, &taylor_x, &mut work, &mut y);

    assert_relative_eq!(y[0], xs[0] * xs[1].sin(), epsilon = 1e-12);
    assert_relative_eq!(y[1], xs[1].sin(), epsilon = 1e-12);
    assert_relative_eq!(y[2], xs[0] + xs[1] * xs[1], epsilon = 1e-12);
    assert_relative_eq!(y[3], 1.0, epsilon = 1e-12);
}
