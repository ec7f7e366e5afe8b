use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tapir::{record, Checkpoint, CheckpointOptions, Scalar, Var};

/// A moderately deep sub-computation worth freezing: `steps` rounds of a
/// smooth iterated map over an n-vector.
fn iterated_map<T: Scalar>(x: &[T], steps: usize) -> Vec<T> {
    let mut state: Vec<T> = x.to_vec();
    for _ in 0..steps {
        let n = state.len();
        state = (0..n)
            .map(|i| {
                let next = state[(i + 1) % n];
                (state[i] * next).sin() + state[i] * T::from(0.5).unwrap()
            })
            .collect();
    }
    state
}

fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.1 + 0.05 * i as f64).collect()
}

fn bench_replay_vs_rerecord(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_vs_rerecord");
    for n in [4, 16] {
        let x = make_input(n);
        let (ckpt, _) = Checkpoint::record(
            "map",
            |v: &[Var<f64>]| iterated_map(v, 10),
            &x,
            CheckpointOptions::default(),
        );

        group.bench_with_input(BenchmarkId::new("checkpoint_eval", n), &x, |b, x| {
            b.iter(|| black_box(ckpt.eval(black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("rerecord_each_call", n), &x, |b, x| {
            b.iter(|| {
                let (tape, _) = record(
                    |v: &[Var<f64>]| {
                        let y = iterated_map(v, 10);
                        y.into_iter().fold(Var::constant(0.0), |acc, v| acc + v)
                    },
                    black_box(x),
                );
                black_box(tape)
            })
        });
    }
    group.finish();
}

fn bench_taylor_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("outer_taylor_through_checkpoint");
    let n = 8;
    let x = make_input(n);
    let (ckpt, _) = Checkpoint::record(
        "map",
        |v: &[Var<f64>]| iterated_map(v, 10),
        &x,
        CheckpointOptions::default(),
    );
    let (outer, _) = record(
        |v: &[Var<f64>]| {
            let y = ckpt.call(v);
            y.into_iter().fold(Var::constant(0.0), |acc, v| acc + v)
        },
        &x,
    );

    for order in [1usize, 4] {
        let k = order + 1;
        let mut taylor_x = vec![0.0; n * k];
        for (j, &xj) in x.iter().enumerate() {
            taylor_x[j * k] = xj;
            taylor_x[j * k + 1] = 1.0;
        }
        group.bench_with_input(BenchmarkId::new("forward_taylor", order), &order, |b, _| {
            let mut work = Vec::new();
            let mut y = Vec::new();
            b.iter(|| {
                outer.forward_taylor(order, black_box(&taylor_x), &mut work, &mut y);
                black_box(y.last().copied())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_replay_vs_rerecord, bench_taylor_orders);
criterion_main!(benches);
