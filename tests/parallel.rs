//! Concurrency behavior: thread isolation, determinism across threads, and
//! single-thread-only enforcement.
//!
//! Tests in this file share the process-wide parallel-region flag, so each
//! one takes the file lock to avoid cross-talk.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use tapir::{ArgKind, AtomicFn, Checkpoint, CheckpointOptions, ParallelRegion, Scalar, Var};

static LOCK: Mutex<()> = Mutex::new(());

fn inner<T: Scalar>(x: &[T]) -> Vec<T> {
    vec![x[0] * x[1].sin(), x[0] + x[1] * x[1]]
}

fn parallel_checkpoint() -> Arc<Checkpoint<f64>> {
    Checkpoint::record(
        "inner_par",
        |x: &[Var<f64>]| inner(x),
        &[1.0, 2.0],
        CheckpointOptions {
            use_in_parallel: true,
            ..CheckpointOptions::default()
        },
    )
    .0
}

fn taylor_seed(xs: &[f64], k: usize) -> Vec<f64> {
    let mut t = vec![0.0; xs.len() * k];
    for (j, &x) in xs.iter().enumerate() {
        t[j * k] = x;
        t[j * k + 1] = 1.0;
    }
    t
}

#[test]
fn threads_see_isolated_results() {
    let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let ckpt = parallel_checkpoint();

    let n_threads = 4;
    let k = 3;
    let type_x = [ArgKind::Variable, ArgKind::Variable];
    let need_y = [true, true];

    // Single-threaded reference runs.
    let mut reference = Vec::new();
    for i in 0..n_threads {
        let xs = [i as f64 + 0.5, 2.0 * i as f64 - 1.0];
        let mut y = Vec::new();
        assert!(ckpt.forward(&type_x, &need_y, 0, k - 1, &taylor_seed(&xs, k), &mut y));
        reference.push(y);
    }

    let _region = ParallelRegion::enter();
    std::thread::scope(|s| {
        for i in 0..n_threads {
            let ckpt = Arc::clone(&ckpt);
            let expected = reference[i].clone();
            s.spawn(move || {
                let xs = [i as f64 + 0.5, 2.0 * i as f64 - 1.0];
                let type_x = [ArgKind::Variable, ArgKind::Variable];
                let need_y = [true, true];
                // Repeat to exercise the cached per-thread buffers.
                for _ in 0..8 {
                    let mut y = Vec::new();
                    assert!(ckpt.forward(
                        &type_x,
                        &need_y,
                        0,
                        k - 1,
                        &taylor_seed(&xs, k),
                        &mut y
                    ));
                    assert_eq!(y, expected);
                }
            });
        }
    });
}

#[test]
fn results_are_deterministic_across_threads() {
    let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let ckpt = parallel_checkpoint();
    let xs = [1.25, -0.75];
    let k = 4;

    let mut baseline = Vec::new();
    assert!(ckpt.forward(
        &[ArgKind::Variable, ArgKind::Variable],
        &[true, true],
        0,
        k - 1,
        &taylor_seed(&xs, k),
        &mut baseline
    ));

    let _region = ParallelRegion::enter();
    std::thread::scope(|s| {
        for _ in 0..4 {
            let ckpt = Arc::clone(&ckpt);
            let baseline = baseline.clone();
            s.spawn(move || {
                let mut y = Vec::new();
                assert!(ckpt.forward(
                    &[ArgKind::Variable, ArgKind::Variable],
                    &[true, true],
                    0,
                    k - 1,
                    &taylor_seed(&xs, k),
                    &mut y
                ));
                // Bit-identical, not merely close.
                assert_eq!(y, baseline);
            });
        }
    });
}

#[test]
fn single_thread_checkpoint_rejects_parallel_use() {
    let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let ckpt = Checkpoint::record(
        "serial_only",
        |x: &[Var<f64>]| inner(x),
        &[1.0, 2.0],
        CheckpointOptions::default(),
    )
    .0;

    // Fine outside a parallel region.
    let ok = ckpt.eval(&[1.0, 2.0]);
    assert_eq!(ok.len(), 2);

    let _region = ParallelRegion::enter();
    // Each violating call trips the fatal path exactly once.
    for _ in 0..2 {
        let result = catch_unwind(AssertUnwindSafe(|| ckpt.eval(&[1.0, 2.0])));
        let err = result.expect_err("expected a fatal usage error");
        let msg = err
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(
            msg.contains("use_in_parallel is false but execution is parallel"),
            "unexpected panic message: {msg}"
        );
        assert!(msg.contains("serial_only"));
    }
}

#[test]
fn construction_inside_parallel_region_is_fatal() {
    let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _region = ParallelRegion::enter();

    let result = catch_unwind(AssertUnwindSafe(|| {
        Checkpoint::record(
            "too_late",
            |x: &[Var<f64>]| inner(x),
            &[1.0, 2.0],
            CheckpointOptions::default(),
        )
    }));
    let err = result.expect_err("expected a fatal usage error");
    let msg = err
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(msg.contains("too_late"));
    assert!(msg.contains("constructed inside a parallel region"));
}

#[test]
fn parallel_eval_matches_serial() {
    let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let ckpt = parallel_checkpoint();

    let points: Vec<[f64; 2]> = (0..16)
        .map(|i| [0.1 * i as f64, 1.0 - 0.2 * i as f64])
        .collect();
    let serial: Vec<Vec<f64>> = points.iter().map(|p| ckpt.eval(p)).collect();

    let _region = ParallelRegion::enter();
    std::thread::scope(|s| {
        for (p, want) in points.iter().zip(serial.iter()) {
            let ckpt = Arc::clone(&ckpt);
            s.spawn(move || {
                let got = ckpt.eval(p);
                for (g, w) in got.iter().zip(want.iter()) {
                    assert_relative_eq!(*g, *w, epsilon = 1e-15);
                }
            });
        }
    });
}

#[cfg(feature = "parallel")]
#[test]
fn rayon_batch_eval_matches_serial() {
    let _guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let ckpt = parallel_checkpoint();

    let points: Vec<Vec<f64>> = (0..32)
        .map(|i| vec![0.3 * i as f64, -1.0 + 0.1 * i as f64])
        .collect();
    let serial: Vec<Vec<f64>> = points.iter().map(|p| ckpt.eval(p)).collect();
    let batched = ckpt.eval_batch_par(&points);
    assert_eq!(serial, batched);
}
