#![cfg(feature = "serde")]

use num_traits::Float;
use tapir::{record, Checkpoint, CheckpointOptions, Tape, Var};

#[test]
fn tape_round_trips_through_json() {
    let (tape, _) = record(
        |v: &[Var<f64>]| v[0].sin() * v[1] + v[0].powi(2),
        &[1.0, 2.0],
    );

    let json = serde_json::to_string(&tape).unwrap();
    let restored: Tape<f64> = serde_json::from_str(&json).unwrap();

    let xs = [0.4, -1.1];
    assert_eq!(tape.eval(&xs), restored.eval(&xs));
    assert_eq!(tape.num_ops(), restored.num_ops());
}

#[test]
fn tapes_with_atomic_calls_refuse_serialization() {
    let (ckpt, _) = Checkpoint::record(
        "inner",
        |x: &[Var<f64>]| vec![x[0] * x[0]],
        &[1.0],
        CheckpointOptions::default(),
    );
    let (outer, _) = record(|x: &[Var<f64>]| ckpt.call(&[x[0]])[0], &[1.0]);

    let err = serde_json::to_string(&outer).unwrap_err();
    assert!(err.to_string().contains("atomic calls"));
}

#[test]
fn comparison_records_survive_round_trip() {
    let (tape, _) = record(
        |v: &[Var<f64>]| {
            if v[0] > v[1] {
                v[0]
            } else {
                v[1]
            }
        },
        &[2.0, 1.0],
    );
    assert_eq!(tape.num_compare_records(), 1);

    let json = serde_json::to_string(&tape).unwrap();
    let restored: Tape<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.num_compare_records(), 1);

    let mut buf = Vec::new();
    assert_eq!(restored.forward_into(&[0.0, 5.0], &mut buf), 1);
}
