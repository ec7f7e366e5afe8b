//! tapir — replayable-tape automatic differentiation with frozen
//! checkpoint functions.
//!
//! A computation recorded once through [`record`]/[`record_multi`] becomes a
//! [`Tape`] that replays at new inputs and propagates Taylor coefficients to
//! any order. A [`Checkpoint`] freezes such a recording into an opaque
//! atomic unit that larger recordings invoke without re-recording its
//! internals, with per-thread replay state and cached Jacobian dependency
//! patterns.
//!
//! ```
//! use tapir::{Checkpoint, CheckpointOptions, Scalar, Var};
//!
//! fn poly<T: Scalar>(x: &[T]) -> Vec<T> {
//!     vec![x[0] * x[0] + x[1], x[1] * x[0]]
//! }
//!
//! let (ckpt, y) = Checkpoint::record(
//!     "poly",
//!     |x: &[Var<f64>]| poly(x),
//!     &[2.0, 3.0],
//!     CheckpointOptions::default(),
//! );
//! assert_eq!(y, vec![7.0, 6.0]);
//!
//! // Replay at new inputs without re-recording.
//! assert_eq!(ckpt.eval(&[1.0, 1.0]), vec![2.0, 1.0]);
//! ```

pub mod atomic;
pub mod checkpoint;
pub mod dual;
pub mod float;
pub mod opcode;
pub mod scalar;
pub mod sparse;
pub mod tape;
pub mod taylor_ops;
pub mod thread;
mod traits;
mod var;

pub use atomic::{ArgKind, AtomicFn};
pub use checkpoint::{Checkpoint, CheckpointOptions, SparsityMode};
pub use dual::Dual;
pub use float::{Float, Value};
pub use scalar::Scalar;
pub use sparse::DepPattern;
pub use tape::{record, record_multi, ActiveTape, Recording, Tape, CONSTANT};
pub use thread::{in_parallel, ParallelRegion};
pub use var::Var;

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
/// Type alias for forward-mode dual numbers over `f32`.
pub type Dual32 = Dual<f32>;
