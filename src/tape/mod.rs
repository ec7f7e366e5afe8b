//! The replayable operation tape.
//!
//! A [`Tape`] stores opcodes rather than precomputed derivative data, so it
//! can be re-evaluated at different inputs, at any Taylor order, without
//! re-recording. Recording happens through a [`Recording`] session and the
//! [`Var`](crate::Var) overloads; replay happens through the forward sweeps
//! in [`forward`](self) and the dependency propagation in [`sparsity`](self).
//!
//! # Limitations
//!
//! The tape records one execution path. Branches taken during recording are
//! frozen; replaying at inputs that would take a different branch is
//! detected (when comparison checking is on) but not corrected.

use std::sync::Arc;

use crate::atomic::{ArgKind, AtomicFn};
use crate::dual::Dual;
use crate::float::{Float, Value};
use crate::opcode::{self, OpCode, UNUSED};
use crate::var::Var;

mod active;
mod forward;
mod optimize;
mod sparsity;

#[cfg(feature = "serde")]
mod serde_support;

pub use self::active::ActiveTape;
pub(crate) use self::active::{try_with_active_tape, with_active_tape};

/// Sentinel index for constant entries (not tracked on a tape).
pub const CONSTANT: u32 = u32::MAX;

/// One recorded atomic-function call.
///
/// The call's result components occupy a contiguous block of `Atomic` nodes
/// starting at `first_result`; argument classification and the needed-output
/// mask are fixed at recording time.
pub(crate) struct AtomicCall<F: Float> {
    pub(crate) fun: Arc<dyn AtomicFn<F>>,
    pub(crate) args: Vec<u32>,
    pub(crate) first_result: u32,
    pub(crate) type_x: Vec<ArgKind>,
    pub(crate) need_y: Vec<bool>,
}

impl<F: Float> Clone for AtomicCall<F> {
    fn clone(&self) -> Self {
        AtomicCall {
            fun: Arc::clone(&self.fun),
            args: self.args.clone(),
            first_result: self.first_result,
            type_x: self.type_x.clone(),
            need_y: self.need_y.clone(),
        }
    }
}

/// A comparison observed during recording, kept so replays can detect
/// control-flow divergence.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct CompareRecord {
    pub(crate) lhs: u32,
    pub(crate) rhs: u32,
    /// -1 less, 0 equal, 1 greater, 2 unordered.
    pub(crate) outcome: i8,
}

/// Encode a `partial_cmp` result for a [`CompareRecord`].
#[inline]
pub(crate) fn compare_outcome(ord: Option<std::cmp::Ordering>) -> i8 {
    match ord {
        Some(std::cmp::Ordering::Less) => -1,
        Some(std::cmp::Ordering::Equal) => 0,
        Some(std::cmp::Ordering::Greater) => 1,
        None => 2,
    }
}

/// A replayable operation tape.
///
/// Created via [`record`], [`record_multi`], or a [`Recording`] session.
pub struct Tape<V: Value> {
    pub(crate) opcodes: Vec<OpCode>,
    pub(crate) arg_indices: Vec<[u32; 2]>,
    pub(crate) values: Vec<V>,
    pub(crate) num_inputs: u32,
    pub(crate) num_variables: u32,
    pub(crate) output_indices: Vec<u32>,
    pub(crate) atomic_calls: Vec<AtomicCall<V::Base>>,
    pub(crate) compares: Vec<CompareRecord>,
    /// Validate replay results for NaN (panics on violation).
    pub(crate) check_for_nan: bool,
    /// Verify recorded comparison outcomes during zero-order replay.
    pub(crate) check_compare: bool,
}

impl<V: Value> Tape<V> {
    /// Create an empty tape.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a tape with pre-allocated capacity.
    pub fn with_capacity(est_ops: usize) -> Self {
        Tape {
            opcodes: Vec::with_capacity(est_ops),
            arg_indices: Vec::with_capacity(est_ops),
            values: Vec::with_capacity(est_ops),
            num_inputs: 0,
            num_variables: 0,
            output_indices: Vec::new(),
            atomic_calls: Vec::new(),
            compares: Vec::new(),
            check_for_nan: true,
            check_compare: true,
        }
    }

    /// Register a new input variable. Returns its index.
    ///
    /// Inputs must be registered before any other entry so that input `j`
    /// occupies tape index `j`; [`Recording::start`] guarantees this.
    #[inline]
    pub fn new_input(&mut self, value: V) -> u32 {
        debug_assert_eq!(
            self.num_inputs, self.num_variables,
            "inputs must precede all other tape entries"
        );
        let idx = self.num_variables;
        self.num_variables += 1;
        self.num_inputs += 1;
        self.opcodes.push(OpCode::Input);
        self.arg_indices.push([UNUSED, UNUSED]);
        self.values.push(value);
        idx
    }

    /// Register a scalar constant. Returns its index.
    #[inline]
    pub fn push_const(&mut self, value: V) -> u32 {
        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(OpCode::Const);
        self.arg_indices.push([UNUSED, UNUSED]);
        self.values.push(value);
        idx
    }

    /// Record an operation. Returns the result index.
    ///
    /// Constant folding: if all operands are `Const` entries, the operation
    /// collapses to a single `Const` with the already-computed value.
    /// Identity patterns (`x + 0`, `x * 1`, ...) short-circuit to the
    /// existing operand; absorbing patterns (`x * 0`, `x - x`, `x / x`) are
    /// guarded by a value check so NaN/Inf operands are not folded away.
    #[inline]
    pub fn push_op(&mut self, op: OpCode, arg0: u32, arg1: u32, value: V) -> u32 {
        let arg0_const = self.opcodes[arg0 as usize] == OpCode::Const;
        let arg1_const = arg1 == UNUSED || self.opcodes[arg1 as usize] == OpCode::Const;
        if arg0_const && arg1_const {
            return self.push_const(value);
        }

        if (arg0_const || arg1_const) && arg1 != UNUSED {
            if let Some(idx) =
                self.try_algebraic_simplify(op, arg0, arg1, arg0_const, arg1_const, value)
            {
                return idx;
            }
        }

        if arg0 == arg1 && arg1 != UNUSED {
            if let Some(idx) = self.try_same_index_simplify(op, value) {
                return idx;
            }
        }

        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(op);
        self.arg_indices.push([arg0, arg1]);
        self.values.push(value);
        idx
    }

    #[inline(never)]
    fn try_algebraic_simplify(
        &mut self,
        op: OpCode,
        arg0: u32,
        arg1: u32,
        arg0_const: bool,
        arg1_const: bool,
        value: V,
    ) -> Option<u32> {
        match op {
            OpCode::Add => {
                if arg1_const && self.values[arg1 as usize].is_exact_zero() {
                    return Some(arg0);
                }
                if arg0_const && self.values[arg0 as usize].is_exact_zero() {
                    return Some(arg1);
                }
            }
            OpCode::Sub => {
                if arg1_const && self.values[arg1 as usize].is_exact_zero() {
                    return Some(arg0);
                }
            }
            OpCode::Mul => {
                if arg1_const && self.values[arg1 as usize].is_exact_one() {
                    return Some(arg0);
                }
                if arg0_const && self.values[arg0 as usize].is_exact_one() {
                    return Some(arg1);
                }
                // x * 0 folds only when the result really is zero (NaN * 0 = NaN).
                if arg1_const
                    && self.values[arg1 as usize].is_exact_zero()
                    && value.is_exact_zero()
                {
                    return Some(self.push_const(value));
                }
                if arg0_const
                    && self.values[arg0 as usize].is_exact_zero()
                    && value.is_exact_zero()
                {
                    return Some(self.push_const(value));
                }
            }
            OpCode::Div => {
                if arg1_const && self.values[arg1 as usize].is_exact_one() {
                    return Some(arg0);
                }
            }
            _ => {}
        }
        None
    }

    #[inline(never)]
    fn try_same_index_simplify(&mut self, op: OpCode, value: V) -> Option<u32> {
        match op {
            // Guarded: Inf - Inf = NaN, 0/0 = NaN.
            OpCode::Sub if value.is_exact_zero() => Some(self.push_const(value)),
            OpCode::Div if value.is_exact_one() => Some(self.push_const(value)),
            _ => None,
        }
    }

    /// Record a powi operation. The `i32` exponent is stored in `arg_indices[1]`.
    #[inline]
    pub fn push_powi(&mut self, arg0: u32, exp: i32, value: V) -> u32 {
        if self.opcodes[arg0 as usize] == OpCode::Const {
            return self.push_const(value);
        }
        // x^0 folds only when the value really is 1 (0^0 edge case).
        if exp == 0 && value.is_exact_one() {
            return self.push_const(V::one());
        }
        if exp == 1 {
            return arg0;
        }
        if exp == -1 {
            return self.push_op(OpCode::Recip, arg0, UNUSED, value);
        }

        let idx = self.num_variables;
        self.num_variables += 1;
        self.opcodes.push(OpCode::Powi);
        self.arg_indices.push([arg0, opcode::powi_exp_encode(exp)]);
        self.values.push(value);
        idx
    }

    /// Record an atomic-function call.
    ///
    /// Pushes one `Atomic` node per output (a contiguous block) carrying the
    /// zero-order values `y0`, and stores the call descriptor in the side
    /// table. Returns the result node indices.
    pub fn record_atomic_call(
        &mut self,
        fun: Arc<dyn AtomicFn<V::Base>>,
        args: &[u32],
        y0: &[V],
    ) -> Vec<u32> {
        assert_eq!(args.len(), fun.domain(), "atomic call arity mismatch");
        assert_eq!(y0.len(), fun.range(), "atomic call range mismatch");

        let type_x: Vec<ArgKind> = args
            .iter()
            .map(|&a| {
                if self.opcodes[a as usize] == OpCode::Const {
                    ArgKind::Constant
                } else {
                    ArgKind::Variable
                }
            })
            .collect();

        let call_idx = self.atomic_calls.len() as u32;
        let first_result = self.num_variables;
        let mut results = Vec::with_capacity(y0.len());
        for (offset, &y) in y0.iter().enumerate() {
            let idx = self.num_variables;
            self.num_variables += 1;
            self.opcodes.push(OpCode::Atomic);
            self.arg_indices.push([call_idx, offset as u32]);
            self.values.push(y);
            results.push(idx);
        }

        self.atomic_calls.push(AtomicCall {
            fun,
            args: args.to_vec(),
            first_result,
            type_x,
            need_y: vec![true; y0.len()],
        });

        results
    }

    /// Record a comparison outcome for replay-time divergence checking.
    #[inline]
    pub(crate) fn record_compare(&mut self, lhs: u32, rhs: u32, outcome: i8) {
        self.compares.push(CompareRecord { lhs, rhs, outcome });
    }

    /// Mark the output variables.
    pub fn set_outputs(&mut self, indices: &[u32]) {
        self.output_indices = indices.to_vec();
    }

    // ── Replay policy ──

    /// Enable or disable NaN validation on replay.
    ///
    /// Checkpoint construction turns this off: the frozen tape's results
    /// were validated once at recording time.
    pub fn set_check_for_nan(&mut self, on: bool) {
        self.check_for_nan = on;
    }

    /// Enable or disable comparison verification on zero-order replay.
    pub fn set_check_compare(&mut self, on: bool) {
        self.check_compare = on;
    }

    // ── Accessors ──

    /// Number of input variables.
    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs as usize
    }

    /// Number of output variables.
    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.output_indices.len()
    }

    /// Number of tape entries (inputs, constants, and operations).
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.opcodes.len()
    }

    /// Number of recorded atomic calls.
    #[inline]
    pub fn num_atomic_calls(&self) -> usize {
        self.atomic_calls.len()
    }

    /// Number of recorded comparison outcomes.
    #[inline]
    pub fn num_compare_records(&self) -> usize {
        self.compares.len()
    }

    /// Output values as of recording (or the most recent in-place sweep).
    pub fn output_values(&self) -> Vec<V> {
        self.output_indices
            .iter()
            .map(|&i| self.values[i as usize])
            .collect()
    }
}

impl<V: Value> Default for Tape<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> Tape<F> {
    /// Convert to a tape over `Dual<F>` (one derivative level deeper).
    ///
    /// Structure and atomic callbacks are shared; values become constants at
    /// the nested level. This is how a checkpoint derives its nested inner
    /// function from the recorded one.
    pub fn to_nested(&self) -> Tape<Dual<F>> {
        Tape {
            opcodes: self.opcodes.clone(),
            arg_indices: self.arg_indices.clone(),
            values: self.values.iter().map(|&v| Dual::constant(v)).collect(),
            num_inputs: self.num_inputs,
            num_variables: self.num_variables,
            output_indices: self.output_indices.clone(),
            atomic_calls: self.atomic_calls.clone(),
            compares: self.compares.clone(),
            check_for_nan: self.check_for_nan,
            check_compare: self.check_compare,
        }
    }
}

// ══════════════════════════════════════════════
//  Recording sessions
// ══════════════════════════════════════════════

/// An in-progress recording session.
///
/// [`start`](Recording::start) declares the independent variables and
/// activates the thread-local tape that [`Var`] overloads write to;
/// [`finish`](Recording::finish) declares the dependent variables and
/// returns the immutable tape. Dropping an unfinished session abandons the
/// recording and restores the previously active tape.
pub struct Recording<V: Value + ActiveTape> {
    tape: Option<Box<Tape<V>>>,
    prev: *mut Tape<V>,
}

impl<V: Value + ActiveTape> Recording<V> {
    /// Begin recording with a copy of `x` as the independent variables.
    pub fn start(x: &[V]) -> (Self, Vec<Var<V>>) {
        let mut tape = Box::new(Tape::with_capacity(x.len() * 10));
        let inputs: Vec<Var<V>> = x
            .iter()
            .map(|&val| {
                let idx = tape.new_input(val);
                Var::from_tape(val, idx)
            })
            .collect();

        let prev = V::cell().with(|cell| {
            let prev = cell.get();
            cell.set(&mut *tape as *mut Tape<V>);
            prev
        });

        (
            Recording {
                tape: Some(tape),
                prev,
            },
            inputs,
        )
    }

    /// Finish recording, declaring `outputs` as the dependent variables.
    pub fn finish(mut self, outputs: &[Var<V>]) -> Tape<V> {
        let mut tape = self.tape.take().expect("recording already finished");
        V::cell().with(|cell| cell.set(self.prev));
        std::mem::forget(self);

        let indices: Vec<u32> = outputs
            .iter()
            .map(|o| {
                if o.index() == CONSTANT {
                    tape.push_const(o.value())
                } else {
                    o.index()
                }
            })
            .collect();
        tape.set_outputs(&indices);
        *tape
    }
}

impl<V: Value + ActiveTape> Drop for Recording<V> {
    fn drop(&mut self) {
        if self.tape.is_some() {
            V::cell().with(|cell| cell.set(self.prev));
        }
    }
}

/// Record a scalar function into a [`Tape`].
///
/// ```
/// let (tape, y) = tapir::record(|x: &[tapir::Var<f64>]| x[0] * x[0] + x[1], &[3.0, 1.0]);
/// assert_eq!(y, 10.0);
/// assert_eq!(tape.num_inputs(), 2);
/// ```
pub fn record<V: Value + ActiveTape>(
    f: impl FnOnce(&[Var<V>]) -> Var<V>,
    x: &[V],
) -> (Tape<V>, V) {
    let (session, inputs) = Recording::start(x);
    let output = f(&inputs);
    let value = output.value();
    let tape = session.finish(std::slice::from_ref(&output));
    (tape, value)
}

/// Record a vector-valued function into a [`Tape`].
pub fn record_multi<V: Value + ActiveTape>(
    f: impl FnOnce(&[Var<V>]) -> Vec<Var<V>>,
    x: &[V],
) -> (Tape<V>, Vec<V>) {
    let (session, inputs) = Recording::start(x);
    let outputs = f(&inputs);
    let values: Vec<V> = outputs.iter().map(|o| o.value()).collect();
    let tape = session.finish(&outputs);
    (tape, values)
}
