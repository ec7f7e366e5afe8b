//! The atomic-function interface.
//!
//! An [`AtomicFn`] is an opaque multi-input, multi-output unit that a tape
//! treats as a single operation: it is recorded as one call, replayed through
//! its own Taylor propagation, and crossed by sparsity propagation through
//! its own dependency pattern. [`crate::Checkpoint`] is the in-crate
//! implementation; the trait exists so the tape engine never needs to know
//! what is behind a call.

use crate::float::Float;
use crate::sparse::DepPattern;

/// Per-argument classification passed to forward calls.
///
/// `Constant` arguments were fixed at recording time; `Dynamic` arguments
/// are parameters that may change between replays without retaping;
/// `Variable` arguments carry derivative information.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    Constant,
    Dynamic,
    Variable,
}

/// An opaque unit that participates in a larger tape as a single operation.
///
/// Taylor coefficient buffers are flattened input-major: with
/// `k = order_up + 1` coefficients per component, `taylor_x[j*k + d]` is the
/// order-`d` coefficient of input `j`, and `taylor_y` uses the same layout
/// over outputs.
///
/// [`forward`](AtomicFn::forward) and
/// [`forward_nested`](AtomicFn::forward_nested) are the two variants of one
/// capability, distinguished by the coefficient scalar. Returning `false`
/// means "this variant/order is not supported here": an expected refusal
/// the caller handles by falling back to an uncheckpointed evaluation, not
/// an error.
pub trait AtomicFn<F: Float>: Send + Sync {
    /// Diagnostic name.
    fn name(&self) -> &str;

    /// Number of inputs.
    fn domain(&self) -> usize;

    /// Number of outputs.
    fn range(&self) -> usize;

    /// Jacobian dependency pattern (`range × domain`), used when a
    /// surrounding tape's sparsity propagation crosses this unit.
    fn dep_pattern(&self) -> DepPattern;

    /// Taylor propagation with base-float coefficients for orders
    /// `[order_low, order_up]`.
    fn forward(
        &self,
        type_x: &[ArgKind],
        need_y: &[bool],
        order_low: usize,
        order_up: usize,
        taylor_x: &[F],
        taylor_y: &mut Vec<F>,
    ) -> bool;

    /// Taylor propagation with `Dual<F>` coefficients, used when the
    /// surrounding tape is itself one derivative level deep.
    fn forward_nested(
        &self,
        type_x: &[ArgKind],
        need_y: &[bool],
        order_low: usize,
        order_up: usize,
        taylor_x: &[crate::dual::Dual<F>],
        taylor_y: &mut Vec<crate::dual::Dual<F>>,
    ) -> bool;
}
