//! Frozen checkpoint functions.
//!
//! A [`Checkpoint`] records a sub-computation once and freezes it into an
//! immutable tape that larger recordings invoke as a single atomic
//! operation, instead of re-recording its internals at every use. Replay
//! state (Taylor work buffers and the cached dependency pattern) is
//! partitioned per thread, so independent threads can replay the same
//! checkpoint concurrently without locking in the evaluation path.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use log::debug;

use crate::atomic::{ArgKind, AtomicFn};
use crate::dual::Dual;
use crate::float::{Float, Value};
use crate::sparse::DepPattern;
use crate::tape::{with_active_tape, ActiveTape, Recording, Tape, CONSTANT};
use crate::thread::{in_parallel, ThreadSlots};
use crate::var::{ensure_on_tape, Var};

mod forward;
mod sparsity;

/// When a checkpoint's Jacobian dependency pattern is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SparsityMode {
    /// Compute at construction, propagating an identity seed forward.
    ForwardPattern,
    /// Compute at construction, choosing the cheaper propagation direction.
    FullPattern,
    /// Defer to first use; the cheaper direction is chosen then.
    #[default]
    Deferred,
}

/// Construction-time configuration for a [`Checkpoint`].
#[derive(Clone, Copy, Debug)]
pub struct CheckpointOptions {
    /// Run the tape optimizer (CSE + DCE) after recording.
    pub optimize: bool,
    /// When to resolve the Jacobian dependency pattern.
    pub sparsity: SparsityMode,
    /// Also build the nested tape, so callers can differentiate through the
    /// checkpoint's own derivative (AD-of-AD).
    pub nested: bool,
    /// Allow concurrent replay from multiple threads, each using private
    /// evaluation state.
    pub use_in_parallel: bool,
}

impl Default for CheckpointOptions {
    fn default() -> Self {
        CheckpointOptions {
            optimize: true,
            sparsity: SparsityMode::Deferred,
            nested: false,
            use_in_parallel: false,
        }
    }
}

/// Per-thread replay state, allocated lazily on a thread's first use.
#[derive(Default)]
pub(crate) struct Member<F: Float> {
    /// Taylor work buffer for the frozen tape.
    pub(crate) work: Vec<F>,
    /// Zero-order replay buffer.
    pub(crate) values: Vec<F>,
    /// Taylor work buffer for the nested tape.
    pub(crate) nested_work: Vec<Dual<F>>,
    /// Cached Jacobian dependency pattern.
    pub(crate) pattern: Option<DepPattern>,
}

/// A frozen, reusable sub-computation.
///
/// Construct with [`Checkpoint::record`]; invoke inside a larger recording
/// with [`Checkpoint::call`], or replay directly with [`Checkpoint::eval`]
/// and the [`AtomicFn`] forward operations.
pub struct Checkpoint<F: Float> {
    name: String,
    /// The frozen inner function.
    pub(crate) fun: Tape<F>,
    /// The inner function one derivative level deeper, when enabled.
    pub(crate) nested: Option<Tape<Dual<F>>>,
    use_in_parallel: bool,
    pub(crate) members: ThreadSlots<Member<F>>,
    /// How many times the dependency pattern has actually been propagated
    /// (not served from a thread's cache).
    pub(crate) pattern_evals: AtomicUsize,
    y0: Vec<F>,
}

impl<F: Float> std::fmt::Debug for Checkpoint<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("name", &self.name)
            .field("use_in_parallel", &self.use_in_parallel)
            .field("pattern_evals", &self.pattern_evals)
            .finish_non_exhaustive()
    }
}

impl<F: Float + ActiveTape> Checkpoint<F> {
    /// Record `algo` once against a copy of `x` and freeze the result.
    ///
    /// Returns the checkpoint and the output values of the recording pass.
    /// After recording, the tape disables NaN validation and comparison
    /// checking (its control flow was fixed at recording time and is not
    /// re-verified on replay), then optionally runs the optimizer.
    ///
    /// # Panics
    ///
    /// Construction is a one-time, single-threaded setup step; calling it
    /// inside a parallel region panics with a diagnostic naming the
    /// checkpoint.
    pub fn record(
        name: &str,
        algo: impl FnOnce(&[Var<F>]) -> Vec<Var<F>>,
        x: &[F],
        options: CheckpointOptions,
    ) -> (Arc<Self>, Vec<F>) {
        assert!(
            !in_parallel(),
            "{name}: checkpoint constructed inside a parallel region"
        );

        let (session, inputs) = Recording::start(x);
        let outputs = algo(&inputs);
        let mut fun = session.finish(&outputs);

        // The frozen tape's control flow and results were validated at
        // recording time; replays skip both checks. Disabled before the
        // optimizer runs so comparison-only subtrees can be eliminated.
        fun.set_check_for_nan(false);
        fun.set_check_compare(false);
        if options.optimize {
            fun.optimize();
        }

        let nested = if options.nested {
            Some(fun.to_nested())
        } else {
            None
        };
        let y0 = fun.output_values();

        debug!(
            "checkpoint '{}': {} -> {}, {} tape entries{}",
            name,
            fun.num_inputs(),
            fun.num_outputs(),
            fun.num_ops(),
            if nested.is_some() { ", nested" } else { "" },
        );

        let ckpt = Checkpoint {
            name: name.to_string(),
            fun,
            nested,
            use_in_parallel: options.use_in_parallel,
            members: ThreadSlots::new(),
            pattern_evals: AtomicUsize::new(0),
            y0: y0.clone(),
        };

        match options.sparsity {
            SparsityMode::ForwardPattern => ckpt.resolve_pattern(true),
            SparsityMode::FullPattern => {
                ckpt.resolve_pattern(ckpt.fun.num_inputs() <= ckpt.fun.num_outputs())
            }
            SparsityMode::Deferred => {}
        }

        (Arc::new(ckpt), y0)
    }
}

impl<F: Float> Checkpoint<F> {
    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of inputs of the frozen function.
    pub fn domain(&self) -> usize {
        self.fun.num_inputs()
    }

    /// Number of outputs of the frozen function.
    pub fn range(&self) -> usize {
        self.fun.num_outputs()
    }

    /// Output values from the recording pass.
    pub fn recorded_outputs(&self) -> &[F] {
        &self.y0
    }

    /// Whether the nested (AD-of-AD) tape was built at construction.
    pub fn supports_nested(&self) -> bool {
        self.nested.is_some()
    }

    /// Number of entries in the frozen tape (diagnostic).
    pub fn num_tape_entries(&self) -> usize {
        self.fun.num_ops()
    }

    /// Whether concurrent replay was enabled at construction.
    pub fn use_in_parallel(&self) -> bool {
        self.use_in_parallel
    }

    /// Zero-order replay at new inputs.
    pub fn eval(&self, x: &[F]) -> Vec<F> {
        assert_eq!(x.len(), self.domain(), "{}: wrong input count", self.name);
        let member = self.select_member();
        // SAFETY: the slot belongs to the calling thread; only the `values`
        // field is touched.
        let values = unsafe { &mut (*member).values };
        self.fun.forward_into(x, values);
        self.fun
            .output_indices
            .iter()
            .map(|&i| values[i as usize])
            .collect()
    }

    /// Invoke the checkpoint inside the active recording.
    ///
    /// Records a single atomic call into the tape being recorded and
    /// returns the result variables. The coefficient scalar of the
    /// surrounding recording selects the variant: recording into a nested
    /// tape requires nested support.
    ///
    /// # Panics
    ///
    /// Panics if no recording session is active, or if the surrounding
    /// recording is nested and this checkpoint was constructed without
    /// nested support.
    pub fn call<V>(self: &Arc<Self>, ax: &[Var<V>]) -> Vec<Var<V>>
    where
        V: Value<Base = F> + ActiveTape,
    {
        assert_eq!(
            ax.len(),
            self.domain(),
            "{}: expected {} arguments, got {}",
            self.name,
            self.domain(),
            ax.len()
        );

        let type_x: Vec<ArgKind> = ax
            .iter()
            .map(|a| {
                if a.index() == CONSTANT {
                    ArgKind::Constant
                } else {
                    ArgKind::Variable
                }
            })
            .collect();
        let need_y = vec![true; self.range()];
        let x0: Vec<V> = ax.iter().map(|a| a.value()).collect();

        let mut y0 = Vec::new();
        let ok = V::atomic_forward(self.as_ref(), &type_x, &need_y, 0, 0, &x0, &mut y0);
        assert!(
            ok,
            "{}: cannot record at this derivative level (checkpoint built without nested support)",
            self.name
        );

        let results = with_active_tape(|t: &mut Tape<V>| {
            let args: Vec<u32> = ax.iter().map(|a| ensure_on_tape(a, t)).collect();
            t.record_atomic_call(Arc::clone(self) as Arc<dyn AtomicFn<F>>, &args, &y0)
        });

        results
            .into_iter()
            .zip(y0)
            .map(|(idx, v)| Var::from_tape(v, idx))
            .collect()
    }
}

#[cfg(feature = "parallel")]
impl<F: Float> Checkpoint<F> {
    /// Replay the checkpoint at many points on the rayon pool.
    ///
    /// Holds a [`crate::ParallelRegion`] guard for the duration, so the
    /// checkpoint must have been constructed with `use_in_parallel`.
    pub fn eval_batch_par(&self, xs: &[Vec<F>]) -> Vec<Vec<F>> {
        use rayon::prelude::*;

        let _region = crate::thread::ParallelRegion::enter();
        xs.par_iter().map(|x| self.eval(x)).collect()
    }
}
