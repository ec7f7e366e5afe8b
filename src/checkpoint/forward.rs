//! Forward-mode dispatch through a checkpoint.

use crate::atomic::{ArgKind, AtomicFn};
use crate::dual::Dual;
use crate::float::Float;
use crate::sparse::DepPattern;
use crate::thread::in_parallel;

use super::{Checkpoint, Member};

impl<F: Float> Checkpoint<F> {
    /// Resolve the calling thread's replay state, allocating it on first
    /// use.
    ///
    /// Checkpoints not flagged for concurrent reuse must not be replayed
    /// from a parallel region; that is a configuration error, not a
    /// recoverable condition.
    pub(crate) fn select_member(&self) -> *mut Member<F> {
        if !self.use_in_parallel() {
            assert!(
                !in_parallel(),
                "{}: use_in_parallel is false but execution is parallel",
                self.name()
            );
        }
        self.members.lookup_or_insert()
    }
}

impl<F: Float> AtomicFn<F> for Checkpoint<F> {
    fn name(&self) -> &str {
        Checkpoint::name(self)
    }

    fn domain(&self) -> usize {
        Checkpoint::domain(self)
    }

    fn range(&self) -> usize {
        Checkpoint::range(self)
    }

    fn dep_pattern(&self) -> DepPattern {
        self.jac_sparsity().clone()
    }

    /// Taylor propagation through the frozen tape.
    ///
    /// All orders `[0, order_up]` and all outputs are computed regardless
    /// of `order_low` and `need_y`; the frozen tape replays as a whole.
    fn forward(
        &self,
        _type_x: &[ArgKind],
        _need_y: &[bool],
        _order_low: usize,
        order_up: usize,
        taylor_x: &[F],
        taylor_y: &mut Vec<F>,
    ) -> bool {
        let member = self.select_member();
        // SAFETY: the slot belongs to the calling thread; only the `work`
        // field is touched, so a cached `&pattern` handed out earlier stays
        // undisturbed.
        let work = unsafe { &mut (*member).work };
        self.fun.forward_taylor(order_up, taylor_x, work, taylor_y);
        true
    }

    /// Taylor propagation through the nested tape.
    ///
    /// Declined (`false`) when the checkpoint was constructed without
    /// nested support; callers fall back to an uncheckpointed evaluation.
    fn forward_nested(
        &self,
        _type_x: &[ArgKind],
        _need_y: &[bool],
        _order_low: usize,
        order_up: usize,
        taylor_x: &[Dual<F>],
        taylor_y: &mut Vec<Dual<F>>,
    ) -> bool {
        let Some(nested) = self.nested.as_ref() else {
            return false;
        };
        let member = self.select_member();
        // SAFETY: as in `forward`; only `nested_work` is touched.
        let work = unsafe { &mut (*member).nested_work };
        nested.forward_taylor(order_up, taylor_x, work, taylor_y);
        true
    }
}
