//! Jacobian dependency-pattern resolution for checkpoints.

use std::sync::atomic::Ordering;

use log::trace;

use crate::float::Float;
use crate::sparse::DepPattern;

use super::Checkpoint;

impl<F: Float> Checkpoint<F> {
    /// The frozen function's Jacobian dependency pattern
    /// (`range × domain`), computed on the calling thread's first use and
    /// cached in its replay state thereafter.
    ///
    /// The propagation direction follows the smaller seed dimension: an
    /// `n×n` identity seed is pushed forward when `n <= m`, otherwise an
    /// `m×m` identity seed is pulled backward and the result transposed.
    /// Both directions produce the identical pattern.
    pub fn jac_sparsity(&self) -> &DepPattern {
        let member = self.members.lookup_or_insert();
        // SAFETY: the slot belongs to the calling thread; once filled, the
        // pattern is never replaced for the checkpoint's lifetime, so the
        // returned reference stays valid alongside later buffer use.
        let slot = unsafe { &mut (*member).pattern };
        if slot.is_none() {
            let forward = self.fun.num_inputs() <= self.fun.num_outputs();
            *slot = Some(self.compute_pattern(forward));
            self.pattern_evals.fetch_add(1, Ordering::Relaxed);
        }
        slot.as_ref().unwrap()
    }

    /// Force pattern computation in a fixed direction (construction-time
    /// sparsity modes).
    pub(crate) fn resolve_pattern(&self, forward: bool) {
        let member = self.members.lookup_or_insert();
        // SAFETY: as in `jac_sparsity`.
        let slot = unsafe { &mut (*member).pattern };
        debug_assert!(
            slot.is_none(),
            "sparsity pattern must be empty before first computation"
        );
        if slot.is_some() {
            return;
        }
        *slot = Some(self.compute_pattern(forward));
        self.pattern_evals.fetch_add(1, Ordering::Relaxed);
    }

    /// How many times the dependency pattern has actually been propagated
    /// across all threads (cached lookups do not count).
    pub fn pattern_evaluations(&self) -> usize {
        self.pattern_evals.load(Ordering::Relaxed)
    }

    fn compute_pattern(&self, forward: bool) -> DepPattern {
        let n = self.fun.num_inputs();
        let m = self.fun.num_outputs();
        // Propagation buffers are local to the sweep, so resolving the
        // pattern leaves no residual allocation behind.
        let pattern = if forward {
            self.fun.for_dep_sparsity(&DepPattern::identity(n))
        } else {
            self.fun
                .rev_dep_sparsity(&DepPattern::identity(m))
                .transposed()
        };
        trace!(
            "checkpoint '{}': dependency pattern via {} propagation, {} entries",
            self.name(),
            if forward { "forward" } else { "reverse" },
            pattern.nnz(),
        );
        debug_assert_eq!(pattern.n_rows(), m);
        debug_assert_eq!(pattern.n_cols(), n);
        pattern
    }
}
