//! Seeded dependency-pattern propagation.
//!
//! These sweeps track *possible* data dependencies (an entry is present if
//! any path connects the pair), not numeric non-zeros. All intermediate row
//! storage is function-local, so a propagation leaves no residual heap
//! growth behind.

use crate::float::Value;
use crate::opcode::{OpCode, UNUSED};
use crate::sparse::{union_words, DepPattern};

use super::Tape;

/// `deps[dst] |= deps[src]` within a flat row buffer.
#[inline]
fn union_row(deps: &mut [u64], words: usize, dst: usize, src: usize) {
    if dst == src {
        return;
    }
    if src < dst {
        let (lo, hi) = deps.split_at_mut(dst * words);
        union_words(&mut hi[..words], &lo[src * words..(src + 1) * words]);
    } else {
        let (lo, hi) = deps.split_at_mut(src * words);
        union_words(&mut lo[dst * words..(dst + 1) * words], &hi[..words]);
    }
}

impl<V: Value> Tape<V> {
    /// Propagate a seed pattern forward through the tape.
    ///
    /// `seed` has one row per input (typically the identity); the result has
    /// one row per output, over the seed's columns. Atomic calls are crossed
    /// through the callback's own dependency pattern.
    pub fn for_dep_sparsity(&self, seed: &DepPattern) -> DepPattern {
        assert_eq!(
            seed.n_rows(),
            self.num_inputs as usize,
            "seed must have one row per input"
        );
        let words = seed.words_per_row();
        let nv = self.num_variables as usize;
        let mut deps = vec![0u64; nv * words];

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input => {
                    deps[i * words..(i + 1) * words].copy_from_slice(seed.row(i));
                }
                OpCode::Const => {}
                OpCode::Atomic => {
                    let [call_idx, offset] = self.arg_indices[i];
                    if offset != 0 {
                        continue;
                    }
                    let call = &self.atomic_calls[call_idx as usize];
                    let pat = call.fun.dep_pattern();
                    debug_assert_eq!(pat.n_rows(), call.need_y.len());
                    debug_assert_eq!(pat.n_cols(), call.args.len());
                    for o in 0..call.need_y.len() {
                        for (j, &a) in call.args.iter().enumerate() {
                            if pat.contains(o, j) {
                                union_row(&mut deps, words, i + o, a as usize);
                            }
                        }
                    }
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    union_row(&mut deps, words, i, a_idx as usize);
                    if op != OpCode::Powi && b_idx != UNUSED {
                        union_row(&mut deps, words, i, b_idx as usize);
                    }
                }
            }
        }

        let mut out = DepPattern::new(self.output_indices.len(), seed.n_cols());
        for (r, &oi) in self.output_indices.iter().enumerate() {
            let oi = oi as usize;
            out.row_mut(r)
                .copy_from_slice(&deps[oi * words..(oi + 1) * words]);
        }
        out
    }

    /// Propagate a seed pattern backward through the tape.
    ///
    /// `seed` has one row per output (typically the identity); the result
    /// has one row per input, over the seed's columns.
    pub fn rev_dep_sparsity(&self, seed: &DepPattern) -> DepPattern {
        assert_eq!(
            seed.n_rows(),
            self.output_indices.len(),
            "seed must have one row per output"
        );
        let words = seed.words_per_row();
        let nv = self.num_variables as usize;
        let mut deps = vec![0u64; nv * words];

        for (r, &oi) in self.output_indices.iter().enumerate() {
            let oi = oi as usize;
            union_words(&mut deps[oi * words..(oi + 1) * words], seed.row(r));
        }

        for i in (0..self.opcodes.len()).rev() {
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => {}
                OpCode::Atomic => {
                    // Node i is result `offset` of its call; its row flows
                    // into exactly the arguments that result depends on.
                    let [call_idx, offset] = self.arg_indices[i];
                    let call = &self.atomic_calls[call_idx as usize];
                    let pat = call.fun.dep_pattern();
                    for (j, &a) in call.args.iter().enumerate() {
                        if pat.contains(offset as usize, j) {
                            union_row(&mut deps, words, a as usize, i);
                        }
                    }
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    union_row(&mut deps, words, a_idx as usize, i);
                    if op != OpCode::Powi && b_idx != UNUSED {
                        union_row(&mut deps, words, b_idx as usize, i);
                    }
                }
            }
        }

        let n = self.num_inputs as usize;
        let mut out = DepPattern::new(n, seed.n_cols());
        for j in 0..n {
            out.row_mut(j)
                .copy_from_slice(&deps[j * words..(j + 1) * words]);
        }
        out
    }
}
