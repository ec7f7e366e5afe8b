//! Tape optimization: dead-code elimination and common-subexpression
//! elimination.

use std::collections::HashMap;

use crate::float::Value;
use crate::opcode::{OpCode, UNUSED};

use super::Tape;

impl<V: Value> Tape<V> {
    /// Eliminate dead (unreachable) entries from the tape.
    ///
    /// Walks backward from the outputs, marks reachable entries, then
    /// compacts the tape in place with an index remap. Inputs are never
    /// removed. Atomic calls are kept whole: if any result of a call is
    /// live, the entire call (all result nodes and all arguments) is
    /// live. Comparison records whose operands die are dropped.
    pub fn dead_code_elimination(&mut self) {
        let n = self.opcodes.len();
        let mut reachable = vec![false; n];

        for flag in reachable.iter_mut().take(self.num_inputs as usize) {
            *flag = true;
        }

        // While comparison checking is on, compare operands stay alive so
        // divergence checks survive optimization. With the check disabled
        // (frozen checkpoints) the records are dead weight and are dropped.
        let mut stack: Vec<u32> = self.output_indices.clone();
        if self.check_compare {
            for rec in &self.compares {
                stack.push(rec.lhs);
                stack.push(rec.rhs);
            }
        } else {
            self.compares.clear();
        }
        while let Some(idx) = stack.pop() {
            let i = idx as usize;
            if reachable[i] {
                continue;
            }
            reachable[i] = true;
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => {}
                OpCode::Atomic => {
                    let call = &self.atomic_calls[self.arg_indices[i][0] as usize];
                    for o in 0..call.need_y.len() {
                        stack.push(call.first_result + o as u32);
                    }
                    stack.extend_from_slice(&call.args);
                }
                op => {
                    let [a, b] = self.arg_indices[i];
                    stack.push(a);
                    if b != UNUSED && op != OpCode::Powi {
                        stack.push(b);
                    }
                }
            }
        }

        // Which calls survive (all-or-nothing per call).
        let live_call: Vec<bool> = self
            .atomic_calls
            .iter()
            .map(|c| reachable[c.first_result as usize])
            .collect();
        let mut call_remap = vec![0u32; self.atomic_calls.len()];
        let mut next_call = 0u32;
        for (ci, &live) in live_call.iter().enumerate() {
            if live {
                call_remap[ci] = next_call;
                next_call += 1;
            }
        }

        // Build node remap: old index -> new index.
        let mut remap = vec![0u32; n];
        let mut new_idx = 0u32;
        for i in 0..n {
            if reachable[i] {
                remap[i] = new_idx;
                new_idx += 1;
            }
        }
        let new_len = new_idx as usize;

        // Compact in place.
        let mut write = 0;
        for read in 0..n {
            if !reachable[read] {
                continue;
            }
            self.opcodes[write] = self.opcodes[read];
            self.values[write] = self.values[read];
            let [a, b] = self.arg_indices[read];
            self.arg_indices[write] = match self.opcodes[read] {
                OpCode::Input | OpCode::Const => [UNUSED, UNUSED],
                OpCode::Atomic => [call_remap[a as usize], b],
                OpCode::Powi => [remap[a as usize], b],
                op => {
                    let rb = if b != UNUSED && op != OpCode::Powi {
                        remap[b as usize]
                    } else {
                        b
                    };
                    [remap[a as usize], rb]
                }
            };
            write += 1;
        }

        self.opcodes.truncate(new_len);
        self.arg_indices.truncate(new_len);
        self.values.truncate(new_len);
        self.num_variables = new_len as u32;

        // Compact and remap the side tables.
        let mut calls = std::mem::take(&mut self.atomic_calls);
        let mut kept = Vec::with_capacity(next_call as usize);
        for (ci, mut call) in calls.drain(..).enumerate() {
            if !live_call[ci] {
                continue;
            }
            call.first_result = remap[call.first_result as usize];
            for a in &mut call.args {
                *a = remap[*a as usize];
            }
            kept.push(call);
        }
        self.atomic_calls = kept;

        self.compares.retain_mut(|rec| {
            if reachable[rec.lhs as usize] && reachable[rec.rhs as usize] {
                rec.lhs = remap[rec.lhs as usize];
                rec.rhs = remap[rec.rhs as usize];
                true
            } else {
                false
            }
        });

        for oi in &mut self.output_indices {
            *oi = remap[*oi as usize];
        }
    }

    /// Common subexpression elimination.
    ///
    /// Deduplicates identical `(OpCode, arg0, arg1)` triples, normalising
    /// argument order for commutative ops. Atomic results are never merged.
    /// Finishes with a DCE pass to remove the now-dead duplicates.
    pub fn cse(&mut self) {
        let n = self.opcodes.len();
        let mut seen: HashMap<(OpCode, u32, u32), u32> = HashMap::new();
        let mut remap: Vec<u32> = (0..n as u32).collect();

        let is_commutative = |op: OpCode| -> bool {
            matches!(
                op,
                OpCode::Add | OpCode::Mul | OpCode::Max | OpCode::Min | OpCode::Hypot
            )
        };

        for i in 0..n {
            let op = self.opcodes[i];
            if matches!(op, OpCode::Input | OpCode::Const | OpCode::Atomic) {
                continue;
            }

            let [mut a, mut b] = self.arg_indices[i];
            a = remap[a as usize];
            if b != UNUSED && op != OpCode::Powi {
                b = remap[b as usize];
            }
            self.arg_indices[i] = [a, b];

            let key = if b == UNUSED || op == OpCode::Powi {
                (op, a, b)
            } else if is_commutative(op) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                (op, lo, hi)
            } else {
                (op, a, b)
            };

            if let Some(&canonical) = seen.get(&key) {
                remap[i] = canonical;
            } else {
                seen.insert(key, i as u32);
            }
        }

        // Apply the remap to atomic-call arguments and outputs.
        for call in &mut self.atomic_calls {
            for a in &mut call.args {
                *a = remap[*a as usize];
            }
        }
        for rec in &mut self.compares {
            rec.lhs = remap[rec.lhs as usize];
            rec.rhs = remap[rec.rhs as usize];
        }
        for oi in &mut self.output_indices {
            *oi = remap[*oi as usize];
        }

        self.dead_code_elimination();
    }

    /// Run all tape optimizations: CSE followed by DCE.
    ///
    /// In debug builds, validates internal consistency afterwards.
    pub fn optimize(&mut self) {
        self.cse();
        self.dead_code_elimination();

        #[cfg(debug_assertions)]
        self.validate();
    }

    #[cfg(debug_assertions)]
    fn validate(&self) {
        let n = self.opcodes.len();
        for i in 0..n {
            let [a, b] = self.arg_indices[i];
            match self.opcodes[i] {
                OpCode::Input | OpCode::Const => {
                    assert_eq!(a, UNUSED, "Input/Const should have UNUSED args");
                    assert_eq!(b, UNUSED, "Input/Const should have UNUSED args");
                }
                OpCode::Powi => {
                    assert!((a as usize) < i, "Powi arg {a} not before op {i}");
                }
                OpCode::Atomic => {
                    let call = &self.atomic_calls[a as usize];
                    assert!(call.first_result as usize <= i);
                    for &arg in &call.args {
                        assert!(
                            (arg as usize) < call.first_result as usize,
                            "atomic arg {arg} not before call at {}",
                            call.first_result
                        );
                    }
                }
                _ => {
                    assert!((a as usize) < i, "arg0 {a} not before op {i}");
                    if b != UNUSED {
                        assert!((b as usize) < i, "arg1 {b} not before op {i}");
                    }
                }
            }
        }
        for &oi in &self.output_indices {
            assert!((oi as usize) < n, "output index {oi} out of bounds");
        }
        let input_count = self
            .opcodes
            .iter()
            .filter(|&&op| op == OpCode::Input)
            .count();
        assert_eq!(
            input_count, self.num_inputs as usize,
            "num_inputs mismatch after optimization"
        );
    }
}
