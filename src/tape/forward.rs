//! Forward replay sweeps: zero-order values and Taylor coefficients.

use crate::float::Value;
use crate::opcode::{self, OpCode, UNUSED};
use crate::taylor_ops;

use super::{compare_outcome, Tape};

impl<V: Value> Tape<V> {
    /// Zero-order replay into an external buffer.
    ///
    /// Reads opcodes and constants from `self` but writes all computed
    /// values into `values_buf`, so concurrent callers can share one tape
    /// without cloning. Returns the number of recorded comparison outcomes
    /// that flipped at these inputs (always 0 when comparison checking is
    /// disabled); a nonzero count means the replay followed a control-flow
    /// path the recording did not take.
    pub fn forward_into(&self, inputs: &[V], values_buf: &mut Vec<V>) -> usize {
        assert_eq!(
            inputs.len(),
            self.num_inputs as usize,
            "wrong number of inputs"
        );

        let n = self.num_variables as usize;
        values_buf.clear();
        values_buf.resize(n, V::zero());

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input => values_buf[i] = inputs[i],
                OpCode::Const => values_buf[i] = self.values[i],
                OpCode::Powi => {
                    let [a_idx, exp_bits] = self.arg_indices[i];
                    let exp = opcode::powi_exp_decode(exp_bits);
                    values_buf[i] = values_buf[a_idx as usize].powi(exp);
                }
                OpCode::Atomic => {
                    let [call_idx, offset] = self.arg_indices[i];
                    if offset != 0 {
                        continue; // filled by the call's first result node
                    }
                    let call = &self.atomic_calls[call_idx as usize];
                    let x0: Vec<V> = call
                        .args
                        .iter()
                        .map(|&a| values_buf[a as usize])
                        .collect();
                    let mut y0 = Vec::new();
                    let ok = V::atomic_forward(
                        call.fun.as_ref(),
                        &call.type_x,
                        &call.need_y,
                        0,
                        0,
                        &x0,
                        &mut y0,
                    );
                    assert!(
                        ok,
                        "atomic '{}' refused zero-order forward",
                        call.fun.name()
                    );
                    values_buf[i..i + y0.len()].copy_from_slice(&y0);
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let a = values_buf[a_idx as usize];
                    let b = if b_idx != UNUSED {
                        values_buf[b_idx as usize]
                    } else {
                        V::zero()
                    };
                    values_buf[i] = opcode::eval_forward(op, a, b);
                }
            }
        }

        if self.check_for_nan {
            for &oi in &self.output_indices {
                assert!(
                    !values_buf[oi as usize].is_nan(),
                    "tape replay produced NaN at output index {oi}"
                );
            }
        }

        let mut changes = 0;
        if self.check_compare {
            for rec in &self.compares {
                let lhs = values_buf[rec.lhs as usize];
                let rhs = values_buf[rec.rhs as usize];
                if compare_outcome(lhs.partial_cmp(&rhs)) != rec.outcome {
                    changes += 1;
                }
            }
        }
        changes
    }

    /// Zero-order replay convenience: evaluate at `inputs` and return the
    /// output values.
    pub fn eval(&self, inputs: &[V]) -> Vec<V> {
        let mut buf = Vec::new();
        self.forward_into(inputs, &mut buf);
        self.output_indices
            .iter()
            .map(|&i| buf[i as usize])
            .collect()
    }

    /// Forward Taylor-coefficient sweep for orders `[0, order_up]`.
    ///
    /// `taylor_x` is input-major with `k = order_up + 1` coefficients per
    /// input: `taylor_x[j*k + d]` is input `j`'s order-`d` coefficient.
    /// `work` is the caller's scratch buffer (resized to `num_ops × k`, one
    /// coefficient row per tape node) so repeated sweeps reuse the
    /// allocation; `taylor_y` receives the output rows in the same layout.
    pub fn forward_taylor(
        &self,
        order_up: usize,
        taylor_x: &[V],
        work: &mut Vec<V>,
        taylor_y: &mut Vec<V>,
    ) {
        let k = order_up + 1;
        let n = self.num_inputs as usize;
        assert_eq!(taylor_x.len(), n * k, "wrong taylor_x length");

        let nv = self.num_variables as usize;
        work.clear();
        work.resize(nv * k, V::zero());

        let mut s1 = vec![V::zero(); k];
        let mut s2 = vec![V::zero(); k];
        let mut s3 = vec![V::zero(); k];

        for i in 0..self.opcodes.len() {
            match self.opcodes[i] {
                OpCode::Input => {
                    // Inputs occupy the first n tape slots, in order.
                    work[i * k..(i + 1) * k].copy_from_slice(&taylor_x[i * k..(i + 1) * k]);
                }
                OpCode::Const => {
                    work[i * k] = self.values[i];
                }
                OpCode::Atomic => {
                    let [call_idx, offset] = self.arg_indices[i];
                    if offset != 0 {
                        continue;
                    }
                    let call = &self.atomic_calls[call_idx as usize];
                    let m_call = call.need_y.len();

                    let mut xa = vec![V::zero(); call.args.len() * k];
                    for (j, &a) in call.args.iter().enumerate() {
                        let a = a as usize;
                        xa[j * k..(j + 1) * k].copy_from_slice(&work[a * k..(a + 1) * k]);
                    }
                    let mut ya = Vec::new();
                    let ok = V::atomic_forward(
                        call.fun.as_ref(),
                        &call.type_x,
                        &call.need_y,
                        0,
                        order_up,
                        &xa,
                        &mut ya,
                    );
                    assert!(
                        ok,
                        "atomic '{}' refused forward at order {}",
                        call.fun.name(),
                        order_up
                    );
                    assert_eq!(ya.len(), m_call * k, "atomic result shape mismatch");
                    work[i * k..i * k + m_call * k].copy_from_slice(&ya);
                }
                op => {
                    let [a_idx, b_idx] = self.arg_indices[i];
                    let (lo, hi) = work.split_at_mut(i * k);
                    let c = &mut hi[..k];
                    let a_idx = a_idx as usize;
                    let a = &lo[a_idx * k..(a_idx + 1) * k];
                    let b = if op != OpCode::Powi && b_idx != UNUSED {
                        let b_idx = b_idx as usize;
                        Some(&lo[b_idx * k..(b_idx + 1) * k])
                    } else {
                        None
                    };
                    taylor_ops::taylor_step(op, a, b, b_idx, c, &mut s1, &mut s2, &mut s3);
                }
            }
        }

        if self.check_for_nan {
            for &oi in &self.output_indices {
                let oi = oi as usize;
                for d in 0..k {
                    assert!(
                        !work[oi * k + d].is_nan(),
                        "tape replay produced NaN at output index {oi}, order {d}"
                    );
                }
            }
        }

        let m = self.output_indices.len();
        taylor_y.clear();
        taylor_y.resize(m * k, V::zero());
        for (r, &oi) in self.output_indices.iter().enumerate() {
            let oi = oi as usize;
            taylor_y[r * k..(r + 1) * k].copy_from_slice(&work[oi * k..(oi + 1) * k]);
        }
    }
}
