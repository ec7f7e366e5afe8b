//! Taylor coefficient propagation kernels.
//!
//! Convention: `c[k] = f^(k)(t₀) / k!` (scaled Taylor coefficients). All
//! kernels operate on slices whose length is the coefficient count, and are
//! generic over `num_traits::Float` so the same code runs a base sweep
//! (`f64`) and a nested sweep (`Dual<f64>`).

use num_traits::Float;

use crate::opcode::{self, OpCode};

// ══════════════════════════════════════════════
//  Arithmetic
// ══════════════════════════════════════════════

/// `c = a + b`
#[inline]
pub fn taylor_add<F: Float>(a: &[F], b: &[F], c: &mut [F]) {
    for k in 0..c.len() {
        c[k] = a[k] + b[k];
    }
}

/// `c = a - b`
#[inline]
pub fn taylor_sub<F: Float>(a: &[F], b: &[F], c: &mut [F]) {
    for k in 0..c.len() {
        c[k] = a[k] - b[k];
    }
}

/// `c = -a`
#[inline]
pub fn taylor_neg<F: Float>(a: &[F], c: &mut [F]) {
    for k in 0..c.len() {
        c[k] = -a[k];
    }
}

/// `c = s * a` where `s` is a scalar.
#[inline]
pub fn taylor_scale<F: Float>(a: &[F], s: F, c: &mut [F]) {
    for k in 0..c.len() {
        c[k] = s * a[k];
    }
}

/// `c = a * b` — Cauchy product.
///
/// `c[k] = Σ_{j=0}^{k} a[j] * b[k-j]`
#[inline]
pub fn taylor_mul<F: Float>(a: &[F], b: &[F], c: &mut [F]) {
    let n = c.len();
    for k in 0..n {
        let mut sum = F::zero();
        for j in 0..=k {
            sum = sum + a[j] * b[k - j];
        }
        c[k] = sum;
    }
}

/// `c = a / b` — recursive Taylor division.
///
/// `c[k] = (a[k] - Σ_{j=1}^{k} b[j] * c[k-j]) / b[0]`
#[inline]
pub fn taylor_div<F: Float>(a: &[F], b: &[F], c: &mut [F]) {
    let n = c.len();
    let inv_b0 = F::one() / b[0];
    for k in 0..n {
        let mut sum = a[k];
        for j in 1..=k {
            sum = sum - b[j] * c[k - j];
        }
        c[k] = sum * inv_b0;
    }
}

/// `c = 1/a` — special case of division with numerator `[1, 0, ..., 0]`.
#[inline]
pub fn taylor_recip<F: Float>(a: &[F], c: &mut [F]) {
    let n = c.len();
    let inv_a0 = F::one() / a[0];
    c[0] = inv_a0;
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + a[j] * c[k - j];
        }
        c[k] = -sum * inv_a0;
    }
}

// ══════════════════════════════════════════════
//  Transcendentals
// ══════════════════════════════════════════════

/// `c = exp(a)`
///
/// `c[k] = (1/k) * Σ_{j=1}^{k} j * a[j] * c[k-j]`
#[inline]
pub fn taylor_exp<F: Float>(a: &[F], c: &mut [F]) {
    let n = c.len();
    c[0] = a[0].exp();
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + F::from(j).unwrap() * a[j] * c[k - j];
        }
        c[k] = sum / F::from(k).unwrap();
    }
}

/// `c = ln(a)`
///
/// `c[k] = (a[k] - (1/k) * Σ_{j=1}^{k-1} j * c[j] * a[k-j]) / a[0]`
#[inline]
pub fn taylor_ln<F: Float>(a: &[F], c: &mut [F]) {
    let n = c.len();
    let inv_a0 = F::one() / a[0];
    c[0] = a[0].ln();
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..k {
            sum = sum + F::from(j).unwrap() * c[j] * a[k - j];
        }
        c[k] = (a[k] - sum / F::from(k).unwrap()) * inv_a0;
    }
}

/// `c = sqrt(a)`
///
/// `c[k] = (a[k] - Σ_{j=1}^{k-1} c[j] * c[k-j]) / (2 * c[0])`
#[inline]
pub fn taylor_sqrt<F: Float>(a: &[F], c: &mut [F]) {
    let n = c.len();
    c[0] = a[0].sqrt();
    let two_c0 = F::from(2.0).unwrap() * c[0];
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..k {
            sum = sum + c[j] * c[k - j];
        }
        c[k] = (a[k] - sum) / two_c0;
    }
}

/// `(s, co) = sin_cos(a)` — coupled recurrence.
///
/// `s[k] = (1/k) * Σ j * a[j] * co[k-j]`, `co[k] = -(1/k) * Σ j * a[j] * s[k-j]`
#[inline]
pub fn taylor_sin_cos<F: Float>(a: &[F], s: &mut [F], co: &mut [F]) {
    let n = s.len();
    let (s0, c0) = a[0].sin_cos();
    s[0] = s0;
    co[0] = c0;
    for k in 1..n {
        let inv_k = F::one() / F::from(k).unwrap();
        let mut sum_s = F::zero();
        let mut sum_c = F::zero();
        for j in 1..=k {
            let jf = F::from(j).unwrap();
            sum_s = sum_s + jf * a[j] * co[k - j];
            sum_c = sum_c + jf * a[j] * s[k - j];
        }
        s[k] = sum_s * inv_k;
        co[k] = -sum_c * inv_k;
    }
}

/// `(sh, ch) = sinh_cosh(a)` — coupled recurrence with positive signs.
#[inline]
pub fn taylor_sinh_cosh<F: Float>(a: &[F], sh: &mut [F], ch: &mut [F]) {
    let n = sh.len();
    sh[0] = a[0].sinh();
    ch[0] = a[0].cosh();
    for k in 1..n {
        let inv_k = F::one() / F::from(k).unwrap();
        let mut sum_sh = F::zero();
        let mut sum_ch = F::zero();
        for j in 1..=k {
            let jf = F::from(j).unwrap();
            sum_sh = sum_sh + jf * a[j] * ch[k - j];
            sum_ch = sum_ch + jf * a[j] * sh[k - j];
        }
        sh[k] = sum_sh * inv_k;
        ch[k] = sum_ch * inv_k;
    }
}

/// Integration recurrence shared by the inverse trig/hyperbolic kernels:
/// given `g` with `c' = a' * g`, fills `c[1..]` as
/// `c[k] = (1/k) * Σ_{j=1}^{k} j * a[j] * g[k-j]`.
#[inline]
fn integrate_product<F: Float>(a: &[F], g: &[F], c: &mut [F]) {
    let n = c.len();
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + F::from(j).unwrap() * a[j] * g[k - j];
        }
        c[k] = sum / F::from(k).unwrap();
    }
}

/// `c = tan(a)` — via `c' = a' * (1 + c²)`, solved incrementally.
#[inline]
pub fn taylor_tan<F: Float>(a: &[F], c: &mut [F], scratch: &mut [F]) {
    let n = c.len();
    c[0] = a[0].tan();
    // scratch holds s = 1 + c²; s[k] only requires c[0..=k], so the two
    // recurrences interleave.
    scratch[0] = F::one() + c[0] * c[0];
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + F::from(j).unwrap() * a[j] * scratch[k - j];
        }
        c[k] = sum / F::from(k).unwrap();
        let mut s_k = F::zero();
        for j in 0..=k {
            s_k = s_k + c[j] * c[k - j];
        }
        scratch[k] = s_k;
    }
}

/// `c = tanh(a)` — via `c' = a' * (1 - c²)`, solved incrementally.
#[inline]
pub fn taylor_tanh<F: Float>(a: &[F], c: &mut [F], scratch: &mut [F]) {
    let n = c.len();
    c[0] = a[0].tanh();
    scratch[0] = F::one() - c[0] * c[0];
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + F::from(j).unwrap() * a[j] * scratch[k - j];
        }
        c[k] = sum / F::from(k).unwrap();
        let mut s_k = F::zero();
        for j in 0..=k {
            s_k = s_k + c[j] * c[k - j];
        }
        scratch[k] = -s_k;
    }
}

/// `c = atan(a)` — via `c' = a' / (1 + a²)`.
#[inline]
pub fn taylor_atan<F: Float>(a: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let n = c.len();
    taylor_mul(a, a, s1);
    s2[..n].copy_from_slice(&s1[..n]);
    s2[0] = F::one() + s1[0];
    taylor_recip(s2, s1);
    c[0] = a[0].atan();
    integrate_product(a, s1, c);
}

/// `c = asin(a)` — via `c' = a' / sqrt(1 - a²)`.
#[inline]
pub fn taylor_asin<F: Float>(a: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let n = c.len();
    c[0] = a[0].asin();
    taylor_mul(a, a, s1);
    s2[0] = F::one() - s1[0];
    for k in 1..n {
        s2[k] = -s1[k];
    }
    taylor_sqrt(s2, s1);
    taylor_recip(s1, s2);
    integrate_product(a, s2, c);
}

/// `c = acos(a) = π/2 - asin(a)`
#[inline]
pub fn taylor_acos<F: Float>(a: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    taylor_asin(a, c, s1, s2);
    c[0] = a[0].acos();
    for ck in c[1..].iter_mut() {
        *ck = -*ck;
    }
}

/// `c = asinh(a)` — via `c' = a' / sqrt(1 + a²)`.
#[inline]
pub fn taylor_asinh<F: Float>(a: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let n = c.len();
    c[0] = a[0].asinh();
    taylor_mul(a, a, s1);
    s2[..n].copy_from_slice(&s1[..n]);
    s2[0] = F::one() + s1[0];
    taylor_sqrt(s2, s1);
    taylor_recip(s1, s2);
    integrate_product(a, s2, c);
}

/// `c = acosh(a)` — via `c' = a' / sqrt(a² - 1)`.
#[inline]
pub fn taylor_acosh<F: Float>(a: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let n = c.len();
    c[0] = a[0].acosh();
    taylor_mul(a, a, s1);
    s2[..n].copy_from_slice(&s1[..n]);
    s2[0] = s1[0] - F::one();
    taylor_sqrt(s2, s1);
    taylor_recip(s1, s2);
    integrate_product(a, s2, c);
}

/// `c = atanh(a)` — via `c' = a' / (1 - a²)`.
#[inline]
pub fn taylor_atanh<F: Float>(a: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let n = c.len();
    c[0] = a[0].atanh();
    taylor_mul(a, a, s1);
    s2[0] = F::one() - s1[0];
    for k in 1..n {
        s2[k] = -s1[k];
    }
    taylor_recip(s2, s1);
    integrate_product(a, s1, c);
}

// ══════════════════════════════════════════════
//  Derived functions
// ══════════════════════════════════════════════

/// `c = a^b` (powf) = `exp(b * ln(a))`.
#[inline]
pub fn taylor_powf<F: Float>(a: &[F], b: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    taylor_ln(a, s1);
    taylor_mul(b, s1, s2);
    taylor_exp(s2, c);
    // Direct powf at order zero avoids the exp/ln round trip error.
    c[0] = a[0].powf(b[0]);
}

/// `c = a^n` (powi) — integer power via `exp(n * ln(a))`.
#[inline]
pub fn taylor_powi<F: Float>(a: &[F], n: i32, c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let deg = c.len();
    if n == 0 {
        c[0] = F::one();
        for ck in c[1..deg].iter_mut() {
            *ck = F::zero();
        }
        return;
    }
    if n == 1 {
        c.copy_from_slice(a);
        return;
    }
    taylor_ln(a, s1);
    taylor_scale(s1, F::from(n).unwrap(), s2);
    taylor_exp(s2, c);
    c[0] = a[0].powi(n);
}

/// `c = cbrt(a) = a^(1/3)`.
#[inline]
pub fn taylor_cbrt<F: Float>(a: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let third = F::one() / F::from(3.0).unwrap();
    taylor_ln(a, s1);
    taylor_scale(s1, third, s2);
    taylor_exp(s2, c);
    c[0] = a[0].cbrt();
}

/// `c = exp2(a) = exp(a * ln 2)`.
#[inline]
pub fn taylor_exp2<F: Float>(a: &[F], c: &mut [F], scratch: &mut [F]) {
    let ln2 = F::from(2.0).unwrap().ln();
    taylor_scale(a, ln2, scratch);
    taylor_exp(scratch, c);
    c[0] = a[0].exp2();
}

/// `c = exp(a) - 1`.
#[inline]
pub fn taylor_exp_m1<F: Float>(a: &[F], c: &mut [F]) {
    taylor_exp(a, c);
    c[0] = a[0].exp_m1();
}

/// `c = log2(a) = ln(a) / ln 2`.
#[inline]
pub fn taylor_log2<F: Float>(a: &[F], c: &mut [F]) {
    taylor_ln(a, c);
    let inv_ln2 = F::one() / F::from(2.0).unwrap().ln();
    c[0] = a[0].log2();
    for ck in c[1..].iter_mut() {
        *ck = *ck * inv_ln2;
    }
}

/// `c = log10(a) = ln(a) / ln 10`.
#[inline]
pub fn taylor_log10<F: Float>(a: &[F], c: &mut [F]) {
    taylor_ln(a, c);
    let inv_ln10 = F::one() / F::from(10.0).unwrap().ln();
    c[0] = a[0].log10();
    for ck in c[1..].iter_mut() {
        *ck = *ck * inv_ln10;
    }
}

/// `c = ln(1 + a)`.
#[inline]
pub fn taylor_ln_1p<F: Float>(a: &[F], c: &mut [F], scratch: &mut [F]) {
    let n = c.len();
    scratch[1..n].copy_from_slice(&a[1..n]);
    scratch[0] = F::one() + a[0];
    taylor_ln(scratch, c);
    c[0] = a[0].ln_1p();
}

/// `c = hypot(a, b) = sqrt(a² + b²)`.
#[inline]
pub fn taylor_hypot<F: Float>(a: &[F], b: &[F], c: &mut [F], s1: &mut [F], s2: &mut [F]) {
    let n = c.len();
    taylor_mul(a, a, s1);
    taylor_mul(b, b, s2);
    for k in 0..n {
        s1[k] = s1[k] + s2[k];
    }
    taylor_sqrt(s1, c);
    c[0] = a[0].hypot(b[0]);
}

/// `c = atan2(a, b)` = `atan(a/b)` with the quadrant fixed at order zero.
#[inline]
pub fn taylor_atan2<F: Float>(
    a: &[F],
    b: &[F],
    c: &mut [F],
    s1: &mut [F],
    s2: &mut [F],
    s3: &mut [F],
) {
    taylor_div(a, b, s1);
    taylor_atan(s1, c, s2, s3);
    c[0] = a[0].atan2(b[0]);
}

/// Piecewise-constant function: `c[0] = val`, `c[k>=1] = 0`.
#[inline]
pub fn taylor_discontinuous<F: Float>(val: F, c: &mut [F]) {
    c[0] = val;
    for ck in c[1..].iter_mut() {
        *ck = F::zero();
    }
}

// ══════════════════════════════════════════════
//  Per-opcode dispatch
// ══════════════════════════════════════════════

/// Propagate one tape node's Taylor coefficients.
///
/// `a` and `b` are the argument coefficient rows (`b` absent for unary
/// ops), `aux` is the raw `arg_indices[1]` slot (the exponent for `Powi`),
/// and `s1`–`s3` are caller-provided scratch rows of the same length as
/// `c`. `Input`, `Const`, and `Atomic` nodes are handled by the sweep.
pub(crate) fn taylor_step<F: Float>(
    op: OpCode,
    a: &[F],
    b: Option<&[F]>,
    aux: u32,
    c: &mut [F],
    s1: &mut [F],
    s2: &mut [F],
    s3: &mut [F],
) {
    match op {
        OpCode::Add => taylor_add(a, b.unwrap(), c),
        OpCode::Sub => taylor_sub(a, b.unwrap(), c),
        OpCode::Mul => taylor_mul(a, b.unwrap(), c),
        OpCode::Div => taylor_div(a, b.unwrap(), c),
        OpCode::Rem => {
            // d/da (a % b) = 1 away from the discontinuities.
            let b = b.unwrap();
            c[0] = a[0] % b[0];
            c[1..].copy_from_slice(&a[1..]);
        }
        OpCode::Powf => taylor_powf(a, b.unwrap(), c, s1, s2),
        OpCode::Atan2 => taylor_atan2(a, b.unwrap(), c, s1, s2, s3),
        OpCode::Hypot => taylor_hypot(a, b.unwrap(), c, s1, s2),
        OpCode::Max => {
            // Branch fixed by the order-zero values, as at recording time.
            let b = b.unwrap();
            c.copy_from_slice(if a[0] >= b[0] { a } else { b });
        }
        OpCode::Min => {
            let b = b.unwrap();
            c.copy_from_slice(if a[0] <= b[0] { a } else { b });
        }

        OpCode::Neg => taylor_neg(a, c),
        OpCode::Recip => taylor_recip(a, c),
        OpCode::Sqrt => taylor_sqrt(a, c),
        OpCode::Cbrt => taylor_cbrt(a, c, s1, s2),
        OpCode::Powi => taylor_powi(a, opcode::powi_exp_decode(aux), c, s1, s2),

        OpCode::Exp => taylor_exp(a, c),
        OpCode::Exp2 => taylor_exp2(a, c, s1),
        OpCode::ExpM1 => taylor_exp_m1(a, c),
        OpCode::Ln => taylor_ln(a, c),
        OpCode::Log2 => taylor_log2(a, c),
        OpCode::Log10 => taylor_log10(a, c),
        OpCode::Ln1p => taylor_ln_1p(a, c, s1),

        OpCode::Sin => taylor_sin_cos(a, c, s1),
        OpCode::Cos => {
            taylor_sin_cos(a, s1, c);
        }
        OpCode::Tan => taylor_tan(a, c, s1),
        OpCode::Asin => taylor_asin(a, c, s1, s2),
        OpCode::Acos => taylor_acos(a, c, s1, s2),
        OpCode::Atan => taylor_atan(a, c, s1, s2),

        OpCode::Sinh => taylor_sinh_cosh(a, c, s1),
        OpCode::Cosh => {
            taylor_sinh_cosh(a, s1, c);
        }
        OpCode::Tanh => taylor_tanh(a, c, s1),
        OpCode::Asinh => taylor_asinh(a, c, s1, s2),
        OpCode::Acosh => taylor_acosh(a, c, s1, s2),
        OpCode::Atanh => taylor_atanh(a, c, s1, s2),

        OpCode::Abs => {
            let sign = a[0].signum();
            for k in 0..c.len() {
                c[k] = a[k] * sign;
            }
        }
        OpCode::Signum => taylor_discontinuous(a[0].signum(), c),
        OpCode::Floor => taylor_discontinuous(a[0].floor(), c),
        OpCode::Ceil => taylor_discontinuous(a[0].ceil(), c),
        OpCode::Round => taylor_discontinuous(a[0].round(), c),
        OpCode::Trunc => taylor_discontinuous(a[0].trunc(), c),
        OpCode::Fract => {
            c[0] = a[0].fract();
            c[1..].copy_from_slice(&a[1..]);
        }

        OpCode::Input | OpCode::Const | OpCode::Atomic => {
            unreachable!("structural nodes are handled by the sweep")
        }
    }
}
