//! `num_traits` implementations for [`Var<V>`].
//!
//! Each transcendental records its opcode to the active tape, so a function
//! written against `num_traits::Float` can be taped unchanged.

use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::float::Value;
use crate::opcode::OpCode;
use crate::tape::{with_active_tape, ActiveTape, Tape, CONSTANT};
use crate::var::{var_binary, var_unary, Var};

impl<V: Value + ActiveTape> Zero for Var<V> {
    #[inline]
    fn zero() -> Self {
        Var::constant(V::zero())
    }
    #[inline]
    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl<V: Value + ActiveTape> One for Var<V> {
    #[inline]
    fn one() -> Self {
        Var::constant(V::one())
    }
}

impl<V: Value + ActiveTape> Num for Var<V> {
    type FromStrRadixErr = V::FromStrRadixErr;
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        V::from_str_radix(str, radix).map(Var::constant)
    }
}

impl<V: Value + ActiveTape> FromPrimitive for Var<V> {
    #[inline]
    fn from_i64(n: i64) -> Option<Self> {
        V::from_i64(n).map(Var::constant)
    }
    #[inline]
    fn from_u64(n: u64) -> Option<Self> {
        V::from_u64(n).map(Var::constant)
    }
    #[inline]
    fn from_f32(n: f32) -> Option<Self> {
        V::from_f32(n).map(Var::constant)
    }
    #[inline]
    fn from_f64(n: f64) -> Option<Self> {
        V::from_f64(n).map(Var::constant)
    }
}

impl<V: Value + ActiveTape> ToPrimitive for Var<V> {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }
    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }
    #[inline]
    fn to_f32(&self) -> Option<f32> {
        self.value.to_f32()
    }
    #[inline]
    fn to_f64(&self) -> Option<f64> {
        self.value.to_f64()
    }
}

impl<V: Value + ActiveTape> NumCast for Var<V> {
    #[inline]
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        V::from(n).map(Var::constant)
    }
}

impl<V: Value + ActiveTape> Signed for Var<V> {
    #[inline]
    fn abs(&self) -> Self {
        var_unary(*self, OpCode::Abs, self.value.abs())
    }
    #[inline]
    fn abs_sub(&self, other: &Self) -> Self {
        if self.value > other.value {
            *self - *other
        } else {
            Self::zero()
        }
    }
    #[inline]
    fn signum(&self) -> Self {
        var_unary(*self, OpCode::Signum, self.value.signum())
    }
    #[inline]
    fn is_positive(&self) -> bool {
        self.value.is_sign_positive()
    }
    #[inline]
    fn is_negative(&self) -> bool {
        self.value.is_sign_negative()
    }
}

#[rustfmt::skip]
impl<V: Value + ActiveTape> FloatConst for Var<V> {
    fn E() -> Self { Var::constant(V::E()) }
    fn FRAC_1_PI() -> Self { Var::constant(V::FRAC_1_PI()) }
    fn FRAC_1_SQRT_2() -> Self { Var::constant(V::FRAC_1_SQRT_2()) }
    fn FRAC_2_PI() -> Self { Var::constant(V::FRAC_2_PI()) }
    fn FRAC_2_SQRT_PI() -> Self { Var::constant(V::FRAC_2_SQRT_PI()) }
    fn FRAC_PI_2() -> Self { Var::constant(V::FRAC_PI_2()) }
    fn FRAC_PI_3() -> Self { Var::constant(V::FRAC_PI_3()) }
    fn FRAC_PI_4() -> Self { Var::constant(V::FRAC_PI_4()) }
    fn FRAC_PI_6() -> Self { Var::constant(V::FRAC_PI_6()) }
    fn FRAC_PI_8() -> Self { Var::constant(V::FRAC_PI_8()) }
    fn LN_10() -> Self { Var::constant(V::LN_10()) }
    fn LN_2() -> Self { Var::constant(V::LN_2()) }
    fn LOG10_E() -> Self { Var::constant(V::LOG10_E()) }
    fn LOG2_E() -> Self { Var::constant(V::LOG2_E()) }
    fn PI() -> Self { Var::constant(V::PI()) }
    fn SQRT_2() -> Self { Var::constant(V::SQRT_2()) }
    fn TAU() -> Self { Var::constant(V::TAU()) }
    fn LOG10_2() -> Self { Var::constant(V::LOG10_2()) }
    fn LOG2_10() -> Self { Var::constant(V::LOG2_10()) }
}

impl<V: Value + ActiveTape> NumFloat for Var<V> {
    fn nan() -> Self {
        Var::constant(V::nan())
    }
    fn infinity() -> Self {
        Var::constant(V::infinity())
    }
    fn neg_infinity() -> Self {
        Var::constant(V::neg_infinity())
    }
    fn neg_zero() -> Self {
        Var::constant(V::neg_zero())
    }

    fn min_value() -> Self {
        Var::constant(V::min_value())
    }
    fn min_positive_value() -> Self {
        Var::constant(V::min_positive_value())
    }
    fn max_value() -> Self {
        Var::constant(V::max_value())
    }
    fn epsilon() -> Self {
        Var::constant(V::epsilon())
    }

    fn is_nan(self) -> bool {
        self.value.is_nan()
    }
    fn is_infinite(self) -> bool {
        self.value.is_infinite()
    }
    fn is_finite(self) -> bool {
        self.value.is_finite()
    }
    fn is_normal(self) -> bool {
        self.value.is_normal()
    }
    fn is_sign_positive(self) -> bool {
        self.value.is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.value.is_sign_negative()
    }
    fn classify(self) -> FpCategory {
        self.value.classify()
    }

    fn floor(self) -> Self {
        var_unary(self, OpCode::Floor, self.value.floor())
    }
    fn ceil(self) -> Self {
        var_unary(self, OpCode::Ceil, self.value.ceil())
    }
    fn round(self) -> Self {
        var_unary(self, OpCode::Round, self.value.round())
    }
    fn trunc(self) -> Self {
        var_unary(self, OpCode::Trunc, self.value.trunc())
    }
    fn fract(self) -> Self {
        var_unary(self, OpCode::Fract, self.value.fract())
    }
    fn abs(self) -> Self {
        var_unary(self, OpCode::Abs, self.value.abs())
    }
    fn signum(self) -> Self {
        var_unary(self, OpCode::Signum, self.value.signum())
    }

    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }

    fn recip(self) -> Self {
        var_unary(self, OpCode::Recip, self.value.recip())
    }

    fn powi(self, n: i32) -> Self {
        let value = self.value.powi(n);
        if self.index == CONSTANT {
            return Var::constant(value);
        }
        let index = with_active_tape(|t: &mut Tape<V>| t.push_powi(self.index, n, value));
        Var::from_tape(value, index)
    }

    fn powf(self, n: Self) -> Self {
        var_binary(self, n, OpCode::Powf, self.value.powf(n.value))
    }
    fn sqrt(self) -> Self {
        var_unary(self, OpCode::Sqrt, self.value.sqrt())
    }
    fn cbrt(self) -> Self {
        var_unary(self, OpCode::Cbrt, self.value.cbrt())
    }

    fn exp(self) -> Self {
        var_unary(self, OpCode::Exp, self.value.exp())
    }
    fn exp2(self) -> Self {
        var_unary(self, OpCode::Exp2, self.value.exp2())
    }
    fn exp_m1(self) -> Self {
        var_unary(self, OpCode::ExpM1, self.value.exp_m1())
    }
    fn ln(self) -> Self {
        var_unary(self, OpCode::Ln, self.value.ln())
    }
    fn log2(self) -> Self {
        var_unary(self, OpCode::Log2, self.value.log2())
    }
    fn log10(self) -> Self {
        var_unary(self, OpCode::Log10, self.value.log10())
    }
    fn ln_1p(self) -> Self {
        var_unary(self, OpCode::Ln1p, self.value.ln_1p())
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    fn sin(self) -> Self {
        var_unary(self, OpCode::Sin, self.value.sin())
    }
    fn cos(self) -> Self {
        var_unary(self, OpCode::Cos, self.value.cos())
    }
    fn tan(self) -> Self {
        var_unary(self, OpCode::Tan, self.value.tan())
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }
    fn asin(self) -> Self {
        var_unary(self, OpCode::Asin, self.value.asin())
    }
    fn acos(self) -> Self {
        var_unary(self, OpCode::Acos, self.value.acos())
    }
    fn atan(self) -> Self {
        var_unary(self, OpCode::Atan, self.value.atan())
    }
    fn atan2(self, other: Self) -> Self {
        var_binary(self, other, OpCode::Atan2, self.value.atan2(other.value))
    }

    fn sinh(self) -> Self {
        var_unary(self, OpCode::Sinh, self.value.sinh())
    }
    fn cosh(self) -> Self {
        var_unary(self, OpCode::Cosh, self.value.cosh())
    }
    fn tanh(self) -> Self {
        var_unary(self, OpCode::Tanh, self.value.tanh())
    }
    fn asinh(self) -> Self {
        var_unary(self, OpCode::Asinh, self.value.asinh())
    }
    fn acosh(self) -> Self {
        var_unary(self, OpCode::Acosh, self.value.acosh())
    }
    fn atanh(self) -> Self {
        var_unary(self, OpCode::Atanh, self.value.atanh())
    }

    fn hypot(self, other: Self) -> Self {
        var_binary(self, other, OpCode::Hypot, self.value.hypot(other.value))
    }

    fn max(self, other: Self) -> Self {
        let value = if self.value >= other.value {
            self.value
        } else {
            other.value
        };
        var_binary(self, other, OpCode::Max, value)
    }
    fn min(self, other: Self) -> Self {
        let value = if self.value <= other.value {
            self.value
        } else {
            other.value
        };
        var_binary(self, other, OpCode::Min, value)
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.value > other.value {
            self - other
        } else {
            Self::zero()
        }
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.value.integer_decode()
    }

    fn to_degrees(self) -> Self {
        let factor = V::from(180.0).unwrap() / V::PI();
        let value = self.value.to_degrees();
        if self.index == CONSTANT {
            return Var::constant(value);
        }
        let index = with_active_tape(|t: &mut Tape<V>| {
            let c = t.push_const(factor);
            t.push_op(OpCode::Mul, self.index, c, value)
        });
        Var::from_tape(value, index)
    }

    fn to_radians(self) -> Self {
        let factor = V::PI() / V::from(180.0).unwrap();
        let value = self.value.to_radians();
        if self.index == CONSTANT {
            return Var::constant(value);
        }
        let index = with_active_tape(|t: &mut Tape<V>| {
            let c = t.push_const(factor);
            t.push_op(OpCode::Mul, self.index, c, value)
        });
        Var::from_tape(value, index)
    }
}
