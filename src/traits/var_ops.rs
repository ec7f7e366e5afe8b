//! `std::ops` implementations for [`Var<V>`].
//!
//! Each operator records an opcode to the active tape.

use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::float::Value;
use crate::opcode::OpCode;
use crate::tape::ActiveTape;
use crate::var::{var_binary, var_unary, Var};

impl<V: Value + ActiveTape> Add for Var<V> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        var_binary(self, rhs, OpCode::Add, self.value + rhs.value)
    }
}

impl<V: Value + ActiveTape> Sub for Var<V> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        var_binary(self, rhs, OpCode::Sub, self.value - rhs.value)
    }
}

impl<V: Value + ActiveTape> Mul for Var<V> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        var_binary(self, rhs, OpCode::Mul, self.value * rhs.value)
    }
}

impl<V: Value + ActiveTape> Div for Var<V> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        var_binary(self, rhs, OpCode::Div, self.value / rhs.value)
    }
}

impl<V: Value + ActiveTape> Rem for Var<V> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        var_binary(self, rhs, OpCode::Rem, self.value % rhs.value)
    }
}

impl<V: Value + ActiveTape> Neg for Var<V> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        var_unary(self, OpCode::Neg, -self.value)
    }
}

impl<V: Value + ActiveTape> AddAssign for Var<V> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<V: Value + ActiveTape> SubAssign for Var<V> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<V: Value + ActiveTape> MulAssign for Var<V> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<V: Value + ActiveTape> DivAssign for Var<V> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<V: Value + ActiveTape> RemAssign for Var<V> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// ── Mixed ops: Var<V> with its value type ──

impl<V: Value + ActiveTape> Add<V> for Var<V> {
    type Output = Var<V>;
    #[inline]
    fn add(self, rhs: V) -> Var<V> {
        var_binary(self, Var::constant(rhs), OpCode::Add, self.value + rhs)
    }
}

impl<V: Value + ActiveTape> Sub<V> for Var<V> {
    type Output = Var<V>;
    #[inline]
    fn sub(self, rhs: V) -> Var<V> {
        var_binary(self, Var::constant(rhs), OpCode::Sub, self.value - rhs)
    }
}

impl<V: Value + ActiveTape> Mul<V> for Var<V> {
    type Output = Var<V>;
    #[inline]
    fn mul(self, rhs: V) -> Var<V> {
        var_binary(self, Var::constant(rhs), OpCode::Mul, self.value * rhs)
    }
}

impl<V: Value + ActiveTape> Div<V> for Var<V> {
    type Output = Var<V>;
    #[inline]
    fn div(self, rhs: V) -> Var<V> {
        var_binary(self, Var::constant(rhs), OpCode::Div, self.value / rhs)
    }
}

impl<V: Value + ActiveTape> Rem<V> for Var<V> {
    type Output = Var<V>;
    #[inline]
    fn rem(self, rhs: V) -> Var<V> {
        var_binary(self, Var::constant(rhs), OpCode::Rem, self.value % rhs)
    }
}

// The scalar-on-the-left direction only exists for the concrete base
// floats (a blanket impl over V would fall outside the coherence rules).
macro_rules! impl_var_scalar_lhs_ops {
    ($f:ty) => {
        impl Add<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn add(self, rhs: Var<$f>) -> Var<$f> {
                var_binary(Var::constant(self), rhs, OpCode::Add, self + rhs.value)
            }
        }

        impl Sub<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn sub(self, rhs: Var<$f>) -> Var<$f> {
                var_binary(Var::constant(self), rhs, OpCode::Sub, self - rhs.value)
            }
        }

        impl Mul<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn mul(self, rhs: Var<$f>) -> Var<$f> {
                var_binary(Var::constant(self), rhs, OpCode::Mul, self * rhs.value)
            }
        }

        impl Div<Var<$f>> for $f {
            type Output = Var<$f>;
            #[inline]
            fn div(self, rhs: Var<$f>) -> Var<$f> {
                var_binary(Var::constant(self), rhs, OpCode::Div, self / rhs.value)
            }
        }
    };
}

impl_var_scalar_lhs_ops!(f32);
impl_var_scalar_lhs_ops!(f64);
