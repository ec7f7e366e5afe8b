use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

use crate::atomic::{ArgKind, AtomicFn};
use crate::dual::Dual;

/// Trait for types that can live in a tape's value slots.
///
/// Implemented for the base floats (`f32`, `f64`) and for [`Dual<F>`], which
/// is the value type of nested tapes (derivatives of derivatives). The
/// associated [`atomic_forward`](Value::atomic_forward) hook routes a tape's
/// atomic-call dispatch to the plain or the nested variant of [`AtomicFn`]
/// depending on the coefficient scalar.
pub trait Value:
    NumFloat
    + FloatConst
    + FromPrimitive
    + Copy
    + Send
    + Sync
    + Default
    + Debug
    + Display
    + 'static
{
    /// The underlying base float type (`Self` for `f32`/`f64`, `F` for `Dual<F>`).
    type Base: Float;

    /// Lift a base float into this value (constant at the nested level).
    fn from_base(val: Self::Base) -> Self;

    /// Extract the base (primal) component.
    fn base(self) -> Self::Base;

    /// Exact zero test, including any derivative components.
    ///
    /// `PartialEq` on `Dual` compares primal parts only, which is too weak
    /// for recording-time algebraic simplification.
    fn is_exact_zero(self) -> bool;

    /// Exact one test, including any derivative components.
    fn is_exact_one(self) -> bool;

    /// Dispatch an atomic call's Taylor propagation for this coefficient
    /// scalar: the plain variant for base floats, the nested variant for
    /// `Dual<F>`. Returns `false` when the atomic does not support the
    /// requested variant.
    fn atomic_forward(
        atomic: &dyn AtomicFn<Self::Base>,
        type_x: &[ArgKind],
        need_y: &[bool],
        order_low: usize,
        order_up: usize,
        taylor_x: &[Self],
        taylor_y: &mut Vec<Self>,
    ) -> bool;
}

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Only primitive float types implement this — AD wrapper types do not.
pub trait Float: Value<Base = Self> {}

macro_rules! impl_value_for_float {
    ($f:ty) => {
        impl Value for $f {
            type Base = $f;

            #[inline]
            fn from_base(val: $f) -> Self {
                val
            }

            #[inline]
            fn base(self) -> $f {
                self
            }

            #[inline]
            fn is_exact_zero(self) -> bool {
                self == 0.0
            }

            #[inline]
            fn is_exact_one(self) -> bool {
                self == 1.0
            }

            fn atomic_forward(
                atomic: &dyn AtomicFn<$f>,
                type_x: &[ArgKind],
                need_y: &[bool],
                order_low: usize,
                order_up: usize,
                taylor_x: &[Self],
                taylor_y: &mut Vec<Self>,
            ) -> bool {
                atomic.forward(type_x, need_y, order_low, order_up, taylor_x, taylor_y)
            }
        }
    };
}

impl_value_for_float!(f32);
impl_value_for_float!(f64);

impl<F: Float> Value for Dual<F> {
    type Base = F;

    #[inline]
    fn from_base(val: F) -> Self {
        Dual::constant(val)
    }

    #[inline]
    fn base(self) -> F {
        self.re
    }

    #[inline]
    fn is_exact_zero(self) -> bool {
        self.re.is_exact_zero() && self.eps.is_exact_zero()
    }

    #[inline]
    fn is_exact_one(self) -> bool {
        self.re.is_exact_one() && self.eps.is_exact_zero()
    }

    fn atomic_forward(
        atomic: &dyn AtomicFn<F>,
        type_x: &[ArgKind],
        need_y: &[bool],
        order_low: usize,
        order_up: usize,
        taylor_x: &[Self],
        taylor_y: &mut Vec<Self>,
    ) -> bool {
        atomic.forward_nested(type_x, need_y, order_low, order_up, taylor_x, taylor_y)
    }
}

impl Float for f32 {}
impl Float for f64 {}
