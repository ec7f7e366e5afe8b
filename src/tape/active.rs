//! Thread-local active-tape plumbing for recording.

use std::cell::Cell;

use crate::dual::Dual;
use crate::float::Value;

use super::Tape;

thread_local! {
    static TAPE_F32: Cell<*mut Tape<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_F64: Cell<*mut Tape<f64>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_DUAL_F32: Cell<*mut Tape<Dual<f32>>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_DUAL_F64: Cell<*mut Tape<Dual<f64>>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Trait selecting the thread-local active tape for a given value type.
///
/// Implemented for `f32`, `f64`, `Dual<f32>`, and `Dual<f64>`; the last two
/// enable recording nested computations with `Var<Dual<_>>`.
pub trait ActiveTape: Value {
    #[doc(hidden)]
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>>;
}

impl ActiveTape for f32 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F32
    }
}

impl ActiveTape for f64 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F64
    }
}

impl ActiveTape for Dual<f32> {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_DUAL_F32
    }
}

impl ActiveTape for Dual<f64> {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_DUAL_F64
    }
}

/// Access the active tape for the current thread.
/// Panics if no recording session is in scope.
#[inline]
pub(crate) fn with_active_tape<V: ActiveTape, R>(f: impl FnOnce(&mut Tape<V>) -> R) -> R {
    V::cell().with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "no active tape; start a recording session first"
        );
        // SAFETY: the Recording session guarantees the pointer stays valid
        // for the duration of the recording scope, and the cell is
        // thread-local so no other thread can observe it.
        let tape = unsafe { &mut *ptr };
        f(tape)
    })
}

/// Access the active tape if a recording session is in scope.
#[inline]
pub(crate) fn try_with_active_tape<V: ActiveTape, R>(
    f: impl FnOnce(&mut Tape<V>) -> R,
) -> Option<R> {
    V::cell().with(|cell| {
        let ptr = cell.get();
        if ptr.is_null() {
            return None;
        }
        // SAFETY: as in `with_active_tape`.
        let tape = unsafe { &mut *ptr };
        Some(f(tape))
    })
}
