//! The interlocked counter cell backing a lock.

use core::sync::atomic::{AtomicI16, AtomicI32, AtomicI64, Ordering};

mod sealed {
    pub trait Sealed {}
}
use sealed::Sealed;

/// Signed integer widths usable as the state cell of a [`RawRwSpinLock`].
///
/// The whole persistent state of one lock is a single value of this type:
/// `0` means unowned, `-1` exclusively owned, `k >= 1` shared by `k` holders.
/// Supported widths are `i16`, `i32` and `i64`; the width is selected at
/// compile time and costs no per-call indirection.
///
/// On the supported targets all three widths map to natively coherent
/// interlocked instructions, so a lock of any width may be placed in
/// process-shared memory as long as the cell is naturally aligned for its
/// width ([`RawRwSpinLock`] is `repr(transparent)` over the cell, so its own
/// alignment is exactly that).
///
/// All read-modify-write primitives use `AcqRel` ordering. The reference
/// model is a total-order interlocked operation; `AcqRel` preserves the part
/// the lock relies on, namely release semantics on every unlock and acquire
/// semantics on every successful lock. Snapshot loads are `Relaxed`.
///
/// # Safety
///
/// `Atomic` must be the atomic cell matching `Self` exactly in size and
/// alignment, and the associated operations must be the straight atomic
/// operations on that cell, or the lock state transitions built on top of
/// them lose their exclusivity guarantees.
///
/// [`RawRwSpinLock`]: crate::RawRwSpinLock
pub unsafe trait StateWidth: Sealed + Copy + Eq {
    /// The atomic cell holding the state.
    type Atomic;

    /// A cell in the unowned state, for constant initialization.
    const UNLOCKED: Self::Atomic;

    /// The unowned state (`0`).
    const UNOWNED: Self;
    /// The exclusively-owned state (`-1`).
    const EXCLUSIVE: Self;
    /// A single shared holder (`1`).
    const ONE: Self;

    /// Relaxed snapshot of the cell.
    fn load(cell: &Self::Atomic) -> Self;

    /// Stores `new` iff the cell still holds `current`.
    fn compare_exchange(cell: &Self::Atomic, current: Self, new: Self) -> Result<Self, Self>;

    /// Unconditionally stores `value`, returning the previous state.
    fn exchange(cell: &Self::Atomic, value: Self) -> Self;

    /// Subtracts one from the cell, returning the previous state.
    fn decrement(cell: &Self::Atomic) -> Self;

    /// One more shared holder, or `None` when the count would leave the
    /// positive range of the width.
    fn checked_increment(self) -> Option<Self>;
}

macro_rules! impl_state_width {
    ($($int:ty => $atomic:ty),* $(,)?) => {$(
        impl Sealed for $int {}

        unsafe impl StateWidth for $int {
            type Atomic = $atomic;

            #[allow(clippy::declare_interior_mutable_const)]
            const UNLOCKED: $atomic = <$atomic>::new(0);

            const UNOWNED: $int = 0;
            const EXCLUSIVE: $int = -1;
            const ONE: $int = 1;

            #[inline(always)]
            fn load(cell: &$atomic) -> $int {
                cell.load(Ordering::Relaxed)
            }

            #[inline(always)]
            fn compare_exchange(cell: &$atomic, current: $int, new: $int) -> Result<$int, $int> {
                cell.compare_exchange(current, new, Ordering::AcqRel, Ordering::Relaxed)
            }

            #[inline(always)]
            fn exchange(cell: &$atomic, value: $int) -> $int {
                cell.swap(value, Ordering::AcqRel)
            }

            #[inline(always)]
            fn decrement(cell: &$atomic) -> $int {
                cell.fetch_sub(1, Ordering::AcqRel)
            }

            #[inline(always)]
            fn checked_increment(self) -> Option<$int> {
                self.checked_add(1)
            }
        }
    )*};
}

impl_state_width! {
    i16 => AtomicI16,
    i32 => AtomicI32,
    i64 => AtomicI64,
}
