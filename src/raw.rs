use core::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crate::guard::{ExclusiveGuard, SharedGuard};
use crate::spin::{self, Timings};
use crate::state::StateWidth;

/// Slim, unfair, reader-writer spin lock.
///
/// The entire lock is a single signed counter of width `S` (`i16`, `i32` or
/// `i64`, chosen at compile time): `0` is unowned, `-1` is owned exclusively
/// and `k >= 1` counts shared holders. The type is `repr(transparent)` over
/// the matching atomic cell, so it can be embedded in arbitrary data
/// structures or placed in process-shared memory and coordinates across
/// processes without kernel transitions on the fast path.
///
/// Intended for many independent locks each protecting critical sections of
/// a handful of instructions, not for one heavily contended lock:
///
/// - locking is **unfair**; writers can be starved by a steady stream of
///   readers and the order of success among contending acquirers is
///   unspecified,
/// - the lock is **not reentrant**; a thread re-acquiring exclusively
///   deadlocks itself (nesting *shared* acquisitions is fine as long as each
///   one is released),
/// - blocked waiters burn CPU: busy spins first, then scheduler yields, then
///   short sleeps, which amplifies tail latency under sustained contention.
///
/// Misuse (releasing without holding, upgrading without holding exactly one
/// shared reference, destroying a held lock) is a contract violation and is
/// not detected; it may deadlock other threads or corrupt the counter.
#[repr(transparent)]
pub struct RawRwSpinLock<S: StateWidth = i16> {
    state: S::Atomic,
}

impl<S: StateWidth> RawRwSpinLock<S> {
    /// Creates a lock in the unowned state.
    #[inline]
    pub const fn new() -> Self {
        Self { state: S::UNLOCKED }
    }

    /// Attempts to acquire the exclusive lock, without spinning.
    #[inline]
    pub fn try_acquire_exclusive(&self) -> bool {
        // Snapshot first so a visibly taken lock costs no bus locking; the
        // CAS that follows is the authoritative test.
        S::load(&self.state) == S::UNOWNED
            && S::compare_exchange(&self.state, S::UNOWNED, S::EXCLUSIVE).is_ok()
    }

    /// Attempts to acquire one shared reference, without spinning.
    ///
    /// Fails while the lock is owned exclusively. A concurrent reader racing
    /// the increment also counts as failure; retrying is the caller's call
    /// (the spinning wrappers do).
    #[inline]
    pub fn try_acquire_shared(&self) -> bool {
        let s = S::load(&self.state);
        if s == S::EXCLUSIVE {
            return false;
        }
        match s.checked_increment() {
            Some(incremented) => S::compare_exchange(&self.state, s, incremented).is_ok(),
            None => false,
        }
    }

    /// Attempts to convert a shared hold into the exclusive lock, without
    /// spinning.
    ///
    /// Succeeds only when the caller's reference is the single shared one.
    /// Call only while holding exactly one shared acquisition.
    #[inline]
    pub fn try_upgrade(&self) -> bool {
        S::load(&self.state) == S::ONE
            && S::compare_exchange(&self.state, S::ONE, S::EXCLUSIVE).is_ok()
    }

    /// Acquires the exclusive lock, spinning for as long as it takes.
    ///
    /// `rounds` receives the number of backoff rounds the call waited. If
    /// the current holder never releases, this blocks forever; recover with
    /// [`force_unlock`](Self::force_unlock).
    #[inline]
    pub fn acquire_exclusive(&self, rounds: Option<&mut u32>) {
        if self.try_acquire_exclusive() {
            if let Some(out) = rounds {
                *out = 0;
            }
            return;
        }
        self.acquire_exclusive_slow(rounds);
    }

    /// Acquires the exclusive lock, giving up once `timeout` has elapsed.
    ///
    /// Returns whether the lock was acquired; `rounds` is written either
    /// way. A zero `timeout` fails as soon as the opportunistic spin phase
    /// is exhausted, without ever sleeping.
    #[inline]
    #[must_use]
    pub fn acquire_exclusive_for(&self, timeout: Duration, rounds: Option<&mut u32>) -> bool {
        if self.try_acquire_exclusive() {
            if let Some(out) = rounds {
                *out = 0;
            }
            return true;
        }
        self.acquire_exclusive_for_slow(timeout, rounds)
    }

    /// Acquires one shared reference, spinning for as long as it takes.
    ///
    /// `rounds` receives the number of backoff rounds the call waited.
    #[inline]
    pub fn acquire_shared(&self, rounds: Option<&mut u32>) {
        if self.try_acquire_shared() {
            if let Some(out) = rounds {
                *out = 0;
            }
            return;
        }
        self.acquire_shared_slow(rounds);
    }

    /// Acquires one shared reference, giving up once `timeout` has elapsed.
    ///
    /// Returns whether the reference was acquired; `rounds` is written
    /// either way. A zero `timeout` fails as soon as the opportunistic spin
    /// phase is exhausted.
    #[inline]
    #[must_use]
    pub fn acquire_shared_for(&self, timeout: Duration, rounds: Option<&mut u32>) -> bool {
        if self.try_acquire_shared() {
            if let Some(out) = rounds {
                *out = 0;
            }
            return true;
        }
        self.acquire_shared_for_slow(timeout, rounds)
    }

    /// Converts a shared hold into the exclusive lock, giving up once
    /// `timeout` has elapsed.
    ///
    /// Call only while holding exactly one shared acquisition. There is
    /// deliberately no indefinite variant: two candidate upgraders would
    /// each keep the reader count above one and spin against each other
    /// forever, so the wait must be bounded.
    #[inline]
    #[must_use]
    pub fn upgrade(&self, timeout: Duration, rounds: Option<&mut u32>) -> bool {
        if self.try_upgrade() {
            if let Some(out) = rounds {
                *out = 0;
            }
            return true;
        }
        self.upgrade_slow(timeout, rounds)
    }

    /// Releases the exclusive lock.
    ///
    /// Must be paired with a successful exclusive acquisition.
    #[inline]
    pub fn release_exclusive(&self) {
        S::exchange(&self.state, S::UNOWNED);
    }

    /// Releases one shared reference.
    ///
    /// Must be paired with a successful shared acquisition.
    #[inline]
    pub fn release_shared(&self) {
        S::decrement(&self.state);
    }

    /// Converts the exclusive lock into a single shared reference, letting
    /// other readers in while the caller keeps reading.
    ///
    /// Call only while holding the exclusive lock; release the result with
    /// [`release_shared`](Self::release_shared).
    #[inline]
    pub fn downgrade_to_shared(&self) {
        S::exchange(&self.state, S::ONE);
    }

    /// Forcibly returns the lock to the unowned state.
    ///
    /// Recovery only: use when the thread or process holding the lock
    /// crashed and no other holder is active.
    #[inline]
    pub fn force_unlock(&self) {
        self.release_exclusive();
    }

    /// Whether the lock is currently held, in either mode.
    ///
    /// Advisory only; the state may have changed by the time the call
    /// returns.
    #[inline]
    pub fn is_locked(&self) -> bool {
        S::load(&self.state) != S::UNOWNED
    }

    /// Whether the lock is currently held exclusively.
    ///
    /// Advisory only; the state may have changed by the time the call
    /// returns.
    #[inline]
    pub fn is_locked_exclusively(&self) -> bool {
        S::load(&self.state) == S::EXCLUSIVE
    }

    /// Acquires the exclusive lock and returns a guard releasing it when
    /// dropped.
    #[inline]
    pub fn exclusively(&self) -> ExclusiveGuard<'_, S> {
        let mut rounds = 0;
        self.acquire_exclusive(Some(&mut rounds));
        ExclusiveGuard::new(self, rounds)
    }

    /// Acquires the exclusive lock with a timeout and returns a guard
    /// releasing it when dropped.
    ///
    /// Bind the guard to a name for the whole guarded body:
    ///
    /// ```
    /// # use std::time::Duration;
    /// # let lock = rwspin::RawRwSpinLock::<i16>::new();
    /// let acquired = lock.exclusively_for(Duration::from_millis(5));
    /// if let Some(guard) = acquired {
    ///     // the lock is held until `guard` goes out of scope
    /// }
    /// ```
    #[inline]
    pub fn exclusively_for(&self, timeout: Duration) -> Option<ExclusiveGuard<'_, S>> {
        let mut rounds = 0;
        if self.acquire_exclusive_for(timeout, Some(&mut rounds)) {
            Some(ExclusiveGuard::new(self, rounds))
        } else {
            None
        }
    }

    /// Acquires a shared reference and returns a guard releasing it when
    /// dropped.
    #[inline]
    pub fn share(&self) -> SharedGuard<'_, S> {
        let mut rounds = 0;
        self.acquire_shared(Some(&mut rounds));
        SharedGuard::new(self, rounds)
    }

    /// Acquires a shared reference with a timeout and returns a guard
    /// releasing it when dropped.
    #[inline]
    pub fn share_for(&self, timeout: Duration) -> Option<SharedGuard<'_, S>> {
        let mut rounds = 0;
        if self.acquire_shared_for(timeout, Some(&mut rounds)) {
            Some(SharedGuard::new(self, rounds))
        } else {
            None
        }
    }

    #[cold]
    fn acquire_exclusive_slow(&self, rounds: Option<&mut u32>) {
        self.spin_acquire::<spin::Exclusive>(Self::try_acquire_exclusive, rounds);
    }

    #[cold]
    fn acquire_exclusive_for_slow(&self, timeout: Duration, rounds: Option<&mut u32>) -> bool {
        self.spin_acquire_for::<spin::Exclusive>(Self::try_acquire_exclusive, timeout, rounds)
    }

    #[cold]
    fn acquire_shared_slow(&self, rounds: Option<&mut u32>) {
        self.spin_acquire::<spin::Shared>(Self::try_acquire_shared, rounds);
    }

    #[cold]
    fn acquire_shared_for_slow(&self, timeout: Duration, rounds: Option<&mut u32>) -> bool {
        self.spin_acquire_for::<spin::Shared>(Self::try_acquire_shared, timeout, rounds)
    }

    #[cold]
    fn upgrade_slow(&self, timeout: Duration, rounds: Option<&mut u32>) -> bool {
        self.spin_acquire_for::<spin::Upgrade>(Self::try_upgrade, timeout, rounds)
    }

    /// Backoff-then-retry loop for the indefinite acquires. The caller has
    /// already failed the round-zero attempt.
    fn spin_acquire<T: Timings>(&self, try_once: impl Fn(&Self) -> bool, rounds: Option<&mut u32>) {
        let mut r: u32 = 0;
        loop {
            r = r.saturating_add(1);
            spin::wait::<T>(r);
            if try_once(self) {
                if let Some(out) = rounds {
                    *out = r;
                }
                return;
            }
        }
    }

    /// Two-phase timed loop: an opportunistic processor-yield phase, then a
    /// deadline-checked contested phase entered only for a non-zero timeout.
    ///
    /// The deadline starts counting after the opportunistic phase, so a
    /// timed acquire is never weaker than the same number of plain tries.
    fn spin_acquire_for<T: Timings>(
        &self,
        try_once: impl Fn(&Self) -> bool,
        timeout: Duration,
        rounds: Option<&mut u32>,
    ) -> bool {
        let mut r: u32 = 0;
        loop {
            r += 1;
            if r > T::YIELDS {
                break;
            }
            spin::wait::<T>(r);
            if try_once(self) {
                if let Some(out) = rounds {
                    *out = r;
                }
                return true;
            }
        }

        if timeout.is_zero() {
            if let Some(out) = rounds {
                *out = r;
            }
            return false;
        }

        // None means the deadline is beyond the clock's range; treat it as
        // unreachable and spin like the indefinite loop.
        let deadline = Instant::now().checked_add(timeout);
        thread::yield_now();
        loop {
            if try_once(self) {
                if let Some(out) = rounds {
                    *out = r;
                }
                return true;
            }
            if deadline.map_or(false, |t| Instant::now() >= t) {
                if let Some(out) = rounds {
                    *out = r;
                }
                return false;
            }
            r = r.saturating_add(1);
            spin::wait::<T>(r);
        }
    }
}

impl<S: StateWidth> Default for RawRwSpinLock<S> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateWidth> fmt::Debug for RawRwSpinLock<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwSpinLock")
            .field("locked", &self.is_locked())
            .field("exclusive", &self.is_locked_exclusively())
            .finish()
    }
}

unsafe impl<S: StateWidth> lock_api::RawRwLock for RawRwSpinLock<S> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline]
    fn lock_shared(&self) {
        self.acquire_shared(None);
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_acquire_shared()
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        self.release_shared();
    }

    #[inline]
    fn lock_exclusive(&self) {
        self.acquire_exclusive(None);
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.try_acquire_exclusive()
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        self.release_exclusive();
    }

    #[inline]
    fn is_locked(&self) -> bool {
        RawRwSpinLock::is_locked(self)
    }

    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        self.is_locked_exclusively()
    }
}

unsafe impl<S: StateWidth> lock_api::RawRwLockTimed for RawRwSpinLock<S> {
    type Duration = Duration;
    type Instant = Instant;

    #[inline]
    fn try_lock_shared_for(&self, timeout: Duration) -> bool {
        self.acquire_shared_for(timeout, None)
    }

    #[inline]
    fn try_lock_shared_until(&self, deadline: Instant) -> bool {
        self.acquire_shared_for(deadline.saturating_duration_since(Instant::now()), None)
    }

    #[inline]
    fn try_lock_exclusive_for(&self, timeout: Duration) -> bool {
        self.acquire_exclusive_for(timeout, None)
    }

    #[inline]
    fn try_lock_exclusive_until(&self, deadline: Instant) -> bool {
        self.acquire_exclusive_for(deadline.saturating_duration_since(Instant::now()), None)
    }
}

unsafe impl<S: StateWidth> lock_api::RawRwLockDowngrade for RawRwSpinLock<S> {
    #[inline]
    unsafe fn downgrade(&self) {
        self.downgrade_to_shared();
    }
}
