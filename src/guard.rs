use core::fmt;
use core::mem;
use std::time::Duration;

use crate::raw::RawRwSpinLock;
use crate::state::StateWidth;

/// RAII handle to an exclusively held [`RawRwSpinLock`].
///
/// Releases the lock when dropped; drop it early to release early. The
/// guard is move-only, so responsibility for the release transfers with it.
///
/// Timed acquisition returns `Option<ExclusiveGuard>`, which forces the
/// guard to be bound to a name before the guarded body runs:
///
/// ```
/// # use std::time::Duration;
/// # let lock = rwspin::RawRwSpinLock::<i16>::new();
/// let acquired = lock.exclusively_for(Duration::from_millis(5));
/// if let Some(guard) = acquired {
///     // exclusive until `guard` leaves scope
/// }
/// ```
#[must_use = "if unused the lock is immediately released"]
pub struct ExclusiveGuard<'a, S: StateWidth = i16> {
    lock: &'a RawRwSpinLock<S>,
    rounds: u32,
}

impl<'a, S: StateWidth> ExclusiveGuard<'a, S> {
    #[inline]
    pub(crate) fn new(lock: &'a RawRwSpinLock<S>, rounds: u32) -> Self {
        Self { lock, rounds }
    }

    /// Number of backoff rounds the acquisition that produced this guard
    /// spent waiting.
    #[inline]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Temporarily releases the lock while `f` runs, re-acquiring
    /// exclusively before returning.
    ///
    /// The lock is re-acquired even if `f` panics. Afterwards
    /// [`rounds`](Self::rounds) reports the rounds of the re-acquisition.
    #[inline]
    pub fn unlocked<F, U>(&mut self, f: F) -> U
    where
        F: FnOnce() -> U,
    {
        self.lock.release_exclusive();
        let mut rounds = 0;
        let result = {
            let _relock = RelockExclusive { lock: self.lock, rounds: &mut rounds };
            f()
        };
        self.rounds = rounds;
        result
    }

    /// Converts this guard into a single shared reference without passing
    /// through the unowned state, so no writer can sneak in between.
    #[inline]
    pub fn downgrade(self) -> SharedGuard<'a, S> {
        self.lock.downgrade_to_shared();
        let lock = self.lock;
        let rounds = self.rounds;
        mem::forget(self);
        SharedGuard { lock, rounds }
    }
}

impl<S: StateWidth> Drop for ExclusiveGuard<'_, S> {
    #[inline]
    fn drop(&mut self) {
        self.lock.release_exclusive();
    }
}

impl<S: StateWidth> fmt::Debug for ExclusiveGuard<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveGuard").field("rounds", &self.rounds).finish()
    }
}

/// RAII handle to one shared reference on a [`RawRwSpinLock`].
///
/// Decrements the reader count when dropped. Cloning acquires an additional
/// shared reference, spinning until it succeeds.
#[must_use = "if unused the lock is immediately released"]
pub struct SharedGuard<'a, S: StateWidth = i16> {
    lock: &'a RawRwSpinLock<S>,
    rounds: u32,
}

impl<'a, S: StateWidth> SharedGuard<'a, S> {
    #[inline]
    pub(crate) fn new(lock: &'a RawRwSpinLock<S>, rounds: u32) -> Self {
        Self { lock, rounds }
    }

    /// Number of backoff rounds the acquisition that produced this guard
    /// spent waiting.
    #[inline]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Attempts to convert this shared hold into the exclusive lock,
    /// without spinning.
    ///
    /// Fails while any other reader is present; the shared hold is kept
    /// either way. The shared guard stays mutably borrowed while the
    /// returned guard lives, and dropping the returned guard downgrades
    /// back to this guard's single shared reference.
    #[inline]
    pub fn try_upgrade(&mut self) -> Option<UpgradedGuard<'_, S>> {
        if self.lock.try_upgrade() {
            Some(UpgradedGuard { lock: self.lock, rounds: 0 })
        } else {
            None
        }
    }

    /// Converts this shared hold into the exclusive lock, giving up once
    /// `timeout` has elapsed.
    ///
    /// See [`try_upgrade`](Self::try_upgrade) for the guard semantics.
    #[inline]
    pub fn upgrade_for(&mut self, timeout: Duration) -> Option<UpgradedGuard<'_, S>> {
        let mut rounds = 0;
        if self.lock.upgrade(timeout, Some(&mut rounds)) {
            Some(UpgradedGuard { lock: self.lock, rounds })
        } else {
            None
        }
    }

    /// Temporarily releases this shared reference while `f` runs,
    /// re-acquiring shared access before returning.
    ///
    /// The reference is re-acquired even if `f` panics. Afterwards
    /// [`rounds`](Self::rounds) reports the rounds of the re-acquisition.
    #[inline]
    pub fn unlocked<F, U>(&mut self, f: F) -> U
    where
        F: FnOnce() -> U,
    {
        self.lock.release_shared();
        let mut rounds = 0;
        let result = {
            let _relock = RelockShared { lock: self.lock, rounds: &mut rounds };
            f()
        };
        self.rounds = rounds;
        result
    }
}

impl<S: StateWidth> Clone for SharedGuard<'_, S> {
    #[inline]
    fn clone(&self) -> Self {
        let mut rounds = 0;
        self.lock.acquire_shared(Some(&mut rounds));
        Self { lock: self.lock, rounds }
    }
}

impl<S: StateWidth> Drop for SharedGuard<'_, S> {
    #[inline]
    fn drop(&mut self) {
        self.lock.release_shared();
    }
}

impl<S: StateWidth> fmt::Debug for SharedGuard<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGuard").field("rounds", &self.rounds).finish()
    }
}

/// RAII handle to an exclusive lock obtained by upgrading a shared
/// reference.
///
/// Dropping the guard downgrades back to the single shared reference the
/// parent [`SharedGuard`] holds, without passing through the unowned state.
#[must_use = "if unused the lock is immediately downgraded"]
pub struct UpgradedGuard<'a, S: StateWidth = i16> {
    lock: &'a RawRwSpinLock<S>,
    rounds: u32,
}

impl<S: StateWidth> UpgradedGuard<'_, S> {
    /// Number of backoff rounds the upgrade spent waiting.
    #[inline]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

impl<S: StateWidth> Drop for UpgradedGuard<'_, S> {
    #[inline]
    fn drop(&mut self) {
        self.lock.downgrade_to_shared();
    }
}

impl<S: StateWidth> fmt::Debug for UpgradedGuard<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradedGuard").field("rounds", &self.rounds).finish()
    }
}

/// Re-acquires the exclusive lock on drop, keeping [`ExclusiveGuard::unlocked`]
/// correct when the closure panics.
struct RelockExclusive<'a, 'r, S: StateWidth> {
    lock: &'a RawRwSpinLock<S>,
    rounds: &'r mut u32,
}

impl<S: StateWidth> Drop for RelockExclusive<'_, '_, S> {
    fn drop(&mut self) {
        self.lock.acquire_exclusive(Some(&mut *self.rounds));
    }
}

/// Re-acquires a shared reference on drop, keeping [`SharedGuard::unlocked`]
/// correct when the closure panics.
struct RelockShared<'a, 'r, S: StateWidth> {
    lock: &'a RawRwSpinLock<S>,
    rounds: &'r mut u32,
}

impl<S: StateWidth> Drop for RelockShared<'_, '_, S> {
    fn drop(&mut self) {
        self.lock.acquire_shared(Some(&mut *self.rounds));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_guard_releases_on_drop() {
        let lock = RawRwSpinLock::<i16>::new();
        {
            let guard = lock.exclusively();
            assert_eq!(guard.rounds(), 0);
            assert!(lock.is_locked_exclusively());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn timed_guard_entry_points_report_contention() {
        let lock = RawRwSpinLock::<i16>::new();
        let guard = lock.exclusively_for(Duration::ZERO).expect("uncontended");
        assert!(lock.exclusively_for(Duration::ZERO).is_none());
        assert!(lock.share_for(Duration::ZERO).is_none());
        drop(guard);
        assert!(lock.share_for(Duration::ZERO).is_some());
        assert!(!lock.is_locked());
    }

    #[test]
    fn cloning_a_shared_guard_adds_a_reference() {
        let lock = RawRwSpinLock::<i32>::new();
        let first = lock.share();
        let second = first.clone();
        // Two readers: no upgrade, no writer.
        assert!(!lock.try_upgrade());
        assert!(!lock.try_acquire_exclusive());
        drop(first);
        drop(second);
        assert!(!lock.is_locked());
    }

    #[test]
    fn upgrade_downgrades_back_on_drop() {
        let lock = RawRwSpinLock::<i16>::new();
        let mut reader = lock.share();
        {
            let upgraded = reader.try_upgrade().expect("single reader");
            assert_eq!(upgraded.rounds(), 0);
            assert!(lock.is_locked_exclusively());
        }
        assert!(lock.is_locked());
        assert!(!lock.is_locked_exclusively());
        drop(reader);
        assert!(!lock.is_locked());
    }

    #[test]
    fn upgrade_fails_with_concurrent_reader() {
        let lock = RawRwSpinLock::<i16>::new();
        let mut first = lock.share();
        let second = lock.share();
        assert!(first.try_upgrade().is_none());
        assert!(first.upgrade_for(Duration::ZERO).is_none());
        // The failed upgrade kept both shared references.
        drop(second);
        assert!(first.try_upgrade().is_some());
        drop(first);
        assert!(!lock.is_locked());
    }

    #[test]
    fn unlocked_releases_for_the_closure_and_reacquires() {
        let lock = RawRwSpinLock::<i16>::new();
        let mut guard = lock.exclusively();
        let observed = guard.unlocked(|| lock.is_locked());
        assert!(!observed);
        assert!(lock.is_locked_exclusively());
        drop(guard);

        let mut guard = lock.share();
        let observed = guard.unlocked(|| lock.is_locked());
        assert!(!observed);
        assert!(lock.is_locked());
        drop(guard);
        assert!(!lock.is_locked());
    }

    #[test]
    fn downgrade_keeps_the_lock_held() {
        let lock = RawRwSpinLock::<i64>::new();
        let writer = lock.exclusively();
        let reader = writer.downgrade();
        assert!(lock.is_locked());
        assert!(!lock.is_locked_exclusively());
        // Other readers may now join.
        assert!(lock.try_acquire_shared());
        lock.release_shared();
        drop(reader);
        assert!(!lock.is_locked());
    }
}
