use crate::raw::RawRwSpinLock;

/// A reader-writer spin lock wrapping the data it protects.
///
/// This is the in-process, data-carrying form of [`RawRwSpinLock`], built on
/// the `lock_api` wrappers: guards implement `Deref`/`DerefMut` and release
/// on drop. Timed acquisition is available through `try_read_for` /
/// `try_write_for`, and a write guard can be downgraded in place with
/// `RwSpinLockWriteGuard::downgrade`.
///
/// The lock itself stays a single `i16`; for a wider reader count
/// instantiate `lock_api::RwLock` with a wider cell directly:
///
/// ```
/// type WideRwSpinLock<T> = lock_api::RwLock<rwspin::RawRwSpinLock<i64>, T>;
/// ```
///
/// All caveats of [`RawRwSpinLock`] apply: unfair, not reentrant, spin-waits
/// burn CPU. Use it for many lightly contended locks around tiny critical
/// sections.
pub type RwSpinLock<T> = lock_api::RwLock<RawRwSpinLock, T>;

/// RAII structure used to release the shared read access of a lock when
/// dropped.
pub type RwSpinLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwSpinLock, T>;

/// RAII structure used to release the exclusive write access of a lock when
/// dropped.
pub type RwSpinLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwSpinLock, T>;
