//! Slim, unfair reader-writer spin lock.
//!
//! The whole lock is one signed integer counter: `0` unowned, `-1` owned
//! exclusively, `k >= 1` shared by `k` holders. Every transition is a single
//! interlocked operation on that cell, so the uncontended path never enters
//! the kernel, and the cell can live in process-shared memory to coordinate
//! cooperating processes.
//!
//! Contended acquires spin adaptively: processor-yield hints first, then
//! cooperative yields of the scheduling quantum, then short sleeps of about
//! one tick. The thresholds are per-mode and exported in [`params`]. Every
//! blocking acquire can report the number of backoff rounds it waited, which
//! is the cheapest contention signal a caller can get.
//!
//! ## The two surfaces
//!
//! [`RawRwSpinLock`] is the bare cell. It carries the full operation family
//! (try-once, indefinite, timed; upgrade and downgrade; force-unlock
//! recovery; advisory state queries) and hands out data-less scope guards
//! through [`exclusively`](RawRwSpinLock::exclusively) /
//! [`share`](RawRwSpinLock::share). Use it when the lock must live next to
//! the data it protects, for example inside a shared-memory segment.
//!
//! [`RwSpinLock`] is the familiar data-carrying form, a `lock_api::RwLock`
//! over the same raw lock: `read` / `write` guards dereference to the
//! protected value. [`RawRwSpinLock`] also implements
//! `lock_api::RawRwLock`, `RawRwLockTimed` and `RawRwLockDowngrade` for
//! code generic over raw lock implementations.
//!
//! ## What this lock is not
//!
//! Locking is unfair in both directions and there is no queueing, no FIFO
//! ordering, no writer priority and no reentrancy. Waiters burn CPU while
//! blocked. The design target is many independent locks, each protecting a
//! handful of instructions; a single hot lock wants a fair, parking lock
//! instead.
//!
//! ```
//! use rwspin::RwSpinLock;
//!
//! let total = RwSpinLock::new(0u64);
//! *total.write() += 1;
//! assert_eq!(*total.read(), 1);
//! ```

#![warn(missing_docs)]

mod guard;
mod raw;
mod rwlock;
mod spin;
mod state;

pub use guard::{ExclusiveGuard, SharedGuard, UpgradedGuard};
pub use raw::RawRwSpinLock;
pub use rwlock::{RwSpinLock, RwSpinLockReadGuard, RwSpinLockWriteGuard};
pub use spin::params;
pub use state::StateWidth;
