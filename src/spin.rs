//! The adaptive waiting discipline used by the blocking acquires.
//!
//! A waiter escalates through three stages, indexed by its round counter:
//! processor-yield hints for the first `YIELDS` rounds, then cooperative
//! yields of the remaining scheduling quantum for `SLEEP0S` rounds, then
//! short sleeps of roughly one tick. The thresholds differ per acquisition
//! mode; see [`params`].

use core::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Per-mode spin thresholds.
///
/// These values are tuned empirically and are not semantically required;
/// they are exported so that alternative builds can re-tune them without
/// touching the acquire loops.
pub mod params {
    /// Processor-yield rounds before an exclusive waiter involves the scheduler.
    pub const EXCLUSIVE_YIELDS: u32 = 125;
    /// Quantum-yield rounds before an exclusive waiter starts sleeping.
    pub const EXCLUSIVE_SLEEP0S: u32 = 2;

    /// Processor-yield rounds before a shared waiter involves the scheduler.
    pub const SHARED_YIELDS: u32 = 120;
    /// Quantum-yield rounds before a shared waiter starts sleeping.
    pub const SHARED_SLEEP0S: u32 = 7;

    /// Processor-yield rounds before an upgrade waiter involves the scheduler.
    pub const UPGRADE_YIELDS: u32 = 27;
    /// Quantum-yield rounds before an upgrade waiter starts sleeping.
    pub const UPGRADE_SLEEP0S: u32 = 100;
}

pub(crate) trait Timings {
    const YIELDS: u32;
    const SLEEP0S: u32;
}

pub(crate) enum Exclusive {}
pub(crate) enum Shared {}
pub(crate) enum Upgrade {}

impl Timings for Exclusive {
    const YIELDS: u32 = params::EXCLUSIVE_YIELDS;
    const SLEEP0S: u32 = params::EXCLUSIVE_SLEEP0S;
}

impl Timings for Shared {
    const YIELDS: u32 = params::SHARED_YIELDS;
    const SLEEP0S: u32 = params::SHARED_SLEEP0S;
}

impl Timings for Upgrade {
    const YIELDS: u32 = params::UPGRADE_YIELDS;
    const SLEEP0S: u32 = params::UPGRADE_SLEEP0S;
}

/// One round of the backoff ladder for round number `round`.
#[inline]
pub(crate) fn wait<T: Timings>(round: u32) {
    if round <= T::YIELDS {
        spin_loop();
    } else if round <= T::YIELDS + T::SLEEP0S {
        thread::yield_now();
    } else {
        thread::sleep(Duration::from_millis(1));
    }
}
