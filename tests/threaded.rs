//! Multi-threaded scenarios: mutual exclusion, reader scaling, upgrade
//! races, timed starvation, downgrade visibility and crash recovery.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rand::Rng;
use rwspin::{params, RawRwSpinLock, RwSpinLock, RwSpinLockWriteGuard};

#[test]
fn exclusive_alternation() {
    const THREADS: usize = 2;
    const ITERS: u64 = 100_000;

    let lock = Arc::new(RwSpinLock::new(0u64));
    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let lock = Arc::clone(&lock);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                // Every entry observes the previous writer's stored value,
                // otherwise increments would be lost.
                *lock.write() += 1;
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*lock.read(), THREADS as u64 * ITERS);
    assert!(lock.try_write().is_some());
}

#[test]
fn reader_scaling() {
    const THREADS: usize = 16;
    const ITERS: usize = 20_000;

    let lock = Arc::new(RawRwSpinLock::<i32>::new());
    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let lock = Arc::clone(&lock);
        handles.push(thread::spawn(move || {
            for _ in 0..ITERS {
                lock.acquire_shared(None);
                assert!(!lock.is_locked_exclusively());
                lock.release_shared();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!lock.is_locked());
}

#[test]
fn upgrade_contention() {
    const ROUNDS: usize = 100;

    let lock = Arc::new(RawRwSpinLock::<i32>::new());
    let barrier = Arc::new(Barrier::new(2));
    let inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let lock = Arc::clone(&lock);
        let barrier = Arc::clone(&barrier);
        let inside = Arc::clone(&inside);
        handles.push(thread::spawn(move || {
            // Both threads hold a shared reference before either upgrades,
            // so the reader count is two and neither upgrade can succeed.
            for _ in 0..ROUNDS {
                let mut guard = lock.share();
                barrier.wait();
                assert!(guard.try_upgrade().is_none());
                barrier.wait();
                drop(guard);
            }

            // Free-running race: whichever upgrade wins must be the only
            // exclusive holder, and a loser must not block the winner.
            for _ in 0..ROUNDS {
                barrier.wait();
                let mut guard = lock.share();
                let upgraded = guard.try_upgrade();
                if let Some(_upgraded) = upgraded {
                    let holders = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    assert_eq!(holders, 1);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!lock.is_locked());
}

#[test]
fn timed_starvation() {
    let lock = Arc::new(RawRwSpinLock::<i32>::new());
    let held = Arc::new(AtomicBool::new(false));

    let holder = {
        let lock = Arc::clone(&lock);
        let held = Arc::clone(&held);
        thread::spawn(move || {
            lock.acquire_exclusive(None);
            held.store(true, Ordering::Release);
            thread::sleep(Duration::from_millis(500));
            lock.release_exclusive();
        })
    };

    while !held.load(Ordering::Acquire) {
        thread::yield_now();
    }

    let mut rounds = 0;
    assert!(!lock.acquire_exclusive_for(Duration::from_millis(50), Some(&mut rounds)));
    assert!(rounds > params::EXCLUSIVE_YIELDS);

    holder.join().unwrap();

    let mut rounds = 0;
    assert!(lock.acquire_exclusive_for(Duration::from_millis(50), Some(&mut rounds)));
    assert!(rounds <= params::EXCLUSIVE_YIELDS);
    lock.release_exclusive();
}

#[test]
fn timed_acquire_succeeds_once_released() {
    let lock = Arc::new(RawRwSpinLock::<i32>::new());
    let held = Arc::new(AtomicBool::new(false));

    let holder = {
        let lock = Arc::clone(&lock);
        let held = Arc::clone(&held);
        thread::spawn(move || {
            lock.acquire_exclusive(None);
            held.store(true, Ordering::Release);
            thread::sleep(Duration::from_millis(100));
            lock.release_exclusive();
        })
    };

    while !held.load(Ordering::Acquire) {
        thread::yield_now();
    }

    let mut rounds = 0;
    assert!(lock.acquire_exclusive_for(Duration::from_millis(2_000), Some(&mut rounds)));
    assert!(rounds > params::EXCLUSIVE_YIELDS);
    lock.release_exclusive();

    holder.join().unwrap();
}

#[test]
fn downgrade_visibility() {
    let lock = Arc::new(RwSpinLock::new(0u32));

    let mut writer = lock.write();
    *writer = 7;

    let reader_thread = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            // Spins while the writer holds the lock; once admitted it must
            // observe everything the writer published before downgrading.
            assert_eq!(*lock.read(), 7);
        })
    };

    let reader = RwSpinLockWriteGuard::downgrade(writer);
    assert_eq!(*reader, 7);

    reader_thread.join().unwrap();
    drop(reader);
    assert!(lock.try_write().is_some());
}

#[test]
fn force_unlock_recovery() {
    let lock = Arc::new(RawRwSpinLock::<i16>::new());

    let crashed_holder = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            lock.acquire_exclusive(None);
            // Exits without releasing.
        })
    };
    crashed_holder.join().unwrap();

    assert!(!lock.try_acquire_exclusive());
    lock.force_unlock();
    assert!(lock.try_acquire_exclusive());
    lock.release_exclusive();
}

#[test]
fn randomized_interleaving_keeps_data_consistent() {
    let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8);
    let lock = Arc::new(RwSpinLock::new((0u64, 0u64)));

    let mut handles = Vec::new();
    for _ in 0..threads {
        let lock = Arc::clone(&lock);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..5_000 {
                match rng.gen_range(0..4) {
                    0 => {
                        let mut guard = lock.write();
                        guard.0 += 1;
                        guard.1 += 1;
                    }
                    1 => {
                        if let Some(mut guard) = lock.try_write_for(Duration::from_micros(50)) {
                            guard.0 += 1;
                            guard.1 += 1;
                        }
                    }
                    2 => {
                        let guard = lock.read();
                        assert_eq!(guard.0, guard.1);
                    }
                    _ => {
                        if let Some(guard) = lock.try_read() {
                            assert_eq!(guard.0, guard.1);
                        }
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let settled = lock.read();
    assert_eq!(settled.0, settled.1);
}

#[test]
fn randomized_guard_traffic_settles_unowned() {
    let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8);
    let lock = Arc::new(RawRwSpinLock::<i32>::new());

    let mut handles = Vec::new();
    for _ in 0..threads {
        let lock = Arc::clone(&lock);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..2_000 {
                match rng.gen_range(0..5) {
                    0 => {
                        let _guard = lock.exclusively();
                    }
                    1 => {
                        if let Some(mut guard) = lock.exclusively_for(Duration::from_micros(20)) {
                            guard.unlocked(|| {});
                        }
                    }
                    2 => {
                        let guard = lock.share();
                        let _extra = guard.clone();
                    }
                    3 => {
                        let mut guard = lock.share();
                        let _ = guard.try_upgrade();
                    }
                    _ => {
                        let mut guard = lock.share();
                        let _upgraded = guard.upgrade_for(Duration::from_micros(20));
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!lock.is_locked());
}
