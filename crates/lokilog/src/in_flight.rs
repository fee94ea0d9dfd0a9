// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Counting barrier for dispatched-but-unfinished pushes.
//!
//! Writers register work synchronously before spawning it; the returned guard
//! is moved into the spawned task and releases the slot when dropped. Waiters
//! block (or await) until the count reaches zero.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct InFlight {
    count: Mutex<usize>,
    zero: Condvar,
    notify: Notify,
}

impl InFlight {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one unit of work. Must run on the dispatching side, before
    /// the work is scheduled, so a drain that starts after this call returns
    /// always observes it.
    #[must_use = "dropping the guard immediately releases the registration"]
    pub fn register(self: &Arc<Self>) -> InFlightGuard {
        *self.lock() += 1;
        InFlightGuard {
            in_flight: Arc::clone(self),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Blocks the current thread until no work is registered.
    pub fn wait(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self
                .zero
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Waits asynchronously until no work is registered.
    pub async fn wait_async(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Enable before checking so a release between the check and the
            // await still wakes us.
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        let reached_zero = *count == 0;
        drop(count);

        if reached_zero {
            self.zero.notify_all();
            self.notify.notify_waiters();
        }
    }

    // The count stays consistent even if a holder panicked, so poisoning is
    // ignored.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One registered unit of work. Released on drop, whatever the outcome.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_register_and_release() {
        let in_flight = InFlight::new();
        let first = in_flight.register();
        let second = in_flight.register();
        assert_eq!(in_flight.count(), 2);

        drop(first);
        assert_eq!(in_flight.count(), 1);
        drop(second);
        assert_eq!(in_flight.count(), 0);
    }

    #[test]
    fn test_wait_returns_immediately_when_idle() {
        let in_flight = InFlight::new();
        in_flight.wait();
    }

    #[test]
    fn test_wait_blocks_until_all_guards_dropped() {
        let in_flight = InFlight::new();
        let finished = Arc::new(AtomicBool::new(false));

        let guards: Vec<_> = (0..8).map(|_| in_flight.register()).collect();
        let handles: Vec<_> = guards
            .into_iter()
            .enumerate()
            .map(|(i, guard)| {
                let finished = Arc::clone(&finished);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10 * (i as u64 + 1)));
                    if i == 7 {
                        finished.store(true, Ordering::SeqCst);
                    }
                    drop(guard);
                })
            })
            .collect();

        in_flight.wait();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(in_flight.count(), 0);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_guard_released_on_panic() {
        let in_flight = InFlight::new();
        let guard = in_flight.register();
        let result = thread::spawn(move || {
            let _guard = guard;
            panic!("push task panicked");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(in_flight.count(), 0);
        in_flight.wait();
    }

    #[test]
    fn test_concurrent_register_and_release() {
        let in_flight = InFlight::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        let guard = in_flight.register();
                        drop(guard);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(in_flight.count(), 0);
    }

    #[tokio::test]
    async fn test_wait_async_until_released() {
        let in_flight = InFlight::new();
        let guard = in_flight.register();

        let released = Arc::new(AtomicBool::new(false));
        let task_released = Arc::clone(&released);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            task_released.store(true, Ordering::SeqCst);
            drop(guard);
        });

        in_flight.wait_async().await;
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_wait_async_returns_immediately_when_idle() {
        let in_flight = InFlight::new();
        tokio::time::timeout(Duration::from_millis(100), in_flight.wait_async())
            .await
            .expect("idle wait should not block");
    }
}
