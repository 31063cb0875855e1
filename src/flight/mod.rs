//! Single-flight request coalescing.
//!
//! Concurrent callers asking for the same key collapse into one in-flight
//! call: the first caller runs the work, everyone else parks on a channel and
//! receives the same result. Entries are torn down after completion, so a
//! later call for the same key runs the work again. This is coalescing, not
//! memoization.

use crate::error::{CacheError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::oneshot;

type WaiterTable<T> = Mutex<HashMap<String, Vec<oneshot::Sender<Result<T>>>>>;

/// Coalesces concurrent calls per key.
///
/// The table mutex only guards registration and teardown; the work future
/// itself runs without it, so the critical sections stay short no matter how
/// long the work suspends.
pub struct FlightGroup<T> {
    calls: WaiterTable<T>,
}

impl<T: Clone> FlightGroup<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `work` for `key`, unless a call for the same key is already in
    /// flight, in which case the caller waits for that call's result.
    ///
    /// Every coalesced caller observes exactly the result produced by the one
    /// execution. Cancellation travels inside `work`; if the leading caller
    /// is dropped mid-flight, waiters are released with an error rather than
    /// left hanging.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let waiter = {
            let mut calls = self.calls.lock().expect("flight table lock poisoned");
            match calls.get_mut(key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    calls.insert(key.to_string(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(result) => result,
                Err(_) => Err(CacheError::Internal(
                    "in-flight call abandoned before completing".to_string(),
                )),
            };
        }

        // Leader path. The guard tears the entry down even if this future is
        // dropped before `work` completes, dropping the parked senders and
        // thereby failing the waiters instead of wedging them.
        let guard = FlightGuard {
            calls: &self.calls,
            key,
        };
        let result = work().await;

        let waiters = {
            let mut calls = guard
                .calls
                .lock()
                .expect("flight table lock poisoned");
            calls.remove(key).unwrap_or_default()
        };
        std::mem::forget(guard);

        for tx in waiters {
            let _ = tx.send(result.clone());
        }
        result
    }
}

impl<T: Clone> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct FlightGuard<'a, T> {
    calls: &'a WaiterTable<T>,
    key: &'a str,
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.remove(self.key);
        }
    }
}
