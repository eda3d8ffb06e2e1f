//! Cookie-based timeout facility
//!
//! Protocol engines need to detect a silent peer: a handler registers a
//! timeout when it starts waiting for an answer, refreshes it every time the
//! peer shows a sign of life and unregisters it when the exchange completes.
//! Expired timeouts are delivered as cookies on a channel so that the owning
//! engine can process them in its own event loop, serialized with the
//! incoming messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering::Relaxed};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Opaque handle identifying a registered timeout.
pub(crate) type TimeoutCookie = u32;

struct TimeoutEntry {
    deadline: Instant,
    duration: Duration,
}

/// Timeout registry. Each registered timeout is watched by its own task;
/// the registry map is the single source of truth so that refresh and
/// unregister are race-free with the watcher.
pub(crate) struct Timeouts {
    next_cookie: AtomicU32,
    entries: Mutex<HashMap<TimeoutCookie, TimeoutEntry>>,
    fired: flume::Sender<TimeoutCookie>,
}

impl Timeouts {
    pub(crate) fn new(fired: flume::Sender<TimeoutCookie>) -> Arc<Self> {
        Arc::new(Self {
            next_cookie: AtomicU32::new(1),
            entries: Mutex::new(HashMap::new()),
            fired,
        })
    }

    /// Register a new timeout. The cookie is sent on the `fired` channel
    /// once `duration` elapses without a [refresh](Timeouts::refresh).
    pub(crate) fn register(self: &Arc<Self>, duration: Duration) -> TimeoutCookie {
        let cookie = self.next_cookie.fetch_add(1, Relaxed);
        let deadline = Instant::now() + duration;

        self.entries
            .lock()
            .unwrap()
            .insert(cookie, TimeoutEntry { deadline, duration });

        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let deadline = match this.entries.lock().unwrap().get(&cookie) {
                    Some(entry) => entry.deadline,
                    // Unregistered, nothing to watch anymore.
                    None => return,
                };

                let now = Instant::now();
                if now >= deadline {
                    this.entries.lock().unwrap().remove(&cookie);
                    let _ = this.fired.send(cookie);
                    return;
                }

                tokio::time::sleep(deadline - now).await;
            }
        });

        cookie
    }

    /// Push the deadline of a registered timeout back by its full duration.
    /// Refreshing an expired or unregistered cookie is a no-op.
    pub(crate) fn refresh(&self, cookie: TimeoutCookie) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&cookie) {
            entry.deadline = Instant::now() + entry.duration;
        }
    }

    /// Cancel a registered timeout. Cancelling an expired or unregistered
    /// cookie is a no-op.
    pub(crate) fn unregister(&self, cookie: TimeoutCookie) {
        self.entries.lock().unwrap().remove(&cookie);
    }
}
