//! # Dependency Readiness Gate
//!
//! Tracks packages currently being installed and a FIFO queue of deferred
//! method calls. While any installation is outstanding, the dispatcher
//! boxes each call as a thunk and parks it here; when the last outstanding
//! package resolves, the queue drains exactly once.
//!
//! The drain operates over a snapshot of the queue length taken at drain
//! start: a thunk that re-defers itself mid-drain lands in a later pass
//! instead of extending the current one.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;
use tracing::{debug, warn};

/// A deferred invocation: the boxed remainder of a dispatch.
pub type Deferred = BoxFuture<'static, ()>;

/// Shared gate state: the installing set and the deferred-call queue.
#[derive(Default)]
pub struct DependencyGate {
    installing: Mutex<HashSet<String>>,
    queue: Mutex<VecDeque<Deferred>>,
}

impl DependencyGate {
    pub fn new() -> Self {
        DependencyGate::default()
    }

    /// Whether any installation is outstanding (calls must be deferred).
    pub fn is_blocked(&self) -> bool {
        !self
            .installing
            .lock()
            .expect("gate lock poisoned")
            .is_empty()
    }

    /// The number of currently parked calls.
    pub fn pending(&self) -> usize {
        self.queue.lock().expect("gate lock poisoned").len()
    }

    /// Marks a package as installing. Returns `false` if it was already
    /// tracked, so the same package is never installed twice concurrently.
    pub fn begin(&self, package: &str) -> bool {
        let inserted = self
            .installing
            .lock()
            .expect("gate lock poisoned")
            .insert(package.to_string());
        if inserted {
            debug!(package, "installation started");
        }
        inserted
    }

    /// Parks a deferred call at the back of the queue.
    pub fn defer(&self, thunk: Deferred) {
        self.queue
            .lock()
            .expect("gate lock poisoned")
            .push_back(thunk);
    }

    /// Marks a package as installed; drains the queue if it was the last
    /// outstanding one.
    pub fn finish(&self, package: &str) {
        let emptied = {
            let mut installing = self.installing.lock().expect("gate lock poisoned");
            installing.remove(package) && installing.is_empty()
        };
        if emptied {
            self.drain();
        }
    }

    /// Clears a set of failed packages. The queue still drains so deferred
    /// calls fail on their own terms instead of hanging forever.
    pub fn fail<'a>(&self, packages: impl IntoIterator<Item = &'a str>) {
        let emptied = {
            let mut installing = self.installing.lock().expect("gate lock poisoned");
            for package in packages {
                installing.remove(package);
            }
            installing.is_empty()
        };
        if emptied {
            self.drain();
        }
    }

    /// Executes every currently parked thunk, once. Thunks enqueued while
    /// this pass runs wait for a later drain.
    fn drain(&self) {
        let thunks: Vec<Deferred> = {
            let mut queue = self.queue.lock().expect("gate lock poisoned");
            let snapshot = queue.len();
            queue.drain(..snapshot).collect()
        };
        if thunks.is_empty() {
            return;
        }
        warn!(count = thunks.len(), "executing deferred call(s)");
        for thunk in thunks {
            tokio::spawn(thunk);
        }
    }
}
