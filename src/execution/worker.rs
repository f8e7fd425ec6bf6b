//! Worker leasing
//!
//! A worker runs at most one pipeline at a time. Jobs name the workers they
//! may use; a job waits until one of them is free.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Every worker known to the engine
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    slots: HashMap<String, Arc<Semaphore>>,
    released: Arc<Notify>,
}

/// Exclusive use of one worker, released on drop
#[derive(Debug)]
pub struct WorkerLease {
    name: String,
    permit: Option<OwnedSemaphorePermit>,
    released: Arc<Notify>,
}

impl WorkerLease {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        // Free the slot before waking waiters so they can take it
        self.permit.take();
        self.released.notify_waiters();
    }
}

impl WorkerPool {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = names
            .into_iter()
            .map(|name| (name.into(), Arc::new(Semaphore::new(1))))
            .collect();

        Self {
            slots,
            released: Arc::new(Notify::new()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Lease the first free worker among `candidates`, without waiting
    pub fn try_lease(&self, candidates: &[String]) -> Option<WorkerLease> {
        candidates.iter().find_map(|name| {
            let permit = self.slots.get(name)?.clone().try_acquire_owned().ok()?;
            Some(WorkerLease {
                name: name.clone(),
                permit: Some(permit),
                released: self.released.clone(),
            })
        })
    }

    /// Lease the first worker among `candidates` that becomes free.
    ///
    /// Returns `None` only if no candidate is part of the pool.
    pub async fn lease(&self, candidates: &[String]) -> Option<WorkerLease> {
        if !candidates.iter().any(|c| self.contains(c)) {
            return None;
        }

        loop {
            // Register interest before trying so a release in between is not lost
            let mut released = pin!(self.released.notified());
            released.as_mut().enable();

            if let Some(lease) = self.try_lease(candidates) {
                return Some(lease);
            }
            released.await;
        }
    }
}
