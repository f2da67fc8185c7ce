use std::fmt;
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};
use crate::core::error::{Error, ErrorKind, Result};

/// Lifecycle of one index instance; `Removed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Uninit,
    Building,
    Built,
    Removed,
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            IndexStatus::Uninit => "UNINIT",
            IndexStatus::Building => "BUILDING",
            IndexStatus::Built => "BUILT",
            IndexStatus::Removed => "REMOVED",
        };
        f.write_str(name)
    }
}

/// Status plus a condition variable fired on every transition
pub struct StatusCell {
    status: Mutex<IndexStatus>,
    changed: Condvar,
}

impl StatusCell {
    pub fn new() -> Self {
        StatusCell {
            status: Mutex::new(IndexStatus::Uninit),
            changed: Condvar::new(),
        }
    }

    pub fn get(&self) -> IndexStatus {
        *self.status.lock()
    }

    /// Move to `next`; returns false if the index was already removed
    pub fn set(&self, next: IndexStatus) -> bool {
        let mut status = self.status.lock();
        if *status == IndexStatus::Removed {
            return false;
        }
        *status = next;
        self.changed.notify_all();
        true
    }

    /// Move to `next` only from one of `from`
    pub fn transition(&self, from: &[IndexStatus], next: IndexStatus) -> bool {
        let mut status = self.status.lock();
        if !from.contains(&status) {
            return false;
        }
        *status = next;
        self.changed.notify_all();
        true
    }

    /// Block until the index is built, at most `timeout`
    pub fn wait_built(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut status = self.status.lock();
        loop {
            match *status {
                IndexStatus::Built => return Ok(()),
                IndexStatus::Removed => return Err(Error::invalid_state("Index has been removed")),
                _ => {}
            }
            if self.changed.wait_until(&mut status, deadline).timed_out() && *status != IndexStatus::Built {
                if *status == IndexStatus::Removed {
                    return Err(Error::invalid_state("Index has been removed"));
                }
                return Err(Error::new(
                    ErrorKind::Timeout,
                    format!("Index still {} after {:?}", *status, timeout),
                ));
            }
        }
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
