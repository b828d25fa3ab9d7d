//! Tracks in-flight per-connection worker threads for shutdown join-out.

use std::thread::JoinHandle;
use tracing::warn;

/// Append-only during the accept loop; drained in FIFO order on shutdown.
///
/// Workers never return an error to their join handle (connection-level
/// failures are logged and swallowed inside the worker itself) — the only
/// way `join` fails here is a panic. Shutdown continues joining every
/// worker regardless, reporting the first panic rather than abandoning
/// the remaining handles.
pub struct WorkerRegistry {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self { handles: Vec::new() }
    }

    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Join every worker in FIFO order, logging (but not stopping for)
    /// panics. Returns whether any worker panicked.
    pub fn join_all(&mut self) -> bool {
        let mut any_panicked = false;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                if !any_panicked {
                    warn!("a connection worker panicked; continuing to join the rest");
                }
                any_panicked = true;
            }
        }
        any_panicked
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
