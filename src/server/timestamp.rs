//! Periodic "timestamp:" appender, active only for the in-process log.

use crate::error::Result;
use crate::store::CommandStore;
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

const INTERVAL: Duration = Duration::from_secs(10);

/// Spawn the periodic task. `stop_rx` receiving anything (or disconnecting)
/// ends the loop; the loop otherwise wakes every 10 seconds.
pub fn spawn<S: CommandStore + 'static>(
    store: Arc<S>,
    mutex: Arc<Mutex<()>>,
    stop_rx: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match stop_rx.recv_timeout(INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Err(e) = write_timestamp(&store, &mutex) {
                    warn!("failed to write timestamp: {}", e);
                }
            }
        }
    })
}

fn write_timestamp<S: CommandStore>(store: &Arc<S>, mutex: &Mutex<()>) -> Result<()> {
    let line = format!("timestamp:{}\n", Local::now().format("%a, %d %b %Y %T %z"));
    let bytes = line.as_bytes();

    let mut handle = S::open(store)?;
    let _guard = mutex.lock();

    let mut written = 0;
    while written < bytes.len() {
        match handle.write(&bytes[written..])? {
            0 => break,
            n => written += n,
        }
    }
    Ok(())
}
