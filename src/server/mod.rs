//! TCP front-end: accept loop, per-connection workers, and the periodic
//! timestamp task, generic over the backing [`CommandStore`].

pub mod connection;
pub mod registry;
pub mod seek;
pub mod timestamp;

use crate::error::Result;
use crate::store::CommandStore;
use parking_lot::Mutex;
use registry::WorkerRegistry;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Growth increment for a worker's per-connection read buffer, and the
/// chunk size used when streaming a reply back to the client.
pub const READ_CHUNK: usize = 512;

/// How often the accept loop re-checks the run flag while no connection is
/// pending. `std::net::TcpListener` doesn't surface `EINTR` the way a raw
/// blocking `accept(2)` does, so the listener is set non-blocking and
/// polled instead — functionally equivalent interruptibility.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The TCP front-end. Generic over the store so the accept loop and worker
/// logic are shared between the in-process log and an external character
/// device.
pub struct Server<S: CommandStore> {
    store: Arc<S>,
    mutex: Arc<Mutex<()>>,
    run_flag: Arc<AtomicBool>,
    port: u16,
    read_chunk: usize,
    /// Backing file to remove on clean shutdown; only meaningful (and only
    /// ever `Some`) when `S::IS_IN_PROCESS_LOG`.
    data_file: Option<PathBuf>,
}

impl<S: CommandStore + 'static> Server<S> {
    pub fn new(store: Arc<S>, port: u16, run_flag: Arc<AtomicBool>, data_file: Option<PathBuf>) -> Self {
        Self {
            store,
            mutex: Arc::new(Mutex::new(())),
            run_flag,
            port,
            read_chunk: READ_CHUNK,
            data_file,
        }
    }

    /// Bind, listen, and run the accept loop until the run flag clears.
    /// Joins all in-flight workers before returning.
    pub fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        info!("listening on port {}", self.port);

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let timestamp_handle = S::IS_IN_PROCESS_LOG
            .then(|| timestamp::spawn(Arc::clone(&self.store), Arc::clone(&self.mutex), stop_rx));

        let mut registry = WorkerRegistry::new();

        while self.run_flag.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    let store = Arc::clone(&self.store);
                    let mutex = Arc::clone(&self.mutex);
                    let read_chunk = self.read_chunk;
                    registry.push(thread::spawn(move || {
                        connection::handle(store, mutex, stream, addr, read_chunk);
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    error!("failed to accept client: {}", e);
                    break;
                }
            }
        }

        info!("caught signal, exiting");
        registry.join_all();

        if let Some(handle) = timestamp_handle {
            let _ = stop_tx.send(());
            let _ = handle.join();
        }

        if S::IS_IN_PROCESS_LOG {
            if let Some(path) = &self.data_file {
                if let Err(e) = std::fs::remove_file(path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("failed to remove backing file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Ok(())
    }

    fn bind(&self) -> Result<TcpListener> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        if let Err(e) = socket.set_reuse_address(true) {
            warn!("failed to set SO_REUSEADDR: {}", e);
        }
        socket.bind(&addr.into())?;
        socket.listen(1)?;
        socket.set_nonblocking(true)?;
        Ok(socket.into())
    }
}
