//! The byte-addressable sink the server writes commands to and reads
//! responses from.
//!
//! Two implementations share this interface: [`device::Device`], the
//! in-process [`crate::ring::RingLog`]-backed store, and
//! [`char_device::CharDeviceStore`], a thin wrapper over an external
//! character device that performs its own synchronization. The server is
//! generic over [`CommandStore`] so the accept loop and worker logic are
//! shared between both backends.

pub mod char_device;
pub mod device;

use crate::error::Result;
use std::io::SeekFrom;
use std::sync::Arc;

/// A store's notion of a single open handle: owns whatever per-open state
/// the backend needs (an assembly buffer, a read/write cursor, an open fd).
pub trait StoreHandle: Send {
    /// Append `buf`. Returns the number of bytes accepted (always
    /// `buf.len()` on success — a short count only ever signals a hard
    /// error on the underlying transport, per `std::io::Write`).
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Read from the handle's current position, advancing it by the number
    /// of bytes copied. Returns `0` at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reposition the handle's cursor; mirrors POSIX `lseek` whence
    /// semantics via [`SeekFrom`].
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Position the cursor at the start of the `cmd_index`-th retained
    /// command, plus `byte_offset` bytes into it.
    fn seek_to(&mut self, cmd_index: u32, byte_offset: u32) -> Result<u64>;

    /// Convenience: seek back to the start of the stream.
    fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

/// A backing store the server can open handles against.
///
/// `open` takes `&Arc<Self>` rather than `&self` so that handles which need
/// to outlive the call (the in-process [`device::Device`]) can clone a
/// persistent reference; backends that don't need one simply ignore it.
pub trait CommandStore: Send + Sync + Sized {
    /// Per-open handle type for this store.
    type Handle: StoreHandle;

    /// Whether this store is the in-process `RingLog`-backed device, as
    /// opposed to an external device that serializes itself. Governs both
    /// whether the server takes its own cross-worker mutex around
    /// append+readback, and whether the periodic timestamp task and the
    /// backing-file lifecycle (§6) apply.
    const IS_IN_PROCESS_LOG: bool;

    /// Open a new handle against this store.
    fn open(store: &Arc<Self>) -> Result<Self::Handle>;
}
