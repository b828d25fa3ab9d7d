//! The in-process, `RingLog`-backed command store.

use crate::error::{AesdError, Result};
use crate::ring::{Record, RingLog, DEFAULT_CAPACITY};
use crate::store::{CommandStore, StoreHandle};
use parking_lot::RwLock;
use std::io::SeekFrom;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared state: a `RingLog` behind a reader-writer lock.
///
/// `read`, `seek` and `seek_to` take the read side; a write's commit step
/// takes the write side. Many readers may hold the read side concurrently;
/// the write side is exclusive.
pub struct Device<const CAPACITY: usize = DEFAULT_CAPACITY> {
    ring: RwLock<RingLog<CAPACITY>>,
}

impl<const CAPACITY: usize> Device<CAPACITY> {
    /// Create a new, empty device.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ring: RwLock::new(RingLog::new()),
        })
    }

    /// Total bytes currently retained across all committed commands.
    pub fn len(&self) -> usize {
        self.ring.read().len()
    }

    /// Whether the device currently retains no commands.
    pub fn is_empty(&self) -> bool {
        self.ring.read().is_empty()
    }
}

impl<const CAPACITY: usize> CommandStore for Device<CAPACITY> {
    type Handle = DeviceHandle<CAPACITY>;
    const IS_IN_PROCESS_LOG: bool = true;

    fn open(store: &Arc<Self>) -> Result<Self::Handle> {
        debug!("device open");
        Ok(DeviceHandle {
            device: Arc::clone(store),
            assembly: Vec::new(),
            cursor: 0,
        })
    }
}

/// Per-open state: the shared device plus this open's assembly buffer and
/// read/seek cursor. Writes from distinct opens never mix because each
/// handle owns its own `assembly`.
pub struct DeviceHandle<const CAPACITY: usize = DEFAULT_CAPACITY> {
    device: Arc<Device<CAPACITY>>,
    assembly: Vec<u8>,
    cursor: usize,
}

impl<const CAPACITY: usize> DeviceHandle<CAPACITY> {
    /// Bytes currently accumulated in the assembly buffer, not yet
    /// committed (no trailing newline seen yet).
    pub fn pending(&self) -> &[u8] {
        &self.assembly
    }
}

impl<const CAPACITY: usize> StoreHandle for DeviceHandle<CAPACITY> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // Idle -> Accumulating: append to the per-open assembly buffer.
        let prev_len = self.assembly.len();
        self.assembly.try_reserve(buf.len()).map_err(|_| AesdError::OutOfMemory)?;
        self.assembly.extend_from_slice(buf);

        let Some(nl) = buf.iter().position(|&b| b == b'\n') else {
            // No newline yet: still Accumulating, whole buffer accepted.
            return Ok(buf.len());
        };
        let newline_abs = prev_len + nl;

        if newline_abs + 1 != self.assembly.len() {
            debug!("discarding {} trailing byte(s) after command terminator", self.assembly.len() - newline_abs - 1);
        }
        self.assembly.truncate(newline_abs + 1);

        // Accumulating -> Idle: commit to the ring under the write lock.
        let committed = Record::new(std::mem::take(&mut self.assembly));
        let evicted = self.device.ring.write().append(committed);
        drop(evicted); // caller-owned buffer; dropping frees it

        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let ring = self.device.ring.read();
        let mut copied = 0;
        while copied < buf.len() {
            let Some((record, within)) = ring.find_by_offset(self.cursor) else {
                break;
            };
            let available = record.size() - within;
            let space = buf.len() - copied;
            let n = available.min(space);
            buf[copied..copied + n].copy_from_slice(&record.as_bytes()[within..within + n]);
            copied += n;
            self.cursor += n;
        }
        Ok(copied)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let ring = self.device.ring.read();
        let size = ring.len() as i64;
        let current = self.cursor as i64;
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => current + offset,
            SeekFrom::End(offset) => size + offset,
        };
        if new_pos < 0 || new_pos > size {
            return Err(AesdError::invalid(format!(
                "seek target {new_pos} out of range [0, {size}]"
            )));
        }
        self.cursor = new_pos as usize;
        Ok(self.cursor as u64)
    }

    fn seek_to(&mut self, cmd_index: u32, byte_offset: u32) -> Result<u64> {
        let ring = self.device.ring.read();
        let Some((record, prefix)) = ring.get_by_index(cmd_index as usize) else {
            return Err(AesdError::invalid(format!("no command at index {cmd_index}")));
        };
        if byte_offset as usize >= record.size() {
            return Err(AesdError::invalid(format!(
                "byte offset {byte_offset} out of range for command {cmd_index} (size {})",
                record.size()
            )));
        }
        self.cursor = prefix + byte_offset as usize;
        Ok(self.cursor as u64)
    }
}

impl<const CAPACITY: usize> Drop for DeviceHandle<CAPACITY> {
    fn drop(&mut self) {
        if !self.assembly.is_empty() {
            warn!(
                "discarding {} byte(s) of unterminated command on release",
                self.assembly.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> DeviceHandle<10> {
        let device = Device::<10>::new();
        Device::open(&device).unwrap()
    }

    #[test]
    fn test_round_trip_single_command() {
        let mut h = handle();
        let b = b"hello world\n";
        assert_eq!(h.write(b).unwrap(), b.len());
        h.rewind().unwrap();
        let mut out = vec![0u8; b.len()];
        assert_eq!(h.read(&mut out).unwrap(), b.len());
        assert_eq!(&out, b);
    }

    #[test]
    fn test_framing_across_partial_writes_commits_once() {
        let mut h = handle();
        h.write(b"A").unwrap();
        h.write(b"B").unwrap();
        h.write(b"C\n").unwrap();
        h.rewind().unwrap();
        let mut out = vec![0u8; 4];
        let n = h.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"ABC\n");
    }

    #[test]
    fn test_newline_discards_trailing_bytes_in_same_write() {
        let mut h = handle();
        h.write(b"X\nY").unwrap();
        h.rewind().unwrap();
        let mut out = vec![0u8; 16];
        let n = h.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"X\n");
        assert_eq!(h.pending(), b"");
    }

    #[test]
    fn test_eviction_keeps_only_most_recent_capacity_commands() {
        let device = Device::<10>::new();
        let mut writer = Device::open(&device).unwrap();
        for i in 0..=10u32 {
            writer.write(format!("R{i}\n").as_bytes()).unwrap();
        }
        let mut reader = Device::open(&device).unwrap();
        reader.rewind().unwrap();
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        let expected: String = (1..=10).map(|i| format!("R{i}\n")).collect();
        assert_eq!(out, expected.as_bytes());
    }

    #[test]
    fn test_seek_to_positions_at_command_and_offset() {
        let device = Device::<10>::new();
        let mut writer = Device::open(&device).unwrap();
        for i in 0..10u32 {
            writer.write(format!("{i:04}\n").as_bytes()).unwrap(); // 5 bytes each
        }
        let mut reader = Device::open(&device).unwrap();
        let pos = reader.seek_to(2, 3).unwrap();
        assert_eq!(pos, 2 * 5 + 3);
        let mut out = [0u8; 2];
        let n = reader.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"2\n");
    }

    #[test]
    fn test_seek_to_rejects_out_of_range() {
        let device = Device::<10>::new();
        let mut writer = Device::open(&device).unwrap();
        writer.write(b"hi\n").unwrap();
        let mut reader = Device::open(&device).unwrap();
        assert!(reader.seek_to(5, 0).is_err());
        assert!(reader.seek_to(0, 10).is_err());
    }

    #[test]
    fn test_seek_whence_variants() {
        let device = Device::<10>::new();
        let mut writer = Device::open(&device).unwrap();
        writer.write(b"0123456789\n").unwrap();
        let mut h = Device::open(&device).unwrap();
        assert_eq!(h.seek(SeekFrom::Start(3)).unwrap(), 3);
        assert_eq!(h.seek(SeekFrom::Current(2)).unwrap(), 5);
        assert_eq!(h.seek(SeekFrom::End(0)).unwrap(), 11);
        assert!(h.seek(SeekFrom::End(1)).is_err());
        assert!(h.seek(SeekFrom::Start(1000)).is_err());
    }
}
