//! The external character-device backend.
//!
//! Wraps an already-provisioned character device (e.g. `/dev/aesdchar`,
//! backed by the companion kernel module kept as reference material at
//! `examples/original_source/aesd-char-driver/`) that performs its own
//! command framing and synchronization. From the server's point of view
//! this has identical read/write/seek semantics to [`super::device::Device`];
//! the only difference is that no server-side mutex is taken around it
//! (`IS_IN_PROCESS_LOG = false`) and the seek-to control reaches the
//! device through a Linux `ioctl` rather than an in-process method call.

use crate::error::{AesdError, Result};
use crate::store::{CommandStore, StoreHandle};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// `struct aesd_seekto`, the two fields an `AESDCHAR_IOCSEEKTO` control call
/// carries. The retained pack material (`aesd-char-driver/main.c`,
/// `aesdchar.h`, `aesd-circular-buffer.c`) has no `unlocked_ioctl` handler
/// and no `aesd_ioctl.h`, so this layout and the request code below are not
/// grounded on anything in the pack — they're reconstructed from the
/// publicly documented cu-ecen-aeld assignment driver, outside this corpus.
#[repr(C)]
struct SeekTo {
    write_cmd: u32,
    write_cmd_offset: u32,
}

/// `AESDCHAR_IOCSEEKTO` is `_IOWR(0x16, 1, struct aesd_seekto)` in the
/// cu-ecen-aeld reference driver this backend targets: magic `0x16`,
/// direction read+write, not derivable from anything retained in the pack.
const AESD_IOC_MAGIC: u8 = 0x16;
const AESDCHAR_IOCSEEKTO_NR: u8 = 1;

fn aesdchar_iocseekto() -> libc::c_ulong {
    const SIZE: usize = std::mem::size_of::<SeekTo>();
    // Mirrors the kernel's _IOWR macro: dir(2) | size(14) | type(8) | nr(8).
    const IOC_READ: libc::c_ulong = 2;
    const IOC_WRITE: libc::c_ulong = 1;
    const IOC_RDWR: libc::c_ulong = IOC_READ | IOC_WRITE;
    (IOC_RDWR << 30)
        | ((SIZE as libc::c_ulong) << 16)
        | ((AESD_IOC_MAGIC as libc::c_ulong) << 8)
        | (AESDCHAR_IOCSEEKTO_NR as libc::c_ulong)
}

/// A store backed by an already-provisioned character device node.
pub struct CharDeviceStore {
    path: PathBuf,
}

impl CharDeviceStore {
    /// Reference the device node at `path`. Nothing is opened until a
    /// handle is created.
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { path: path.into() })
    }
}

impl CommandStore for CharDeviceStore {
    type Handle = CharDeviceHandle;
    const IS_IN_PROCESS_LOG: bool = false;

    fn open(store: &Arc<Self>) -> Result<Self::Handle> {
        let file = OpenOptions::new().read(true).write(true).open(&store.path)?;
        Ok(CharDeviceHandle { file })
    }
}

/// A single open file descriptor against the character device.
pub struct CharDeviceHandle {
    file: File,
}

impl StoreHandle for CharDeviceHandle {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.file.write(buf)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.file.seek(pos)?)
    }

    #[cfg(target_os = "linux")]
    fn seek_to(&mut self, cmd_index: u32, byte_offset: u32) -> Result<u64> {
        use std::os::unix::io::AsRawFd;

        let seekto = SeekTo {
            write_cmd: cmd_index,
            write_cmd_offset: byte_offset,
        };
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                aesdchar_iocseekto(),
                &seekto as *const SeekTo,
            )
        };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return Err(if err.kind() == std::io::ErrorKind::Interrupted {
                AesdError::Interrupted
            } else {
                AesdError::invalid(format!("seek_to ioctl failed: {err}"))
            });
        }
        // The driver repositions the fd's own offset; report it back.
        Ok(self.file.stream_position()?)
    }

    #[cfg(not(target_os = "linux"))]
    fn seek_to(&mut self, _cmd_index: u32, _byte_offset: u32) -> Result<u64> {
        Err(AesdError::UnknownControl(
            "AESDCHAR_IOCSEEKTO is only available on Linux".into(),
        ))
    }
}
