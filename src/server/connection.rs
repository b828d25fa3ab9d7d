//! Per-connection worker: read a newline-terminated command, commit or
//! seek it against the store, then stream the store's contents back.

use crate::error::{AesdError, Result};
use crate::server::seek;
use crate::store::{CommandStore, StoreHandle};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point spawned per accepted connection. Never panics on a
/// recoverable per-request error — those are logged and the connection is
/// simply closed; the accept loop keeps running regardless.
pub fn handle<S: CommandStore>(
    store: Arc<S>,
    mutex: Arc<Mutex<()>>,
    mut stream: TcpStream,
    addr: SocketAddr,
    read_chunk: usize,
) {
    info!("Accepted connection from {}", addr);

    if let Err(e) = serve(&store, &mutex, &mut stream, read_chunk) {
        if e.is_recoverable() {
            debug!("connection from {} ended without a response: {}", addr, e);
        } else {
            warn!("connection from {} failed: {}", addr, e);
        }
    }

    let _ = stream.shutdown(std::net::Shutdown::Both);
    info!("Closed connection from {}", addr);
}

fn serve<S: CommandStore>(
    store: &Arc<S>,
    mutex: &Mutex<()>,
    stream: &mut TcpStream,
    read_chunk: usize,
) -> Result<()> {
    let mut handle = S::open(store)?;
    let command = read_command(stream, read_chunk)?;

    if command.starts_with(seek::PREFIX) {
        let (cmd_index, byte_offset) = seek::parse(&command)?;
        handle.seek_to(cmd_index, byte_offset)?;
        return Ok(());
    }

    write_command(&mut handle, mutex, S::IS_IN_PROCESS_LOG, &command)?;
    reply(&mut handle, mutex, S::IS_IN_PROCESS_LOG, stream, read_chunk)
}

/// Grow a buffer by `read_chunk` bytes per recv until a newline appears in
/// the newly received region, or the peer closes (which, before a newline
/// is seen, means the request is abandoned).
fn read_command(stream: &mut TcpStream, read_chunk: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(read_chunk);
    let mut chunk = vec![0u8; read_chunk];

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(AesdError::PeerClosed);
        }
        let start = buffer.len();
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos + 1;
            buffer.truncate(end);
            return Ok(buffer);
        }
    }
}

fn write_command<H: StoreHandle>(
    handle: &mut H,
    mutex: &Mutex<()>,
    take_lock: bool,
    command: &[u8],
) -> Result<()> {
    let _guard = take_lock.then(|| mutex.lock());

    let mut written = 0;
    while written < command.len() {
        match handle.write(&command[written..])? {
            0 => break,
            n => written += n,
        }
    }
    Ok(())
}

fn reply<H: StoreHandle>(
    handle: &mut H,
    mutex: &Mutex<()>,
    take_lock: bool,
    stream: &mut TcpStream,
    read_chunk: usize,
) -> Result<()> {
    let _guard = take_lock.then(|| mutex.lock());

    handle.rewind()?;
    let mut buf = vec![0u8; read_chunk];
    loop {
        let n = handle.read(&mut buf)?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::device::Device;
    use std::io::{Read as _, Write as _};
    use std::net::{TcpListener, TcpStream};

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn test_echoes_cumulative_log_back_to_the_client() {
        let device = Device::<10>::new();
        let mutex = Arc::new(Mutex::new(()));
        let (mut client, mut server) = connected_pair();

        client.write_all(b"hello\n").unwrap();
        serve(&device, &mutex, &mut server, 512).unwrap();
        let mut out = [0u8; 16];
        let n = client.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"hello\n");

        let (mut client, mut server) = connected_pair();
        client.write_all(b"world\n").unwrap();
        serve(&device, &mutex, &mut server, 512).unwrap();
        let mut out = [0u8; 32];
        let n = client.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"hello\nworld\n");
    }

    #[test]
    fn test_seek_to_command_sends_no_response() {
        let device = Device::<10>::new();
        let mutex = Arc::new(Mutex::new(()));
        {
            let mut writer = Device::open(&device).unwrap();
            for i in 0..3u32 {
                crate::store::StoreHandle::write(&mut writer, format!("{i:04}\n").as_bytes()).unwrap();
            }
        }

        let (mut client, mut server) = connected_pair();
        client.write_all(b"AESDCHAR_IOCSEEKTO:1,2\n").unwrap();
        serve(&device, &mutex, &mut server, 512).unwrap();

        client.set_read_timeout(Some(std::time::Duration::from_millis(50))).unwrap();
        let mut out = [0u8; 4];
        let result = client.read(&mut out);
        assert!(result.is_err() || result.unwrap() == 0);
    }

    #[test]
    fn test_half_a_line_without_newline_is_abandoned() {
        let device = Device::<10>::new();
        let mutex = Arc::new(Mutex::new(()));
        let (mut client, mut server) = connected_pair();

        client.write_all(b"partial").unwrap();
        drop(client);

        let result = serve(&device, &mutex, &mut server, 512);
        assert!(matches!(result, Err(AesdError::PeerClosed)));
        assert!(device.is_empty());
    }
}
