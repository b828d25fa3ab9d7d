//! aesdsocket - bounded command-log device with a TCP front-end

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aesdsocket::config::Args;
use aesdsocket::ring::DEFAULT_CAPACITY;
use aesdsocket::server::Server;
use aesdsocket::store::device::Device;

fn main() -> Result<()> {
    let args = Args::parse();

    if args.daemonize {
        daemonize()?;
    }

    init_logging(&args)?;

    let run_flag = Arc::new(AtomicBool::new(true));
    install_signal_handlers(Arc::clone(&run_flag))?;

    match &args.char_device {
        Some(path) => run_char_device(&args, path, run_flag),
        None => run_in_process_log(&args, run_flag),
    }
}

#[cfg(unix)]
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    Daemonize::new()
        .working_directory("/")
        .start()
        .context("failed to daemonize")
}

#[cfg(not(unix))]
fn daemonize() -> Result<()> {
    bail!("daemonization is only supported on unix targets");
}

fn install_signal_handlers(run_flag: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        run_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install signal handlers")
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if let Some(log_file) = args.effective_log_file() {
        let file = std::fs::File::create(&log_file)
            .with_context(|| format!("failed to create log file {}", log_file.display()))?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

fn run_in_process_log(args: &Args, run_flag: Arc<AtomicBool>) -> Result<()> {
    if args.capacity != DEFAULT_CAPACITY {
        bail!(
            "--capacity {} requested, but this build's ring capacity is fixed at compile time \
             (CAPACITY = {DEFAULT_CAPACITY}); rebuild with a different RingLog<CAPACITY> to change it",
            args.capacity
        );
    }

    std::fs::File::create(&args.data_file)
        .with_context(|| format!("failed to create backing file {}", args.data_file.display()))?;

    let store = Device::<DEFAULT_CAPACITY>::new();
    let server = Server::new(store, args.port, run_flag, Some(args.data_file.clone()));

    info!("using in-process log, capacity {DEFAULT_CAPACITY}, backing file {}", args.data_file.display());

    if let Err(e) = server.run() {
        error!("server exited with error: {}", e);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn run_char_device(args: &Args, path: &std::path::Path, run_flag: Arc<AtomicBool>) -> Result<()> {
    use aesdsocket::store::char_device::CharDeviceStore;

    let store = CharDeviceStore::new(path);
    let server = Server::new(store, args.port, run_flag, None);

    info!("using external character device {}", path.display());

    if let Err(e) = server.run() {
        error!("server exited with error: {}", e);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run_char_device(_args: &Args, _path: &std::path::Path, _run_flag: Arc<AtomicBool>) -> Result<()> {
    bail!("--char-device is only supported on Linux targets");
}
