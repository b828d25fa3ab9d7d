//! Command-line configuration

use clap::Parser;
use std::path::PathBuf;

/// Bounded command-log device with a TCP front-end
#[derive(Parser, Debug)]
#[command(name = "aesdsocket", version, about)]
pub struct Args {
    /// Daemonize after binding the listening socket
    #[arg(short = 'd', long)]
    pub daemonize: bool,

    /// TCP port to listen on
    #[arg(long, default_value_t = 9000)]
    pub port: u16,

    /// Ring capacity (max retained commands) for the in-process log
    #[arg(long, default_value_t = 10)]
    pub capacity: usize,

    /// Backing file path for the in-process log
    #[arg(long, default_value = "/var/tmp/aesdsocketdata")]
    pub data_file: PathBuf,

    /// Use an external character device as the store instead of the
    /// in-process log (mutually exclusive with --data-file/--capacity)
    #[arg(long, conflicts_with_all = ["data_file", "capacity"])]
    pub char_device: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to this file instead of stdout. Defaults to
    /// `/var/tmp/aesdsocket.log` when daemonizing, since a daemon's stdio
    /// is redirected to `/dev/null` and would otherwise lose every line.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Tracing filter directive implied by `-v`/`-q`.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// The log file to write to, if any: an explicit `--log-file`, or a
    /// fixed fallback path when daemonizing with none given.
    pub fn effective_log_file(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| self.daemonize.then(|| PathBuf::from("/var/tmp/aesdsocket.log")))
    }
}
