//! Process-wide tracing setup and size-based rotation of `autograde.log`.
//!
//! Rotation scheme, newest first:
//!   autograde.log -> autograde.log.1 -> ... -> autograde.log.5 (dropped)

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use autograde_core::paths::log_path;

/// Rotate once the live log reaches this size (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated copies kept beside the live log.
pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log` when it has reached `max_bytes`. Returns whether it did.
/// A missing log is not an error.
pub fn rotate_if_needed(log: &Path, max_bytes: u64, keep: usize) -> io::Result<bool> {
    let size = match fs::metadata(log) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    let oldest = backup_path(log, keep);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..keep).rev() {
        let from = backup_path(log, n);
        if from.exists() {
            fs::rename(&from, backup_path(log, n + 1))?;
        }
    }
    fs::rename(log, backup_path(log, 1))?;
    Ok(true)
}

fn backup_path(log: &Path, n: usize) -> PathBuf {
    let mut name = log.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Install the global subscriber: human-readable output on stderr and,
/// when `marking_root` is given, plain lines appended to its
/// `autograde.log` (rotated first).
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug`
/// with `debug == true`. Calling twice is harmless.
pub fn init_tracing(marking_root: Option<&Path>, debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = marking_root.and_then(|root| {
        let path = log_path(root);
        if let Err(err) = rotate_if_needed(&path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
            eprintln!("warning: could not rotate {}: {err}", path.display());
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            ),
            Err(err) => {
                eprintln!("warning: could not open {}: {err}", path.display());
                None
            }
        }
    });

    let stderr_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}
