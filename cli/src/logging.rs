//! Logging initialization.
//!
//! stdout carries the protocol, so logs go to stderr or the requested log
//! file, never stdout. The env filter sits behind a reload handle owned by
//! [`LogControl`] so the `set-debug` verb can flip verbosity at runtime.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};

use csense_core::LogSwitch;

/// Handle on the active log configuration, passed to the dispatcher.
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogSwitch for LogControl {
    fn set_debug(&mut self, on: bool) {
        let directive = if on { "debug" } else { "info" };
        if let Err(err) = self.handle.reload(EnvFilter::new(directive)) {
            tracing::warn!(%err, "Failed to reload log filter");
        }
    }
}

pub fn init(debug: bool, log_file: Option<&Path>) -> Result<LogControl> {
    let default_directive = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let (filter, handle) = reload::Layer::new(filter);

    let registry = tracing_subscriber::registry().with(filter);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => {
            registry
                .with(fmt::layer().with_ansi(false).with_writer(io::stderr))
                .init();
        }
    }

    Ok(LogControl { handle })
}
