//! Tracing setup: a per-instance log file plus an optional console layer.
//!
//! The wire log (every inbound line, every `→ `-prefixed outbound line)
//! lands in the file. The console layer goes to stderr and is left out in
//! terminal-UI mode, where the TUI owns the tty.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub fn init(log_path: &Path, console: bool) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Arc::new(file));
    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if console {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry.init();
    }
    Ok(())
}
