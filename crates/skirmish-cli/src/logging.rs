use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::Context;
use time::UtcOffset;
use time::format_description;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

/// Log to stderr and append to `log_file`. Level from `RUST_LOG`, else `info`.
///
/// Must run before the runtime starts: the local offset can only be read
/// while the process is single-threaded.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    let file = open_log_file(log_file)?;
    let writer = BoxMakeWriter::new(std::io::stderr.and(file));

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")?,
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install the tracing subscriber: {e}"))
}

/// Earlier runs stay in the file; every command appends to it.
fn open_log_file(log_file: &Path) -> anyhow::Result<File> {
    if let Some(dir) = log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("cannot open log file {}", log_file.display()))
}
