//! Tracing setup.
//!
//! The REPL logs to a file so the console stays clean; the HTTP server logs
//! to stderr. File logs rotate on every start.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "relay.log";

/// Previous runs' logs kept next to the live one.
const KEEP_GENERATIONS: u32 = 3;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Rotated `relay.log` in the data directory.
    File,
    /// Standard error, for the long-running HTTP server.
    Stderr,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Returns the live log file when logging to a file.
pub fn init_tracing(target: LogTarget, format: LogFormat) -> std::io::Result<Option<PathBuf>> {
    let log_path = match target {
        LogTarget::Stderr => {
            install(std::io::stderr, format, true);
            None
        }
        LogTarget::File => {
            let dir = crate::data_dir();
            std::fs::create_dir_all(&dir)?;
            let log = LogGenerations::new(dir.join(LOG_FILE_NAME), KEEP_GENERATIONS);
            log.rotate();
            // `File` writes are unbuffered, so each event reaches the OS
            // as soon as it is formatted.
            install(Mutex::new(log.open_live()?), format, false);
            Some(log.live().to_path_buf())
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.as_deref().map_or("stderr".into(), |p| p.display().to_string()),
        pid = std::process::id(),
        "=== mcp-relay starting ==="
    );
    Ok(log_path)
}

fn install<W>(writer: W, format: LogFormat, ansi: bool)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mcp_relay=info,warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// A live log file plus numbered copies from earlier runs
/// (`relay.log.1` is the most recent).
#[derive(Debug, Clone)]
struct LogGenerations {
    live: PathBuf,
    keep: u32,
}

impl LogGenerations {
    fn new(live: PathBuf, keep: u32) -> Self {
        Self { live, keep }
    }

    fn live(&self) -> &Path {
        &self.live
    }

    fn generation(&self, n: u32) -> PathBuf {
        let mut name = self.live.clone().into_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    /// Age every file by one generation, dropping the one that falls off
    /// the end. Gaps in the chain are fine.
    fn rotate(&self) {
        if self.keep == 0 {
            let _ = std::fs::remove_file(&self.live);
            return;
        }
        let _ = std::fs::remove_file(self.generation(self.keep));
        for n in (1..self.keep).rev() {
            let _ = std::fs::rename(self.generation(n), self.generation(n + 1));
        }
        let _ = std::fs::rename(&self.live, self.generation(1));
    }

    fn open_live(&self) -> std::io::Result<File> {
        OpenOptions::new().create(true).append(true).open(&self.live)
    }
}
