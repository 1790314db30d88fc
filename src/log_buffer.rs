//! A capped in-memory ring buffer of recent log lines, submitted to the
//! deployment server by `UploadLog`.
//!
//! Wraps the same `env_logger` formatting the agent already emits to
//! stderr, mirroring the memory-logging idiom (start memory logging once,
//! fetch a snapshot on demand) rather than maintaining a second, separate
//! logging pipeline.

use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

const CAPACITY: usize = 500;

static BUFFER: Lazy<Mutex<VecDeque<String>>> =
    Lazy::new(|| Mutex::new(VecDeque::with_capacity(CAPACITY)));

struct MemoryLogger {
    inner: env_logger::Logger,
}

impl log::Log for MemoryLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let line = format!(
                "{} {} {} {}",
                record.level(),
                record.target(),
                record.args(),
                chrono::Utc::now().to_rfc3339()
            );
            let mut buf = BUFFER.lock().unwrap();
            if buf.len() >= CAPACITY {
                buf.pop_front();
            }
            buf.push_back(line);
        }
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the process-wide logger. Must be called exactly once, early in
/// `main`. `module` and `level`, when given, set the default filter for
/// that module's crate (overridable, as usual, via `RUST_LOG`).
pub fn init(level: log::LevelFilter, module: Option<&str>) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp(None).format_module_path(false);
    if let Some(module) = module {
        builder.filter(Some(module), level);
    } else {
        builder.filter_level(level);
    }
    let inner = builder.build();
    let max_level = inner.filter();
    log::set_boxed_logger(Box::new(MemoryLogger { inner }))
        .map(|()| log::set_max_level(max_level))
        .map_err(|e| anyhow::anyhow!(e))
}

/// Snapshot of the most recent (up to [`CAPACITY`]) log lines, oldest
/// first.
pub fn snapshot() -> Vec<String> {
    BUFFER.lock().unwrap().iter().cloned().collect()
}
