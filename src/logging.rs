//! Logging initialization.
//!
//! Two sinks: a `tracing-subscriber` fmt layer on stderr filtered by
//! `RUST_LOG` (default `info`), and a plain append-only log file at
//! `{base}/bootstrap.log` so failed runs leave a trail even when the
//! terminal output is gone. The file sink receives everything at `info`
//! and above regardless of the stderr filter.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Set up the global subscriber. Safe to call more than once; later calls
/// are no-ops (tests share one process).
pub fn init(log_path: &Path) -> anyhow::Result<()> {
    build_subscriber(log_path)?.try_init().ok();
    Ok(())
}

/// Assemble the layered subscriber without installing it.
///
/// The `RUST_LOG` filter applies only to the stderr layer. The file layer
/// stays unfiltered so a quiet terminal run still leaves a full trail in
/// the log file; it enforces its own `info`-and-above cutoff.
fn build_subscriber(log_path: &Path) -> anyhow::Result<impl Subscriber + Send + Sync + use<>> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    Ok(tracing_subscriber::registry()
        .with(stderr_layer)
        .with(FileLogLayer { file: Mutex::new(file) }))
}

/// Appends `[timestamp] [LEVEL] message` lines to the bootstrap log file.
struct FileLogLayer {
    file: Mutex<File>,
}

impl<S: Subscriber> Layer<S> for FileLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > Level::INFO {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if visitor.message.is_empty() {
            return;
        }

        let line = format!(
            "[{}] [{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level(),
            visitor.message
        );
        // Logging must never take the process down; drop the line on
        // contention or I/O failure.
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Captures the `message` field of an event, ignoring structured extras.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}
