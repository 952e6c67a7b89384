use std::{fs, path::Path};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::LineFormatter;
pub use writer::BoundedFileWriter;

use crate::configs::LoggingConfig;

/// Builds the filter directive string from config: `<level>[,<filters>]`.
pub fn filter_directives(config: Option<&LoggingConfig>) -> String {
    let level = config.and_then(|l| l.level.as_deref()).unwrap_or("info");
    let filters = config.and_then(|l| l.filters.as_deref()).unwrap_or("");

    if filters.is_empty() {
        format!("{level},tower_http=warn")
    } else {
        format!("{level},tower_http=warn,{filters}")
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init(config: Option<&LoggingConfig>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let stdout_layer = fmt::layer()
        .event_format(LineFormatter::new(true))
        .with_ansi(true);

    let file_layer = config.and_then(|l| l.file.as_ref()).map(|file| {
        if let Some(parent) = Path::new(&file.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {e}");
            }
        }

        fmt::layer()
            .with_writer(BoundedFileWriter::new(file.path.clone(), file.max_lines))
            .event_format(LineFormatter::new(false))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
