//! Tracing subscriber for the `bt-hwcfg` tool
//!
//! Console output goes to stderr so the tool's own stdout stays parseable.
//! Dependencies are held at `warn`; the configured level applies to this crate.

use crate::domain::settings::LogSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the non-blocking file writer flushing until dropped.
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

/// Filter directives for `level`: dependencies at `warn`, this crate at `level`.
fn default_directives(level: &str) -> String {
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level.to_lowercase())
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&settings.level)))
        .unwrap_or_else(|_| EnvFilter::new(default_directives("info")));

    let console_layer = settings.console_logging_enabled.then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_file(settings.show_file_line)
            .with_line_number(settings.show_file_line)
            .with_target(settings.show_target)
            .with_ansi(settings.ansi_colors)
    });

    let file_layer = if settings.file_logging_enabled {
        let appender = RollingFileAppender::new(
            parse_rotation(&settings.rotation),
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        // Files keep the module path and source line for post-mortems
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_target(true),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(level = %settings.level, "Logging initialized");

    Ok(LoggingGuard { _guards: guards })
}
