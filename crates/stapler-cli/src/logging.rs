use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Set up tracing for stdout and file logging. The returned guard flushes
/// the non-blocking file writer on drop and must stay alive for the whole
/// run.
pub fn init_logger() -> impl Drop {
    // Tracing level comes from `TRACING_LEVEL`, defaulting to `info`.
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    // Log file path comes from `LOG_FILE_PATH`.
    let log_file_path =
        env::var("LOG_FILE_PATH").unwrap_or_else(|_| "./logs/stapler.log".to_string());

    let file_appender = tracing_appender::rolling::never("./", log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(false)
                .pretty()
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                // No ANSI escape codes in the file logger.
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    guard
}
