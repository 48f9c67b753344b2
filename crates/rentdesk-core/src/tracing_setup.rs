use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::LOG_FILE_ENV;

pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Install the global subscriber. `RUST_LOG` overrides `default_directive`.
///
/// Setting `RENTDESK_LOG_FILE` adds a debug-level file layer. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_tracing_with_default(default_directive: &str) {
    let file_logging = std::env::var(LOG_FILE_ENV).ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = file_logging.as_deref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    let result = match file {
        Some(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);
            registry.with(file_layer).try_init()
        }
        None => registry.try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
