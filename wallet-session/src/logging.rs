//! Tracing initialization for host applications.
//!
//! Library code only emits through `tracing`; hosts call [`init`] once at
//! startup to get structured output. Console logging is always on (filtered
//! by `RUST_LOG`, defaulting to crate-level info); setting `WALLET_LOG_DIR`
//! additionally writes a daily-rotated file with non-blocking writes.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system.
///
/// Returns the worker guard for the file appender when file logging is
/// enabled; hold onto it for the process lifetime or buffered log lines are
/// lost on exit. Calling `init` more than once is a no-op.
pub fn init() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wallet_session=info,warn"));

    let stdout_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match std::env::var("WALLET_LOG_DIR") {
        Ok(dir) => {
            if let Err(err) = std::fs::create_dir_all(&dir) {
                eprintln!("Warning: failed to create log directory: {err}");
                let _ = registry.try_init();
                return None;
            }
            let appender = tracing_appender::rolling::daily(&dir, "wallet-session.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false);
            let _ = registry.with(file_layer).try_init();
            Some(guard)
        }
        Err(_) => {
            let _ = registry.try_init();
            None
        }
    }
}
