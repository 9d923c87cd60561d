use std::path::PathBuf;

use butler::infrastructure::environment::{self, optional_env_var, parse_env_var};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "warn,butler=info";
const LOG_FILE_PREFIX: &str = "butler.log";

/// Loads `.env` and installs the global subscriber.
///
/// The returned guard flushes the log file on drop and must live until shutdown.
pub fn init_logger() -> Option<WorkerGuard> {
    let env_file = load_env_file();
    let guard = init_tracing();
    info!("Starting Butler...");
    log_env_file_result(env_file);
    guard
}

fn use_ansi() -> bool {
    !matches!(
        optional_env_var(environment::LOG_STYLE).as_deref(),
        Some("never")
    )
}

fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env(environment::LOG_LEVEL)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let show_source = parse_env_var::<bool>(environment::LOG_PATH).unwrap_or(false);

    let console = fmt::layer()
        .with_ansi(use_ansi())
        .with_file(show_source)
        .with_line_number(show_source);

    let (file, guard) = match optional_env_var(environment::LOG_DIRECTORY) {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_file(show_source)
                .with_line_number(show_source)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    guard
}

fn load_env_file() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

fn log_env_file_result(env_file: Option<PathBuf>) {
    if let Some(path) = env_file {
        info!("Loaded environment variables from {}", path.display());
    } else {
        info!("No .env file found, proceeding with system environment variables.");
    }
}
