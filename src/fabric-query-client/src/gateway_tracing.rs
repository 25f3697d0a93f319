use std::{
    fs::{self, File},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

pub const DEFAULT_STDOUT_FILTER: &str = concat!(
    env!("CARGO_CRATE_NAME"),
    "=info,chaincode_utils=info,fabric_identity=info"
);
pub const DEFAULT_FILE_FILTER: &str = concat!(
    env!("CARGO_CRATE_NAME"),
    "=trace,chaincode_utils=trace,fabric_identity=trace"
);

pub struct InitTracingResult {
    /// keeps the file writer alive, dropping it flushes the pending traces
    pub guard: Option<WorkerGuard>,
}

/// Logs to stdout and, when `trace_dir` is set, as JSON to a new file in that directory.
pub fn init_tracing(trace_dir: Option<&str>) -> Result<InitTracingResult, String> {
    let env_filter_stdout = EnvFilter::builder()
        .with_env_var("RUST_LOG_STDOUT")
        .try_from_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_STDOUT_FILTER));
    let stdout_tracing_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_filter(env_filter_stdout);

    let (file_tracing_layer, guard) = match trace_dir {
        Some(trace_dir) => {
            if !Path::new(trace_dir).is_dir() {
                fs::create_dir_all(trace_dir).map_err(|e| e.to_string())?;
            }

            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| e.to_string())?;
            let filename =
                Path::new(trace_dir).join(format!("query_{:?}.log", timestamp.as_millis()));

            println!("Tracing to file: {}", filename.display());

            let log_file = File::create(filename).map_err(|e| e.to_string())?;
            let (non_blocking_file, guard_file) = tracing_appender::non_blocking(log_file);

            let env_filter_file = EnvFilter::builder()
                .with_env_var("RUST_LOG_FILE")
                .try_from_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_FILTER));
            let file_tracing_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_thread_ids(true)
                .with_filter(env_filter_file);

            (Some(file_tracing_layer), Some(guard_file))
        },
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(stdout_tracing_layer)
        .with(file_tracing_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(|e| e.to_string())?;

    Ok(InitTracingResult { guard })
}
