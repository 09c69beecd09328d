use tracing_subscriber::EnvFilter;

/// Install a process-wide `tracing` subscriber reading its level filter from
/// `RUST_LOG`, defaulting to `info` when unset. Call once from each binary's
/// `main`.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
