use tracing_subscriber::EnvFilter;

/// Initialize a tracing subscriber that writes through the test harness.
/// Safe to call from every test; only the first call installs it.
/// Respects `RUST_LOG`, defaults to "info".
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
