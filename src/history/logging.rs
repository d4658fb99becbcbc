//! Tracing setup shared by the binary and embedding applications.

use tracing_subscriber::EnvFilter;

/// Initialize a formatted subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Calling it more than once is harmless; later calls keep the first subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
