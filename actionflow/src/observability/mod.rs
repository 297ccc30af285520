//! Log output setup.
//!
//! The crate only emits `tracing` events and spans. Binaries call
//! [`init_tracing`] once; tests call [`init_test_tracing`] so output goes
//! through the test harness capture. Later calls return an error.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, otherwise `filter`.
fn env_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
}

/// Installs a formatted subscriber writing to stdout.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(filter))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

/// Installs a formatted subscriber that writes through the test writer.
pub fn init_test_tracing(filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_test_writer(),
        )
        .try_init()
}
