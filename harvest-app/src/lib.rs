//! Harvest application shell
//!
//! Wires configuration, the record store, the browser and the job queue into
//! an [`state::AppState`] and exposes the command surface used by the
//! `harvest` binary. Pipeline logic lives in the `crates/` directory.

pub mod commands;
pub mod error;
pub mod state;

pub use error::CommandError;
pub use state::{AppState, ScrapeJobRunner};

/// Initialize tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence; a second call is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,harvest=debug"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
