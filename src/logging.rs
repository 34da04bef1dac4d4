//! Logging prelude and subscriber setup
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Plan applied");
//! warn!("Lock reclaimed");
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber, writing to stderr
///
/// `RUST_LOG` wins when set; otherwise `default_level` (the config's
/// `logLevel`) applies:
///
/// ```bash
/// RUST_LOG=debug tplsync sync ./templates ./project
/// RUST_LOG=tplsync::lock=trace tplsync locks sweep
/// ```
pub fn init_tracing(default_level: &str) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
	// Keep a subscriber the embedding program already installed
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

// vim: ts=4
