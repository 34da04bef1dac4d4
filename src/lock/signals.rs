//! Signal handlers that release held locks before exiting

use tracing::{debug, warn};

use super::FileLockManager;

/// Release every lock held by `manager` on SIGINT/SIGTERM, then exit
#[cfg(unix)]
pub fn setup_signal_handlers(manager: FileLockManager) {
	tokio::spawn(async move {
		use tokio::signal;

		let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGTERM handler: {}. Locks will not be released on SIGTERM.", e);
				return;
			}
		};

		let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGINT handler: {}. Locks will not be released on SIGINT.", e);
				return;
			}
		};

		let code = tokio::select! {
			_ = sigterm.recv() => {
				debug!("Received SIGTERM, releasing locks...");
				143 // 128 + SIGTERM(15)
			}
			_ = sigint.recv() => {
				debug!("Received SIGINT, releasing locks...");
				130 // 128 + SIGINT(2)
			}
		};
		let released = manager.release_all();
		debug!("Released {} lock(s) on shutdown", released);
		std::process::exit(code);
	});
}

#[cfg(not(unix))]
pub fn setup_signal_handlers(manager: FileLockManager) {
	tokio::spawn(async move {
		if let Err(e) = tokio::signal::ctrl_c().await {
			warn!("Failed to setup Ctrl-C handler: {}", e);
			return;
		}
		let released = manager.release_all();
		debug!("Released {} lock(s) on shutdown", released);
		std::process::exit(130);
	});
}

// vim: ts=4
