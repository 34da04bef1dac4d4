//! Progress events for detect/classify/execute runs
//!
//! Components emit discrete [`ProgressEvent`]s through a [`ProgressReporter`].
//! A caller that wants them takes the receiver from [`ProgressReporter::channel`];
//! everyone else uses the disabled reporter and events are dropped.

pub mod constants;

use std::io::Write;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;

use crate::executor::OperationStatus;

pub use constants::*;

/// Top-level phases of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
	Detecting,
	Classifying,
	Executing,
	Baseline,
}

impl std::fmt::Display for SyncPhase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SyncPhase::Detecting => write!(f, "detect"),
			SyncPhase::Classifying => write!(f, "classify"),
			SyncPhase::Executing => write!(f, "execute"),
			SyncPhase::Baseline => write!(f, "baseline"),
		}
	}
}

/// Which tree a scan event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
	Source,
	Destination,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
	PhaseStarted { phase: SyncPhase },
	PhaseFinished { phase: SyncPhase, elapsed_ms: u64 },
	FilesScanned { side: Side, count: usize },
	PathsCompared { count: usize },
	ChangesClassified { count: usize, renames: usize, conflicts: usize },
	OperationCompleted {
		index: usize,
		total: usize,
		path: String,
		status: OperationStatus,
		bytes: u64,
	},
}

/// Optional sender half of the progress channel
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
	tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
	/// Reporter that drops every event
	pub fn disabled() -> Self {
		Self { tx: None }
	}

	/// Reporter plus the receiver its events arrive on
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx: Some(tx) }, rx)
	}

	pub fn is_enabled(&self) -> bool {
		self.tx.is_some()
	}

	/// Send an event; a dropped receiver is not an error
	pub fn emit(&self, event: ProgressEvent) {
		if let Some(tx) = &self.tx {
			let _ = tx.send(event);
		}
	}
}

/// Drain events and render them on stderr until the channel closes
pub async fn render_to_stderr(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
	let mut last_update = Instant::now();
	let mut scanned = [0usize; 2];

	while let Some(event) = rx.recv().await {
		match event {
			ProgressEvent::PhaseStarted { phase } => {
				info!("→ {} phase...", phase);
			}
			ProgressEvent::PhaseFinished { phase, elapsed_ms } => {
				if matches!(phase, SyncPhase::Detecting) {
					let _ = writeln!(std::io::stderr());
				}
				info!("✓ {} phase done in {}ms", phase, elapsed_ms);
			}
			ProgressEvent::FilesScanned { side, count } => {
				let idx = match side {
					Side::Source => 0,
					Side::Destination => 1,
				};
				scanned[idx] = count;
				if last_update.elapsed().as_millis() < UPDATE_THROTTLE_MS {
					continue;
				}
				last_update = Instant::now();
				let _ = write!(
					std::io::stderr(),
					"\r  Scanning: source {}f | destination {}f",
					scanned[0],
					scanned[1]
				);
				let _ = std::io::stderr().flush();
			}
			ProgressEvent::PathsCompared { .. } => {}
			ProgressEvent::ChangesClassified { count, renames, conflicts } => {
				info!("{} change(s), {} rename(s), {} conflict(s)", count, renames, conflicts);
			}
			ProgressEvent::OperationCompleted { index, total, path, status, bytes } => {
				info!(
					"[{}/{}] {} {} ({:.2} MB)",
					index + 1,
					total,
					status,
					path,
					bytes as f64 / BYTES_PER_MB
				);
			}
		}
	}
}


// vim: ts=4
