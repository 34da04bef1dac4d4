//! # tplsync - Template Asset Propagation
//!
//! tplsync pushes a template tree (commands, agents, settings, docs) into a
//! destination tree. It detects what differs, classifies the differences
//! (renames, conflicts, risk, priority), and applies them under per-file
//! advisory locks with retries and a rollback snapshot.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tplsync::sync::SyncBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = SyncBuilder::new()
//!         .source("./templates")
//!         .destination("./project")
//!         .update_baseline(true)
//!         .sync()
//!         .await?;
//!     println!("Applied {} operation(s)", result.execution.completed);
//!     Ok(())
//! }
//! ```
//!
//! ## Using the components directly
//!
//! ```rust,ignore
//! use tplsync::{ChangeClassifier, ChangeDetector, Config};
//!
//! let config = Config::default();
//! let mut report = ChangeDetector::new(&config).detect(src, dst).await?;
//! let changes = std::mem::take(&mut report.changes);
//! let classified = ChangeClassifier::new(&config)?
//!     .classify(changes, &report.source_index, &report.dest_index);
//! ```

pub mod baseline;
pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod exclusion;
pub mod executor;
pub mod lock;
pub mod logging;
pub mod progress;
pub mod strategies;
pub mod sync;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use baseline::{BaselineDiff, PushBaselineManager};
pub use classify::{ChangeClassifier, ClassificationReport};
pub use config::Config;
pub use detect::{ChangeDetector, DetectionReport};
pub use error::{BaselineError, LockError, SnapshotError, SyncError};
pub use executor::{ExecutionOptions, ExecutionReport, SyncExecutor, SyncPlan};
pub use lock::FileLockManager;
pub use strategies::ConflictStrategy;
pub use types::{Change, ChangeType, FileRecord};

// vim: ts=4
