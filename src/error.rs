//! Error types for tplsync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::exclusion::ExclusionError;

/// Main error type for detect/classify/execute runs
#[derive(Debug)]
pub enum SyncError {
	/// Source root does not exist or is not a directory
	SourceMissing { path: PathBuf },

	/// Destination root cannot be written
	DestinationNotWritable { path: PathBuf, reason: String },

	/// A critical file is held by another writer; the plan was not applied
	CriticalFileInUse { path: PathBuf, reason: String },

	/// One or more changes failed validation and blocking was requested
	ValidationFailed { count: usize },

	/// Invalid configuration
	InvalidConfig { message: String },

	/// I/O error
	Io(io::Error),

	/// Lock error (nested)
	Lock(LockError),

	/// Snapshot error (nested)
	Snapshot(SnapshotError),

	/// Baseline error (nested)
	Baseline(BaselineError),

	/// Exclusion pattern error (nested)
	Exclusion(ExclusionError),

	/// Operation aborted by signal or caller
	Aborted,

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::SourceMissing { path } => {
				write!(f, "Source root does not exist or is not a directory: {}", path.display())
			}
			SyncError::DestinationNotWritable { path, reason } => {
				write!(f, "Destination root is not writable: {}: {}", path.display(), reason)
			}
			SyncError::CriticalFileInUse { path, reason } => {
				write!(f, "Critical file in use, plan aborted: {}: {}", path.display(), reason)
			}
			SyncError::ValidationFailed { count } => {
				write!(f, "{} change(s) failed validation", count)
			}
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Lock(e) => write!(f, "Lock error: {}", e),
			SyncError::Snapshot(e) => write!(f, "Snapshot error: {}", e),
			SyncError::Baseline(e) => write!(f, "Baseline error: {}", e),
			SyncError::Exclusion(e) => write!(f, "Exclusion error: {}", e),
			SyncError::Aborted => write!(f, "Operation aborted"),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<LockError> for SyncError {
	fn from(e: LockError) -> Self {
		SyncError::Lock(e)
	}
}

impl From<SnapshotError> for SyncError {
	fn from(e: SnapshotError) -> Self {
		SyncError::Snapshot(e)
	}
}

impl From<BaselineError> for SyncError {
	fn from(e: BaselineError) -> Self {
		SyncError::Baseline(e)
	}
}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::Exclusion(e)
	}
}

/// Rejected configuration value or path key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	ConfigError(String),
	PathError(String),
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValidationError::ConfigError(msg) => write!(f, "Config validation error: {}", msg),
			ValidationError::PathError(msg) => write!(f, "Path validation error: {}", msg),
		}
	}
}

impl Error for ValidationError {}

impl From<ValidationError> for SyncError {
	fn from(e: ValidationError) -> Self {
		SyncError::InvalidConfig { message: e.to_string() }
	}
}

/// File lock errors
#[derive(Debug)]
pub enum LockError {
	/// Waited past the ceiling while another owner held the lock
	Timeout {
		path: PathBuf,
		owner_pid: Option<u32>,
		owner_operation: Option<String>,
		age: Duration,
		waited: Duration,
	},

	/// Lock directory or lock file I/O failed
	Io { path: PathBuf, source: io::Error },

	/// Target path cannot be turned into a lock key
	InvalidPath { path: PathBuf },
}

impl fmt::Display for LockError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LockError::Timeout { path, owner_pid, owner_operation, age, waited } => {
				let owner = match owner_pid {
					Some(pid) => format!("pid {}", pid),
					None => "unknown owner".to_string(),
				};
				write!(
					f,
					"Timed out after {}ms waiting for lock on {} (held by {}, operation '{}', age {}ms)",
					waited.as_millis(),
					path.display(),
					owner,
					owner_operation.as_deref().unwrap_or("?"),
					age.as_millis()
				)
			}
			LockError::Io { path, source } => {
				write!(f, "Lock I/O error on {}: {}", path.display(), source)
			}
			LockError::InvalidPath { path } => {
				write!(f, "Cannot derive a lock key for {}", path.display())
			}
		}
	}
}

impl Error for LockError {}

/// Snapshot store errors
#[derive(Debug)]
pub enum SnapshotError {
	/// No snapshot with this identifier
	NotFound { id: String },

	/// Snapshot I/O failed
	Io { path: PathBuf, source: io::Error },

	/// Snapshot manifest unreadable or inconsistent
	Manifest { message: String },
}

impl fmt::Display for SnapshotError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SnapshotError::NotFound { id } => write!(f, "Snapshot not found: {}", id),
			SnapshotError::Io { path, source } => {
				write!(f, "Snapshot I/O error on {}: {}", path.display(), source)
			}
			SnapshotError::Manifest { message } => write!(f, "Snapshot manifest: {}", message),
		}
	}
}

impl Error for SnapshotError {}

/// Push baseline errors
#[derive(Debug)]
pub enum BaselineError {
	/// Failed to read the baseline file
	LoadFailed { path: PathBuf, source: io::Error },

	/// Failed to write the baseline file
	SaveFailed { path: PathBuf, source: io::Error },

	/// Baseline file is not a valid document
	Corrupted { path: PathBuf, message: String },
}

impl fmt::Display for BaselineError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BaselineError::LoadFailed { path, source } => {
				write!(f, "Failed to load baseline {}: {}", path.display(), source)
			}
			BaselineError::SaveFailed { path, source } => {
				write!(f, "Failed to save baseline {}: {}", path.display(), source)
			}
			BaselineError::Corrupted { path, message } => {
				write!(f, "Baseline corrupted {}: {}", path.display(), message)
			}
		}
	}
}

impl Error for BaselineError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_lock_timeout_display_carries_owner() {
		let err = LockError::Timeout {
			path: PathBuf::from("/tmp/a.txt"),
			owner_pid: Some(4242),
			owner_operation: Some("update".to_string()),
			age: Duration::from_millis(1500),
			waited: Duration::from_millis(300),
		};
		let msg = err.to_string();
		assert!(msg.contains("pid 4242"));
		assert!(msg.contains("update"));
		assert!(msg.contains("1500ms"));
	}

	#[test]
	fn test_rejected_key_becomes_invalid_config() {
		let err = crate::validation::validate_relative_key("docs/../../etc").unwrap_err();
		assert!(matches!(err, ValidationError::PathError(_)));
		let err: SyncError = err.into();
		match err {
			SyncError::InvalidConfig { message } => {
				assert!(message.starts_with("Path validation error"));
				assert!(message.contains("docs/../../etc"));
			}
			other => panic!("unexpected error: {}", other),
		}
	}

	#[test]
	fn test_sync_error_from_lock_error() {
		let err: SyncError = LockError::InvalidPath { path: PathBuf::from("") }.into();
		assert!(matches!(err, SyncError::Lock(_)));
	}
}

// vim: ts=4
