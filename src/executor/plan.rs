//! Sync plans: the classifier's ordered changes as executable operations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{Change, ChangeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
	Copy,
	Update,
	Move,
	Delete,
	Conflict,
}

impl OperationKind {
	/// Whether running the operation can lose destination content
	pub fn is_destructive(&self) -> bool {
		!matches!(self, OperationKind::Copy)
	}
}

impl std::fmt::Display for OperationKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OperationKind::Copy => write!(f, "copy"),
			OperationKind::Update => write!(f, "update"),
			OperationKind::Move => write!(f, "move"),
			OperationKind::Delete => write!(f, "delete"),
			OperationKind::Conflict => write!(f, "conflict"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
	Completed,
	Failed,
	Skipped,
	Simulated,
}

impl std::fmt::Display for OperationStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OperationStatus::Completed => write!(f, "completed"),
			OperationStatus::Failed => write!(f, "failed"),
			OperationStatus::Skipped => write!(f, "skipped"),
			OperationStatus::Simulated => write!(f, "simulated"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
	pub kind: OperationKind,
	pub path: String,
	pub old_path: Option<String>,
	pub priority: i32,
	pub status: Option<OperationStatus>,
	pub message: Option<String>,
	pub bytes_written: u64,
	pub attempts: u32,
}

impl Operation {
	pub fn from_change(change: &Change) -> Self {
		let kind = if change.is_conflicted() {
			OperationKind::Conflict
		} else {
			match change.change_type {
				ChangeType::New => OperationKind::Copy,
				ChangeType::Modified => OperationKind::Update,
				ChangeType::Moved => OperationKind::Move,
				ChangeType::Deleted => OperationKind::Delete,
			}
		};
		Operation {
			kind,
			path: change.path.clone(),
			old_path: change.old_path.clone(),
			priority: change.priority,
			status: None,
			message: None,
			bytes_written: 0,
			attempts: 0,
		}
	}

	/// Destination paths this operation writes or removes
	pub fn touched_paths(&self) -> Vec<&str> {
		let mut paths = vec![self.path.as_str()];
		if let Some(old) = self.old_path.as_deref().filter(|old| *old != self.path) {
			paths.push(old);
		}
		paths
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
	pub id: String,
	pub source_root: PathBuf,
	pub dest_root: PathBuf,
	pub operations: Vec<Operation>,
}

impl SyncPlan {
	/// One operation per change, in the order given
	pub fn from_changes(
		source_root: impl Into<PathBuf>,
		dest_root: impl Into<PathBuf>,
		changes: &[Change],
	) -> Self {
		SyncPlan {
			id: uuid::Uuid::new_v4().to_string(),
			source_root: source_root.into(),
			dest_root: dest_root.into(),
			operations: changes.iter().map(Operation::from_change).collect(),
		}
	}

	pub fn is_destructive(&self) -> bool {
		self.operations.iter().any(|op| op.kind.is_destructive())
	}

	/// Every destination path the plan may touch, deduplicated and sorted
	pub fn touched_paths(&self) -> Vec<String> {
		let mut paths: Vec<String> = self
			.operations
			.iter()
			.flat_map(|op| op.touched_paths())
			.map(String::from)
			.collect();
		paths.sort();
		paths.dedup();
		paths
	}
}


// vim: ts=4
