//! Core data types shared by detection, classification and execution

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Index of file records keyed by `/`-separated relative path
pub type FileIndex = BTreeMap<String, FileRecord>;

/// Milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
	system_time_ms(SystemTime::now())
}

/// Convert a SystemTime to milliseconds since the Unix epoch (negative before 1970)
pub fn system_time_ms(t: SystemTime) -> i64 {
	match t.duration_since(UNIX_EPOCH) {
		Ok(d) => d.as_millis() as i64,
		Err(e) => -(e.duration().as_millis() as i64),
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
	Text,
	Binary,
}

/// One file on one side of a comparison
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
	pub path: PathBuf,
	pub relative_path: String,
	pub size: u64,
	pub mtime_ms: i64,
	pub content_kind: ContentKind,
	pub hash: Option<String>,
}

impl FileRecord {
	pub fn is_binary(&self) -> bool {
		self.content_kind == ContentKind::Binary
	}

	/// File name component of the relative path
	pub fn file_name(&self) -> &str {
		self.relative_path.rsplit('/').next().unwrap_or(&self.relative_path)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
	New,
	Deleted,
	Modified,
	Moved,
}

impl std::fmt::Display for ChangeType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ChangeType::New => write!(f, "new"),
			ChangeType::Deleted => write!(f, "deleted"),
			ChangeType::Modified => write!(f, "modified"),
			ChangeType::Moved => write!(f, "moved"),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
	CreateDelete,
	ConcurrentModification,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Low,
	Medium,
	High,
}

/// One colliding change recorded inside a conflict
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictMember {
	pub change_type: ChangeType,
	pub detected_at: i64,
	pub reason: String,
}

/// Contention between changes on one path
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
	pub kind: ConflictKind,
	pub severity: Severity,
	pub path: String,
	pub members: Vec<ConflictMember>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
	#[default]
	Unchecked,
	Valid,
	Invalid,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Validation {
	pub status: ValidationStatus,
	pub warnings: Vec<String>,
	pub errors: Vec<String>,
}

impl Validation {
	pub fn is_invalid(&self) -> bool {
		self.status == ValidationStatus::Invalid
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reliability {
	High,
	Medium,
	Low,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clarity {
	Clear,
	Vague,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ReasonAnalysis {
	pub reliability: Reliability,
	pub clarity: Clarity,
	pub keywords: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
	Low,
	Medium,
	High,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RiskAssessment {
	pub score: u32,
	pub level: RiskLevel,
	pub factors: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingHint {
	BinaryFile,
	LargeFile,
	CriticalFile,
	RequiresConfirmation,
}

/// Enrichment attached by the classifier
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ChangeAnalysis {
	pub reason: ReasonAnalysis,
	pub risk: RiskAssessment,
	pub hints: Vec<ProcessingHint>,
}

/// A classified difference between source and destination at one path
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
	pub change_type: ChangeType,
	pub path: String,
	pub old_path: Option<String>,
	pub source_file: Option<FileRecord>,
	pub dest_file: Option<FileRecord>,
	pub reason: String,
	confidence: f64,
	pub priority: i32,
	pub conflict: Option<Conflict>,
	pub validation: Validation,
	pub analysis: Option<ChangeAnalysis>,
	pub detected_at: i64,
}

impl Change {
	fn base(change_type: ChangeType, path: String, reason: String) -> Self {
		Change {
			change_type,
			path,
			old_path: None,
			source_file: None,
			dest_file: None,
			reason,
			confidence: 1.0,
			priority: 0,
			conflict: None,
			validation: Validation::default(),
			analysis: None,
			detected_at: now_ms(),
		}
	}

	/// File present only on the source side
	pub fn new_file(source: FileRecord) -> Self {
		let mut change =
			Self::base(ChangeType::New, source.relative_path.clone(), "exists only in source".to_string());
		change.source_file = Some(source);
		change
	}

	/// File present only on the destination side
	pub fn deleted_file(dest: FileRecord) -> Self {
		let mut change = Self::base(
			ChangeType::Deleted,
			dest.relative_path.clone(),
			"missing from source".to_string(),
		);
		change.dest_file = Some(dest);
		change
	}

	/// File present on both sides with differing content
	pub fn modified_file(
		source: FileRecord,
		dest: FileRecord,
		reason: impl Into<String>,
		confidence: f64,
	) -> Self {
		let mut change = Self::base(ChangeType::Modified, source.relative_path.clone(), reason.into());
		change.source_file = Some(source);
		change.dest_file = Some(dest);
		change.set_confidence(confidence);
		change
	}

	/// Destination file that reappears under a new path in the source
	pub fn moved_file(
		source: FileRecord,
		dest: FileRecord,
		reason: impl Into<String>,
		confidence: f64,
	) -> Self {
		let mut change = Self::base(ChangeType::Moved, source.relative_path.clone(), reason.into());
		change.old_path = Some(dest.relative_path.clone());
		change.source_file = Some(source);
		change.dest_file = Some(dest);
		change.set_confidence(confidence);
		change
	}

	pub fn confidence(&self) -> f64 {
		self.confidence
	}

	/// Set confidence, clamped into [0, 1] (NaN becomes 0)
	pub fn set_confidence(&mut self, value: f64) {
		self.confidence = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
	}

	/// Multiply confidence by a factor, keeping it in [0, 1]
	pub fn discount(&mut self, factor: f64) {
		self.set_confidence(self.confidence * factor);
	}

	pub fn with_detected_at(mut self, ms: i64) -> Self {
		self.detected_at = ms;
		self
	}

	/// Largest known size among the attached records
	pub fn size(&self) -> u64 {
		let s = self.source_file.as_ref().map(|f| f.size).unwrap_or(0);
		let d = self.dest_file.as_ref().map(|f| f.size).unwrap_or(0);
		s.max(d)
	}

	/// Whether any attached record is binary
	pub fn is_binary(&self) -> bool {
		self.source_file.as_ref().map(|f| f.is_binary()).unwrap_or(false)
			|| self.dest_file.as_ref().map(|f| f.is_binary()).unwrap_or(false)
	}

	pub fn is_conflicted(&self) -> bool {
		self.conflict.is_some()
	}
}


// vim: ts=4
