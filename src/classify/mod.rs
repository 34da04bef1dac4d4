//! Classification of raw changes
//!
//! A fixed pipeline turns the detector's raw changes into an ordered,
//! annotated change list:
//!
//! 1. enrichment (record backfill, confidence, reason analysis, risk, hints)
//! 2. rename/move inference
//! 3. conflict detection
//! 4. validation
//! 5. priority assignment and sort

pub mod conflict;
pub mod enrich;
pub mod priority;
pub mod rename;
pub mod validate;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::SyncError;
use crate::progress::{ProgressEvent, ProgressReporter, SyncPhase};
use crate::types::{Change, ChangeType, Conflict, FileIndex, ValidationStatus};

/// Classification thresholds and compiled file-class patterns
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
	pub rename_threshold: f64,
	pub max_rename_comparisons: usize,
	pub conflict_window_ms: u64,
	pub large_file_bytes: u64,
	pub priority_size_bytes: u64,
	pub warn_file_bytes: u64,
	critical: GlobSet,
	config_files: GlobSet,
}

fn build_set(field: &str, patterns: &[String]) -> Result<GlobSet, SyncError> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| SyncError::InvalidConfig {
			message: format!("{}: invalid pattern '{}': {}", field, pattern, e),
		})?;
		builder.add(glob);
	}
	builder
		.build()
		.map_err(|e| SyncError::InvalidConfig { message: format!("{}: {}", field, e) })
}

impl ClassifierOptions {
	pub fn from_config(config: &Config) -> Result<Self, SyncError> {
		Ok(ClassifierOptions {
			rename_threshold: config.rename_threshold,
			max_rename_comparisons: config.max_rename_comparisons,
			conflict_window_ms: config.conflict_window_ms,
			large_file_bytes: config.large_file_bytes,
			priority_size_bytes: config.priority_size_bytes,
			warn_file_bytes: config.warn_file_bytes,
			critical: build_set("criticalPatterns", &config.critical_patterns)?,
			config_files: build_set("configPatterns", &config.config_patterns)?,
		})
	}

	pub fn is_critical(&self, rel_path: &str) -> bool {
		self.critical.is_match(rel_path)
	}

	pub fn is_config_file(&self, rel_path: &str) -> bool {
		self.config_files.is_match(rel_path)
	}
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationStats {
	pub classified: usize,
	pub renames: usize,
	pub conflicts: usize,
	pub validation_errors: usize,
	pub validation_warnings: usize,
	pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationReport {
	/// Ordered for execution: ascending priority, then path
	pub changes: Vec<Change>,
	pub conflicts: Vec<Conflict>,
	pub stats: ClassificationStats,
}

impl ClassificationReport {
	pub fn invalid_changes(&self) -> impl Iterator<Item = &Change> {
		self.changes.iter().filter(|c| c.validation.status == ValidationStatus::Invalid)
	}
}

pub struct ChangeClassifier {
	options: ClassifierOptions,
	progress: ProgressReporter,
}

impl ChangeClassifier {
	pub fn new(config: &Config) -> Result<Self, SyncError> {
		Ok(ChangeClassifier {
			options: ClassifierOptions::from_config(config)?,
			progress: ProgressReporter::disabled(),
		})
	}

	pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
		self.progress = progress;
		self
	}

	pub fn options(&self) -> &ClassifierOptions {
		&self.options
	}

	/// Run the full pipeline over the detector's output
	pub fn classify(
		&self,
		changes: Vec<Change>,
		source_index: &FileIndex,
		dest_index: &FileIndex,
	) -> ClassificationReport {
		let start = Instant::now();
		let opts = &self.options;
		self.progress.emit(ProgressEvent::PhaseStarted { phase: SyncPhase::Classifying });

		let mut changes = changes;
		for change in changes.iter_mut() {
			enrich::enrich(change, source_index, dest_index, opts);
		}

		let has_new = changes.iter().any(|c| c.change_type == ChangeType::New);
		let has_deleted = changes.iter().any(|c| c.change_type == ChangeType::Deleted);
		let mut renames = 0;
		if has_new && has_deleted {
			let (rest, mut moves) = rename::infer_renames(
				changes,
				opts.rename_threshold,
				opts.max_rename_comparisons,
			);
			for mv in moves.iter_mut() {
				enrich::enrich(mv, source_index, dest_index, opts);
			}
			renames = moves.len();
			changes = rest;
			changes.extend(moves);
			debug!("Inferred {} move(s)", renames);
		}

		let conflicts = conflict::detect_conflicts(&mut changes, opts.conflict_window_ms);

		for change in changes.iter_mut() {
			validate::validate_change(change, opts.warn_file_bytes);
			change.priority = priority::priority_for(change, opts);
		}
		priority::sort_changes(&mut changes);

		let stats = ClassificationStats {
			classified: changes.len(),
			renames,
			conflicts: conflicts.len(),
			validation_errors: changes.iter().filter(|c| c.validation.is_invalid()).count(),
			validation_warnings: changes.iter().map(|c| c.validation.warnings.len()).sum(),
			elapsed_ms: start.elapsed().as_millis() as u64,
		};
		info!(
			"Classified {} change(s): {} move(s), {} conflict(s), {} invalid",
			stats.classified, stats.renames, stats.conflicts, stats.validation_errors
		);
		self.progress.emit(ProgressEvent::ChangesClassified {
			count: stats.classified,
			renames: stats.renames,
			conflicts: stats.conflicts,
		});
		self.progress.emit(ProgressEvent::PhaseFinished {
			phase: SyncPhase::Classifying,
			elapsed_ms: stats.elapsed_ms,
		});

		ClassificationReport { changes, conflicts, stats }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{ConflictKind, ContentKind, FileRecord, Severity};
	use std::path::PathBuf;

	fn record(rel: &str, size: u64) -> FileRecord {
		FileRecord {
			path: PathBuf::from("/x").join(rel),
			relative_path: rel.to_string(),
			size,
			mtime_ms: 0,
			content_kind: ContentKind::Text,
			hash: None,
		}
	}

	fn classifier() -> ChangeClassifier {
		ChangeClassifier::new(&Config::default()).unwrap()
	}

	fn assert_invariants(changes: &[Change]) {
		for c in changes {
			assert!((0.0..=1.0).contains(&c.confidence()), "{} confidence", c.path);
			match c.change_type {
				ChangeType::New => assert!(c.source_file.is_some() && c.dest_file.is_none()),
				ChangeType::Deleted => assert!(c.source_file.is_none() && c.dest_file.is_some()),
				ChangeType::Modified | ChangeType::Moved => {
					assert!(c.source_file.is_some() && c.dest_file.is_some())
				}
			}
		}
	}

	#[test]
	fn test_end_to_end_ordering() {
		let changes = vec![
			Change::new_file(record("config.json", 2)),
			Change::deleted_file(record("old.log", 3)),
			Change::modified_file(record("readme.md", 10), record("readme.md", 5), "size changed", 1.0),
		];
		let report = classifier().classify(changes, &FileIndex::new(), &FileIndex::new());

		let paths: Vec<&str> = report.changes.iter().map(|c| c.path.as_str()).collect();
		assert_eq!(paths, vec!["old.log", "readme.md", "config.json"]);
		assert_eq!(report.stats.classified, 3);
		assert_eq!(report.stats.renames, 0);
		assert_invariants(&report.changes);
	}

	#[test]
	fn test_concurrent_modification_scenario() {
		let changes = vec![
			Change::modified_file(record("a.md", 2), record("a.md", 1), "content hash differs", 1.0)
				.with_detected_at(10_000),
			Change::modified_file(record("a.md", 2), record("a.md", 1), "content hash differs", 1.0)
				.with_detected_at(10_500),
		];
		let report = classifier().classify(changes, &FileIndex::new(), &FileIndex::new());

		assert_eq!(report.conflicts.len(), 1);
		assert_eq!(report.conflicts[0].kind, ConflictKind::ConcurrentModification);
		assert_eq!(report.conflicts[0].severity, Severity::Medium);
		for change in &report.changes {
			// 0.9 base for modified, then the conflict discount
			assert!((change.confidence() - 0.9 * 0.7).abs() < 1e-9);
			assert_eq!(change.priority, 20 - 15);
		}
		assert_invariants(&report.changes);
	}

	#[test]
	fn test_move_inferred_and_enriched() {
		let changes = vec![
			Change::deleted_file(record("old/guide.md", 42)),
			Change::new_file(record("new/guide.md", 42)),
		];
		let report = classifier().classify(changes, &FileIndex::new(), &FileIndex::new());

		assert_eq!(report.stats.renames, 1);
		assert_eq!(report.changes.len(), 1);
		let mv = &report.changes[0];
		assert_eq!(mv.change_type, ChangeType::Moved);
		assert_eq!(mv.old_path.as_deref(), Some("old/guide.md"));
		assert!(mv.analysis.is_some());
		assert_eq!(mv.priority, 30);
		assert!(mv.confidence() <= 0.8);
		assert_invariants(&report.changes);
	}

	#[test]
	fn test_same_path_create_delete_is_conflict_not_move() {
		let changes = vec![
			Change::new_file(record("x.md", 7)),
			Change::deleted_file(record("x.md", 7)),
		];
		let report = classifier().classify(changes, &FileIndex::new(), &FileIndex::new());

		assert_eq!(report.stats.renames, 0);
		assert!(report.changes.iter().all(|c| c.change_type != ChangeType::Moved));
		assert_eq!(report.conflicts.len(), 1);
		assert_eq!(report.conflicts[0].kind, ConflictKind::CreateDelete);
		assert_eq!(report.conflicts[0].severity, Severity::High);
		assert!(report.changes.iter().all(|c| c.is_conflicted()));
		assert_invariants(&report.changes);
	}

	#[test]
	fn test_invalid_changes_are_kept() {
		let changes = vec![Change::new_file(record("../outside.md", 1))];
		let report = classifier().classify(changes, &FileIndex::new(), &FileIndex::new());
		assert_eq!(report.changes.len(), 1);
		assert_eq!(report.stats.validation_errors, 1);
		assert_eq!(report.invalid_changes().count(), 1);
	}

	#[test]
	fn test_bad_pattern_is_config_error() {
		let config =
			Config { critical_patterns: vec!["[unclosed".to_string()], ..Config::default() };
		assert!(matches!(ChangeClassifier::new(&config), Err(SyncError::InvalidConfig { .. })));
	}
}

// vim: ts=4
