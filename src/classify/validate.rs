//! Structural validation of classified changes

use std::path::Path;

use crate::types::{Change, ChangeType, ValidationStatus};
use crate::validation::{has_null_byte, has_traversal, is_path_relative};

/// Confidence below which a warning is recorded
pub const LOW_CONFIDENCE_WARNING: f64 = 0.5;

fn check_path(label: &str, rel: &str, errors: &mut Vec<String>) {
	if rel.is_empty() {
		errors.push(format!("{} is empty", label));
		return;
	}
	if has_traversal(rel) {
		errors.push(format!("{} contains a parent directory reference: {}", label, rel));
	}
	if has_null_byte(rel) {
		errors.push(format!("{} contains a NUL byte: {:?}", label, rel));
	}
	if !is_path_relative(Path::new(rel)) || rel.starts_with('/') || rel.starts_with('\\') {
		errors.push(format!("{} must be relative: {}", label, rel));
	}
}

/// Check one change and record the outcome on it
///
/// Invalid changes are kept; callers decide whether to block on them.
pub fn validate_change(change: &mut Change, warn_file_bytes: u64) {
	let mut errors = Vec::new();
	let mut warnings = Vec::new();

	check_path("path", &change.path, &mut errors);
	if let Some(old) = &change.old_path {
		check_path("old path", old, &mut errors);
	}

	let has_source = change.source_file.is_some();
	let has_dest = change.dest_file.is_some();
	match change.change_type {
		ChangeType::New => {
			if !has_source {
				errors.push("new change without a source file".to_string());
			}
			if has_dest {
				errors.push("new change must not carry a destination file".to_string());
			}
		}
		ChangeType::Deleted => {
			if !has_dest {
				errors.push("deleted change without a destination file".to_string());
			}
			if has_source {
				errors.push("deleted change must not carry a source file".to_string());
			}
		}
		ChangeType::Modified => {
			if !has_source || !has_dest {
				errors.push("modified change needs both source and destination files".to_string());
			}
		}
		ChangeType::Moved => {
			if !has_source || !has_dest {
				errors.push("moved change needs both source and destination files".to_string());
			}
			if change.old_path.is_none() {
				errors.push("moved change without an old path".to_string());
			}
		}
	}

	let confidence = change.confidence();
	if !(0.0..=1.0).contains(&confidence) {
		errors.push(format!("confidence out of range: {}", confidence));
	} else if confidence < LOW_CONFIDENCE_WARNING {
		warnings.push(format!("low confidence: {:.2}", confidence));
	}

	if change.size() > warn_file_bytes {
		warnings.push(format!("large file: {} bytes", change.size()));
	}

	change.validation.status =
		if errors.is_empty() { ValidationStatus::Valid } else { ValidationStatus::Invalid };
	change.validation.errors = errors;
	change.validation.warnings = warnings;
}


// vim: ts=4
