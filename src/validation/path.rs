//! Path validation functions

use std::path::{Component, Path};

use super::ValidationError;

/// Check a relative path string for traversal segments
///
/// Works on the `/`-separated keys used in file indexes, so it also catches
/// backslash-separated segments that `Path` would not split on Unix.
pub fn has_traversal(rel_path: &str) -> bool {
	rel_path.split(['/', '\\']).any(|segment| segment == "..")
}

/// Check a path string for embedded NUL bytes
pub fn has_null_byte(rel_path: &str) -> bool {
	rel_path.contains('\0')
}

/// Validate a relative index key (no traversal, no NUL, not absolute, not empty)
pub fn validate_relative_key(rel_path: &str) -> Result<(), ValidationError> {
	if rel_path.is_empty() {
		return Err(ValidationError::PathError("Path is empty".to_string()));
	}
	if has_null_byte(rel_path) {
		return Err(ValidationError::PathError(format!("Path contains a NUL byte: {:?}", rel_path)));
	}
	if has_traversal(rel_path) {
		return Err(ValidationError::PathError(format!(
			"Path contains parent directory reference (..): {}",
			rel_path
		)));
	}
	validate_path_relative(Path::new(rel_path))
}

/// Check if path has no absolute components
pub fn is_path_relative(path: &Path) -> bool {
	!path.is_absolute() && !path.has_root()
}

/// Validate that path is relative (not absolute)
pub fn validate_path_relative(path: &Path) -> Result<(), ValidationError> {
	if !is_path_relative(path) {
		return Err(ValidationError::PathError(format!(
			"Path must be relative, got absolute path: {:?}",
			path
		)));
	}
	Ok(())
}

/// Convert a path below `root` into a `/`-separated index key
pub fn relative_key(path: &Path, root: &Path) -> Option<String> {
	let rel = path.strip_prefix(root).ok()?;
	let parts: Vec<String> = rel
		.components()
		.filter_map(|c| match c {
			Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
			_ => None,
		})
		.collect();
	if parts.is_empty() {
		None
	} else {
		Some(parts.join("/"))
	}
}


// vim: ts=4
