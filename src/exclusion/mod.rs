//! Exclusion and filtering system
//!
//! Combines user glob patterns, built-in exclusions and an optional
//! `.tplsyncignore` at the scan root.

mod ignore;
mod patterns;

pub use self::ignore::{IgnoreFileMatcher, IGNORE_FILE_NAME};
pub use patterns::{PatternMatcher, TEMP_SUFFIX};

use std::path::Path;

/// Combined exclusion engine for one scan root
#[derive(Debug, Clone)]
pub struct ExclusionEngine {
	pattern_matcher: PatternMatcher,
	ignore_matcher: Option<IgnoreFileMatcher>,
}

impl ExclusionEngine {
	/// Create an engine from exclude patterns; loads the root's ignore file when requested
	pub fn new(
		exclude_patterns: &[String],
		base_path: &Path,
		respect_ignore_file: bool,
	) -> Result<Self, ExclusionError> {
		let pattern_matcher = PatternMatcher::new(exclude_patterns)?;
		let ignore_matcher =
			if respect_ignore_file { IgnoreFileMatcher::load(base_path)? } else { None };
		Ok(Self { pattern_matcher, ignore_matcher })
	}

	/// Engine with patterns only
	pub fn from_patterns(exclude_patterns: &[String]) -> Result<Self, ExclusionError> {
		Ok(Self { pattern_matcher: PatternMatcher::new(exclude_patterns)?, ignore_matcher: None })
	}

	/// Check if a relative file path should be excluded
	pub fn should_exclude(&self, path: &Path) -> bool {
		// Pattern matcher first (fastest)
		if self.pattern_matcher.is_excluded(path) {
			return true;
		}

		if let Some(ref ignore_matcher) = self.ignore_matcher {
			if ignore_matcher.is_ignored(path) {
				return true;
			}
		}

		false
	}

	/// Check if a relative directory path should be pruned during traversal
	pub fn should_exclude_dir(&self, path: &Path) -> bool {
		if self.pattern_matcher.is_excluded_dir(path) {
			return true;
		}

		if let Some(ref ignore_matcher) = self.ignore_matcher {
			if ignore_matcher.is_ignored_dir(path) {
				return true;
			}
		}

		false
	}
}

/// Errors that can occur during exclusion processing
#[derive(Debug)]
pub enum ExclusionError {
	/// Failed to parse a glob pattern
	InvalidPattern(String),

	/// Failed to read or parse an ignore file
	IgnoreFileError(String),
}

impl std::fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExclusionError::InvalidPattern(msg) => {
				write!(f, "Invalid exclusion pattern: {}", msg)
			}
			ExclusionError::IgnoreFileError(msg) => {
				write!(f, "Ignore file error: {}", msg)
			}
		}
	}
}

impl std::error::Error for ExclusionError {}


// vim: ts=4
