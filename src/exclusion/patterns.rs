//! Pattern-based file exclusion using glob patterns

use super::ExclusionError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Suffix of in-flight temporary files written by atomic updates
pub const TEMP_SUFFIX: &str = ".tplsync-tmp";

/// Pattern matcher using globset for efficient matching
#[derive(Debug, Clone)]
pub struct PatternMatcher {
	/// Compiled exclusion patterns
	exclude_set: GlobSet,

	/// Always-excluded patterns (built-in)
	always_exclude: GlobSet,
}

impl PatternMatcher {
	/// Create a new pattern matcher
	pub fn new(exclude_patterns: &[String]) -> Result<Self, ExclusionError> {
		let always_exclude = Self::build_always_excluded()?;
		let exclude_set = Self::build_glob_set(exclude_patterns)?;
		Ok(Self { exclude_set, always_exclude })
	}

	/// Build the always-excluded patterns
	fn build_always_excluded() -> Result<GlobSet, ExclusionError> {
		let patterns = vec![
			".tplsync/**",       // tplsync state directory
			"**/*.tplsync-tmp",  // in-flight atomic update temp files
			".tplsync-probe-*",  // destination writability probes
			"**/.DS_Store",      // macOS cruft
			"**/Thumbs.db",      // Windows cruft
			"**/desktop.ini",    // Windows cruft
			"**/*.swp",          // Vim swap files
			"**/*.swo",          // Vim swap files
			"**/*~",             // Editor backups
		];

		Self::build_glob_set(&patterns.into_iter().map(String::from).collect::<Vec<_>>())
	}

	/// Build a GlobSet from patterns
	fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ExclusionError> {
		let mut builder = GlobSetBuilder::new();

		for pattern in patterns {
			let glob = Glob::new(pattern)
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			builder.add(glob);
		}

		builder.build().map_err(|e| {
			ExclusionError::InvalidPattern(format!("Failed to build pattern set: {}", e))
		})
	}

	/// Check if a relative path is excluded by any pattern
	pub fn is_excluded(&self, path: &Path) -> bool {
		// Always-excluded takes highest priority
		if self.always_exclude.is_match(path) {
			return true;
		}

		self.exclude_set.is_match(path)
	}

	/// Check if a relative directory path is excluded
	///
	/// A trailing-`/**` pattern matches the directory with a trailing slash,
	/// which lets the walker prune the whole subtree.
	pub fn is_excluded_dir(&self, path: &Path) -> bool {
		if self.is_excluded(path) {
			return true;
		}
		let with_slash = format!("{}/", path.to_string_lossy());
		self.always_exclude.is_match(&with_slash) || self.exclude_set.is_match(&with_slash)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_basic_exclusion() {
		let patterns = vec!["*.log".to_string(), "*.tmp".to_string()];
		let matcher = PatternMatcher::new(&patterns).unwrap();

		assert!(matcher.is_excluded(Path::new("test.log")));
		assert!(matcher.is_excluded(Path::new("foo/bar.tmp")));
		assert!(!matcher.is_excluded(Path::new("test.txt")));
	}

	#[test]
	fn test_always_excluded() {
		let matcher = PatternMatcher::new(&[]).unwrap();

		assert!(matcher.is_excluded(Path::new(".tplsync/baselines/x.json")));
		assert!(matcher.is_excluded(Path::new("docs/.readme.md.1234.tplsync-tmp")));
		assert!(matcher.is_excluded(Path::new(".DS_Store")));
		assert!(matcher.is_excluded(Path::new("foo/Thumbs.db")));
		assert!(matcher.is_excluded(Path::new("file.swp")));
		assert!(matcher.is_excluded(Path::new("backup~")));
		assert!(!matcher.is_excluded(Path::new("docs/readme.md")));
	}

	#[test]
	fn test_directory_patterns() {
		let patterns = vec!["node_modules/**".to_string(), ".git/**".to_string()];
		let matcher = PatternMatcher::new(&patterns).unwrap();

		assert!(matcher.is_excluded(Path::new("node_modules/package/file.js")));
		assert!(matcher.is_excluded_dir(Path::new("node_modules")));
		assert!(matcher.is_excluded_dir(Path::new(".git")));
		assert!(!matcher.is_excluded_dir(Path::new("src")));
		assert!(!matcher.is_excluded(Path::new("src/main.rs")));
	}

	#[test]
	fn test_invalid_pattern() {
		let result = PatternMatcher::new(&["[invalid".to_string()]);
		assert!(matches!(result, Err(ExclusionError::InvalidPattern(_))));
	}
}

// vim: ts=4
