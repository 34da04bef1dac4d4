//! .tplsyncignore parsing and matching
//!
//! Uses the `ignore` crate (same as ripgrep) for gitignore-style pattern handling.

use super::ExclusionError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Ignore file honored at the root of every scanned tree
pub const IGNORE_FILE_NAME: &str = ".tplsyncignore";

/// Applies the ignore file found at a scan root
#[derive(Debug, Clone)]
pub struct IgnoreFileMatcher {
	/// Base directory for relative path resolution
	base_path: PathBuf,

	/// Compiled gitignore matcher
	gitignore: Gitignore,
}

impl IgnoreFileMatcher {
	/// Load `<base_path>/.tplsyncignore`, returning None when the file does not exist
	pub fn load(base_path: &Path) -> Result<Option<Self>, ExclusionError> {
		let ignore_path = base_path.join(IGNORE_FILE_NAME);
		if !ignore_path.is_file() {
			return Ok(None);
		}

		let mut builder = GitignoreBuilder::new(base_path);
		// add() returns Option<Error>, None on success
		if let Some(err) = builder.add(&ignore_path) {
			return Err(ExclusionError::IgnoreFileError(format!(
				"Failed to add {}: {}",
				ignore_path.display(),
				err
			)));
		}

		let gitignore =
			builder.build().map_err(|e| ExclusionError::IgnoreFileError(e.to_string()))?;

		Ok(Some(Self { base_path: base_path.to_path_buf(), gitignore }))
	}

	fn relative<'a>(&self, path: &'a Path) -> &'a Path {
		if path.is_absolute() {
			path.strip_prefix(&self.base_path).unwrap_or(path)
		} else {
			path
		}
	}

	/// Check if a file path is ignored (directly or through an ignored parent)
	pub fn is_ignored(&self, path: &Path) -> bool {
		let relative_path = self.relative(path);

		if self.gitignore.matched(relative_path, false).is_ignore() {
			return true;
		}

		// "node_modules/" must also hide "node_modules/file.js"
		for ancestor in relative_path.ancestors().skip(1) {
			if ancestor == Path::new("") || ancestor == Path::new(".") {
				break;
			}
			if self.gitignore.matched(ancestor, true).is_ignore() {
				return true;
			}
		}

		false
	}

	/// Check if a directory is ignored, so traversal can skip it
	pub fn is_ignored_dir(&self, path: &Path) -> bool {
		self.gitignore.matched(self.relative(path), true).is_ignore()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[test]
	fn test_ignore_file_basic() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join(IGNORE_FILE_NAME),
			"# Comment\n*.bak\ndrafts/\n!keep.bak\n",
		)
		.unwrap();

		let matcher = IgnoreFileMatcher::load(temp_dir.path()).unwrap().unwrap();

		assert!(matcher.is_ignored(Path::new("notes.bak")));
		assert!(matcher.is_ignored(Path::new("docs/old.bak")));
		assert!(!matcher.is_ignored(Path::new("keep.bak")));
		assert!(matcher.is_ignored_dir(Path::new("drafts")));
		assert!(matcher.is_ignored(Path::new("drafts/wip.md")));
		assert!(!matcher.is_ignored(Path::new("readme.md")));
	}

	#[test]
	fn test_missing_ignore_file() {
		let temp_dir = TempDir::new().unwrap();
		assert!(IgnoreFileMatcher::load(temp_dir.path()).unwrap().is_none());
	}
}

// vim: ts=4
