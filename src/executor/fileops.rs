//! Destination file operations: create-new copy, atomic replace, idempotent delete

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::exclusion::TEMP_SUFFIX;

/// Removes its temporary file on drop unless committed
struct TempFileGuard {
	path: PathBuf,
	armed: bool,
}

impl TempFileGuard {
	fn new(path: PathBuf) -> Self {
		TempFileGuard { path, armed: true }
	}

	fn path(&self) -> &Path {
		&self.path
	}

	fn disarm(mut self) {
		self.armed = false;
	}
}

impl Drop for TempFileGuard {
	fn drop(&mut self) {
		if self.armed {
			let _ = fs::remove_file(&self.path);
		}
	}
}

/// Unique hidden temp name beside `dest`: `.<name>.<uuid>.tplsync-tmp`
pub fn temp_path_for(dest: &Path) -> PathBuf {
	let name = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
	let name = name.strip_prefix('.').unwrap_or(&name);
	let unique = uuid::Uuid::new_v4().simple().to_string();
	let dir = dest.parent().unwrap_or(Path::new("."));
	dir.join(format!(".{}.{}{}", name, &unique[..12], TEMP_SUFFIX))
}

fn ensure_parent(path: &Path) -> io::Result<()> {
	match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
		_ => Ok(()),
	}
}

/// Copy content, permissions and mtime from `src` into an already created `out`
fn fill_from(src: &Path, out: &mut File) -> io::Result<u64> {
	let mut input = File::open(src)?;
	let meta = input.metadata()?;
	let bytes = io::copy(&mut input, out)?;
	out.set_permissions(meta.permissions())?;
	out.set_modified(meta.modified()?)?;
	out.sync_all()?;
	Ok(bytes)
}

/// Copy `src` to a destination that must not exist yet
pub fn copy_new(src: &Path, dest: &Path) -> io::Result<u64> {
	ensure_parent(dest)?;
	let mut out = OpenOptions::new().write(true).create_new(true).open(dest)?;
	let guard = TempFileGuard::new(dest.to_path_buf());
	let bytes = fill_from(src, &mut out)?;
	guard.disarm();
	Ok(bytes)
}

/// Replace `dest` with `src` through a temp file and rename
///
/// `before_commit` runs after the temp file is complete and before the rename;
/// an error from it (or from any earlier step) leaves `dest` untouched and the
/// temp file removed.
pub fn atomic_replace<F>(src: &Path, dest: &Path, before_commit: F) -> io::Result<u64>
where
	F: FnOnce(&Path) -> io::Result<()>,
{
	ensure_parent(dest)?;
	let guard = TempFileGuard::new(temp_path_for(dest));
	let mut out = OpenOptions::new().write(true).create_new(true).open(guard.path())?;
	let bytes = fill_from(src, &mut out)?;
	drop(out);

	before_commit(guard.path())?;
	fs::rename(guard.path(), dest)?;
	guard.disarm();
	Ok(bytes)
}

/// Remove a file; `Ok(false)` when it was already gone
pub fn remove_if_present(path: &Path) -> io::Result<bool> {
	match fs::remove_file(path) {
		Ok(()) => Ok(true),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
		Err(e) => Err(e),
	}
}

/// Remove orphaned temp files left by interrupted updates under `dir`
pub fn cleanup_temp_files(dir: &Path) -> io::Result<usize> {
	fn scan_dir(dir: &Path, count: &mut usize) -> io::Result<()> {
		let entries = match fs::read_dir(dir) {
			Ok(e) => e,
			Err(e) => {
				warn!("Cannot read directory {} during cleanup: {}", dir.display(), e);
				return Ok(());
			}
		};

		for entry_result in entries {
			let entry = match entry_result {
				Ok(e) => e,
				Err(e) => {
					debug!("Error reading directory entry during cleanup: {}", e);
					continue;
				}
			};

			let path = entry.path();
			let metadata = match fs::symlink_metadata(&path) {
				Ok(m) => m,
				Err(e) => {
					warn!("Cannot access {} during cleanup: {}", path.display(), e);
					continue;
				}
			};

			let is_temp = path
				.file_name()
				.and_then(|n| n.to_str())
				.map(|n| n.ends_with(TEMP_SUFFIX))
				.unwrap_or(false);

			if is_temp && metadata.is_file() {
				debug!("Removing orphaned temp file: {:?}", path);
				match fs::remove_file(&path) {
					Ok(()) => *count += 1,
					Err(e) if e.kind() == io::ErrorKind::NotFound => {
						debug!("Temp file already removed: {:?}", path);
					}
					Err(e) => warn!("Failed to remove temp file {:?}: {}", path, e),
				}
			} else if metadata.is_dir() {
				scan_dir(&path, count)?;
			}
		}
		Ok(())
	}

	let mut count = 0;
	scan_dir(dir, &mut count)?;
	info!("Cleaned up {} temporary file(s) under {}", count, dir.display());
	Ok(count)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_temp_path_is_hidden_sibling() {
		let tmp = temp_path_for(Path::new("/d/sub/.env"));
		let name = tmp.file_name().unwrap().to_str().unwrap();
		assert!(name.starts_with(".env."));
		assert!(name.ends_with(TEMP_SUFFIX));
		assert_eq!(tmp.parent(), Some(Path::new("/d/sub")));
	}

	#[test]
	fn test_copy_new_refuses_existing() {
		let dir = TempDir::new().unwrap();
		let src = dir.path().join("src.txt");
		let dest = dir.path().join("out/dest.txt");
		fs::write(&src, "hello").unwrap();

		assert_eq!(copy_new(&src, &dest).unwrap(), 5);
		assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");

		let err = copy_new(&src, &dest).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
		assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");
	}

	#[test]
	fn test_atomic_replace_failure_leaves_original() {
		let dir = TempDir::new().unwrap();
		let src = dir.path().join("new.txt");
		let dest = dir.path().join("target.txt");
		fs::write(&src, "new content that is longer").unwrap();
		fs::write(&dest, "original").unwrap();

		let mut seen_tmp = None;
		let err = atomic_replace(&src, &dest, |tmp| {
			assert_eq!(fs::read_to_string(tmp)?, "new content that is longer");
			seen_tmp = Some(tmp.to_path_buf());
			Err(io::Error::new(io::ErrorKind::Other, "injected"))
		})
		.unwrap_err();

		assert_eq!(err.to_string(), "injected");
		assert_eq!(fs::read_to_string(&dest).unwrap(), "original");
		assert!(!seen_tmp.unwrap().exists());
	}

	#[test]
	fn test_atomic_replace_success() {
		let dir = TempDir::new().unwrap();
		let src = dir.path().join("new.txt");
		let dest = dir.path().join("target.txt");
		fs::write(&src, "v2").unwrap();
		fs::write(&dest, "v1").unwrap();

		assert_eq!(atomic_replace(&src, &dest, |_| Ok(())).unwrap(), 2);
		assert_eq!(fs::read_to_string(&dest).unwrap(), "v2");
		assert_eq!(cleanup_temp_files(dir.path()).unwrap(), 0);
	}

	#[test]
	fn test_remove_if_present_is_idempotent() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("x");
		fs::write(&path, "x").unwrap();
		assert!(remove_if_present(&path).unwrap());
		assert!(!remove_if_present(&path).unwrap());
	}

	#[test]
	fn test_cleanup_temp_files() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join("a/b")).unwrap();
		fs::write(dir.path().join("a/b/.x.123.tplsync-tmp"), "partial").unwrap();
		fs::write(dir.path().join(".y.456.tplsync-tmp"), "partial").unwrap();
		fs::write(dir.path().join("a/keep.txt"), "keep").unwrap();

		assert_eq!(cleanup_temp_files(dir.path()).unwrap(), 2);
		assert!(dir.path().join("a/keep.txt").exists());
	}
}

// vim: ts=4
