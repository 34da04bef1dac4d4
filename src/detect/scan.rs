//! Directory walking and per-file metadata extraction

use ignore::WalkBuilder;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::exclusion::ExclusionEngine;
use crate::progress::{ProgressEvent, ProgressReporter, Side};
use crate::types::{system_time_ms, ContentKind, FileIndex, FileRecord};
use crate::validation::relative_key;

/// Bytes inspected for a NUL byte when deciding text vs binary
pub const SNIFF_BYTES: u64 = 8192;

/// Files found under one root, with the errors met on the way
#[derive(Debug, Default)]
pub struct ScanResult {
	pub index: FileIndex,
	pub errors: Vec<String>,
}

/// Walk `root` (or only `include_dirs` below it) and list candidate files
///
/// Excluded directories are pruned rather than walked. Symlinks are not followed
/// and symlinked files are not reported.
pub fn walk_tree(
	root: &Path,
	include_dirs: &[String],
	exclusion: &ExclusionEngine,
) -> (Vec<(String, PathBuf)>, Vec<String>) {
	let mut files = Vec::new();
	let mut errors = Vec::new();

	let starts: Vec<PathBuf> = if include_dirs.is_empty() {
		vec![root.to_path_buf()]
	} else {
		include_dirs.iter().map(|d| root.join(d)).filter(|p| p.is_dir()).collect()
	};
	let Some((first, rest)) = starts.split_first() else {
		return (files, errors);
	};

	let mut builder = WalkBuilder::new(first);
	for start in rest {
		builder.add(start);
	}

	let filter_root = root.to_path_buf();
	let filter_engine = exclusion.clone();
	builder.standard_filters(false).follow_links(false).filter_entry(move |entry| {
		let Some(rel) = relative_key(entry.path(), &filter_root) else {
			return true;
		};
		let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
		if is_dir {
			!filter_engine.should_exclude_dir(Path::new(&rel))
		} else {
			!filter_engine.should_exclude(Path::new(&rel))
		}
	});

	for result in builder.build() {
		match result {
			Ok(entry) => {
				if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
					continue;
				}
				if let Some(rel) = relative_key(entry.path(), root) {
					files.push((rel, entry.into_path()));
				}
			}
			Err(e) => {
				warn!("Walk error under {}: {}", root.display(), e);
				errors.push(e.to_string());
			}
		}
	}

	files.sort();
	files.dedup_by(|a, b| a.0 == b.0);
	(files, errors)
}

/// Stat one file and sniff its content kind
pub fn read_record(path: &Path, relative_path: String) -> io::Result<FileRecord> {
	let meta = std::fs::metadata(path)?;
	let mtime_ms = meta.modified().map(system_time_ms)?;

	let mut head = Vec::with_capacity(SNIFF_BYTES as usize);
	File::open(path)?.take(SNIFF_BYTES).read_to_end(&mut head)?;
	let content_kind = if head.contains(&0) { ContentKind::Binary } else { ContentKind::Text };

	Ok(FileRecord {
		path: path.to_path_buf(),
		relative_path,
		size: meta.len(),
		mtime_ms,
		content_kind,
		hash: None,
	})
}

/// Walk a root and build its file index with bounded metadata fan-out
pub async fn scan_tree(
	root: &Path,
	include_dirs: &[String],
	exclusion: &ExclusionEngine,
	concurrency: usize,
	side: Side,
	progress: &ProgressReporter,
) -> Result<ScanResult, SyncError> {
	if !root.is_dir() {
		debug!("Scan root {} does not exist, treating as empty", root.display());
		return Ok(ScanResult::default());
	}

	let walk_root = root.to_path_buf();
	let walk_includes = include_dirs.to_vec();
	let walk_engine = exclusion.clone();
	let (files, mut errors) = tokio::task::spawn_blocking(move || {
		walk_tree(&walk_root, &walk_includes, &walk_engine)
	})
	.await
	.map_err(|e| SyncError::Other { message: format!("Walk task failed: {}", e) })?;

	let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
	let mut handles = Vec::with_capacity(files.len());

	for (rel, path) in files {
		let permit = semaphore
			.clone()
			.acquire_owned()
			.await
			.map_err(|e| SyncError::Other { message: format!("Scan semaphore closed: {}", e) })?;
		handles.push(tokio::task::spawn_blocking(move || {
			let _permit = permit;
			let result = read_record(&path, rel.clone());
			(rel, result)
		}));
	}

	let mut index = FileIndex::new();
	for handle in handles {
		match handle.await {
			Ok((_, Ok(record))) => {
				index.insert(record.relative_path.clone(), record);
				progress.emit(ProgressEvent::FilesScanned { side, count: index.len() });
			}
			Ok((rel, Err(e))) => {
				warn!("Skipping {}: {}", rel, e);
				errors.push(format!("{}: {}", rel, e));
			}
			Err(e) => {
				warn!("Metadata task failed: {}", e);
				errors.push(format!("metadata task failed: {}", e));
			}
		}
	}

	debug!("Scanned {} file(s) under {}", index.len(), root.display());
	Ok(ScanResult { index, errors })
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	fn engine(patterns: &[&str]) -> ExclusionEngine {
		let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
		ExclusionEngine::from_patterns(&patterns).unwrap()
	}

	#[test]
	fn test_walk_prunes_excluded_dirs() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
		fs::create_dir_all(dir.path().join("docs")).unwrap();
		fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
		fs::write(dir.path().join("docs/a.md"), "a").unwrap();
		fs::write(dir.path().join("build.log"), "log").unwrap();

		let (files, errors) = walk_tree(dir.path(), &[], &engine(&["node_modules/**", "*.log"]));
		let rels: Vec<&str> = files.iter().map(|(r, _)| r.as_str()).collect();
		assert_eq!(rels, vec!["docs/a.md"]);
		assert!(errors.is_empty());
	}

	#[test]
	fn test_walk_include_dirs() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join(".claude")).unwrap();
		fs::create_dir_all(dir.path().join("src")).unwrap();
		fs::write(dir.path().join(".claude/settings.json"), "{}").unwrap();
		fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
		fs::write(dir.path().join("top.txt"), "t").unwrap();

		let includes = vec![".claude".to_string(), "missing".to_string()];
		let (files, _) = walk_tree(dir.path(), &includes, &engine(&[]));
		let rels: Vec<&str> = files.iter().map(|(r, _)| r.as_str()).collect();
		assert_eq!(rels, vec![".claude/settings.json"]);
	}

	#[test]
	fn test_read_record_sniffs_binary() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("text.md"), "hello").unwrap();
		fs::write(dir.path().join("blob.bin"), [1u8, 0, 2, 3]).unwrap();

		let text = read_record(&dir.path().join("text.md"), "text.md".to_string()).unwrap();
		assert_eq!(text.content_kind, ContentKind::Text);
		assert_eq!(text.size, 5);

		let blob = read_record(&dir.path().join("blob.bin"), "blob.bin".to_string()).unwrap();
		assert_eq!(blob.content_kind, ContentKind::Binary);
	}

	#[tokio::test]
	async fn test_scan_missing_root_is_empty() {
		let dir = TempDir::new().unwrap();
		let result = scan_tree(
			&dir.path().join("nope"),
			&[],
			&engine(&[]),
			2,
			Side::Destination,
			&ProgressReporter::disabled(),
		)
		.await
		.unwrap();
		assert!(result.index.is_empty());
		assert!(result.errors.is_empty());
	}
}

// vim: ts=4
