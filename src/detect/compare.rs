//! Per-path comparison cascade: size, then mtime, then content

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::types::{Change, FileRecord};

/// Confidence of a modification reported from timestamps alone
pub const MTIME_ONLY_CONFIDENCE: f64 = 0.7;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Knobs for the comparison cascade
#[derive(Debug, Clone)]
pub struct CompareOptions {
	pub mtime_tolerance_ms: u64,
	pub content_compare: bool,
	pub large_binary_threshold: u64,
	pub sample_count: usize,
	pub sample_size: usize,
}

impl From<&Config> for CompareOptions {
	fn from(config: &Config) -> Self {
		CompareOptions {
			mtime_tolerance_ms: config.mtime_tolerance_ms,
			content_compare: config.content_compare,
			large_binary_threshold: config.large_binary_threshold,
			sample_count: config.sample_count,
			sample_size: config.sample_size,
		}
	}
}

/// BLAKE3 digest of a whole file, lowercase hex
pub fn hash_file(path: &Path) -> io::Result<String> {
	let mut file = File::open(path)?;
	let mut hasher = blake3::Hasher::new();
	let mut buf = vec![0u8; HASH_BUFFER_SIZE];
	loop {
		let n = file.read(&mut buf)?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Evenly spaced window offsets covering a file of `size` bytes
pub fn sample_offsets(size: u64, count: usize, window: usize) -> Vec<u64> {
	let window = window as u64;
	if count == 0 || size == 0 {
		return Vec::new();
	}
	let span = size.saturating_sub(window);
	if count == 1 {
		return vec![0];
	}
	(0..count as u64).map(|i| span * i / (count as u64 - 1)).collect()
}

/// BLAKE3 digest over the sampled windows of a file
pub fn sample_digest(path: &Path, size: u64, count: usize, window: usize) -> io::Result<String> {
	let mut file = File::open(path)?;
	let mut hasher = blake3::Hasher::new();
	let mut buf = vec![0u8; window];
	for offset in sample_offsets(size, count, window) {
		file.seek(SeekFrom::Start(offset))?;
		let mut filled = 0;
		while filled < buf.len() {
			let n = file.read(&mut buf[filled..])?;
			if n == 0 {
				break;
			}
			filled += n;
		}
		hasher.update(&offset.to_le_bytes());
		hasher.update(&buf[..filled]);
	}
	Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Outcome of comparing two equally sized files
#[derive(Debug, Clone, PartialEq)]
pub struct ContentComparison {
	pub equal: bool,
	pub sampled: bool,
	pub source_hash: Option<String>,
	pub dest_hash: Option<String>,
}

/// Compare content by full hash, or by sampled windows for large binaries
pub fn compare_content(
	source: &FileRecord,
	dest: &FileRecord,
	opts: &CompareOptions,
) -> io::Result<ContentComparison> {
	let large_binary = (source.is_binary() || dest.is_binary())
		&& source.size >= opts.large_binary_threshold;

	if large_binary {
		let s = sample_digest(&source.path, source.size, opts.sample_count, opts.sample_size)?;
		let d = sample_digest(&dest.path, dest.size, opts.sample_count, opts.sample_size)?;
		return Ok(ContentComparison {
			equal: s == d,
			sampled: true,
			source_hash: None,
			dest_hash: None,
		});
	}

	let s = hash_file(&source.path)?;
	let d = hash_file(&dest.path)?;
	Ok(ContentComparison { equal: s == d, sampled: false, source_hash: Some(s), dest_hash: Some(d) })
}

/// Run the cascade on one path present on both sides
///
/// Returns `None` when the files are considered identical.
pub fn compare_pair(
	source: &FileRecord,
	dest: &FileRecord,
	opts: &CompareOptions,
) -> io::Result<Option<Change>> {
	if source.size != dest.size {
		let delta = source.size as i128 - dest.size as i128;
		let reason =
			format!("size changed: {} -> {} bytes ({:+})", dest.size, source.size, delta);
		return Ok(Some(Change::modified_file(source.clone(), dest.clone(), reason, 1.0)));
	}

	let mtime_delta = source.mtime_ms.abs_diff(dest.mtime_ms);
	if mtime_delta <= opts.mtime_tolerance_ms {
		return Ok(None);
	}

	if !opts.content_compare {
		let reason = format!("mtime changed by {}ms, content not compared", mtime_delta);
		return Ok(Some(Change::modified_file(
			source.clone(),
			dest.clone(),
			reason,
			MTIME_ONLY_CONFIDENCE,
		)));
	}

	let cmp = compare_content(source, dest, opts)?;
	if cmp.equal {
		debug!("{}: timestamp-only difference of {}ms", source.relative_path, mtime_delta);
		return Ok(None);
	}

	let mut source = source.clone();
	let mut dest = dest.clone();
	source.hash = cmp.source_hash;
	dest.hash = cmp.dest_hash;
	let reason = if cmp.sampled {
		format!("sampled content differs (mtime delta {}ms)", mtime_delta)
	} else {
		format!("content hash differs (mtime delta {}ms)", mtime_delta)
	};
	Ok(Some(Change::modified_file(source, dest, reason, 1.0)))
}


// vim: ts=4
