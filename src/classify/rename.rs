//! Rename/move inference by multi-factor similarity
//!
//! Pairing is greedy: new entries are visited in path order and each takes the
//! best still-unmatched deletion at or above the threshold. The number of
//! similarity evaluations is capped, so large change sets stay bounded.

use tracing::debug;

use crate::types::{Change, ChangeType, FileRecord};

const WEIGHT_SIZE: f64 = 4.0;
const WEIGHT_NAME: f64 = 3.0;
const WEIGHT_DIR: f64 = 2.0;
const WEIGHT_EXT: f64 = 1.0;
const WEIGHT_TOTAL: f64 = 10.0;

/// Scale from similarity to the confidence of an inferred move
pub const MOVE_CONFIDENCE_SCALE: f64 = 0.8;

const SCORE_EPSILON: f64 = 1e-9;

/// Edit distance over characters
pub fn levenshtein(a: &str, b: &str) -> usize {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();
	if a.is_empty() {
		return b.len();
	}
	if b.is_empty() {
		return a.len();
	}

	let mut prev: Vec<usize> = (0..=b.len()).collect();
	let mut curr = vec![0; b.len() + 1];
	for (i, ca) in a.iter().enumerate() {
		curr[0] = i + 1;
		for (j, cb) in b.iter().enumerate() {
			let cost = if ca == cb { 0 } else { 1 };
			curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
		}
		std::mem::swap(&mut prev, &mut curr);
	}
	prev[b.len()]
}

/// 1.0 for identical names, 0.0 for completely different ones
pub fn name_similarity(a: &str, b: &str) -> f64 {
	let longest = a.chars().count().max(b.chars().count());
	if longest == 0 {
		return 1.0;
	}
	1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn parent_components(rel: &str) -> Vec<&str> {
	let mut parts: Vec<&str> = rel.split('/').collect();
	parts.pop();
	parts
}

/// Shared leading directory components over the deeper of the two paths
pub fn directory_similarity(a: &str, b: &str) -> f64 {
	let da = parent_components(a);
	let db = parent_components(b);
	let deepest = da.len().max(db.len());
	if deepest == 0 {
		return 1.0;
	}
	let common = da.iter().zip(db.iter()).take_while(|(x, y)| x == y).count();
	common as f64 / deepest as f64
}

fn extension(name: &str) -> Option<&str> {
	match name.rfind('.') {
		Some(0) | None => None,
		Some(idx) => Some(&name[idx + 1..]),
	}
}

pub fn extension_match(a: &str, b: &str) -> bool {
	extension(a).map(str::to_lowercase) == extension(b).map(str::to_lowercase)
}

/// Similarity of a new file to a deleted one; exactly 0 when sizes differ
pub fn similarity(new: &FileRecord, deleted: &FileRecord) -> f64 {
	if new.size != deleted.size {
		return 0.0;
	}
	let name = name_similarity(new.file_name(), deleted.file_name());
	let dir = directory_similarity(&new.relative_path, &deleted.relative_path);
	let ext = if extension_match(new.file_name(), deleted.file_name()) { 1.0 } else { 0.0 };

	(WEIGHT_SIZE + WEIGHT_NAME * name + WEIGHT_DIR * dir + WEIGHT_EXT * ext) / WEIGHT_TOTAL
}

/// Replace matched new/deleted pairs with single `moved` changes
///
/// Returns the unpaired changes and the new moves, both unsorted.
pub fn infer_renames(
	changes: Vec<Change>,
	threshold: f64,
	max_comparisons: usize,
) -> (Vec<Change>, Vec<Change>) {
	let mut new_idx: Vec<usize> = Vec::new();
	let mut deleted_idx: Vec<usize> = Vec::new();
	for (i, c) in changes.iter().enumerate() {
		match c.change_type {
			ChangeType::New if c.source_file.is_some() => new_idx.push(i),
			ChangeType::Deleted if c.dest_file.is_some() => deleted_idx.push(i),
			_ => {}
		}
	}
	if new_idx.is_empty() || deleted_idx.is_empty() {
		return (changes, Vec::new());
	}
	new_idx.sort_by(|&a, &b| changes[a].path.cmp(&changes[b].path));

	let mut deleted_taken = vec![false; deleted_idx.len()];
	let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
	let mut comparisons = 0usize;

	'outer: for &ni in &new_idx {
		let Some(new_rec) = changes[ni].source_file.as_ref() else {
			continue;
		};
		let mut best: Option<(usize, f64)> = None;
		for (slot, &di) in deleted_idx.iter().enumerate() {
			if deleted_taken[slot] {
				continue;
			}
			if comparisons >= max_comparisons {
				debug!("Rename inference stopped after {} comparison(s)", comparisons);
				if let Some((slot, score)) = best {
					if score + SCORE_EPSILON >= threshold {
						deleted_taken[slot] = true;
						pairs.push((ni, deleted_idx[slot], score));
					}
				}
				break 'outer;
			}
			comparisons += 1;
			let Some(del_rec) = changes[di].dest_file.as_ref() else {
				continue;
			};
			// A file cannot move onto its own path; that pair is a create-delete conflict
			if del_rec.relative_path == new_rec.relative_path {
				continue;
			}
			let score = similarity(new_rec, del_rec);
			if best.map(|(_, b)| score > b).unwrap_or(true) {
				best = Some((slot, score));
			}
		}
		if let Some((slot, score)) = best {
			if score + SCORE_EPSILON >= threshold {
				deleted_taken[slot] = true;
				pairs.push((ni, deleted_idx[slot], score));
			}
		}
	}

	if pairs.is_empty() {
		return (changes, Vec::new());
	}

	let mut consumed = vec![false; changes.len()];
	let mut moves = Vec::with_capacity(pairs.len());
	for &(ni, di, score) in &pairs {
		consumed[ni] = true;
		consumed[di] = true;
		let new_change = &changes[ni];
		let del_change = &changes[di];
		if let (Some(source), Some(dest)) = (&new_change.source_file, &del_change.dest_file) {
			let reason = format!(
				"same size as removed {}, similarity {:.2}",
				dest.relative_path, score
			);
			let moved = Change::moved_file(
				source.clone(),
				dest.clone(),
				reason,
				MOVE_CONFIDENCE_SCALE * score,
			)
			.with_detected_at(new_change.detected_at);
			moves.push(moved);
		}
	}

	let rest = changes
		.into_iter()
		.enumerate()
		.filter(|(i, _)| !consumed[*i])
		.map(|(_, c)| c)
		.collect();
	(rest, moves)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::ContentKind;
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

	#[test]
	fn test_levenshtein() {
		assert_eq!(levenshtein("kitten", "sitting"), 3);
		assert_eq!(levenshtein("", "abc"), 3);
		assert_eq!(levenshtein("same", "same"), 0);
	}

	#[test]
	fn test_similarity_zero_on_size_mismatch() {
		let a = record("docs/guide.md", 100);
		let b = record("docs/guide.md", 101);
		assert_eq!(similarity(&a, &b), 0.0);
	}

	#[test]
	fn test_similarity_identical_paths_is_one() {
		let a = record("docs/guide.md", 100);
		assert!((similarity(&a, &a) - 1.0).abs() < 1e-12);
	}

	#[test]
	fn test_directory_move_reaches_threshold() {
		let new = record("new/guide.md", 42);
		let old = record("old/guide.md", 42);
		// size 0.4 + name 0.3 + dir 0.0 + ext 0.1
		assert!((similarity(&new, &old) - 0.8).abs() < 1e-12);
	}

	#[test]
	fn test_infer_renames_pairs_best_match() {
		let changes = vec![
			Change::new_file(record("docs/intro.md", 10)),
			Change::deleted_file(record("docs/introduction.md", 10)),
			Change::deleted_file(record("docs/intro.txt", 10)),
			Change::new_file(record("other.bin", 99)),
		];

		let (rest, moves) = infer_renames(changes, 0.7, 10_000);
		assert_eq!(moves.len(), 1);
		let mv = &moves[0];
		assert_eq!(mv.change_type, ChangeType::Moved);
		assert_eq!(mv.path, "docs/intro.md");
		// intro.md scores 0.86 against introduction.md and 0.8 against intro.txt
		assert_eq!(mv.old_path.as_deref(), Some("docs/introduction.md"));
		assert!(mv.confidence() <= MOVE_CONFIDENCE_SCALE);
		assert_eq!(rest.len(), 2);
	}

	#[test]
	fn test_infer_renames_below_threshold_keeps_changes() {
		let changes = vec![
			Change::new_file(record("a/x.md", 10)),
			Change::deleted_file(record("b/completely-different.txt", 10)),
		];
		let (rest, moves) = infer_renames(changes, 0.8, 10_000);
		assert!(moves.is_empty());
		assert_eq!(rest.len(), 2);
	}

	#[test]
	fn test_infer_renames_skips_same_path() {
		let changes = vec![
			Change::new_file(record("x.md", 7)),
			Change::deleted_file(record("x.md", 7)),
		];
		let (rest, moves) = infer_renames(changes, 0.8, 10_000);
		assert!(moves.is_empty());
		assert_eq!(rest.len(), 2);
	}

	#[test]
	fn test_infer_renames_respects_cap() {
		let changes = vec![
			Change::new_file(record("a/file.md", 10)),
			Change::deleted_file(record("b/file.md", 10)),
		];
		let (rest, moves) = infer_renames(changes, 0.8, 0);
		assert!(moves.is_empty());
		assert_eq!(rest.len(), 2);
	}
}

// vim: ts=4
