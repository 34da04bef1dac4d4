//! Conflict detection among changes on the same path

use std::collections::BTreeMap;

use crate::types::{Change, ChangeType, Conflict, ConflictKind, ConflictMember, Severity};

/// Confidence multiplier applied to every change involved in a conflict
pub const CONFLICT_DISCOUNT: f64 = 0.7;

fn member(change: &Change) -> ConflictMember {
	ConflictMember {
		change_type: change.change_type,
		detected_at: change.detected_at,
		reason: change.reason.clone(),
	}
}

/// Modified changes in the group that have another modification within the window
fn concurrent_modifications(changes: &[Change], group: &[usize], window_ms: u64) -> Vec<usize> {
	let modified: Vec<usize> = group
		.iter()
		.copied()
		.filter(|&i| changes[i].change_type == ChangeType::Modified)
		.collect();

	modified
		.iter()
		.copied()
		.filter(|&i| {
			modified.iter().any(|&j| {
				j != i && changes[i].detected_at.abs_diff(changes[j].detected_at) <= window_ms
			})
		})
		.collect()
}

/// Tag conflicting changes in place and return the conflict descriptors
///
/// New + deleted on one path is a high-severity create-delete conflict. Two or
/// more modifications observed within `window_ms` of each other are a
/// medium-severity concurrent modification.
pub fn detect_conflicts(changes: &mut [Change], window_ms: u64) -> Vec<Conflict> {
	let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
	for (i, change) in changes.iter().enumerate() {
		groups.entry(change.path.clone()).or_default().push(i);
	}

	let mut conflicts = Vec::new();
	for (path, group) in groups {
		if group.len() < 2 {
			continue;
		}

		let has_new = group.iter().any(|&i| changes[i].change_type == ChangeType::New);
		let has_deleted = group.iter().any(|&i| changes[i].change_type == ChangeType::Deleted);
		if has_new && has_deleted {
			let involved: Vec<usize> = group
				.iter()
				.copied()
				.filter(|&i| {
					matches!(changes[i].change_type, ChangeType::New | ChangeType::Deleted)
				})
				.collect();
			conflicts.push(tag(changes, &involved, ConflictKind::CreateDelete, Severity::High, &path));
		}

		let involved = concurrent_modifications(changes, &group, window_ms);
		if involved.len() > 1 {
			conflicts.push(tag(
				changes,
				&involved,
				ConflictKind::ConcurrentModification,
				Severity::Medium,
				&path,
			));
		}
	}
	conflicts
}

fn tag(
	changes: &mut [Change],
	involved: &[usize],
	kind: ConflictKind,
	severity: Severity,
	path: &str,
) -> Conflict {
	let conflict = Conflict {
		kind,
		severity,
		path: path.to_string(),
		members: involved.iter().map(|&i| member(&changes[i])).collect(),
	};
	for &i in involved {
		changes[i].conflict = Some(conflict.clone());
		changes[i].discount(CONFLICT_DISCOUNT);
	}
	conflict
}


// vim: ts=4
