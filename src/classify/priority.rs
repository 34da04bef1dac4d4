//! Execution priority and final ordering

use crate::types::{Change, ChangeType};

use super::ClassifierOptions;

pub fn base_priority(change_type: ChangeType) -> i32 {
	match change_type {
		ChangeType::Deleted => 10,
		ChangeType::Modified => 20,
		ChangeType::Moved => 30,
		ChangeType::New => 40,
	}
}

/// Lower runs earlier
pub fn priority_for(change: &Change, opts: &ClassifierOptions) -> i32 {
	let mut priority = base_priority(change.change_type);
	if opts.is_critical(&change.path) {
		priority -= 10;
	}
	if opts.is_config_file(&change.path) {
		priority -= 5;
	}
	if change.size() > opts.priority_size_bytes {
		priority += 5;
	}
	if change.is_conflicted() {
		priority -= 15;
	}
	if change.is_binary() {
		priority += 2;
	}
	priority
}

/// Ascending by priority, then by path
pub fn sort_changes(changes: &mut [Change]) {
	changes.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.path.cmp(&b.path)));
}


// vim: ts=4
