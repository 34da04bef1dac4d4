//! Strategy and mode enums
//!
//! Each enum includes a FromStr implementation for CLI and config parsing.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// CONFLICT STRATEGY
// ============================================================================

/// How a `conflict` operation is applied to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
	/// Leave the destination untouched (default)
	#[default]
	Skip,

	/// Overwrite the destination with the source version
	UseSource,

	/// Keep the destination's local version
	KeepLocal,
}

impl FromStr for ConflictStrategy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().replace('-', "_").as_str() {
			"skip" => Ok(Self::Skip),
			"use_source" | "source" | "overwrite" => Ok(Self::UseSource),
			"keep_local" | "local" | "keep" => Ok(Self::KeepLocal),
			_ => Err(format!(
				"Unknown conflict strategy: {}. Valid options: skip, use_source, keep_local",
				s
			)),
		}
	}
}

impl std::fmt::Display for ConflictStrategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Skip => write!(f, "skip"),
			Self::UseSource => write!(f, "use_source"),
			Self::KeepLocal => write!(f, "keep_local"),
		}
	}
}

impl ConflictStrategy {
	/// Whether the strategy writes to the destination
	pub fn mutates_destination(&self) -> bool {
		matches!(self, Self::UseSource)
	}

	/// Audit message recorded for operations that leave the destination alone
	pub fn skip_message(&self) -> &'static str {
		match self {
			Self::Skip => "conflict skipped, destination left unchanged",
			Self::KeepLocal => "conflict resolved by keeping local destination version",
			Self::UseSource => "conflict resolved with source version",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_conflict_strategy_from_str() {
		assert_eq!(ConflictStrategy::from_str("skip").unwrap(), ConflictStrategy::Skip);
		assert_eq!(ConflictStrategy::from_str("use_source").unwrap(), ConflictStrategy::UseSource);
		assert_eq!(ConflictStrategy::from_str("use-source").unwrap(), ConflictStrategy::UseSource);
		assert_eq!(ConflictStrategy::from_str("KEEP_LOCAL").unwrap(), ConflictStrategy::KeepLocal);
		assert!(ConflictStrategy::from_str("newest").is_err());
	}

	#[test]
	fn test_conflict_strategy_display_roundtrips() {
		for strategy in
			[ConflictStrategy::Skip, ConflictStrategy::UseSource, ConflictStrategy::KeepLocal]
		{
			assert_eq!(ConflictStrategy::from_str(&strategy.to_string()).unwrap(), strategy);
		}
	}

	#[test]
	fn test_skip_variants_have_distinct_messages() {
		assert_ne!(
			ConflictStrategy::Skip.skip_message(),
			ConflictStrategy::KeepLocal.skip_message()
		);
		assert!(!ConflictStrategy::Skip.mutates_destination());
		assert!(ConflictStrategy::UseSource.mutates_destination());
	}
}

// vim: ts=4
