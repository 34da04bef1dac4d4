//! Enrichment: record backfill, confidence baseline, reason analysis, risk and hints

use crate::types::{
	Change, ChangeAnalysis, ChangeType, Clarity, FileIndex, ProcessingHint, ReasonAnalysis,
	Reliability, RiskAssessment, RiskLevel,
};

use super::ClassifierOptions;

/// Reason keywords backed by direct evidence (sizes, digests, presence)
pub const HIGH_RELIABILITY_KEYWORDS: &[&str] = &["size", "hash", "content", "exists", "missing"];

/// Reason keywords backed by timestamps only
pub const MEDIUM_RELIABILITY_KEYWORDS: &[&str] = &["timestamp", "mtime"];

const RISK_DELETE: u32 = 30;
const RISK_CRITICAL: u32 = 25;
const RISK_LARGE: u32 = 15;
const RISK_MOVE: u32 = 10;
const RISK_BINARY: u32 = 10;
const RISK_NEW: u32 = 5;

/// Upper bound on confidence for each change type
pub fn base_confidence(change_type: ChangeType) -> f64 {
	match change_type {
		ChangeType::New | ChangeType::Deleted => 1.0,
		ChangeType::Modified => 0.9,
		ChangeType::Moved => 0.8,
	}
}

pub fn reliability_factor(reliability: Reliability) -> f64 {
	match reliability {
		Reliability::High => 1.0,
		Reliability::Medium => 0.95,
		Reliability::Low => 0.85,
	}
}

/// Classify a free-text reason by the evidence it cites
pub fn analyze_reason(reason: &str) -> ReasonAnalysis {
	let lower = reason.to_lowercase();
	let high: Vec<&str> =
		HIGH_RELIABILITY_KEYWORDS.iter().copied().filter(|k| lower.contains(k)).collect();
	let medium: Vec<&str> =
		MEDIUM_RELIABILITY_KEYWORDS.iter().copied().filter(|k| lower.contains(k)).collect();

	let reliability = if !high.is_empty() {
		Reliability::High
	} else if !medium.is_empty() {
		Reliability::Medium
	} else {
		Reliability::Low
	};
	let clarity = if high.is_empty() && medium.is_empty() { Clarity::Vague } else { Clarity::Clear };
	let keywords = high.into_iter().chain(medium).map(String::from).collect();

	ReasonAnalysis { reliability, clarity, keywords }
}

fn touches_critical(change: &Change, opts: &ClassifierOptions) -> bool {
	opts.is_critical(&change.path)
		|| change.old_path.as_deref().map(|p| opts.is_critical(p)).unwrap_or(false)
}

pub fn assess_risk(change: &Change, opts: &ClassifierOptions) -> RiskAssessment {
	let mut score = 0;
	let mut factors = Vec::new();

	match change.change_type {
		ChangeType::Deleted => {
			score += RISK_DELETE;
			factors.push("deletion".to_string());
		}
		ChangeType::Moved => {
			score += RISK_MOVE;
			factors.push("move".to_string());
		}
		ChangeType::New => {
			score += RISK_NEW;
			factors.push("new file".to_string());
		}
		ChangeType::Modified => {}
	}
	if touches_critical(change, opts) {
		score += RISK_CRITICAL;
		factors.push("critical file".to_string());
	}
	if change.size() > opts.large_file_bytes {
		score += RISK_LARGE;
		factors.push(format!("large file ({} bytes)", change.size()));
	}
	if change.is_binary() {
		score += RISK_BINARY;
		factors.push("binary content".to_string());
	}

	let level = match score {
		s if s < 20 => RiskLevel::Low,
		s if s < 40 => RiskLevel::Medium,
		_ => RiskLevel::High,
	};
	RiskAssessment { score, level, factors }
}

pub fn processing_hints(change: &Change, opts: &ClassifierOptions) -> Vec<ProcessingHint> {
	let mut hints = Vec::new();
	if change.is_binary() {
		hints.push(ProcessingHint::BinaryFile);
	}
	if change.size() > opts.large_file_bytes {
		hints.push(ProcessingHint::LargeFile);
	}
	if touches_critical(change, opts) {
		hints.push(ProcessingHint::CriticalFile);
	}
	if change.change_type == ChangeType::Deleted {
		hints.push(ProcessingHint::RequiresConfirmation);
	}
	hints
}

/// Fill in file records the change type requires but the detector left out
pub fn backfill(change: &mut Change, source: &FileIndex, dest: &FileIndex) {
	let needs_source = matches!(
		change.change_type,
		ChangeType::New | ChangeType::Modified | ChangeType::Moved
	);
	if needs_source && change.source_file.is_none() {
		change.source_file = source.get(&change.path).cloned();
	}

	let dest_key = match change.change_type {
		ChangeType::Deleted | ChangeType::Modified => Some(change.path.clone()),
		ChangeType::Moved => change.old_path.clone(),
		ChangeType::New => None,
	};
	if let Some(key) = dest_key {
		if change.dest_file.is_none() {
			change.dest_file = dest.get(&key).cloned();
		}
	}
}

/// Apply every enrichment step to one change
pub fn enrich(change: &mut Change, source: &FileIndex, dest: &FileIndex, opts: &ClassifierOptions) {
	backfill(change, source, dest);

	let reason = analyze_reason(&change.reason);
	let capped = change.confidence().min(base_confidence(change.change_type));
	change.set_confidence(capped * reliability_factor(reason.reliability));

	let risk = assess_risk(change, opts);
	let hints = processing_hints(change, opts);
	change.analysis = Some(ChangeAnalysis { reason, risk, hints });
}


// vim: ts=4
