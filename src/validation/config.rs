//! Configuration validation functions

use super::ValidationError;

/// Validate a similarity/probability threshold (must be within 0.0..=1.0)
pub fn validate_threshold(name: &str, value: f64) -> Result<(), ValidationError> {
	if !(0.0..=1.0).contains(&value) {
		return Err(ValidationError::ConfigError(format!(
			"{} must be between 0.0 and 1.0, got {}",
			name, value
		)));
	}
	Ok(())
}

/// Validate retry count
pub fn validate_retry_count(count: u32) -> Result<(), ValidationError> {
	if count == 0 {
		return Err(ValidationError::ConfigError("Retry count must be at least 1".to_string()));
	}
	if count > 100 {
		return Err(ValidationError::ConfigError(format!("Retry count too high: {}", count)));
	}
	Ok(())
}

/// Validate a timeout in milliseconds
pub fn validate_timeout_ms(name: &str, timeout_ms: u64) -> Result<(), ValidationError> {
	if timeout_ms == 0 {
		return Err(ValidationError::ConfigError(format!("{} must be greater than 0", name)));
	}
	if timeout_ms > 3_600_000 {
		return Err(ValidationError::ConfigError(format!(
			"{} too large: {}ms (max 3600000)",
			name, timeout_ms
		)));
	}
	Ok(())
}

/// Validate large-binary sampling parameters
pub fn validate_sampling(sample_count: usize, sample_size: usize) -> Result<(), ValidationError> {
	if sample_count == 0 {
		return Err(ValidationError::ConfigError("sampleCount must be at least 1".to_string()));
	}
	if sample_size == 0 {
		return Err(ValidationError::ConfigError("sampleSize must be greater than 0".to_string()));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validate_threshold() {
		assert!(validate_threshold("t", 0.0).is_ok());
		assert!(validate_threshold("t", 0.8).is_ok());
		assert!(validate_threshold("t", 1.0).is_ok());
		assert!(validate_threshold("t", -0.1).is_err());
		assert!(validate_threshold("t", f64::NAN).is_err());
	}

	#[test]
	fn test_validate_retry_count() {
		assert!(validate_retry_count(1).is_ok());
		assert!(validate_retry_count(100).is_ok());
		assert!(validate_retry_count(0).is_err());
		let result = validate_retry_count(101);
		assert!(result.unwrap_err().to_string().contains("too high"));
	}

	#[test]
	fn test_validate_timeout_ms() {
		assert!(validate_timeout_ms("wait", 100).is_ok());
		assert!(validate_timeout_ms("wait", 0).is_err());
		let result = validate_timeout_ms("wait", 3_600_001);
		assert!(result.unwrap_err().to_string().contains("too large"));
	}

	#[test]
	fn test_validate_sampling() {
		assert!(validate_sampling(3, 4096).is_ok());
		assert!(validate_sampling(0, 4096).is_err());
		assert!(validate_sampling(3, 0).is_err());
	}
}

// vim: ts=4
