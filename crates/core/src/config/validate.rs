use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Service endpoint is set
/// - Lookup timeout, attempts, burst and backoff multiplier are usable
/// - Ambiguity threshold is finite and non-negative
/// - At least one worker
/// - Table delimiter is a single ASCII character
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    // Service validation
    if config.service.base_url.trim().is_empty() {
        return invalid("service.base_url cannot be empty".to_string());
    }

    // Lookup validation
    let lookup = &config.lookup;
    if lookup.timeout_ms == 0 {
        return invalid("lookup.timeout_ms cannot be 0".to_string());
    }
    if lookup.max_attempts == 0 {
        return invalid("lookup.max_attempts cannot be 0".to_string());
    }
    if lookup.rate_limit_burst == 0 {
        return invalid("lookup.rate_limit_burst cannot be 0".to_string());
    }
    if !lookup.backoff_multiplier.is_finite() || lookup.backoff_multiplier < 1.0 {
        return invalid(format!(
            "lookup.backoff_multiplier must be at least 1.0, got {}",
            lookup.backoff_multiplier
        ));
    }

    // Resolver validation
    config
        .resolver
        .validate()
        .map_err(|msg| ConfigError::ValidationError(format!("resolver.{}", msg)))?;

    // Batch validation
    if config.batch.workers == 0 {
        return invalid("batch.workers cannot be 0".to_string());
    }

    // Table validation
    if config.table.delimiter_byte().is_none() {
        return invalid(format!(
            "table.delimiter must be a single ASCII character, got {:?}",
            config.table.delimiter
        ));
    }

    Ok(())
}
