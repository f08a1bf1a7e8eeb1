//! Key configuration validation
//!
//! Policy configuration is validated when keys are created or updated, never
//! on the verification path.

use thiserror::Error;

use crate::domain::access::{validate_whitelist, WhitelistError};
use crate::domain::DomainError;

use super::entity::{QuotaConfig, RateLimitConfig};

const MAX_KEY_NAME_LENGTH: usize = 255;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeyValidationError {
    #[error("Key name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("Rate limit max_requests must be greater than zero")]
    ZeroRateLimit,

    #[error("Rate limit window must be greater than zero seconds")]
    ZeroRateWindow,

    #[error("Quota max_uses must be greater than zero")]
    NonPositiveQuota,

    #[error("Refill amount must be greater than zero")]
    NonPositiveRefillAmount,

    #[error("Refill interval must be greater than zero seconds")]
    ZeroRefillInterval,

    #[error(transparent)]
    Whitelist(#[from] WhitelistError),
}

impl From<KeyValidationError> for DomainError {
    fn from(err: KeyValidationError) -> Self {
        DomainError::validation(err.to_string())
    }
}

pub fn validate_key_name(name: &str) -> Result<(), KeyValidationError> {
    if name.len() > MAX_KEY_NAME_LENGTH {
        return Err(KeyValidationError::NameTooLong(MAX_KEY_NAME_LENGTH));
    }
    Ok(())
}

pub fn validate_rate_limit(config: &RateLimitConfig) -> Result<(), KeyValidationError> {
    if config.max_requests == 0 {
        return Err(KeyValidationError::ZeroRateLimit);
    }
    if config.window_secs == 0 {
        return Err(KeyValidationError::ZeroRateWindow);
    }
    Ok(())
}

pub fn validate_quota(config: &QuotaConfig) -> Result<(), KeyValidationError> {
    if config.max_uses <= 0 {
        return Err(KeyValidationError::NonPositiveQuota);
    }
    if let Some(refill) = &config.refill {
        if refill.amount <= 0 {
            return Err(KeyValidationError::NonPositiveRefillAmount);
        }
        if refill.interval_secs == 0 {
            return Err(KeyValidationError::ZeroRefillInterval);
        }
    }
    Ok(())
}

pub fn validate_ip_whitelist(entries: &[String]) -> Result<(), KeyValidationError> {
    validate_whitelist(entries)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_configs() {
        assert!(validate_key_name("billing service").is_ok());
        assert!(validate_rate_limit(&RateLimitConfig::new(100, 60)).is_ok());
        assert!(validate_quota(&QuotaConfig::new(10).with_refill(3600, 10)).is_ok());
        assert!(validate_ip_whitelist(&["10.0.0.0/8".to_string()]).is_ok());
    }

    #[test]
    fn test_name_too_long() {
        let name = "a".repeat(256);
        assert_eq!(
            validate_key_name(&name),
            Err(KeyValidationError::NameTooLong(255))
        );
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        assert_eq!(
            validate_rate_limit(&RateLimitConfig::new(0, 60)),
            Err(KeyValidationError::ZeroRateLimit)
        );
        assert_eq!(
            validate_rate_limit(&RateLimitConfig::new(10, 0)),
            Err(KeyValidationError::ZeroRateWindow)
        );
    }

    #[test]
    fn test_bad_quota_rejected() {
        assert_eq!(
            validate_quota(&QuotaConfig::new(0)),
            Err(KeyValidationError::NonPositiveQuota)
        );
        assert_eq!(
            validate_quota(&QuotaConfig::new(5).with_refill(0, 5)),
            Err(KeyValidationError::ZeroRefillInterval)
        );
        assert_eq!(
            validate_quota(&QuotaConfig::new(5).with_refill(60, 0)),
            Err(KeyValidationError::NonPositiveRefillAmount)
        );
    }

    #[test]
    fn test_whitelist_error_converts_to_domain_error() {
        let err = validate_ip_whitelist(&["nope".to_string()]).unwrap_err();
        let domain: DomainError = err.into();
        assert!(domain.to_string().contains("Invalid whitelist entry"));
    }
}
