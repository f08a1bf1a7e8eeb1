//! Key record domain

mod entity;
mod repository;
mod validation;

pub use entity::{KeyId, KeyRecord, QuotaConfig, RateLimitConfig, RefillConfig};
pub use repository::KeyRecordRepository;
pub use validation::{
    validate_ip_whitelist, validate_key_name, validate_quota, validate_rate_limit,
    KeyValidationError,
};
