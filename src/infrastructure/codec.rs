//! Credential codec
//!
//! Generates raw key material and derives the non-reversible lookup
//! fingerprint. Raw keys exist only in the creation/rotation response;
//! everything else in the system handles fingerprints.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes per key: 256 bits of entropy.
const KEY_BYTES: usize = 32;

/// Characters of the random portion kept in the display prefix.
const PREFIX_CHARS: usize = 8;

/// Result of minting a new credential
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    /// The full raw key. Shown once; never persisted or logged.
    pub raw_key: String,
    /// Keyed-hash fingerprint, the only stored representation of the key
    pub fingerprint: String,
    /// Truncated display form for identification, e.g. "sk_live_ab12cd34..."
    pub key_prefix: String,
}

/// Codec keyed by the server-side hashing secret.
///
/// The secret is injected at construction so two deployments with different
/// secrets can never produce colliding fingerprints, and so tests can supply
/// a fixed value.
#[derive(Clone)]
pub struct CredentialCodec {
    secret: Vec<u8>,
    prefix: String,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("secret", &"<redacted>")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl CredentialCodec {
    pub fn new(secret: impl Into<Vec<u8>>, prefix: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Mint a new key: `prefix + base64url(32 random bytes)`.
    pub fn generate(&self) -> Result<GeneratedKey, DomainError> {
        let mut random_bytes = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let encoded = URL_SAFE_NO_PAD.encode(random_bytes);
        let raw_key = format!("{}{}", self.prefix, encoded);
        let key_prefix = format!(
            "{}{}...",
            self.prefix,
            &encoded[..PREFIX_CHARS.min(encoded.len())]
        );
        let fingerprint = self.fingerprint(&raw_key)?;

        Ok(GeneratedKey {
            raw_key,
            fingerprint,
            key_prefix,
        })
    }

    /// Deterministic keyed one-way hash of a presented key: HMAC-SHA256
    /// under the server secret, hex-encoded.
    pub fn fingerprint(&self, raw_key: &str) -> Result<String, DomainError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| DomainError::internal(format!("HMAC init failed: {err}")))?;
        mac.update(raw_key.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Compare two secret-derived strings in time independent of where the first
/// mismatch occurs.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() != b_bytes.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a_bytes.iter().zip(b_bytes.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> CredentialCodec {
        CredentialCodec::new("test-secret", "sk_test_")
    }

    #[test]
    fn test_generate_key_shape() {
        let generated = test_codec().generate().unwrap();

        assert!(generated.raw_key.starts_with("sk_test_"));
        assert!(generated.key_prefix.starts_with("sk_test_"));
        assert!(generated.key_prefix.ends_with("..."));
        // 32 bytes of entropy encode to 43 base64url chars
        assert_eq!(generated.raw_key.len(), "sk_test_".len() + 43);
        // hex-encoded SHA-256 output
        assert_eq!(generated.fingerprint.len(), 64);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let codec = test_codec();
        let generated = codec.generate().unwrap();

        assert_eq!(
            codec.fingerprint(&generated.raw_key).unwrap(),
            generated.fingerprint
        );
        assert_eq!(
            codec.fingerprint(&generated.raw_key).unwrap(),
            codec.fingerprint(&generated.raw_key).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_not_raw_key() {
        let generated = test_codec().generate().unwrap();
        assert!(!generated.fingerprint.contains(&generated.raw_key));
    }

    #[test]
    fn test_different_secrets_never_collide() {
        let a = CredentialCodec::new("secret-a", "sk_test_");
        let b = CredentialCodec::new("secret-b", "sk_test_");

        assert_ne!(
            a.fingerprint("sk_test_same").unwrap(),
            b.fingerprint("sk_test_same").unwrap()
        );
    }

    #[test]
    fn test_fingerprint_accepts_any_secret_length() {
        let empty = CredentialCodec::new(Vec::new(), "sk_test_");
        let long = CredentialCodec::new(vec![0x42u8; 1024], "sk_test_");

        assert_eq!(empty.fingerprint("sk_test_x").unwrap().len(), 64);
        assert_eq!(long.fingerprint("sk_test_x").unwrap().len(), 64);
    }

    #[test]
    fn test_generated_keys_unique() {
        let codec = test_codec();
        let one = codec.generate().unwrap();
        let two = codec.generate().unwrap();

        assert_ne!(one.raw_key, two.raw_key);
        assert_ne!(one.fingerprint, two.fingerprint);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abcdef", "abcdef"));
        assert!(!constant_time_eq("abcdef", "abcdeg"));
        assert!(!constant_time_eq("abcdef", "abcde"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_constant_time_eq_timing_independence() {
        // Statistical check: mismatch at the first byte should not be
        // measurably faster than mismatch at the last byte.
        let base = "a".repeat(4096);
        let early = format!("b{}", "a".repeat(4095));
        let late = format!("{}b", "a".repeat(4095));

        let time_comparisons = |other: &str| {
            let start = std::time::Instant::now();
            for _ in 0..2000 {
                std::hint::black_box(constant_time_eq(
                    std::hint::black_box(&base),
                    std::hint::black_box(other),
                ));
            }
            start.elapsed()
        };

        // Warm up caches before measuring
        time_comparisons(&early);
        time_comparisons(&late);

        let early_time = time_comparisons(&early).as_nanos() as f64;
        let late_time = time_comparisons(&late).as_nanos() as f64;
        let ratio = early_time.max(late_time) / early_time.min(late_time).max(1.0);

        // Generous bound: an early-exit comparison differs by orders of
        // magnitude here, a constant-time one stays close to 1.
        assert!(ratio < 3.0, "timing ratio too large: {ratio}");
    }
}
