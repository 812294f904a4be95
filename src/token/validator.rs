use crate::token::config::TokenConfig;
use crate::token::error::TokenError;
use crate::token::fingerprint::FINGERPRINT_DIVISOR;
use crate::token::layout::RawToken;
use std::sync::Arc;

/// Stateless fast-reject checks for tokens.
///
/// A token passes when all of the following hold:
///
/// 1. Its machine fingerprint is divisible by 91
/// 2. Its embedded timestamp is not before the base timestamp
/// 3. Its embedded timestamp is less than `max_future_skew` ahead of now
/// 4. At least two configured primes divide the multiplier once
///    `primes_add`, the random byte and the sequence are subtracted
///
/// Staleness is not checked here. A token from last year passes as long as it
/// is not from before the base timestamp; freshness belongs to
/// [`TokenCache`](crate::TokenCache).
///
/// None of this is cryptographic. It rejects obvious garbage without a lookup.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    config: Arc<TokenConfig>,
}

impl TokenValidator {
    pub fn new(config: Arc<TokenConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<TokenConfig> {
        &self.config
    }

    /// Returns `true` if the token passes every check. Never fails.
    pub fn is_valid(&self, token: &str) -> bool {
        self.verify(token).is_ok()
    }

    /// Runs every check and reports the first failure.
    pub fn verify(&self, token: &str) -> Result<(), TokenError> {
        let raw = RawToken::decode(token)?;
        self.verify_raw(&raw)
    }

    /// Runs every check against an already decoded token.
    pub fn verify_raw(&self, token: &RawToken) -> Result<(), TokenError> {
        let config = &self.config;

        if token.machine_fingerprint() % FINGERPRINT_DIVISOR != 0 {
            return Err(self.reject(TokenError::FingerprintMismatch));
        }

        let timestamp = self.timestamp_of(token);
        if timestamp < config.base_timestamp() {
            return Err(self.reject(TokenError::TimestampBeforeBase));
        }
        if timestamp.wrapping_sub(config.now()) >= config.max_future_skew() {
            return Err(self.reject(TokenError::FutureSkewExceeded));
        }

        let adjusted = token.multiplier().wrapping_sub(
            config
                .primes_add()
                .wrapping_add(token.random_byte() as i64)
                .wrapping_add(token.sequence() as i64),
        );
        if config.divisible_count(adjusted) < 2 {
            return Err(self.reject(TokenError::PrimeCheckFailed));
        }

        Ok(())
    }

    /// Returns the token's embedded timestamp in epoch millis, or 0 if the
    /// token cannot be decoded.
    ///
    /// Timestamps are stored in units of the time offset divisor, so the
    /// result may be up to one unit earlier than the moment of minting.
    pub fn extract_timestamp(&self, token: &str) -> i64 {
        match RawToken::decode(token) {
            Ok(raw) => self.timestamp_of(&raw),
            Err(_) => 0,
        }
    }

    fn timestamp_of(&self, token: &RawToken) -> i64 {
        (token.time_offset() as i64)
            .wrapping_mul(self.config.time_offset_divisor())
            .wrapping_add(self.config.base_timestamp())
    }

    fn reject(&self, error: TokenError) -> TokenError {
        tracing::debug!("Token rejected: {}", error);
        error
    }
}
