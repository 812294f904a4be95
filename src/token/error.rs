use thiserror::Error;

/// Error types produced while configuring, minting or checking tokens.
///
/// The variants fall into two groups:
///
/// - **Rejections**: `MalformedToken`, `FingerprintMismatch`, `TimestampBeforeBase`,
///   `FutureSkewExceeded`, `PrimeCheckFailed`, `NotIssued`, `Expired`, `AlreadyUsed`
/// - **System errors**: `ConfigurationError`, `InvalidArgument`, `EntropyError`
///
/// Rejections are only ever seen through the `verify` methods. The boolean
/// predicates (`is_valid`) collapse all of them into `false`, so a caller gating
/// a request cannot tell a decoding failure apart from a failed arithmetic check.
///
/// # Example
///
/// ```rust
/// use fast_token::{TokenCache, TokenConfig, TokenError};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), TokenError> {
/// let config = Arc::new(TokenConfig::builder().build()?);
/// let cache = TokenCache::builder(config).build();
///
/// match cache.verify("not-a-token") {
///     Ok(()) => println!("accepted"),
///     Err(TokenError::MalformedToken) => println!("garbage"),
///     Err(TokenError::NotIssued) => println!("not minted here"),
///     Err(e) => println!("rejected: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not valid base64 or decodes to fewer than 36 bytes.
    #[error("Malformed token")]
    MalformedToken,

    /// The embedded machine fingerprint is not divisible by 91.
    #[error("Machine fingerprint mismatch")]
    FingerprintMismatch,

    /// The embedded timestamp predates the configured base timestamp.
    #[error("Timestamp before base timestamp")]
    TimestampBeforeBase,

    /// The embedded timestamp is further in the future than the allowed skew.
    #[error("Timestamp too far in the future")]
    FutureSkewExceeded,

    /// Fewer than two configured primes divide the adjusted multiplier.
    #[error("Prime check failed")]
    PrimeCheckFailed,

    /// The token is well formed but was not issued by this cache, or its
    /// issuance record has already expired.
    #[error("Token not issued by this process")]
    NotIssued,

    /// The token is older than the issuance cache TTL.
    #[error("Token expired")]
    Expired,

    /// The token was already redeemed.
    #[error("Token already used")]
    AlreadyUsed,

    /// Startup configuration is unusable.
    ///
    /// # When This Occurs
    ///
    /// - Default primes used in production mode
    /// - A frozen test timestamp configured in production mode
    /// - Unparsable environment values, a non-positive divisor, or a prime list
    ///   with fewer than two usable primes
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A caller passed an argument outside the accepted range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The randomness source failed; no token is issued.
    #[error("Entropy error: {0}")]
    EntropyError(String),
}

impl TokenError {
    /// Returns `true` for the variants that describe a rejected token rather
    /// than a failure of the system itself.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            TokenError::ConfigurationError(_)
                | TokenError::InvalidArgument(_)
                | TokenError::EntropyError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TokenError::MalformedToken.to_string(), "Malformed token");
        assert_eq!(TokenError::Expired.to_string(), "Token expired");
        assert_eq!(
            TokenError::PrimeCheckFailed.to_string(),
            "Prime check failed"
        );

        let config_error = TokenError::ConfigurationError("bad primes".to_string());
        assert_eq!(config_error.to_string(), "Configuration error: bad primes");

        let arg_error = TokenError::InvalidArgument("count".to_string());
        assert_eq!(arg_error.to_string(), "Invalid argument: count");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenError>();
    }

    #[test]
    fn test_rejection_classification() {
        let rejections = vec![
            TokenError::MalformedToken,
            TokenError::FingerprintMismatch,
            TokenError::TimestampBeforeBase,
            TokenError::FutureSkewExceeded,
            TokenError::PrimeCheckFailed,
            TokenError::NotIssued,
            TokenError::Expired,
            TokenError::AlreadyUsed,
        ];
        for error in rejections {
            assert!(error.is_rejection(), "{error:?} should be a rejection");
        }

        assert!(!TokenError::ConfigurationError("x".into()).is_rejection());
        assert!(!TokenError::InvalidArgument("x".into()).is_rejection());
        assert!(!TokenError::EntropyError("x".into()).is_rejection());
    }
}
