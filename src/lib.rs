//! # Fast Token
//!
//! Compact, self-describing request tokens that can be rejected cheaply.
//!
//! Each token is 36 random-looking bytes, base64 encoded. Embedded in them are
//! a machine fingerprint, a coarse timestamp and a multiplier built from two
//! secret primes. A validator holding the same parameters can throw out
//! forged, corrupted, truncated or wildly mistimed tokens with a handful of
//! integer operations and no storage lookup. An issuance cache on top turns
//! the stateless checks into "minted here, recently".
//!
//! The checks are **not** cryptographic. Anyone with a few real tokens and
//! some patience can recover the parameters. Use this as a first line of
//! defense in front of a real one, never as the only one.
//!
//! ## Features
//!
//! - **Fast Rejection**: Structural checks need no I/O and no locks
//! - **Issuance Tracking**: Tokens not minted by this process are refused
//! - **Bounded Lifetime**: Tokens expire a configurable time after minting
//! - **Consumption Tracking**: Optional single-use semantics via `redeem`
//! - **Environment Configuration**: Every parameter can come from the process
//!   environment, with production-mode guards against test defaults
//!
//! ## Quick Start
//!
//! ### Stateless Generate and Check
//!
//! ```rust
//! use fast_token::{TokenConfig, TokenGenerator, TokenValidator};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), fast_token::TokenError> {
//! let config = Arc::new(TokenConfig::builder().build()?);
//! let generator = TokenGenerator::new(Arc::clone(&config));
//! let validator = TokenValidator::new(config);
//!
//! let token = generator.new_token()?;
//! assert_eq!(token.len(), 48);
//! assert!(validator.is_valid(&token));
//! assert!(!validator.is_valid("forged"));
//! # Ok(())
//! # }
//! ```
//!
//! ### With the Issuance Cache
//!
//! ```rust
//! use fast_token::{TokenCache, TokenConfig, TokenError};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), TokenError> {
//! let config = Arc::new(TokenConfig::builder().build()?);
//! let cache = TokenCache::builder(config)
//!     .with_cache_ttl(Duration::from_secs(5 * 60))
//!     .build();
//!
//! let token = cache.issue()?;
//! match cache.verify(&token) {
//!     Ok(()) => println!("Token accepted"),
//!     Err(e) => println!("Token rejected: {e}"),
//! }
//!
//! // Single use on top of validity
//! cache.redeem(&token)?;
//! assert_eq!(cache.redeem(&token), Err(TokenError::AlreadyUsed));
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Configuration
//!
//! [`TokenConfig::from_env`] reads the following variables, falling back to
//! the built-in defaults for anything unset:
//!
//! ```bash
//! export FAST_TOKEN_MODE=production
//! export FAST_TOKEN_PRIMES="104729,130363,155921,179424,196613"
//! export FAST_TOKEN_PRIMES_ADD=771234
//! export FAST_TOKEN_BASE_TIMESTAMP=1503123984836
//! export FAST_TOKEN_TIME_OFFSET_DIVISOR=15000
//! export FAST_TOKEN_MAX_FUTURE_SKEW=600000
//! export FAST_TOKEN_CACHE_MINUTES=10
//!
//! # Tests only, refused in production
//! export FAST_TOKEN_FIXED_TIMESTAMP=1700000000000
//! ```
//!
//! In production mode the built-in prime list is refused: every deployment
//! must pick its own.
//!
//! ## Architecture
//!
//! - **[`TokenConfig`]**: Validated parameters, the sequence counter and the
//!   injected clock, randomness and interface sources
//! - **[`TokenGenerator`]**: Mints tokens
//! - **[`TokenValidator`]**: Stateless fast-reject checks
//! - **[`TokenCache`]**: Issuance and consumption tracking with TTLs
//! - **[`RawToken`]**: The 36-byte layout, field by field
//! - **[`TokenError`]**: Every rejection reason and system failure

pub mod token;

// Re-export commonly used types
pub use token::{
    BoxedCleanupStrategy, CacheStats, CleanupStrategy, Clock, CustomCleanupStrategy,
    DeploymentMode, EntropySource, FrozenClock, HybridCleanupStrategy, InterfaceSource,
    ManualClock, NetworkInterface, OsEntropy, RawToken, SeededEntropy, SequenceCounter,
    StaticInterfaces, SysfsInterfaces, SystemClock, TokenCache, TokenCacheBuilder, TokenConfig,
    TokenConfigBuilder, TokenError, TokenGenerator, TokenSettings, TokenValidator,
};

#[cfg(test)]
mod tests {
    use crate::token::{
        ManualClock, SeededEntropy, StaticInterfaces, TokenCache, TokenConfig, TokenConfigBuilder,
        TokenError, TokenGenerator, TokenSettings, TokenValidator,
    };
    use std::sync::Arc;

    fn process_config(seed: u64, pid: u32, clock: Arc<ManualClock>) -> Arc<TokenConfig> {
        Arc::new(
            TokenConfigBuilder::new(TokenSettings::default())
                .with_clock(clock)
                .with_entropy(Arc::new(SeededEntropy::new(seed)))
                .with_interfaces(StaticInterfaces::default())
                .with_pid(pid)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_minting_and_checking_processes_agree() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        // Same settings, different processes.
        let minter = process_config(1, 100, Arc::clone(&clock));
        let checker = process_config(2, 200, clock);

        let generator = TokenGenerator::new(minter);
        let validator = TokenValidator::new(checker);

        for _ in 0..50 {
            let token = generator.new_token().unwrap();
            assert!(validator.is_valid(&token));
        }
    }

    #[test]
    fn test_settings_mismatch_rejects() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let minter = process_config(1, 100, Arc::clone(&clock));
        let checker = Arc::new(
            TokenConfigBuilder::new(TokenSettings {
                primes: vec![104_729, 130_363, 155_921],
                ..TokenSettings::default()
            })
            .with_clock(clock)
            .with_entropy(Arc::new(SeededEntropy::new(2)))
            .with_interfaces(StaticInterfaces::default())
            .build()
            .unwrap(),
        );

        let generator = TokenGenerator::new(minter);
        let validator = TokenValidator::new(checker);

        let token = generator.new_token().unwrap();
        assert_eq!(validator.verify(&token), Err(TokenError::PrimeCheckFailed));
    }

    #[test]
    fn test_issue_validate_consume() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = TokenCache::new(process_config(7, 100, clock));

        let token = cache.issue().unwrap();
        assert!(cache.is_valid(&token));
        assert!(!cache.is_used(&token));

        cache.mark_used(&token);
        assert!(cache.is_used(&token));
        assert!(cache.is_valid(&token));
    }
}
