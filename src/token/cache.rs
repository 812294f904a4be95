use std::sync::Arc;
use std::time::Duration;

use crate::token::cleanup::{BoxedCleanupStrategy, CustomCleanupStrategy, HybridCleanupStrategy};
use crate::token::clock::saturating_millis;
use crate::token::config::TokenConfig;
use crate::token::error::TokenError;
use crate::token::generator::TokenGenerator;
use crate::token::ttl_table::TtlTable;
use crate::token::validator::TokenValidator;

/// How long consumed tokens are remembered.
pub const DEFAULT_USED_TTL: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Statistics about the issuance cache tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries in the recently-issued table, including unswept expired ones
    pub issued: usize,
    /// Entries in the consumed table, including unswept expired ones
    pub consumed: usize,
}

/// Turns stateless tokens into practically single-use, time-bounded ones.
///
/// The cache remembers every token this instance minted. A token is accepted
/// only if it passes the stateless [`TokenValidator`] checks, is younger than
/// the cache TTL, and is still in the recently-issued table. Tokens minted by
/// another process (or another cache) are never accepted here.
///
/// Consumption tracking is advisory: [`is_valid`](Self::is_valid) does not look
/// at the consumed table. Callers wanting single use either check
/// [`is_used`](Self::is_used) themselves or call [`redeem`](Self::redeem).
///
/// # Example
///
/// ```rust
/// use fast_token::{TokenCache, TokenConfig};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), fast_token::TokenError> {
/// let config = Arc::new(TokenConfig::builder().build()?);
/// let cache = TokenCache::builder(config).build();
///
/// let token = cache.issue()?;
/// assert!(cache.is_valid(&token));
///
/// cache.redeem(&token)?;
/// assert!(cache.is_used(&token));
/// assert!(cache.redeem(&token).is_err());
/// # Ok(())
/// # }
/// ```
pub struct TokenCache {
    generator: TokenGenerator,
    validator: TokenValidator,
    issued: TtlTable,
    used: TtlTable,
    cleanup_strategy: BoxedCleanupStrategy,
}

impl TokenCache {
    /// Creates a builder with the cache TTL taken from the config.
    pub fn builder(config: Arc<TokenConfig>) -> TokenCacheBuilder {
        TokenCacheBuilder::new(config)
    }

    /// Creates a cache with default settings.
    pub fn new(config: Arc<TokenConfig>) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Arc<TokenConfig> {
        self.generator.config()
    }

    pub fn generator(&self) -> &TokenGenerator {
        &self.generator
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// The maximum age of an issued token.
    pub fn cache_ttl(&self) -> Duration {
        self.issued.ttl()
    }

    /// Mints a token and records it as recently issued.
    ///
    /// # Errors
    ///
    /// `EntropyError` if the randomness source fails.
    pub fn issue(&self) -> Result<String, TokenError> {
        let token = self.generator.new_token()?;
        self.issued.insert(&token);

        if self.cleanup_strategy.should_cleanup() {
            let removed = self.cleanup_expired();
            self.cleanup_strategy.mark_as_cleaned();
            tracing::debug!("Swept {} expired token entries", removed);
        }
        Ok(token)
    }

    /// Returns `true` if the token passes all checks. See [`verify`](Self::verify).
    pub fn is_valid(&self, token: &str) -> bool {
        self.verify(token).is_ok()
    }

    /// Checks a presented token and reports the first failure.
    ///
    /// 1. The stateless checks of [`TokenValidator::verify`]
    /// 2. The embedded timestamp is no older than the cache TTL
    /// 3. The token is present in the recently-issued table, which refreshes
    ///    its entry
    pub fn verify(&self, token: &str) -> Result<(), TokenError> {
        self.validator.verify(token)?;

        let issued_at = self.validator.extract_timestamp(token);
        let age = self.config().now() - issued_at;
        if age > saturating_millis(self.cache_ttl()) {
            tracing::debug!("Token rejected: {}ms old", age);
            return Err(TokenError::Expired);
        }

        if !self.issued.touch(token) {
            tracing::debug!("Token rejected: not in issuance table");
            return Err(TokenError::NotIssued);
        }
        Ok(())
    }

    /// Records the token as consumed for [`DEFAULT_USED_TTL`] (or the
    /// configured used TTL).
    pub fn mark_used(&self, token: &str) {
        self.used.insert(token);
    }

    /// Returns `true` if the token has been recorded as consumed.
    pub fn is_used(&self, token: &str) -> bool {
        self.used.touch(token)
    }

    /// Verifies the token and marks it consumed in one step.
    ///
    /// Of several concurrent redeemers of the same token exactly one succeeds;
    /// the others get `AlreadyUsed`.
    pub fn redeem(&self, token: &str) -> Result<(), TokenError> {
        self.verify(token)?;
        if !self.used.insert_if_absent(token) {
            tracing::debug!("Token rejected: already used");
            return Err(TokenError::AlreadyUsed);
        }
        Ok(())
    }

    /// Sweeps expired entries from both tables and returns how many went.
    pub fn cleanup_expired(&self) -> usize {
        self.issued.cleanup_expired() + self.used.cleanup_expired()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            issued: self.issued.len(),
            consumed: self.used.len(),
        }
    }
}

/// A builder for [`TokenCache`].
#[must_use = "The builder does nothing unless `.build()` is called."]
pub struct TokenCacheBuilder {
    config: Arc<TokenConfig>,
    cache_ttl: Option<Duration>,
    used_ttl: Option<Duration>,
    cleanup_strategy: Option<BoxedCleanupStrategy>,
}

impl TokenCacheBuilder {
    pub(crate) fn new(config: Arc<TokenConfig>) -> Self {
        Self {
            config,
            cache_ttl: None,
            used_ttl: None,
            cleanup_strategy: None,
        }
    }

    /// Overrides the issued-token TTL. Defaults to the config's `cache_minutes`.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Overrides how long consumed tokens are remembered. Defaults to 2 days.
    pub fn with_used_ttl(mut self, ttl: Duration) -> Self {
        self.used_ttl = Some(ttl);
        self
    }

    /// Sweeps expired entries every `count_threshold` issued tokens or every
    /// `time_threshold`, whichever comes first.
    ///
    /// Defaults to 1000 tokens or 5 minutes.
    pub fn with_hybrid_cleanup_thresholds(
        mut self,
        count_threshold: u32,
        time_threshold: Duration,
    ) -> Self {
        let strategy =
            HybridCleanupStrategy::new(count_threshold, time_threshold, self.config.clock());
        self.cleanup_strategy = Some(Box::new(strategy));
        self
    }

    /// Replaces the sweep decision with a closure called after each issue.
    pub fn with_custom_cleanup_strategy<F>(mut self, strategy_fn: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.cleanup_strategy = Some(Box::new(CustomCleanupStrategy::new(strategy_fn)));
        self
    }

    pub fn build(self) -> TokenCache {
        let clock = self.config.clock();
        let cache_ttl = self.cache_ttl.unwrap_or_else(|| self.config.cache_ttl());
        let used_ttl = self.used_ttl.unwrap_or(DEFAULT_USED_TTL);
        let cleanup_strategy = self.cleanup_strategy.unwrap_or_else(|| {
            Box::new(HybridCleanupStrategy::new(
                1000,
                Duration::from_secs(300),
                Arc::clone(&clock),
            ))
        });

        TokenCache {
            generator: TokenGenerator::new(Arc::clone(&self.config)),
            validator: TokenValidator::new(self.config),
            issued: TtlTable::new(cache_ttl, Arc::clone(&clock)),
            used: TtlTable::new(used_ttl, clock),
            cleanup_strategy,
        }
    }
}
