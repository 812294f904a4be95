use crate::token::clock::{Clock, FrozenClock, SystemClock};
use crate::token::entropy::{EntropySource, OsEntropy};
use crate::token::error::TokenError;
use crate::token::fingerprint::{InterfaceSource, SysfsInterfaces, compute_fingerprint};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of raw bytes in a token before base64 encoding.
pub const TOKEN_BYTES_LENGTH: usize = 36;

pub const DEFAULT_BASE_TIMESTAMP: i64 = 1_503_123_984_836;
pub const DEFAULT_TIME_OFFSET_DIVISOR: i64 = 15_000;
pub const DEFAULT_PRIMES_ADD: i64 = 23_829_901;
pub const DEFAULT_MAX_FUTURE_SKEW: i64 = 10 * 60 * 1000;
pub const DEFAULT_CACHE_MINUTES: u64 = 10;
pub const DEFAULT_PRIMES: [i64; 5] = [16657, 17291, 22259, 36919, 39191];

const ENV_BASE_TIMESTAMP: &str = "FAST_TOKEN_BASE_TIMESTAMP";
const ENV_TIME_OFFSET_DIVISOR: &str = "FAST_TOKEN_TIME_OFFSET_DIVISOR";
const ENV_PRIMES: &str = "FAST_TOKEN_PRIMES";
const ENV_PRIMES_ADD: &str = "FAST_TOKEN_PRIMES_ADD";
const ENV_MAX_FUTURE_SKEW: &str = "FAST_TOKEN_MAX_FUTURE_SKEW";
const ENV_CACHE_MINUTES: &str = "FAST_TOKEN_CACHE_MINUTES";
const ENV_FIXED_TIMESTAMP: &str = "FAST_TOKEN_FIXED_TIMESTAMP";
const ENV_MODE: &str = "FAST_TOKEN_MODE";

/// The deployment mode the process runs in.
///
/// Production refuses the placeholder prime list and the frozen test clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        self == DeploymentMode::Production
    }
}

impl FromStr for DeploymentMode {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(DeploymentMode::Production),
            "development" | "dev" => Ok(DeploymentMode::Development),
            other => Err(TokenError::ConfigurationError(format!(
                "Unknown deployment mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Development => f.write_str("development"),
            DeploymentMode::Production => f.write_str("production"),
        }
    }
}

/// Raw token settings, before validation.
///
/// Generator and validator must agree on `base_timestamp`,
/// `time_offset_divisor`, `primes` and `primes_add` bit for bit, so every
/// process that checks tokens must be started with the same values as the
/// processes that mint them.
///
/// # Environment Variables
///
/// - `FAST_TOKEN_BASE_TIMESTAMP`: base timestamp, epoch millis
/// - `FAST_TOKEN_TIME_OFFSET_DIVISOR`: millis per time-offset tick
/// - `FAST_TOKEN_PRIMES`: comma separated prime list
/// - `FAST_TOKEN_PRIMES_ADD`: additive offset
/// - `FAST_TOKEN_MAX_FUTURE_SKEW`: max future skew, millis
/// - `FAST_TOKEN_CACHE_MINUTES`: issuance cache TTL, minutes
/// - `FAST_TOKEN_FIXED_TIMESTAMP`: frozen clock origin, tests only
/// - `FAST_TOKEN_MODE`: `production` or `development`
///
/// # Example
///
/// ```rust
/// use fast_token::TokenSettings;
///
/// let settings = TokenSettings {
///     cache_minutes: 5,
///     ..TokenSettings::default()
/// };
/// assert!(settings.validate().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    pub base_timestamp: i64,
    pub time_offset_divisor: i64,
    pub primes: Vec<i64>,
    pub primes_add: i64,
    pub max_future_skew_ms: i64,
    pub cache_minutes: u64,
    pub fixed_timestamp: Option<i64>,
    pub mode: DeploymentMode,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            base_timestamp: DEFAULT_BASE_TIMESTAMP,
            time_offset_divisor: DEFAULT_TIME_OFFSET_DIVISOR,
            primes: DEFAULT_PRIMES.to_vec(),
            primes_add: DEFAULT_PRIMES_ADD,
            max_future_skew_ms: DEFAULT_MAX_FUTURE_SKEW,
            cache_minutes: DEFAULT_CACHE_MINUTES,
            fixed_timestamp: None,
            mode: DeploymentMode::Development,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, TokenError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            TokenError::ConfigurationError(format!("{key} is not a valid number: '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}

impl TokenSettings {
    /// Loads settings from the environment, falling back to defaults for
    /// anything unset.
    ///
    /// A set but unparsable variable is an error rather than a silent default.
    pub fn from_env() -> Result<Self, TokenError> {
        let defaults = Self::default();
        let primes = match std::env::var(ENV_PRIMES) {
            Ok(raw) => parse_primes(&raw)?,
            Err(_) => defaults.primes,
        };
        let mode = match std::env::var(ENV_MODE) {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.mode,
        };

        Ok(Self {
            base_timestamp: env_parse(ENV_BASE_TIMESTAMP)?.unwrap_or(defaults.base_timestamp),
            time_offset_divisor: env_parse(ENV_TIME_OFFSET_DIVISOR)?
                .unwrap_or(defaults.time_offset_divisor),
            primes,
            primes_add: env_parse(ENV_PRIMES_ADD)?.unwrap_or(defaults.primes_add),
            max_future_skew_ms: env_parse(ENV_MAX_FUTURE_SKEW)?
                .unwrap_or(defaults.max_future_skew_ms),
            cache_minutes: env_parse(ENV_CACHE_MINUTES)?.unwrap_or(defaults.cache_minutes),
            fixed_timestamp: env_parse(ENV_FIXED_TIMESTAMP)?,
            mode,
        })
    }

    /// Parses settings from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, TokenError> {
        serde_json::from_str(json)
            .map_err(|e| TokenError::ConfigurationError(format!("Invalid token settings: {e}")))
    }

    /// Validates the settings and returns any warnings.
    ///
    /// Warnings flag settings that work but are probably not what was meant.
    /// Hard errors are reported by [`TokenConfig`] construction instead.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.cache_minutes == 0 {
            warnings.push("Cache TTL of zero minutes rejects every token".to_string());
        }
        if self.primes.len() < 3 {
            warnings.push(
                "Fewer than three primes makes the prime pair predictable".to_string(),
            );
        }
        let too_short = self
            .cache_minutes
            .checked_mul(60_000)
            .and_then(|ms| i64::try_from(ms).ok())
            .is_some_and(|ms| ms <= self.time_offset_divisor);
        if self.cache_minutes > 0 && too_short {
            // Embedded timestamps round down by up to one divisor unit.
            warnings.push(
                "Cache TTL not longer than the time offset divisor expires fresh tokens"
                    .to_string(),
            );
        }
        if self.time_offset_divisor > 60_000 {
            warnings.push(
                "Time offset divisor above one minute makes token ages very coarse".to_string(),
            );
        }

        warnings
    }
}

/// Parses a comma separated prime list.
pub fn parse_primes(raw: &str) -> Result<Vec<i64>, TokenError> {
    raw.split(',')
        .enumerate()
        .map(|(i, part)| {
            part.trim().parse::<i64>().map_err(|_| {
                TokenError::ConfigurationError(format!(
                    "Not a valid integer at index {i} '{part}' in primes list {raw}"
                ))
            })
        })
        .collect()
}

/// Process-wide monotonic sequence counter.
///
/// Every minted token consumes exactly one value. The first value is 1.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    value: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter whose next value is `last + 1`.
    pub fn starting_after(last: u64) -> Self {
        Self {
            value: AtomicU64::new(last),
        }
    }

    /// Returns the next value. Never repeats within a process.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The most recently issued value, 0 before the first call to `next`.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// Validated, process-wide token parameters plus the capabilities both the
/// generator and the validator draw on.
///
/// Immutable after construction except for the sequence counter. Build one per
/// process and share it behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use fast_token::{ManualClock, TokenConfig};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), fast_token::TokenError> {
/// let config = TokenConfig::builder()
///     .with_clock(Arc::new(ManualClock::new(1_700_000_000_000)))
///     .build()?;
/// assert_eq!(config.now(), 1_700_000_000_000);
/// assert_eq!(config.pick_primes(2)?.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct TokenConfig {
    base_timestamp: i64,
    time_offset_divisor: i64,
    primes_add: i64,
    max_future_skew: i64,
    primes: Vec<i64>,
    cache_ttl: Duration,
    mode: DeploymentMode,
    counter: SequenceCounter,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    interfaces_fingerprint: u32,
    process_fingerprint: [u8; 4],
    pid: u16,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("base_timestamp", &self.base_timestamp)
            .field("time_offset_divisor", &self.time_offset_divisor)
            .field("primes_count", &self.primes.len())
            .field("max_future_skew", &self.max_future_skew)
            .field("cache_ttl", &self.cache_ttl)
            .field("mode", &self.mode)
            .field("interfaces_fingerprint", &self.interfaces_fingerprint)
            .field("process_fingerprint", &hex::encode(self.process_fingerprint))
            .field("pid", &self.pid)
            .finish()
    }
}

impl TokenConfig {
    /// Starts a builder with default settings and production capabilities.
    pub fn builder() -> TokenConfigBuilder {
        TokenConfigBuilder::new(TokenSettings::default())
    }

    /// Builds a config from settings using the system clock (or the frozen
    /// clock if `fixed_timestamp` is set), OS randomness and sysfs interfaces.
    pub fn from_settings(settings: TokenSettings) -> Result<Self, TokenError> {
        TokenConfigBuilder::new(settings).build()
    }

    /// Builds a config from environment variables.
    pub fn from_env() -> Result<Self, TokenError> {
        Self::from_settings(TokenSettings::from_env()?)
    }

    pub fn base_timestamp(&self) -> i64 {
        self.base_timestamp
    }

    pub fn time_offset_divisor(&self) -> i64 {
        self.time_offset_divisor
    }

    pub fn primes_add(&self) -> i64 {
        self.primes_add
    }

    pub fn max_future_skew(&self) -> i64 {
        self.max_future_skew
    }

    pub fn primes(&self) -> &[i64] {
        &self.primes
    }

    /// Issuance cache TTL derived from `cache_minutes`.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn interfaces_fingerprint(&self) -> u32 {
        self.interfaces_fingerprint
    }

    pub fn process_fingerprint(&self) -> [u8; 4] {
        self.process_fingerprint
    }

    /// Low 16 bits of the OS process id.
    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Consumes and returns the next sequence counter value.
    pub fn counter(&self) -> u64 {
        self.counter.next()
    }

    /// Current time in epoch millis from the configured clock.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// The shared clock, for components that keep their own timers.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Draws `count` fresh random bytes.
    pub fn random_bytes(&self, count: usize) -> Result<Vec<u8>, TokenError> {
        let mut bytes = vec![0u8; count];
        self.entropy.fill(&mut bytes)?;
        Ok(bytes)
    }

    /// Picks `count` distinct primes uniformly at random from the configured set.
    ///
    /// Shuffles a copy of the prime list with Fisher-Yates and takes the first
    /// `count` entries.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `count` is zero or larger than the prime set.
    pub fn pick_primes(&self, count: usize) -> Result<Vec<i64>, TokenError> {
        if count == 0 {
            return Err(TokenError::InvalidArgument(
                "Prime count must be > 0".to_string(),
            ));
        }
        if count > self.primes.len() {
            return Err(TokenError::InvalidArgument(format!(
                "Asked for {count} primes but only have {}",
                self.primes.len()
            )));
        }

        let mut pick_from = self.primes.clone();
        let draws = self.random_bytes(pick_from.len() * 4)?;
        for i in (1..pick_from.len()).rev() {
            let chunk = &draws[i * 4..i * 4 + 4];
            let r = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let j = r as usize % (i + 1);
            pick_from.swap(i, j);
        }
        pick_from.truncate(count);
        Ok(pick_from)
    }

    /// Counts the configured primes that evenly divide `value`.
    pub fn divisible_count(&self, value: i64) -> usize {
        self.primes.iter().filter(|p| value % **p == 0).count()
    }

    /// Returns a one line summary suitable for startup logs.
    ///
    /// The prime list is left out.
    pub fn summary(&self) -> String {
        format!(
            "TokenConfig {{ mode: {}, base: {}, divisor: {}ms, skew: {}ms, \
             cache TTL: {}s, primes: {}, pid: {} }}",
            self.mode,
            self.base_timestamp,
            self.time_offset_divisor,
            self.max_future_skew,
            self.cache_ttl.as_secs(),
            self.primes.len(),
            self.pid,
        )
    }
}

/// Builder for [`TokenConfig`].
///
/// Capabilities left unset fall back to the production ones: [`SystemClock`]
/// (or [`FrozenClock`] when `fixed_timestamp` is set), [`OsEntropy`] and
/// [`SysfsInterfaces`].
#[must_use = "The builder does nothing unless `.build()` is called."]
pub struct TokenConfigBuilder {
    settings: TokenSettings,
    clock: Option<Arc<dyn Clock>>,
    entropy: Option<Arc<dyn EntropySource>>,
    interfaces: Option<Box<dyn InterfaceSource>>,
    pid: Option<u32>,
    sequence_start: u64,
}

impl TokenConfigBuilder {
    pub fn new(settings: TokenSettings) -> Self {
        Self {
            settings,
            clock: None,
            entropy: None,
            interfaces: None,
            pid: None,
            sequence_start: 0,
        }
    }

    pub fn with_settings(mut self, settings: TokenSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = Some(entropy);
        self
    }

    pub fn with_interfaces<I: InterfaceSource + 'static>(mut self, interfaces: I) -> Self {
        self.interfaces = Some(Box::new(interfaces));
        self
    }

    /// Overrides the OS process id. Only the low 16 bits end up in tokens.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Resumes the sequence counter: the first minted token gets `last + 1`.
    pub fn with_sequence_start(mut self, last: u64) -> Self {
        self.sequence_start = last;
        self
    }

    /// Validates the settings and assembles the config.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if:
    /// - running in production with the default primes
    /// - running in production with a fixed test timestamp
    /// - the time offset divisor is not positive
    /// - the max future skew is negative
    /// - fewer than two primes are configured, or any prime is below 2
    ///
    /// `EntropyError` if the process fingerprint cannot be drawn.
    pub fn build(self) -> Result<TokenConfig, TokenError> {
        let settings = self.settings;
        let mode = settings.mode;

        if mode.is_production() {
            if let Some(fixed) = settings.fixed_timestamp {
                return Err(TokenError::ConfigurationError(format!(
                    "Fixed timestamp for tokens set to {fixed} - \
                     this is for tests, but started in {mode}"
                )));
            }
            if settings.primes == DEFAULT_PRIMES {
                return Err(TokenError::ConfigurationError(
                    "Will not use default primes in production mode".to_string(),
                ));
            }
        }
        if settings.time_offset_divisor <= 0 {
            return Err(TokenError::ConfigurationError(format!(
                "Time offset divisor must be positive, got {}",
                settings.time_offset_divisor
            )));
        }
        if settings.max_future_skew_ms < 0 {
            return Err(TokenError::ConfigurationError(format!(
                "Max future skew must not be negative, got {}",
                settings.max_future_skew_ms
            )));
        }
        let cache_secs = settings.cache_minutes.checked_mul(60).ok_or_else(|| {
            TokenError::ConfigurationError(format!(
                "cache_minutes too large: {}",
                settings.cache_minutes
            ))
        })?;
        if settings.primes.len() < 2 {
            return Err(TokenError::ConfigurationError(format!(
                "At least two primes are required, got {}",
                settings.primes.len()
            )));
        }
        if let Some((i, p)) = settings.primes.iter().enumerate().find(|(_, p)| **p < 2) {
            return Err(TokenError::ConfigurationError(format!(
                "Prime at index {i} must be >= 2, got {p}"
            )));
        }

        for warning in settings.validate() {
            tracing::warn!("Token settings: {}", warning);
        }

        let clock: Arc<dyn Clock> = match (self.clock, settings.fixed_timestamp) {
            (Some(clock), _) => clock,
            (None, Some(fixed)) => Arc::new(FrozenClock::new(fixed)),
            (None, None) => Arc::new(SystemClock),
        };
        let entropy: Arc<dyn EntropySource> = self.entropy.unwrap_or_else(|| Arc::new(OsEntropy));
        let interfaces_fingerprint = match self.interfaces {
            Some(source) => compute_fingerprint(&source.interfaces()),
            None => compute_fingerprint(&SysfsInterfaces::new().interfaces()),
        };

        let mut process_fingerprint = [0u8; 4];
        entropy.fill(&mut process_fingerprint)?;

        let pid = self.pid.unwrap_or_else(std::process::id) as u16;

        let config = TokenConfig {
            base_timestamp: settings.base_timestamp,
            time_offset_divisor: settings.time_offset_divisor,
            primes_add: settings.primes_add,
            max_future_skew: settings.max_future_skew_ms,
            primes: settings.primes,
            cache_ttl: Duration::from_secs(cache_secs),
            mode,
            counter: SequenceCounter::starting_after(self.sequence_start),
            clock,
            entropy,
            interfaces_fingerprint,
            process_fingerprint,
            pid,
        };
        tracing::info!("{}", config.summary());
        Ok(config)
    }
}
