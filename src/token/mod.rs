// Core token components
mod cache;
mod config;
mod error;
mod generator;
mod layout;
mod validator;

// Capabilities and bookkeeping
pub mod cleanup;
pub mod clock;
pub mod entropy;
pub mod fingerprint;
mod ttl_table;

// Core components exports
pub use cache::{CacheStats, DEFAULT_USED_TTL, TokenCache, TokenCacheBuilder};
pub use config::{
    DEFAULT_BASE_TIMESTAMP, DEFAULT_CACHE_MINUTES, DEFAULT_MAX_FUTURE_SKEW, DEFAULT_PRIMES,
    DEFAULT_PRIMES_ADD, DEFAULT_TIME_OFFSET_DIVISOR, DeploymentMode, SequenceCounter,
    TOKEN_BYTES_LENGTH, TokenConfig, TokenConfigBuilder, TokenSettings, parse_primes,
};
pub use error::TokenError;
pub use generator::TokenGenerator;
pub use layout::{RawToken, TIME_OFFSET_MASK};
pub use validator::TokenValidator;

// Capability exports
pub use cleanup::{
    BoxedCleanupStrategy, CleanupStrategy, CustomCleanupStrategy, HybridCleanupStrategy,
};
pub use clock::{Clock, FrozenClock, ManualClock, SystemClock};
pub use entropy::{EntropySource, OsEntropy, SeededEntropy};
pub use fingerprint::{
    FINGERPRINT_DIVISOR, InterfaceSource, NetworkInterface, StaticInterfaces, SysfsInterfaces,
    compute_fingerprint,
};
