use crate::token::config::TokenConfig;
use crate::token::error::TokenError;
use crate::token::layout::RawToken;
use std::sync::Arc;

/// Modulus applied to the counter before it is written to the sequence field.
pub(crate) const SEQUENCE_MODULUS: u64 = 2_147_483_647;

/// Mints new tokens.
///
/// Each token carries a random multiplier seed scaled by two primes picked
/// from the configured set, shifted by `primes_add`, the sequence counter and
/// one random byte. The validator undoes the shift and counts prime divisors.
/// The sequence is reduced modulo 2^31 - 1 before it is folded in, so a
/// process can mint indefinitely.
///
/// `TokenGenerator` is cheap to clone and safe to share between threads; the
/// only shared mutable state is the config's atomic counter.
///
/// # Example
///
/// ```rust
/// use fast_token::{TokenConfig, TokenGenerator, TokenValidator};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), fast_token::TokenError> {
/// let config = Arc::new(TokenConfig::builder().build()?);
/// let generator = TokenGenerator::new(Arc::clone(&config));
/// let validator = TokenValidator::new(config);
///
/// let token = generator.new_token()?;
/// assert!(validator.is_valid(&token));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    config: Arc<TokenConfig>,
}

impl TokenGenerator {
    pub fn new(config: Arc<TokenConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<TokenConfig> {
        &self.config
    }

    /// Mints a token and returns it base64 encoded.
    ///
    /// # Errors
    ///
    /// `EntropyError` if the randomness source fails. Nothing else can fail.
    pub fn new_token(&self) -> Result<String, TokenError> {
        Ok(self.mint()?.encode())
    }

    /// Mints a token and returns the raw layout.
    ///
    /// Consumes exactly one sequence counter value.
    pub fn mint(&self) -> Result<RawToken, TokenError> {
        let config = &self.config;

        let random = config.random_bytes(16)?;
        let word = |i: usize| {
            i32::from_be_bytes([
                random[i * 4],
                random[i * 4 + 1],
                random[i * 4 + 2],
                random[i * 4 + 3],
            ])
        };
        let first = word(0);
        let second = word(1);
        let third = (word(2) % 256).unsigned_abs() as u8;
        let seed = word(3);

        let primes = config.pick_primes(2)?;
        let counter = config.counter();
        // Fold in the reduced value the token actually carries, so the prime
        // check keeps working once the counter passes the modulus.
        let sequence = (counter % SEQUENCE_MODULUS) as i32;

        let multiplier = primes
            .iter()
            .fold((seed as i64).abs(), |acc, p| acc.wrapping_mul(*p))
            .wrapping_add(config.primes_add())
            .wrapping_add(sequence as i64)
            .wrapping_add(third as i64);

        let time_offset = (config.now() - config.base_timestamp()) / config.time_offset_divisor();

        let mut token = RawToken::default();
        token.set_multiplier(multiplier);
        token.set_sequence(sequence);
        token.set_machine_fingerprint(config.interfaces_fingerprint());
        token.set_process_fingerprint(config.process_fingerprint());
        token.set_random_words(first, second);
        token.set_random_byte(third);
        token.set_time_offset(time_offset);
        token.set_pid(config.pid());

        tracing::trace!(sequence = counter, "Minted token");
        Ok(token)
    }
}
