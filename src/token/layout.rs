//! The 36-byte token layout.
//!
//! All multi-byte fields are little-endian.
//!
//! | Offset | Length | Field |
//! |---|---|---|
//! | 0 | 4 | multiplier, low 32 bits |
//! | 4 | 4 | sequence counter mod 2^31 - 1 |
//! | 8 | 3 | machine fingerprint, low 3 bytes |
//! | 11 | 4 | multiplier, high 32 bits |
//! | 15 | 4 | process fingerprint |
//! | 19 | 4 | random word A |
//! | 23 | 4 | random word B |
//! | 27 | 1 | random byte C, folded into the multiplier |
//! | 28 | 6 | time offset |
//! | 34 | 2 | process id, low 16 bits |

use crate::token::config::TOKEN_BYTES_LENGTH;
use crate::token::error::TokenError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

const MULTIPLIER_LOW: usize = 0;
const SEQUENCE: usize = 4;
const MACHINE_FINGERPRINT: usize = 8;
const MULTIPLIER_HIGH: usize = 11;
const PROCESS_FINGERPRINT: usize = 15;
const RANDOM_A: usize = 19;
const RANDOM_B: usize = 23;
const RANDOM_C: usize = 27;
const TIME_OFFSET: usize = 28;
const PID: usize = 34;

/// Mask for the 48-bit time offset field.
pub const TIME_OFFSET_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// A decoded token payload.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawToken {
    bytes: [u8; TOKEN_BYTES_LENGTH],
}

impl RawToken {
    pub fn from_bytes(bytes: [u8; TOKEN_BYTES_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Builds a token from a slice of at least 36 bytes. Extra bytes are ignored.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TokenError> {
        let head = bytes
            .get(..TOKEN_BYTES_LENGTH)
            .ok_or(TokenError::MalformedToken)?;
        let mut raw = [0u8; TOKEN_BYTES_LENGTH];
        raw.copy_from_slice(head);
        Ok(Self { bytes: raw })
    }

    /// Decodes a standard-alphabet, padded base64 token.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let bytes = STANDARD
            .decode(token)
            .map_err(|_| TokenError::MalformedToken)?;
        Self::from_slice(&bytes)
    }

    /// Encodes the token as standard-alphabet, padded base64.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_BYTES_LENGTH] {
        &self.bytes
    }

    fn u32_at(&self, offset: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[offset..offset + 4]);
        u32::from_le_bytes(word)
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn multiplier_low(&self) -> u32 {
        self.u32_at(MULTIPLIER_LOW)
    }

    pub fn multiplier_high(&self) -> u32 {
        self.u32_at(MULTIPLIER_HIGH)
    }

    /// Reassembles the 64-bit multiplier from its two halves.
    pub fn multiplier(&self) -> i64 {
        (self.multiplier_low() as u64 | (self.multiplier_high() as u64) << 32) as i64
    }

    pub fn set_multiplier(&mut self, multiplier: i64) {
        self.put_u32(MULTIPLIER_LOW, multiplier as u32);
        self.put_u32(MULTIPLIER_HIGH, (multiplier >> 32) as u32);
    }

    /// The sequence field, read as signed.
    pub fn sequence(&self) -> i32 {
        self.u32_at(SEQUENCE) as i32
    }

    pub fn set_sequence(&mut self, sequence: i32) {
        self.put_u32(SEQUENCE, sequence as u32);
    }

    /// The three machine fingerprint bytes, zero-extended.
    pub fn machine_fingerprint(&self) -> u32 {
        let b = &self.bytes[MACHINE_FINGERPRINT..MACHINE_FINGERPRINT + 3];
        u32::from_le_bytes([b[0], b[1], b[2], 0])
    }

    pub fn set_machine_fingerprint(&mut self, fingerprint: u32) {
        self.bytes[MACHINE_FINGERPRINT..MACHINE_FINGERPRINT + 3]
            .copy_from_slice(&fingerprint.to_le_bytes()[..3]);
    }

    pub fn process_fingerprint(&self) -> [u8; 4] {
        let mut fp = [0u8; 4];
        fp.copy_from_slice(&self.bytes[PROCESS_FINGERPRINT..PROCESS_FINGERPRINT + 4]);
        fp
    }

    pub fn set_process_fingerprint(&mut self, fingerprint: [u8; 4]) {
        self.bytes[PROCESS_FINGERPRINT..PROCESS_FINGERPRINT + 4].copy_from_slice(&fingerprint);
    }

    pub fn random_words(&self) -> (i32, i32) {
        (self.u32_at(RANDOM_A) as i32, self.u32_at(RANDOM_B) as i32)
    }

    pub fn set_random_words(&mut self, a: i32, b: i32) {
        self.put_u32(RANDOM_A, a as u32);
        self.put_u32(RANDOM_B, b as u32);
    }

    pub fn random_byte(&self) -> u8 {
        self.bytes[RANDOM_C]
    }

    pub fn set_random_byte(&mut self, value: u8) {
        self.bytes[RANDOM_C] = value;
    }

    /// The 48-bit time offset, zero-extended.
    pub fn time_offset(&self) -> u64 {
        let mut word = [0u8; 8];
        word[..6].copy_from_slice(&self.bytes[TIME_OFFSET..TIME_OFFSET + 6]);
        u64::from_le_bytes(word)
    }

    /// Writes the low 48 bits of `offset`.
    pub fn set_time_offset(&mut self, offset: i64) {
        self.bytes[TIME_OFFSET..TIME_OFFSET + 6].copy_from_slice(&offset.to_le_bytes()[..6]);
    }

    pub fn pid(&self) -> u16 {
        u16::from_le_bytes([self.bytes[PID], self.bytes[PID + 1]])
    }

    pub fn set_pid(&mut self, pid: u16) {
        self.bytes[PID..PID + 2].copy_from_slice(&pid.to_le_bytes());
    }
}

impl Default for RawToken {
    fn default() -> Self {
        Self {
            bytes: [0u8; TOKEN_BYTES_LENGTH],
        }
    }
}

impl fmt::Debug for RawToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawToken({})", hex::encode(self.bytes))
    }
}
