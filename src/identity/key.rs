//! Identity key codec
//!
//! Minting draws the random segment from `rand::thread_rng()`. That is enough to
//! keep collisions negligible at platform volume, but the key scheme as a whole is
//! not cryptographically hardened: anyone can compute a valid checksum.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix used by the platform's issuing scheme.
pub const DEFAULT_PREFIX: &str = "FAGRI";

/// Length of the random segment.
pub const RANDOM_SEGMENT_LEN: usize = 8;

/// Length of the checksum segment (two hex digits).
pub const CHECKSUM_SEGMENT_LEN: usize = 2;

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Reason a candidate string is not a well-formed identity key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyFormatError {
    #[error("expected 4 dash-separated segments, found {0}")]
    SegmentCount(usize),

    #[error("prefix must be {expected}, found '{found}'")]
    Prefix { expected: String, found: String },

    #[error("timestamp segment must be one or more characters from [A-Z0-9]")]
    TimestampSegment,

    #[error("random segment must be exactly 8 characters from [A-Z0-9]")]
    RandomSegment,

    #[error("checksum segment must be exactly 2 hex digits")]
    ChecksumSegment,

    #[error("checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },
}

/// A minted or parsed platform account identifier.
///
/// Immutable once built; the only constructors check the format invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityKey {
    prefix: String,
    timestamp: String,
    random: String,
    checksum: String,
}

impl IdentityKey {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn timestamp_segment(&self) -> &str {
        &self.timestamp
    }

    pub fn random_segment(&self) -> &str {
        &self.random
    }

    pub fn checksum_segment(&self) -> &str {
        &self.checksum
    }

    /// Decode the timestamp segment back to the mint time, if it fits.
    pub fn minted_at(&self) -> Option<DateTime<Utc>> {
        let millis = decode_base36(&self.timestamp)?;
        DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.prefix, self.timestamp, self.random, self.checksum
        )
    }
}

/// Parses any prefix; use [`IdentityKeyCodec::parse`] to pin the issuing scheme.
impl FromStr for IdentityKey {
    type Err = KeyFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s, None)
    }
}

impl TryFrom<String> for IdentityKey {
    type Error = KeyFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IdentityKey> for String {
    fn from(key: IdentityKey) -> Self {
        key.to_string()
    }
}

/// Mints and validates identity keys for one issuing prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKeyCodec {
    prefix: String,
}

impl Default for IdentityKeyCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl IdentityKeyCodec {
    /// Create a codec for the given prefix (upper-cased).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim().to_ascii_uppercase(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Mint a fresh key from the current time. Never fails.
    pub fn mint(&self) -> IdentityKey {
        self.mint_with(Utc::now(), &mut rand::thread_rng())
    }

    /// Mint a key for a given time and random source.
    pub fn mint_with<R: Rng>(&self, at: DateTime<Utc>, rng: &mut R) -> IdentityKey {
        let timestamp = encode_base36(at.timestamp_millis().max(0) as u64);
        let random: String = (0..RANDOM_SEGMENT_LEN)
            .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
            .collect();
        let checksum = checksum(&timestamp, &random);

        IdentityKey {
            prefix: self.prefix.clone(),
            timestamp,
            random,
            checksum,
        }
    }

    /// Parse a candidate, reporting why it is malformed.
    ///
    /// Input is trimmed and upper-cased before any check.
    pub fn parse(&self, candidate: &str) -> Result<IdentityKey, KeyFormatError> {
        parse_key(candidate, Some(&self.prefix))
    }

    /// Total predicate: `true` only for well-formed keys with a matching checksum.
    pub fn validate(&self, candidate: &str) -> bool {
        self.parse(candidate).is_ok()
    }
}

/// Two uppercase hex digits of the byte sum of `timestamp ‖ random`, mod 256.
pub fn checksum(timestamp: &str, random: &str) -> String {
    let sum = timestamp
        .bytes()
        .chain(random.bytes())
        .fold(0u8, |acc, b| acc.wrapping_add(b));
    format!("{:02X}", sum)
}

fn parse_key(candidate: &str, expected_prefix: Option<&str>) -> Result<IdentityKey, KeyFormatError> {
    let normalized = candidate.trim().to_ascii_uppercase();
    let segments: Vec<&str> = normalized.split('-').collect();
    let [prefix, timestamp, random, check] = segments.as_slice() else {
        return Err(KeyFormatError::SegmentCount(segments.len()));
    };

    match expected_prefix {
        Some(expected) if *prefix != expected => {
            return Err(KeyFormatError::Prefix {
                expected: expected.to_string(),
                found: prefix.to_string(),
            });
        }
        None if !is_base36(prefix) => {
            return Err(KeyFormatError::Prefix {
                expected: "[A-Z0-9]+".to_string(),
                found: prefix.to_string(),
            });
        }
        _ => {}
    }

    if !is_base36(timestamp) {
        return Err(KeyFormatError::TimestampSegment);
    }
    if random.len() != RANDOM_SEGMENT_LEN || !is_base36(random) {
        return Err(KeyFormatError::RandomSegment);
    }
    if check.len() != CHECKSUM_SEGMENT_LEN || !check.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(KeyFormatError::ChecksumSegment);
    }

    let expected = checksum(timestamp, random);
    if expected != *check {
        return Err(KeyFormatError::ChecksumMismatch {
            expected,
            found: check.to_string(),
        });
    }

    Ok(IdentityKey {
        prefix: prefix.to_string(),
        timestamp: timestamp.to_string(),
        random: random.to_string(),
        checksum: expected,
    })
}

fn is_base36(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

fn encode_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    // Only ASCII digits were pushed
    String::from_utf8(digits).unwrap_or_default()
}

fn decode_base36(segment: &str) -> Option<u64> {
    u64::from_str_radix(segment, 36).ok()
}
