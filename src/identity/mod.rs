//! FAGRI ID KEY generation and validation
//!
//! Account identifiers have the canonical form
//! `PREFIX-TIMESTAMP-RANDOM-CHECKSUM`, e.g. `FAGRI-LOYW3V28-K9X2P4M7-54`.
//! The checksum detects transcription errors; it is not a security boundary.

pub mod key;

pub use key::{IdentityKey, IdentityKeyCodec, KeyFormatError, DEFAULT_PREFIX};
