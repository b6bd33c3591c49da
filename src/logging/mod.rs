//! Logging infrastructure
//!
//! Diagnostic logging goes through `tracing`; the access audit trail is a
//! separate JSONL file.

pub mod audit;

pub use audit::{AuditEntry, AuditLogger};
