//! fagri-access - identity and access for the FAGRI certification platform
//!
//! Mints and validates FAGRI ID KEYs, maps account roles to permission sets,
//! and drives the registration and sign-in flows that establish a session.
//!
//! ## Modules
//!
//! - **identity**: identity key codec (mint, parse, validate)
//! - **auth**: account roles, capabilities and permission derivation
//! - **db**: account records and the account store contract
//! - **flows**: registration and sign-in state machines
//! - **session**: the process-wide session store
//! - **events**: access event bus
//! - **logging**: JSONL audit trail

pub mod auth;
pub mod config;
pub mod db;
pub mod events;
pub mod flows;
pub mod identity;
pub mod logging;
pub mod session;
pub mod types;

pub use config::Args;
pub use types::{AccessError, FlowError, Result};
