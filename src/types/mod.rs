//! Shared types for fagri-access

mod error;

pub use error::{AccessError, FlowError, Result};
