//! Roles and permissions
//!
//! Provides:
//! - The unified `AccountRole` enumeration and its routing destinations
//! - The fixed role → capability table (`derive`)

pub mod permissions;
pub mod role;

pub use permissions::{derive, derive_tag, is_capability_granted, Capability, PermissionSet};
pub use role::{AccountRole, Destination, UnknownRole};
