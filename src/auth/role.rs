//! Account roles and their routing destinations
//!
//! The platform historically used two role vocabularies: the account-type picker
//! (`corporate`, `admin`, `certification`) and the sign-in picker (`fagri-member`,
//! `team-member`, `certification`, `administration`). Both resolve to the single
//! [`AccountRole`] enum through [`AccountRole::from_tag`]:
//!
//! | tag              | role            |
//! |------------------|-----------------|
//! | `corporate`      | `Corporate`     |
//! | `admin`          | `Admin`         |
//! | `administration` | `Admin`         |
//! | `certification`  | `Certification` |
//! | `fagri-member`   | `FagriMember`   |
//! | `team-member`    | `TeamMember`    |
//! | `non-member`     | `NonMember`     |
//!
//! Tags are matched case-insensitively and `_` is accepted for `-`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountRole {
    Corporate,
    Admin,
    Certification,
    FagriMember,
    TeamMember,
    NonMember,
}

/// Role tag outside the closed enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl AccountRole {
    pub const ALL: [AccountRole; 6] = [
        AccountRole::Corporate,
        AccountRole::Admin,
        AccountRole::Certification,
        AccountRole::FagriMember,
        AccountRole::TeamMember,
        AccountRole::NonMember,
    ];

    /// Canonical tag
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Corporate => "corporate",
            AccountRole::Admin => "admin",
            AccountRole::Certification => "certification",
            AccountRole::FagriMember => "fagri-member",
            AccountRole::TeamMember => "team-member",
            AccountRole::NonMember => "non-member",
        }
    }

    /// Resolve a tag from either vocabulary. Returns None for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "corporate" => Some(AccountRole::Corporate),
            "admin" | "administration" => Some(AccountRole::Admin),
            "certification" => Some(AccountRole::Certification),
            "fagri-member" => Some(AccountRole::FagriMember),
            "team-member" => Some(AccountRole::TeamMember),
            "non-member" => Some(AccountRole::NonMember),
            _ => None,
        }
    }

    /// Where the routing collaborator sends a session holding this role
    pub fn destination(&self) -> Destination {
        match self {
            AccountRole::Corporate => Destination::CorporateDashboard,
            AccountRole::Admin => Destination::AdminConsole,
            AccountRole::Certification => Destination::CertificationPortal,
            AccountRole::FagriMember => Destination::MemberDashboard,
            AccountRole::TeamMember => Destination::TeamWorkspace,
            AccountRole::NonMember => Destination::PublicLanding,
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountRole::from_tag(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Fixed set of post-sign-in destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    CorporateDashboard,
    AdminConsole,
    CertificationPortal,
    MemberDashboard,
    TeamWorkspace,
    PublicLanding,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::CorporateDashboard => "corporate-dashboard",
            Destination::AdminConsole => "admin-console",
            Destination::CertificationPortal => "certification-portal",
            Destination::MemberDashboard => "member-dashboard",
            Destination::TeamWorkspace => "team-workspace",
            Destination::PublicLanding => "public-landing",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
