//! Capability flags and the role → permission table
//!
//! Every role has its own hand-authored table listing every capability. Tables do
//! not inherit from each other, so changing one role never moves another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use super::role::AccountRole;

/// Named boolean capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    CanManageProjects,
    CanViewReports,
    CanManageTeam,
    CanAccessDashboard,
    CanSubmitApplications,
    CanViewCertifications,
    IsAdmin,
    IsCertificationAuthority,
    CanManageUsers,
    CanAccessAuditTools,
    CanIssueCertificates,
    CanEditProfile,
}

impl Capability {
    pub const ALL: [Capability; 12] = [
        Capability::CanManageProjects,
        Capability::CanViewReports,
        Capability::CanManageTeam,
        Capability::CanAccessDashboard,
        Capability::CanSubmitApplications,
        Capability::CanViewCertifications,
        Capability::IsAdmin,
        Capability::IsCertificationAuthority,
        Capability::CanManageUsers,
        Capability::CanAccessAuditTools,
        Capability::CanIssueCertificates,
        Capability::CanEditProfile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CanManageProjects => "canManageProjects",
            Capability::CanViewReports => "canViewReports",
            Capability::CanManageTeam => "canManageTeam",
            Capability::CanAccessDashboard => "canAccessDashboard",
            Capability::CanSubmitApplications => "canSubmitApplications",
            Capability::CanViewCertifications => "canViewCertifications",
            Capability::IsAdmin => "isAdmin",
            Capability::IsCertificationAuthority => "isCertificationAuthority",
            Capability::CanManageUsers => "canManageUsers",
            Capability::CanAccessAuditTools => "canAccessAuditTools",
            Capability::CanIssueCertificates => "canIssueCertificates",
            Capability::CanEditProfile => "canEditProfile",
        }
    }

    /// Human-readable description for listings
    pub fn description(&self) -> &'static str {
        match self {
            Capability::CanManageProjects => "Create and edit CO2 projects",
            Capability::CanViewReports => "View emission and progress reports",
            Capability::CanManageTeam => "Invite and manage team members",
            Capability::CanAccessDashboard => "Open the role dashboard",
            Capability::CanSubmitApplications => "Submit certification applications",
            Capability::CanViewCertifications => "Browse issued certifications",
            Capability::IsAdmin => "Platform administrator",
            Capability::IsCertificationAuthority => "Acts as a certification authority",
            Capability::CanManageUsers => "Manage platform accounts",
            Capability::CanAccessAuditTools => "Use audit and verification tools",
            Capability::CanIssueCertificates => "Issue certificates",
            Capability::CanEditProfile => "Edit own profile",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat capability → flag map. Absent flags read as false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    flags: BTreeMap<Capability, bool>,
}

impl PermissionSet {
    /// Permission set granting nothing
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_table(table: &[(Capability, bool)]) -> Self {
        Self {
            flags: table.iter().copied().collect(),
        }
    }

    /// Check a single capability
    pub fn allows(&self, capability: Capability) -> bool {
        self.flags.get(&capability).copied().unwrap_or(false)
    }

    /// Capabilities whose flag is true, in declaration order
    pub fn granted(&self) -> impl Iterator<Item = Capability> + '_ {
        self.flags
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(cap, _)| *cap)
    }

    /// True when no capability is granted
    pub fn is_empty_grant(&self) -> bool {
        self.granted().next().is_none()
    }

    /// Raw flag map
    pub fn flags(&self) -> &BTreeMap<Capability, bool> {
        &self.flags
    }
}

/// Resolve the permission set for a role. Pure and total.
pub fn derive(role: AccountRole) -> PermissionSet {
    PermissionSet::from_table(role_table(role))
}

/// Resolve the permission set for a role tag.
///
/// Unknown tags get the empty set and are logged.
pub fn derive_tag(tag: &str) -> PermissionSet {
    match AccountRole::from_tag(tag) {
        Some(role) => derive(role),
        None => {
            warn!("Unknown role '{}', granting no capabilities", tag);
            PermissionSet::empty()
        }
    }
}

/// Check whether a role holds a capability
pub fn is_capability_granted(role: AccountRole, capability: Capability) -> bool {
    role_table(role)
        .iter()
        .any(|(cap, granted)| *cap == capability && *granted)
}

fn role_table(role: AccountRole) -> &'static [(Capability, bool)] {
    use Capability::*;

    match role {
        AccountRole::Admin => &[
            (CanManageProjects, true),
            (CanViewReports, true),
            (CanManageTeam, true),
            (CanAccessDashboard, true),
            (CanSubmitApplications, true),
            (CanViewCertifications, true),
            (IsAdmin, true),
            (IsCertificationAuthority, true),
            (CanManageUsers, true),
            (CanAccessAuditTools, true),
            (CanIssueCertificates, true),
            (CanEditProfile, true),
        ],

        AccountRole::Certification => &[
            (CanManageProjects, false),
            (CanViewReports, true),
            (CanManageTeam, false),
            (CanAccessDashboard, true),
            (CanSubmitApplications, false),
            (CanViewCertifications, true),
            (IsAdmin, false),
            (IsCertificationAuthority, true),
            (CanManageUsers, false),
            (CanAccessAuditTools, true),
            (CanIssueCertificates, true),
            (CanEditProfile, true),
        ],

        AccountRole::Corporate => &[
            (CanManageProjects, true),
            (CanViewReports, true),
            (CanManageTeam, true),
            (CanAccessDashboard, true),
            (CanSubmitApplications, true),
            (CanViewCertifications, true),
            (IsAdmin, false),
            (IsCertificationAuthority, false),
            (CanManageUsers, false),
            (CanAccessAuditTools, false),
            (CanIssueCertificates, false),
            (CanEditProfile, true),
        ],

        AccountRole::FagriMember => &[
            (CanManageProjects, true),
            (CanViewReports, true),
            (CanManageTeam, false),
            (CanAccessDashboard, true),
            (CanSubmitApplications, true),
            (CanViewCertifications, true),
            (IsAdmin, false),
            (IsCertificationAuthority, false),
            (CanManageUsers, false),
            (CanAccessAuditTools, false),
            (CanIssueCertificates, false),
            (CanEditProfile, true),
        ],

        AccountRole::TeamMember => &[
            (CanManageProjects, true),
            (CanViewReports, true),
            (CanManageTeam, false),
            (CanAccessDashboard, true),
            (CanSubmitApplications, false),
            (CanViewCertifications, true),
            (IsAdmin, false),
            (IsCertificationAuthority, false),
            (CanManageUsers, false),
            (CanAccessAuditTools, false),
            (CanIssueCertificates, false),
            (CanEditProfile, true),
        ],

        AccountRole::NonMember => &[
            (CanManageProjects, false),
            (CanViewReports, false),
            (CanManageTeam, false),
            (CanAccessDashboard, false),
            (CanSubmitApplications, false),
            (CanViewCertifications, true),
            (IsAdmin, false),
            (IsCertificationAuthority, false),
            (CanManageUsers, false),
            (CanAccessAuditTools, false),
            (CanIssueCertificates, false),
            (CanEditProfile, true),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        for role in AccountRole::ALL {
            assert_eq!(derive(role), derive(role));
        }
    }

    #[test]
    fn test_every_table_is_complete() {
        for role in AccountRole::ALL {
            let set = derive(role);
            assert_eq!(set.flags().len(), Capability::ALL.len(), "{} table", role);
        }
    }

    #[test]
    fn test_admin_operations() {
        let admin = derive(AccountRole::Admin);
        assert!(admin.allows(Capability::IsAdmin));
        assert!(admin.allows(Capability::CanManageUsers));
        assert_eq!(admin.granted().count(), Capability::ALL.len());
    }

    #[test]
    fn test_member_operations() {
        let member = derive(AccountRole::FagriMember);
        assert!(member.allows(Capability::CanSubmitApplications));
        assert!(!member.allows(Capability::IsAdmin));
        assert!(!member.allows(Capability::CanManageTeam));
    }

    #[test]
    fn test_certification_authority() {
        let cert = derive(AccountRole::Certification);
        assert!(cert.allows(Capability::IsCertificationAuthority));
        assert!(cert.allows(Capability::CanIssueCertificates));
        assert!(!cert.allows(Capability::CanSubmitApplications));
        assert!(!derive(AccountRole::Corporate).allows(Capability::CanIssueCertificates));
    }

    #[test]
    fn test_unknown_roles_granted_nothing() {
        let set = derive_tag("not-a-real-role");
        assert!(set.is_empty_grant());
        for cap in Capability::ALL {
            assert!(!set.allows(cap));
        }
    }

    #[test]
    fn test_alias_tag_resolves() {
        assert_eq!(derive_tag("administration"), derive(AccountRole::Admin));
    }

    #[test]
    fn test_is_capability_granted_matches_derive() {
        for role in AccountRole::ALL {
            let set = derive(role);
            for cap in Capability::ALL {
                assert_eq!(is_capability_granted(role, cap), set.allows(cap));
            }
        }
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let json = serde_json::to_value(derive(AccountRole::NonMember)).unwrap();
        assert_eq!(json["canViewCertifications"], true);
        assert_eq!(json["isAdmin"], false);

        let back: PermissionSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, derive(AccountRole::NonMember));
    }
}
