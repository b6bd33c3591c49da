//! Account record schema
//!
//! One record per registered identity key. Permissions are derived from the role
//! and stored alongside it so readers never recompute them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::{self, AccountRole, PermissionSet};
use crate::db::schemas::Metadata;
use crate::identity::IdentityKey;

/// Profile fields required by default at registration
pub const DEFAULT_REQUIRED_FIELDS: [&str; 3] = ["name", "email", "phone"];

/// Personal and organization data collected at registration.
///
/// Opaque to this crate apart from the required-field check; passed through to
/// the account store unchanged.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ProfileFields(BTreeMap<String, String>);

impl ProfileFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Names from `required` that are absent or blank
    pub fn missing<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|name| self.get(name).map_or(true, |v| v.trim().is_empty()))
            .map(str::to_string)
            .collect()
    }

    /// Merge `other` over these fields
    pub fn merge(&mut self, other: ProfileFields) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProfileFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Persisted account, keyed by identity key
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    identity_key: IdentityKey,
    role: AccountRole,
    permissions: PermissionSet,
    #[serde(default)]
    profile_fields: ProfileFields,
    #[serde(flatten)]
    metadata: Metadata,
}

impl AccountRecord {
    /// Create a record, deriving permissions from the role
    pub fn new(identity_key: IdentityKey, role: AccountRole, profile_fields: ProfileFields) -> Self {
        Self {
            identity_key,
            role,
            permissions: auth::derive(role),
            profile_fields,
            metadata: Metadata::new(),
        }
    }

    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    pub fn role(&self) -> AccountRole {
        self.role
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn profile_fields(&self) -> &ProfileFields {
        &self.profile_fields
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Move the account to another role and re-derive its permissions
    pub fn change_role(&mut self, role: AccountRole) {
        self.role = role;
        self.permissions = auth::derive(role);
        self.metadata.touch();
    }

    /// Merge updated profile fields
    pub fn update_profile(&mut self, fields: ProfileFields) {
        self.profile_fields.merge(fields);
        self.metadata.touch();
    }
}
