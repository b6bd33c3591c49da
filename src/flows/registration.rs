//! Registration flow
//!
//! ```text
//! CollectingIdentityFields -> KeyMinted -> RoleSelection -> PermissionsAttached -> Complete
//! ```
//!
//! A refused transition records a [`FlowError`] and leaves the flow at the step it
//! was in with everything entered so far. The account store is only written by
//! [`RegistrationFlow::complete`].

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::auth::{self, AccountRole, PermissionSet};
use crate::db::schemas::DEFAULT_REQUIRED_FIELDS;
use crate::db::{AccountRecord, AccountStore, ProfileFields};
use crate::events::{AccessEvent, EventBus};
use crate::identity::{IdentityKey, IdentityKeyCodec};
use crate::types::FlowError;

/// Registration steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationStep {
    CollectingIdentityFields,
    KeyMinted,
    RoleSelection,
    PermissionsAttached,
    Complete,
}

impl RegistrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStep::CollectingIdentityFields => "collecting-identity-fields",
            RegistrationStep::KeyMinted => "key-minted",
            RegistrationStep::RoleSelection => "role-selection",
            RegistrationStep::PermissionsAttached => "permissions-attached",
            RegistrationStep::Complete => "complete",
        }
    }
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a registration flow asks for and offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPolicy {
    /// Profile fields that must be present and non-blank
    pub required_fields: Vec<String>,
    /// Roles offered at role selection
    pub selectable_roles: Vec<AccountRole>,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            required_fields: DEFAULT_REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            selectable_roles: AccountRole::ALL.to_vec(),
        }
    }
}

impl RegistrationPolicy {
    /// The account-type picker: corporate, admin or certification
    pub fn account_type_selection() -> Self {
        Self {
            selectable_roles: vec![
                AccountRole::Corporate,
                AccountRole::Admin,
                AccountRole::Certification,
            ],
            ..Self::default()
        }
    }
}

/// One registration attempt
#[derive(Debug)]
pub struct RegistrationFlow {
    policy: RegistrationPolicy,
    codec: IdentityKeyCodec,
    step: RegistrationStep,
    error: Option<FlowError>,
    fields: ProfileFields,
    identity_key: Option<IdentityKey>,
    role: Option<AccountRole>,
    permissions: Option<PermissionSet>,
    record: Option<AccountRecord>,
    events: Option<EventBus>,
}

impl RegistrationFlow {
    /// Start a registration at field collection
    pub fn new(codec: IdentityKeyCodec, policy: RegistrationPolicy) -> Self {
        Self {
            policy,
            codec,
            step: RegistrationStep::CollectingIdentityFields,
            error: None,
            fields: ProfileFields::new(),
            identity_key: None,
            role: None,
            permissions: None,
            record: None,
            events: None,
        }
    }

    /// Start at `KeyMinted` for a key that already exists.
    ///
    /// Used to pick an account type for an identity minted earlier.
    pub fn for_existing_key(
        identity_key: IdentityKey,
        fields: ProfileFields,
        policy: RegistrationPolicy,
    ) -> Self {
        let codec = IdentityKeyCodec::new(identity_key.prefix());
        let mut flow = Self::new(codec, policy);
        flow.fields = fields;
        flow.identity_key = Some(identity_key);
        flow.step = RegistrationStep::KeyMinted;
        flow
    }

    /// Publish `Registered` on this bus when the flow completes
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn step(&self) -> RegistrationStep {
        self.step
    }

    /// Last refused transition, cleared by the next accepted one
    pub fn error(&self) -> Option<&FlowError> {
        self.error.as_ref()
    }

    pub fn fields(&self) -> &ProfileFields {
        &self.fields
    }

    pub fn identity_key(&self) -> Option<&IdentityKey> {
        self.identity_key.as_ref()
    }

    pub fn role(&self) -> Option<AccountRole> {
        self.role
    }

    pub fn permissions(&self) -> Option<&PermissionSet> {
        self.permissions.as_ref()
    }

    /// The persisted record once complete
    pub fn record(&self) -> Option<&AccountRecord> {
        self.record.as_ref()
    }

    pub fn offered_roles(&self) -> &[AccountRole] {
        &self.policy.selectable_roles
    }

    /// Submit identity fields. Merged over anything submitted before.
    ///
    /// Mints the identity key the first time the required fields are complete.
    pub fn submit_fields(&mut self, fields: ProfileFields) -> Result<&IdentityKey, FlowError> {
        self.require_step(RegistrationStep::CollectingIdentityFields)?;

        self.fields.merge(fields);
        let missing = self
            .fields
            .missing(self.policy.required_fields.iter().map(String::as_str));
        if !missing.is_empty() {
            debug!("Registration fields incomplete: {:?}", missing);
            return Err(self.reject(FlowError::missing_fields(missing)));
        }

        self.error = None;
        self.step = RegistrationStep::KeyMinted;
        let codec = &self.codec;
        let key = self.identity_key.get_or_insert_with(|| codec.mint());
        info!("Minted identity key {}", key);
        Ok(key)
    }

    /// Move to role selection and list the roles on offer
    pub fn begin_role_selection(&mut self) -> Result<&[AccountRole], FlowError> {
        self.require_step(RegistrationStep::KeyMinted)?;
        self.step = RegistrationStep::RoleSelection;
        Ok(&self.policy.selectable_roles)
    }

    /// Choose exactly one offered role and attach its permissions
    pub fn select_role(&mut self, tag: &str) -> Result<AccountRole, FlowError> {
        self.require_step(RegistrationStep::RoleSelection)?;

        let role = match AccountRole::from_tag(tag) {
            Some(role) if self.policy.selectable_roles.contains(&role) => role,
            Some(role) => {
                debug!("Role {} not offered by this registration", role);
                return Err(self.reject(FlowError::invalid_role(tag)));
            }
            None => {
                warn!("Unknown role '{}' at registration", tag);
                return Err(self.reject(FlowError::invalid_role(tag)));
            }
        };

        self.error = None;
        self.role = Some(role);
        self.permissions = Some(auth::derive(role));
        self.step = RegistrationStep::PermissionsAttached;
        Ok(role)
    }

    /// Persist the account record and finish.
    ///
    /// A key that already has a record keeps it: the role changes, permissions are
    /// re-derived and the submitted fields are merged in.
    pub async fn complete<S>(&mut self, store: &S) -> Result<AccountRecord, FlowError>
    where
        S: AccountStore + ?Sized,
    {
        self.require_step(RegistrationStep::PermissionsAttached)?;
        let (Some(key), Some(role)) = (self.identity_key.clone(), self.role) else {
            return Err(self.out_of_order(RegistrationStep::PermissionsAttached));
        };

        let existing = match store.get(&key).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Failed to load account {}: {}", key, e);
                return Err(self.reject(e.into()));
            }
        };
        let record = match existing {
            Some(mut record) => {
                debug!("Updating existing account {} to {}", key, role);
                record.change_role(role);
                record.update_profile(self.fields.clone());
                record
            }
            None => AccountRecord::new(key.clone(), role, self.fields.clone()),
        };
        if let Err(e) = store.put(&record).await {
            warn!("Failed to persist account {}: {}", key, e);
            return Err(self.reject(e.into()));
        }

        info!("Registered {} as {}", key, role);
        self.error = None;
        self.step = RegistrationStep::Complete;
        self.record = Some(record.clone());
        if let Some(events) = &self.events {
            events.publish(AccessEvent::Registered {
                identity_key: key,
                role,
            });
        }
        Ok(record)
    }

    fn require_step(&self, expected: RegistrationStep) -> Result<(), FlowError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(self.out_of_order(expected))
        }
    }

    fn out_of_order(&self, expected: RegistrationStep) -> FlowError {
        FlowError::OutOfOrder {
            expected: expected.as_str(),
            actual: self.step.as_str(),
        }
    }

    fn reject(&mut self, err: FlowError) -> FlowError {
        self.error = Some(err.clone());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Capability;
    use crate::db::MemoryAccountStore;
    use crate::identity::IdentityKey;
    use crate::types::{AccessError, Result};

    struct FailingStore;

    #[async_trait::async_trait]
    impl AccountStore for FailingStore {
        async fn put(&self, _record: &AccountRecord) -> Result<()> {
            Err(AccessError::Storage("disk full".into()))
        }

        async fn get(&self, _key: &IdentityKey) -> Result<Option<AccountRecord>> {
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<AccountRecord>> {
            Ok(Vec::new())
        }
    }

    fn complete_fields() -> ProfileFields {
        ProfileFields::new()
            .with("name", "Giulia Rossi")
            .with("email", "giulia@example.org")
            .with("phone", "+39 055 000000")
    }

    fn flow() -> RegistrationFlow {
        RegistrationFlow::new(IdentityKeyCodec::default(), RegistrationPolicy::default())
    }

    #[test]
    fn test_incomplete_fields_stay_in_place() {
        let mut flow = flow();
        let err = flow
            .submit_fields(ProfileFields::new().with("name", "Giulia"))
            .unwrap_err();

        match &err {
            FlowError::Validation { fields, .. } => {
                assert_eq!(fields, &vec!["email".to_string(), "phone".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(flow.step(), RegistrationStep::CollectingIdentityFields);
        assert_eq!(flow.error(), Some(&err));
        assert!(flow.identity_key().is_none());
        // Entered fields survive the rejection
        assert_eq!(flow.fields().get("name"), Some("Giulia"));

        flow.submit_fields(
            ProfileFields::new()
                .with("email", "giulia@example.org")
                .with("phone", "1"),
        )
        .unwrap();
        assert_eq!(flow.step(), RegistrationStep::KeyMinted);
        assert!(flow.error().is_none());
    }

    #[test]
    fn test_key_minted_once() {
        let mut flow = flow();
        let key = flow.submit_fields(complete_fields()).unwrap().clone();
        assert!(IdentityKeyCodec::default().validate(&key.to_string()));

        // A second submission is out of order and leaves the key alone
        assert!(matches!(
            flow.submit_fields(complete_fields()),
            Err(FlowError::OutOfOrder { .. })
        ));
        assert_eq!(flow.identity_key(), Some(&key));
    }

    #[test]
    fn test_role_selection() {
        let mut flow = flow();
        flow.submit_fields(complete_fields()).unwrap();
        assert_eq!(flow.begin_role_selection().unwrap().len(), AccountRole::ALL.len());

        let err = flow.select_role("not-a-real-role").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(flow.step(), RegistrationStep::RoleSelection);

        assert_eq!(flow.select_role("fagri-member").unwrap(), AccountRole::FagriMember);
        assert_eq!(flow.step(), RegistrationStep::PermissionsAttached);
        assert!(flow.permissions().unwrap().allows(Capability::CanSubmitApplications));
    }

    #[test]
    fn test_account_type_policy_narrows_roles() {
        let mut flow = RegistrationFlow::new(
            IdentityKeyCodec::default(),
            RegistrationPolicy::account_type_selection(),
        );
        flow.submit_fields(complete_fields()).unwrap();
        flow.begin_role_selection().unwrap();

        assert!(flow.select_role("team-member").unwrap_err().is_validation());
        assert_eq!(flow.select_role("administration").unwrap(), AccountRole::Admin);
    }

    #[test]
    fn test_steps_cannot_be_skipped() {
        let mut flow = flow();
        assert!(matches!(
            flow.select_role("admin"),
            Err(FlowError::OutOfOrder { .. })
        ));
        assert!(flow.begin_role_selection().is_err());

        let store = MemoryAccountStore::new();
        let result = tokio_test::block_on(flow.complete(&store));
        assert!(matches!(result, Err(FlowError::OutOfOrder { .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_complete_persists_record() {
        let store = MemoryAccountStore::new();
        let events = EventBus::new();
        let mut rx = events.subscribe();

        let mut flow = flow().with_events(events);
        let key = flow.submit_fields(complete_fields()).unwrap().clone();
        flow.begin_role_selection().unwrap();
        flow.select_role("corporate").unwrap();
        let record = flow.complete(&store).await.unwrap();

        assert_eq!(flow.step(), RegistrationStep::Complete);
        assert_eq!(record.identity_key(), &key);
        assert_eq!(record.permissions(), &auth::derive(AccountRole::Corporate));
        assert_eq!(record.profile_fields().get("name"), Some("Giulia Rossi"));
        assert_eq!(store.get(&key).await.unwrap(), Some(record));
        assert_eq!(
            rx.recv().await.unwrap(),
            AccessEvent::Registered {
                identity_key: key,
                role: AccountRole::Corporate
            }
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_recoverable() {
        let mut flow = flow();
        flow.submit_fields(complete_fields()).unwrap();
        flow.begin_role_selection().unwrap();
        flow.select_role("non-member").unwrap();

        let err = flow.complete(&FailingStore).await.unwrap_err();
        assert!(matches!(err, FlowError::Store(_)));
        assert_eq!(flow.step(), RegistrationStep::PermissionsAttached);

        let store = MemoryAccountStore::new();
        flow.complete(&store).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_key_reselects_role() {
        let key = IdentityKeyCodec::default().mint();
        let mut flow = RegistrationFlow::for_existing_key(
            key.clone(),
            complete_fields(),
            RegistrationPolicy::account_type_selection(),
        );
        assert_eq!(flow.step(), RegistrationStep::KeyMinted);

        flow.begin_role_selection().unwrap();
        flow.select_role("certification").unwrap();
        let record = flow.complete(&MemoryAccountStore::new()).await.unwrap();
        assert_eq!(record.identity_key(), &key);
        assert_eq!(record.role(), AccountRole::Certification);
    }

    #[tokio::test]
    async fn test_existing_key_keeps_stored_record() {
        let key = IdentityKeyCodec::default().mint();
        let store = MemoryAccountStore::new();
        let original = AccountRecord::new(
            key.clone(),
            AccountRole::Corporate,
            complete_fields().with("vat", "IT1"),
        );
        store.put(&original).await.unwrap();

        let mut flow = RegistrationFlow::for_existing_key(
            key.clone(),
            ProfileFields::new().with("phone", "+39 055 999999"),
            RegistrationPolicy::account_type_selection(),
        );
        flow.begin_role_selection().unwrap();
        flow.select_role("certification").unwrap();
        let record = flow.complete(&store).await.unwrap();

        assert_eq!(record.role(), AccountRole::Certification);
        assert_eq!(record.permissions(), &auth::derive(AccountRole::Certification));
        assert_eq!(record.metadata().created_at, original.metadata().created_at);
        assert!(record.metadata().last_updated >= original.metadata().last_updated);
        assert_eq!(record.profile_fields().get("vat"), Some("IT1"));
        assert_eq!(record.profile_fields().get("name"), Some("Giulia Rossi"));
        assert_eq!(record.profile_fields().get("phone"), Some("+39 055 999999"));
        assert_eq!(store.get(&key).await.unwrap(), Some(record));
        assert_eq!(store.len(), 1);
    }
}
