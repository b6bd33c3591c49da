//! Sign-in flow
//!
//! ```text
//! RoleSelection -> KeyEntry -> Verifying -> Authenticated
//! ```
//!
//! Verification always checks the key format. In [`VerificationMode::Lookup`] it also
//! requires a registered account whose role matches the one selected. Any failure
//! records a [`FlowError`] and returns the flow to `KeyEntry`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::auth::AccountRole;
use crate::db::AccountStore;
use crate::events::AccessEvent;
use crate::identity::{IdentityKey, IdentityKeyCodec};
use crate::session::{Session, SessionStore};
use crate::types::FlowError;

/// Sign-in steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignInStep {
    RoleSelection,
    KeyEntry,
    Verifying,
    Authenticated,
}

impl SignInStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignInStep::RoleSelection => "role-selection",
            SignInStep::KeyEntry => "key-entry",
            SignInStep::Verifying => "verifying",
            SignInStep::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for SignInStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a sign-in checks beyond the key format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMode {
    /// Key must belong to a registered account with the selected role
    #[default]
    Lookup,
    /// Any well-formed key is accepted with the selected role
    FormatOnly,
}

impl VerificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMode::Lookup => "lookup",
            VerificationMode::FormatOnly => "format-only",
        }
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles offered and verification applied by a sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInPolicy {
    pub selectable_roles: Vec<AccountRole>,
    pub verification: VerificationMode,
}

impl Default for SignInPolicy {
    fn default() -> Self {
        Self {
            selectable_roles: vec![
                AccountRole::FagriMember,
                AccountRole::TeamMember,
                AccountRole::Certification,
                AccountRole::Admin,
            ],
            verification: VerificationMode::default(),
        }
    }
}

impl SignInPolicy {
    pub fn with_verification(mut self, verification: VerificationMode) -> Self {
        self.verification = verification;
        self
    }
}

/// One sign-in attempt
#[derive(Debug)]
pub struct SignInFlow {
    policy: SignInPolicy,
    codec: IdentityKeyCodec,
    step: SignInStep,
    error: Option<FlowError>,
    role: Option<AccountRole>,
    candidate: String,
    session: Option<Session>,
}

impl SignInFlow {
    pub fn new(codec: IdentityKeyCodec, policy: SignInPolicy) -> Self {
        Self {
            policy,
            codec,
            step: SignInStep::RoleSelection,
            error: None,
            role: None,
            candidate: String::new(),
            session: None,
        }
    }

    pub fn step(&self) -> SignInStep {
        self.step
    }

    pub fn error(&self) -> Option<&FlowError> {
        self.error.as_ref()
    }

    pub fn role(&self) -> Option<AccountRole> {
        self.role
    }

    /// Key text as entered (normalized)
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    pub fn offered_roles(&self) -> &[AccountRole] {
        &self.policy.selectable_roles
    }

    pub fn verification(&self) -> VerificationMode {
        self.policy.verification
    }

    /// Session established by a successful sign-in
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Choose the role to sign in as
    pub fn select_role(&mut self, tag: &str) -> Result<AccountRole, FlowError> {
        self.require_step(SignInStep::RoleSelection)?;

        let Some(role) = AccountRole::from_tag(tag) else {
            warn!("Unknown role '{}' at sign-in", tag);
            return Err(self.reject(FlowError::invalid_role(tag)));
        };
        if !self.policy.selectable_roles.contains(&role) {
            debug!("Role {} not offered at sign-in", role);
            return Err(self.reject(FlowError::invalid_role(tag)));
        }

        self.error = None;
        self.role = Some(role);
        self.step = SignInStep::KeyEntry;
        Ok(role)
    }

    /// Capture the key text. Whitespace is trimmed and letters uppercased.
    pub fn enter_key(&mut self, candidate: &str) -> Result<(), FlowError> {
        self.resume_cancelled();
        self.require_step(SignInStep::KeyEntry)?;
        self.candidate = candidate.trim().to_ascii_uppercase();
        Ok(())
    }

    /// Verify the entered key and establish the session.
    ///
    /// On success the session store is overwritten and `SignedIn` is published on
    /// the store's event bus. If a previous `submit` was dropped mid-verification the
    /// flow is back at `KeyEntry` and can be submitted again.
    pub async fn submit<S>(&mut self, accounts: &S, sessions: &SessionStore) -> Result<Session, FlowError>
    where
        S: AccountStore + ?Sized,
    {
        self.resume_cancelled();
        self.require_step(SignInStep::KeyEntry)?;
        let Some(role) = self.role else {
            return Err(self.out_of_order(SignInStep::KeyEntry));
        };

        self.step = SignInStep::Verifying;
        debug!("Verifying sign-in as {} ({})", role, self.policy.verification);

        let key = match self.verify(accounts, role).await {
            Ok(key) => key,
            Err(e) => {
                warn!("Sign-in rejected: {}", e);
                self.step = SignInStep::KeyEntry;
                return Err(self.reject(e));
            }
        };

        let session = Session::signed_in(key.clone(), role, Utc::now());
        sessions.commit(session.clone());
        sessions.events().publish(AccessEvent::SignedIn {
            identity_key: key.clone(),
            role,
        });

        info!("Signed in {} as {}, routing to {}", key, role, role.destination());
        self.error = None;
        self.step = SignInStep::Authenticated;
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn verify<S>(&self, accounts: &S, role: AccountRole) -> Result<IdentityKey, FlowError>
    where
        S: AccountStore + ?Sized,
    {
        let key = self
            .codec
            .parse(&self.candidate)
            .map_err(|reason| FlowError::InvalidKeyFormat {
                candidate: self.candidate.clone(),
                reason,
            })?;

        if self.policy.verification == VerificationMode::FormatOnly {
            return Ok(key);
        }

        match accounts.get(&key).await? {
            Some(record) if record.role() == role => Ok(key),
            Some(record) => Err(FlowError::RoleMismatch {
                key: key.to_string(),
                registered: record.role(),
                selected: role,
            }),
            None => Err(FlowError::UnknownAccount(key.to_string())),
        }
    }

    /// `Verifying` is only held across the await inside `submit`, which borrows the
    /// flow mutably. Seeing it anywhere else means that future was dropped.
    fn resume_cancelled(&mut self) {
        if self.step == SignInStep::Verifying {
            debug!("Previous verification was cancelled, returning to key entry");
            self.step = SignInStep::KeyEntry;
        }
    }

    fn require_step(&self, expected: SignInStep) -> Result<(), FlowError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(self.out_of_order(expected))
        }
    }

    fn out_of_order(&self, expected: SignInStep) -> FlowError {
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
    use crate::db::{AccountRecord, MemoryAccountStore, ProfileFields};
    use crate::identity::KeyFormatError;
    use crate::types::{AccessError, Result};

    struct StalledStore;

    #[async_trait::async_trait]
    impl AccountStore for StalledStore {
        async fn put(&self, _record: &AccountRecord) -> Result<()> {
            std::future::pending().await
        }

        async fn get(&self, _key: &IdentityKey) -> Result<Option<AccountRecord>> {
            std::future::pending().await
        }

        async fn list(&self) -> Result<Vec<AccountRecord>> {
            std::future::pending().await
        }
    }

    struct UnreachableStore;

    #[async_trait::async_trait]
    impl AccountStore for UnreachableStore {
        async fn put(&self, _record: &AccountRecord) -> Result<()> {
            Err(AccessError::Storage("offline".into()))
        }

        async fn get(&self, _key: &IdentityKey) -> Result<Option<AccountRecord>> {
            Err(AccessError::Storage("offline".into()))
        }

        async fn list(&self) -> Result<Vec<AccountRecord>> {
            Err(AccessError::Storage("offline".into()))
        }
    }

    async fn registered(role: AccountRole) -> (MemoryAccountStore, IdentityKey) {
        let store = MemoryAccountStore::new();
        let key = IdentityKeyCodec::default().mint();
        store
            .put(&AccountRecord::new(key.clone(), role, ProfileFields::new()))
            .await
            .unwrap();
        (store, key)
    }

    fn flow(mode: VerificationMode) -> SignInFlow {
        SignInFlow::new(
            IdentityKeyCodec::default(),
            SignInPolicy::default().with_verification(mode),
        )
    }

    #[test]
    fn test_role_must_be_offered() {
        let mut flow = flow(VerificationMode::Lookup);
        assert!(flow.select_role("corporate").unwrap_err().is_validation());
        assert!(flow.select_role("bogus").unwrap_err().is_validation());
        assert_eq!(flow.step(), SignInStep::RoleSelection);

        assert_eq!(flow.select_role("Team_Member").unwrap(), AccountRole::TeamMember);
        assert_eq!(flow.step(), SignInStep::KeyEntry);
        assert!(flow.error().is_none());
    }

    #[test]
    fn test_key_entry_requires_role() {
        let mut flow = flow(VerificationMode::Lookup);
        assert!(matches!(
            flow.enter_key("FAGRI-1BKQE5C3-K9X2P4M7-15"),
            Err(FlowError::OutOfOrder { .. })
        ));
        assert!(flow.candidate().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_sign_in() {
        let (accounts, key) = registered(AccountRole::FagriMember).await;
        let sessions = SessionStore::default();
        let mut rx = sessions.subscribe();

        let mut flow = flow(VerificationMode::Lookup);
        flow.select_role("fagri-member").unwrap();
        flow.enter_key(&format!("  {}  ", key.to_string().to_lowercase()))
            .unwrap();
        let session = flow.submit(&accounts, &sessions).await.unwrap();

        assert_eq!(flow.step(), SignInStep::Authenticated);
        assert_eq!(session.identity_key, Some(key.clone()));
        assert_eq!(sessions.read(), session);
        assert_eq!(
            rx.recv().await.unwrap(),
            AccessEvent::SignedIn {
                identity_key: key,
                role: AccountRole::FagriMember
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_key_returns_to_entry() {
        let sessions = SessionStore::default();
        let mut flow = flow(VerificationMode::FormatOnly);
        flow.select_role("admin").unwrap();
        flow.enter_key("FAGRI-123").unwrap();

        let err = flow
            .submit(&MemoryAccountStore::new(), &sessions)
            .await
            .unwrap_err();
        assert!(err.is_invalid_key_format());
        assert!(matches!(
            err,
            FlowError::InvalidKeyFormat {
                reason: KeyFormatError::SegmentCount(2),
                ..
            }
        ));
        assert_eq!(flow.step(), SignInStep::KeyEntry);
        assert_eq!(flow.error(), Some(&err));
        assert!(!sessions.read().signed_in);

        // Re-entering a valid key recovers
        flow.enter_key(&IdentityKeyCodec::default().mint().to_string())
            .unwrap();
        flow.submit(&MemoryAccountStore::new(), &sessions)
            .await
            .unwrap();
        assert!(flow.error().is_none());
        assert!(sessions.read().signed_in);
    }

    #[tokio::test]
    async fn test_unknown_account_rejected_in_lookup_mode() {
        let sessions = SessionStore::default();
        let mut flow = flow(VerificationMode::Lookup);
        flow.select_role("certification").unwrap();
        flow.enter_key(&IdentityKeyCodec::default().mint().to_string())
            .unwrap();

        let err = flow
            .submit(&MemoryAccountStore::new(), &sessions)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownAccount(_)));
        assert!(!sessions.read().signed_in);
    }

    #[tokio::test]
    async fn test_role_mismatch_rejected_in_lookup_mode() {
        let (accounts, key) = registered(AccountRole::TeamMember).await;
        let sessions = SessionStore::default();

        let mut flow = flow(VerificationMode::Lookup);
        flow.select_role("admin").unwrap();
        flow.enter_key(&key.to_string()).unwrap();

        match flow.submit(&accounts, &sessions).await.unwrap_err() {
            FlowError::RoleMismatch {
                registered,
                selected,
                ..
            } => {
                assert_eq!(registered, AccountRole::TeamMember);
                assert_eq!(selected, AccountRole::Admin);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(flow.step(), SignInStep::KeyEntry);
    }

    #[tokio::test]
    async fn test_format_only_accepts_any_well_formed_key() {
        let sessions = SessionStore::default();
        let mut flow = flow(VerificationMode::FormatOnly);
        flow.select_role("admin").unwrap();
        flow.enter_key(&IdentityKeyCodec::default().mint().to_string())
            .unwrap();

        let session = flow.submit(&UnreachableStore, &sessions).await.unwrap();
        assert_eq!(session.role, Some(AccountRole::Admin));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let sessions = SessionStore::default();
        let mut flow = flow(VerificationMode::Lookup);
        flow.select_role("admin").unwrap();
        flow.enter_key(&IdentityKeyCodec::default().mint().to_string())
            .unwrap();

        let err = flow.submit(&UnreachableStore, &sessions).await.unwrap_err();
        assert!(matches!(err, FlowError::Store(_)));
        assert_eq!(flow.step(), SignInStep::KeyEntry);
    }

    #[tokio::test]
    async fn test_cancelled_submit_can_be_retried() {
        let (accounts, key) = registered(AccountRole::Admin).await;
        let sessions = SessionStore::default();
        let mut flow = flow(VerificationMode::Lookup);
        flow.select_role("admin").unwrap();
        flow.enter_key(&key.to_string()).unwrap();

        let stalled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            flow.submit(&StalledStore, &sessions),
        )
        .await;
        assert!(stalled.is_err());
        assert_eq!(flow.step(), SignInStep::Verifying);

        let session = flow.submit(&accounts, &sessions).await.unwrap();
        assert_eq!(session.identity_key, Some(key));
        assert_eq!(flow.step(), SignInStep::Authenticated);
    }

    #[test]
    fn test_submit_before_role_is_out_of_order() {
        let sessions = SessionStore::default();
        let mut flow = flow(VerificationMode::FormatOnly);
        let result = tokio_test::block_on(flow.submit(&MemoryAccountStore::new(), &sessions));
        assert!(matches!(result, Err(FlowError::OutOfOrder { .. })));
        assert!(flow.error().is_none());
    }
}
