//! ACME account provisioning
//!
//! Brings the account to a usable state on every start:
//!
//! ```text
//! Idle ─┬─ no stored key ──► Unprovisioned ──► Registering ──► Provisioned
//!       └─ stored key ─────► Loading ───────► Validating ───► Provisioned
//!                      any error ──► Failed
//! ```
//!
//! Only the registration path writes to the store. A stored key is reused
//! byte-for-byte; regenerating it would orphan the registered account.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::directory::{
    accept_terms_of_service, AccountRecord, AccountSession, AcmeDirectoryClient,
};
use crate::error::{AccountError, DirectoryError, ProtocolAction};
use crate::keygen::{self, AccountSigner};
use crate::store::{AccountData, AccountStore, StoreField};
use acme_account_config::AccountSettings;

/// Where the provisioner is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    /// Not run yet
    Idle,
    /// The store holds no account key
    Unprovisioned,
    /// Generating a key and registering it
    Registering,
    /// Decoding the stored key and registration URI
    Loading,
    /// Fetching the account and reconciling its contact
    Validating,
    /// The account is registered and up to date
    Provisioned,
    /// The last run returned an error
    Failed,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionState::Idle => "idle",
            ProvisionState::Unprovisioned => "unprovisioned",
            ProvisionState::Registering => "registering",
            ProvisionState::Loading => "loading",
            ProvisionState::Validating => "validating",
            ProvisionState::Provisioned => "provisioned",
            ProvisionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a run reached [`ProvisionState::Provisioned`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new account was registered and stored
    Registered,
    /// An existing account was validated
    Validated { contact_updated: bool },
}

/// A ready-to-use account
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    /// Key and directory for further protocol calls
    pub session: AccountSession,
    /// The account as the authority last reported it
    pub record: AccountRecord,
    pub outcome: ProvisionOutcome,
}

/// Which store field the registration URI came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriSource {
    RegistrationUrl,
    LegacyRegistration,
}

/// Account decoded from store data, before any network call
#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub session: AccountSession,
    pub uri: String,
    pub uri_source: UriSource,
}

/// Registration document written by older releases
#[derive(Debug, Deserialize)]
struct LegacyRegistration {
    #[serde(rename = "URI", alias = "uri")]
    uri: String,
}

/// Contact list for a configured email: a single lower-cased `mailto:` URI
pub fn contact_for_email(email: &str) -> Vec<String> {
    vec![format!("mailto:{}", email.to_lowercase())]
}

/// Decode stored account data
///
/// The key is decoded first, so malformed key material fails before the
/// registration URI is even looked at. The URI comes from
/// [`StoreField::RegistrationUrl`] when present, otherwise from the legacy
/// JSON document in [`StoreField::LegacyRegistration`].
pub fn load_stored_account(
    data: &AccountData,
    directory_url: &str,
) -> Result<StoredAccount, AccountError> {
    let key_pem = data.get(StoreField::PrivateKey).ok_or(AccountError::StoreLookup {
        field: StoreField::PrivateKey,
    })?;
    let signer = AccountSigner::from_pem(key_pem)?;
    let session = AccountSession::new(signer, directory_url);

    if let Some(raw) = data.get(StoreField::RegistrationUrl) {
        let uri = std::str::from_utf8(raw).map_err(|e| {
            AccountError::Encoding(format!("stored registration URL is not UTF-8: {}", e))
        })?;
        if uri.is_empty() {
            return Err(AccountError::Encoding(
                "stored registration URL is empty".to_string(),
            ));
        }

        return Ok(StoredAccount {
            session,
            uri: uri.to_string(),
            uri_source: UriSource::RegistrationUrl,
        });
    }

    let raw = data
        .get(StoreField::LegacyRegistration)
        .ok_or(AccountError::StoreLookup {
            field: StoreField::RegistrationUrl,
        })?;
    let legacy: LegacyRegistration = serde_json::from_slice(raw).map_err(|e| {
        AccountError::Encoding(format!("invalid legacy registration document: {}", e))
    })?;
    if legacy.uri.is_empty() {
        return Err(AccountError::Encoding(
            "legacy registration document has an empty URI".to_string(),
        ));
    }

    debug!(uri = %legacy.uri, "Resolved ACME account URI from legacy registration");

    Ok(StoredAccount {
        session,
        uri: legacy.uri,
        uri_source: UriSource::LegacyRegistration,
    })
}

/// Creates or validates the ACME account
///
/// One provisioner serves one account. Runs must not overlap; the caller
/// serializes them (a single reconciliation loop, leader election, ...).
/// Network calls are not time-limited here, wrap
/// [`ensure_account`](Self::ensure_account) in a timeout if needed.
pub struct AccountProvisioner {
    settings: Arc<dyn AccountSettings>,
    store: Arc<dyn AccountStore>,
    directory: Arc<dyn AcmeDirectoryClient>,
    state: Mutex<ProvisionState>,
}

impl AccountProvisioner {
    pub fn new(
        settings: Arc<dyn AccountSettings>,
        store: Arc<dyn AccountStore>,
        directory: Arc<dyn AcmeDirectoryClient>,
    ) -> Self {
        Self {
            settings,
            store,
            directory,
            state: Mutex::new(ProvisionState::Idle),
        }
    }

    /// State reached by the last (or current) run
    pub fn state(&self) -> ProvisionState {
        *self.state.lock()
    }

    /// Contact list the account should carry
    pub fn expected_contact(&self) -> Vec<String> {
        contact_for_email(self.settings.contact_email())
    }

    /// Register a new account or validate the stored one
    pub async fn ensure_account(&self) -> Result<ProvisionedAccount, AccountError> {
        match self.provision().await {
            Ok(account) => {
                self.transition(ProvisionState::Provisioned);
                Ok(account)
            }
            Err(e) => {
                self.transition(ProvisionState::Failed);
                warn!(error = %e, "ACME account provisioning failed");
                Err(e)
            }
        }
    }

    async fn provision(&self) -> Result<ProvisionedAccount, AccountError> {
        let data = self.store.get().await?;

        if !data.contains(StoreField::PrivateKey) {
            self.transition(ProvisionState::Unprovisioned);
            return self.create_account(data).await;
        }

        self.transition(ProvisionState::Loading);
        let stored = load_stored_account(&data, self.settings.directory_url())?;

        self.transition(ProvisionState::Validating);
        let (record, contact_updated) = self
            .validate_account(&stored.session, &stored.uri)
            .await?;

        Ok(ProvisionedAccount {
            session: stored.session,
            record,
            outcome: ProvisionOutcome::Validated { contact_updated },
        })
    }

    async fn create_account(
        &self,
        mut data: AccountData,
    ) -> Result<ProvisionedAccount, AccountError> {
        self.transition(ProvisionState::Registering);

        let generated = keygen::generate(&self.settings.key_config())?;
        let session = AccountSession::new(generated.signer, self.settings.directory_url());
        let contact = self.expected_contact();

        let record = self
            .directory
            .register(&session, &contact, accept_terms_of_service)
            .await
            .map_err(|source| AccountError::Protocol {
                action: ProtocolAction::Register,
                uri: session.directory_url().to_string(),
                source,
            })?;

        if record.uri.is_empty() {
            return Err(AccountError::Protocol {
                action: ProtocolAction::Register,
                uri: session.directory_url().to_string(),
                source: DirectoryError::InvalidResponse(
                    "registration returned no account URI".to_string(),
                ),
            });
        }

        info!(registration_url = %record.uri, "Created an ACME account");

        // Key and URI go in one write: a URI without its key is unusable.
        // Entries owned by other tools stay in place.
        data.insert(StoreField::PrivateKey, generated.pem.into_bytes());
        data.insert(StoreField::RegistrationUrl, record.uri.clone().into_bytes());
        self.store.put(&data).await?;

        Ok(ProvisionedAccount {
            session,
            record,
            outcome: ProvisionOutcome::Registered,
        })
    }

    async fn validate_account(
        &self,
        session: &AccountSession,
        uri: &str,
    ) -> Result<(AccountRecord, bool), AccountError> {
        let mut record = self
            .directory
            .get_account(session, uri)
            .await
            .map_err(|source| AccountError::Protocol {
                action: ProtocolAction::Fetch,
                uri: uri.to_string(),
                source,
            })?;

        let contact = self.expected_contact();
        if record.contact == contact {
            debug!(uri = %uri, "ACME account contact is up to date");
            return Ok((record, false));
        }

        debug!(
            current = ?record.contact,
            expected = ?contact,
            "ACME account contact differs from configuration"
        );

        record.contact = contact;
        let record = self
            .directory
            .update_account(session, &record)
            .await
            .map_err(|source| AccountError::Protocol {
                action: ProtocolAction::Update,
                uri: uri.to_string(),
                source,
            })?;

        info!(contact = ?record.contact, "Updated ACME account's contact");

        Ok((record, true))
    }

    fn transition(&self, next: ProvisionState) {
        let mut state = self.state.lock();
        debug!(from = %*state, to = %next, "ACME account state transition");
        *state = next;
    }
}

impl fmt::Debug for AccountProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountProvisioner")
            .field("directory_url", &self.settings.directory_url())
            .field("key", &self.settings.key_config())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acme_account_config::KeyTypeConfig;

    fn stored_key() -> String {
        keygen::generate(&KeyTypeConfig::ec(256)).unwrap().pem
    }

    #[test]
    fn test_contact_is_lowercased_mailto() {
        assert_eq!(
            contact_for_email("Admin@Example.COM"),
            vec!["mailto:admin@example.com".to_string()]
        );
    }

    #[test]
    fn test_load_direct_uri() {
        let data = AccountData::new()
            .with(StoreField::PrivateKey, stored_key())
            .with(StoreField::RegistrationUrl, "https://example/acct/7");

        let stored = load_stored_account(&data, "https://example/dir").unwrap();
        assert_eq!(stored.uri, "https://example/acct/7");
        assert_eq!(stored.uri_source, UriSource::RegistrationUrl);
        assert_eq!(stored.session.directory_url(), "https://example/dir");
    }

    #[test]
    fn test_direct_uri_wins_over_legacy() {
        let data = AccountData::new()
            .with(StoreField::PrivateKey, stored_key())
            .with(StoreField::RegistrationUrl, "https://example/acct/new")
            .with(StoreField::LegacyRegistration, r#"{"URI":"https://example/acct/old"}"#);

        let stored = load_stored_account(&data, "https://example/dir").unwrap();
        assert_eq!(stored.uri, "https://example/acct/new");
    }

    #[test]
    fn test_load_legacy_uri() {
        let data = AccountData::new()
            .with(StoreField::PrivateKey, stored_key())
            .with(
                StoreField::LegacyRegistration,
                r#"{"URI":"https://example/acct/1","Contact":["mailto:a@x.com"]}"#,
            );

        let stored = load_stored_account(&data, "https://example/dir").unwrap();
        assert_eq!(stored.uri, "https://example/acct/1");
        assert_eq!(stored.uri_source, UriSource::LegacyRegistration);
    }

    #[test]
    fn test_missing_registration() {
        let data = AccountData::new().with(StoreField::PrivateKey, stored_key());

        let result = load_stored_account(&data, "https://example/dir");
        assert!(matches!(
            result,
            Err(AccountError::StoreLookup {
                field: StoreField::RegistrationUrl
            })
        ));
    }

    #[test]
    fn test_missing_private_key() {
        let data = AccountData::new().with(StoreField::RegistrationUrl, "https://example/acct/1");

        let result = load_stored_account(&data, "https://example/dir");
        assert!(matches!(
            result,
            Err(AccountError::StoreLookup {
                field: StoreField::PrivateKey
            })
        ));
    }

    #[test]
    fn test_invalid_legacy_document() {
        let data = AccountData::new()
            .with(StoreField::PrivateKey, stored_key())
            .with(StoreField::LegacyRegistration, "not json");

        let result = load_stored_account(&data, "https://example/dir");
        assert!(matches!(result, Err(AccountError::Encoding(_))));
    }

    #[test]
    fn test_empty_registration_url() {
        let data = AccountData::new()
            .with(StoreField::PrivateKey, stored_key())
            .with(StoreField::RegistrationUrl, "");

        let result = load_stored_account(&data, "https://example/dir");
        assert!(matches!(result, Err(AccountError::Encoding(_))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ProvisionState::Validating.to_string(), "validating");
        assert_eq!(ProvisionState::Failed.to_string(), "failed");
    }
}
