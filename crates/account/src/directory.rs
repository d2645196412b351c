//! ACME directory client contract
//!
//! The provisioner talks to the certificate authority only through
//! [`AcmeDirectoryClient`]. An implementation owns request signing, nonces
//! and transport; it receives the account key through [`AccountSession`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DirectoryError;
use crate::keygen::AccountSigner;

/// Callback deciding whether to agree to the authority's terms of service
///
/// Called by the directory client with the terms-of-service URL during
/// registration.
pub type TosAgreement = fn(&str) -> bool;

/// Agree to the terms of service on behalf of the operator
///
/// Consent is expected to have been given out of band before the account is
/// provisioned, so this always agrees after logging the URL.
pub fn accept_terms_of_service(tos_url: &str) -> bool {
    info!(
        terms_of_service = %tos_url,
        "If you don't accept the terms of service please exit the program now"
    );
    true
}

/// Account as known to the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Registration URI (the account's `kid`)
    pub uri: String,
    /// Contact URIs, in the order the authority returns them
    #[serde(default)]
    pub contact: Vec<String>,
}

/// What a directory client needs to act as an account
#[derive(Debug, Clone)]
pub struct AccountSession {
    signer: AccountSigner,
    directory_url: String,
}

impl AccountSession {
    pub fn new(signer: AccountSigner, directory_url: impl Into<String>) -> Self {
        Self {
            signer,
            directory_url: directory_url.into(),
        }
    }

    pub fn signer(&self) -> &AccountSigner {
        &self.signer
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }
}

/// Account operations of an ACME directory
#[async_trait]
pub trait AcmeDirectoryClient: Send + Sync {
    /// Register a new account for the session's key
    ///
    /// `accept_tos` is invoked with the terms-of-service URL; a `false`
    /// answer should abort with [`DirectoryError::TermsNotAccepted`].
    async fn register(
        &self,
        session: &AccountSession,
        contact: &[String],
        accept_tos: TosAgreement,
    ) -> Result<AccountRecord, DirectoryError>;

    /// Fetch an existing account by registration URI
    async fn get_account(
        &self,
        session: &AccountSession,
        uri: &str,
    ) -> Result<AccountRecord, DirectoryError>;

    /// Replace the account's mutable fields (currently the contact list)
    async fn update_account(
        &self,
        session: &AccountSession,
        record: &AccountRecord,
    ) -> Result<AccountRecord, DirectoryError>;
}
