//! ACME account provisioning
//!
//! Manages the account identity used to request certificates from an ACME
//! certificate authority: the account private key, its registration with the
//! authority's directory, and the contact address attached to it.
//!
//! # Architecture
//!
//! - [`keygen`] - Account key generation and the [`AccountSigner`] handle
//! - [`AccountStore`] - Key-value persistence for the key and registration URI
//! - [`AcmeDirectoryClient`] - Register/fetch/update calls against the authority
//! - [`AccountProvisioner`] - Orchestrates the other three
//!
//! # Provisioning Flow
//!
//! On first run (nothing stored):
//!
//! 1. A key is generated per the configured [`KeyTypeConfig`]
//! 2. The account is registered with a single `mailto:` contact
//! 3. The PEM key and the registration URI are saved together
//!
//! On every later run:
//!
//! 1. The stored key is decoded and reused as-is
//! 2. The account is fetched from the authority by its URI
//! 3. If the authority's contact list differs from the configured one, it is
//!    updated
//!
//! The store is only ever written on the first run. Regenerating the key of
//! a registered account would lose the account.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use acme_account::{AccountProvisioner, FileAccountStore};
//! use acme_account_config::AccountConfig;
//!
//! let config = AccountConfig::from_file("/etc/acme-account.kdl")?;
//! let store = FileAccountStore::new(&config.storage)?;
//! let provisioner = AccountProvisioner::new(Arc::new(config), Arc::new(store), directory);
//!
//! let account = provisioner.ensure_account().await?;
//! println!("account: {}", account.record.uri);
//! ```

pub mod directory;
mod error;
pub mod keygen;
pub mod provisioner;
pub mod store;

pub use acme_account_config::{
    AccountConfig, AccountSettings, EcCurve, KeyFamily, KeyTypeConfig,
};
pub use directory::{
    accept_terms_of_service, AccountRecord, AccountSession, AcmeDirectoryClient, TosAgreement,
};
pub use error::{AccountError, DirectoryError, ProtocolAction, StoreError};
pub use keygen::{generate, AccountSigner, GeneratedKey};
pub use provisioner::{
    contact_for_email, load_stored_account, AccountProvisioner, ProvisionOutcome, ProvisionState,
    ProvisionedAccount, StoredAccount, UriSource,
};
pub use store::{AccountData, AccountStore, FileAccountStore, MemoryAccountStore, StoreField};
