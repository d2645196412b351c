//! Account store implementations.
//!
//! A store is an opaque key-value document: field names map to raw bytes.
//! The field names are fixed by [`StoreField`] so every backend reads and
//! writes the same layout.

mod file;
mod memory;

pub use file::FileAccountStore;
pub use memory::MemoryAccountStore;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::StoreError;

/// Named fields of a stored account (schema version 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreField {
    /// PEM-encoded account private key
    PrivateKey,
    /// Registration URI assigned by the authority
    RegistrationUrl,
    /// Older JSON registration document `{"URI": "..."}`, read-only
    LegacyRegistration,
}

impl StoreField {
    /// Version of the field layout
    pub const SCHEMA_VERSION: u32 = 1;

    pub const ALL: [StoreField; 3] = [
        StoreField::PrivateKey,
        StoreField::RegistrationUrl,
        StoreField::LegacyRegistration,
    ];

    /// Key under which the field is persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreField::PrivateKey => "acme-private-key",
            StoreField::RegistrationUrl => "acme-registration-url",
            StoreField::LegacyRegistration => "acme-registration",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

impl fmt::Display for StoreField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw account data as held by a store
///
/// Entries whose names are not part of [`StoreField`] are carried through
/// untouched so a backend shared with other tools does not lose them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AccountData {
    entries: BTreeMap<String, Vec<u8>>,
}

impl AccountData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: StoreField) -> Option<&[u8]> {
        self.entries.get(field.as_str()).map(Vec::as_slice)
    }

    pub fn insert(&mut self, field: StoreField, value: impl Into<Vec<u8>>) {
        self.entries.insert(field.as_str().to_string(), value.into());
    }

    pub fn with(mut self, field: StoreField, value: impl Into<Vec<u8>>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn contains(&self, field: StoreField) -> bool {
        self.entries.contains_key(field.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over raw entries, including unknown ones
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_slice()))
    }
}

impl From<BTreeMap<String, Vec<u8>>> for AccountData {
    fn from(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Self { entries }
    }
}

impl From<AccountData> for BTreeMap<String, Vec<u8>> {
    fn from(data: AccountData) -> Self {
        data.entries
    }
}

// Values are secret material, only names are shown
impl fmt::Debug for AccountData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Persistence for account data
///
/// `put` replaces the whole document and must be atomic: readers see either
/// the previous data or all of the new data.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Read the stored account data, empty when nothing has been stored.
    async fn get(&self) -> Result<AccountData, StoreError>;

    /// Replace the stored account data.
    async fn put(&self, data: &AccountData) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        assert_eq!(StoreField::PrivateKey.as_str(), "acme-private-key");
        assert_eq!(StoreField::RegistrationUrl.as_str(), "acme-registration-url");
        assert_eq!(StoreField::LegacyRegistration.as_str(), "acme-registration");

        for field in StoreField::ALL {
            assert_eq!(StoreField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(StoreField::from_name("tls.crt"), None);
    }

    #[test]
    fn test_account_data_fields() {
        let data = AccountData::new()
            .with(StoreField::PrivateKey, "pem")
            .with(StoreField::RegistrationUrl, "https://example/acct/1");

        assert_eq!(data.len(), 2);
        assert_eq!(data.get(StoreField::PrivateKey), Some(&b"pem"[..]));
        assert!(!data.contains(StoreField::LegacyRegistration));
    }

    #[test]
    fn test_unknown_entries_are_preserved() {
        let mut raw = BTreeMap::new();
        raw.insert("tls.crt".to_string(), b"cert".to_vec());
        raw.insert("acme-private-key".to_string(), b"pem".to_vec());

        let data = AccountData::from(raw.clone());
        assert_eq!(data.get(StoreField::PrivateKey), Some(&b"pem"[..]));
        assert_eq!(BTreeMap::from(data), raw);
    }

    #[test]
    fn test_debug_hides_values() {
        let data = AccountData::new().with(StoreField::PrivateKey, "secret-key-bytes");
        let debug = format!("{:?}", data);

        assert!(debug.contains("acme-private-key"));
        assert!(!debug.contains("secret-key-bytes"));
    }
}
