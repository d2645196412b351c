//! Filesystem account store
//!
//! # Directory Structure
//!
//! ```text
//! storage/
//! └── account.json      # Every field, base64 encoded, plus write metadata
//! ```
//!
//! `account.json` is replaced through a rename so a crash mid-write leaves
//! the previous document intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::StoreError;
use crate::store::{AccountData, AccountStore, StoreField};

const ACCOUNT_FILE: &str = "account.json";
const ACCOUNT_TMP_FILE: &str = "account.json.tmp";

/// On-disk account document
#[derive(Debug, Serialize, Deserialize)]
struct AccountDocument {
    /// Field layout version, see [`StoreField::SCHEMA_VERSION`]
    version: u32,
    /// When the document was written
    updated: DateTime<Utc>,
    /// Field name -> base64 value
    entries: BTreeMap<String, String>,
}

/// Account store backed by a directory on disk
///
/// The directory is created with 0700 permissions and the account document
/// with 0600 on Unix, since it holds the account private key.
#[derive(Debug)]
pub struct FileAccountStore {
    base_path: PathBuf,
}

impl FileAccountStore {
    /// Open (creating if needed) a store rooted at `base_path`
    pub fn new(base_path: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(base_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(base_path, fs::Permissions::from_mode(0o700))?;
        }

        info!(
            storage_path = %base_path.display(),
            "Initialized ACME account storage"
        );

        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    /// Open an existing store without creating it or changing its permissions
    pub fn open(base_path: &Path) -> Result<Self, StoreError> {
        if !base_path.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("storage directory {} does not exist", base_path.display()),
            )));
        }

        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    /// Get the storage base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the account document
    pub fn account_path(&self) -> PathBuf {
        self.base_path.join(ACCOUNT_FILE)
    }

    /// Read the account document synchronously
    pub fn load(&self) -> Result<AccountData, StoreError> {
        let account_path = self.account_path();

        if !account_path.exists() {
            trace!("No stored ACME account found");
            return Ok(AccountData::new());
        }

        let content = fs::read_to_string(&account_path)?;
        let document: AccountDocument = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", account_path.display(), e)))?;

        if document.version > StoreField::SCHEMA_VERSION {
            return Err(StoreError::Corrupt(format!(
                "{}: schema version {} is newer than supported version {}",
                account_path.display(),
                document.version,
                StoreField::SCHEMA_VERSION
            )));
        }

        let mut entries = BTreeMap::new();
        for (name, encoded) in document.entries {
            let value = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                StoreError::Corrupt(format!("field '{}' is not valid base64: {}", name, e))
            })?;
            entries.insert(name, value);
        }

        debug!(
            fields = entries.len(),
            updated = %document.updated,
            "Loaded ACME account data"
        );

        Ok(AccountData::from(entries))
    }

    /// Write the account document synchronously
    pub fn save(&self, data: &AccountData) -> Result<(), StoreError> {
        let document = AccountDocument {
            version: StoreField::SCHEMA_VERSION,
            updated: Utc::now(),
            entries: data
                .iter()
                .map(|(name, value)| (name.to_string(), STANDARD.encode(value)))
                .collect(),
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let tmp_path = self.base_path.join(ACCOUNT_TMP_FILE);
        let account_path = self.account_path();

        {
            let mut file = fs::File::create(&tmp_path)?;

            // Restrict before any secret bytes are written
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))?;
            }

            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &account_path)?;

        info!(
            path = %account_path.display(),
            fields = data.len(),
            "Saved ACME account data"
        );
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FileAccountStore {
    async fn get(&self) -> Result<AccountData, StoreError> {
        self.load()
    }

    async fn put(&self, data: &AccountData) -> Result<(), StoreError> {
        self.save(data)
    }
}
