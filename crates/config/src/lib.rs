//! ACME account configuration
//!
//! Loads the settings the account provisioner needs (directory URL, contact
//! email, key type and size, storage location) from a KDL file, applies
//! environment overrides and validates the result.
//!
//! # Example
//!
//! ```kdl
//! acme-account {
//!     directory-url "https://acme-v02.api.letsencrypt.org/directory"
//!     email "admin@example.com"
//!     key-type "ec"
//!     key-size 384
//!     storage "/var/lib/acme-account"
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use validator::Validate;

mod error;
mod kdl;
pub mod validate;

pub use error::ConfigError;
pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Let's Encrypt production directory
pub const LETSENCRYPT_DIRECTORY: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory
pub const LETSENCRYPT_STAGING_DIRECTORY: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

/// EC key sizes that select a named curve. Anything else falls back to P-384.
pub const SUPPORTED_EC_SIZES: [u32; 4] = [224, 256, 384, 521];

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "ACME_ACCOUNT_";

// ============================================================================
// Key type configuration
// ============================================================================

/// Asymmetric key family for the account key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFamily {
    Rsa,
    Ec,
}

impl FromStr for KeyFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(KeyFamily::Rsa),
            "ec" | "ecdsa" => Ok(KeyFamily::Ec),
            other => Err(ConfigError::InvalidValue {
                field: "key-type",
                message: format!("unknown key type '{}', expected 'rsa' or 'ec'", other),
            }),
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFamily::Rsa => f.write_str("rsa"),
            KeyFamily::Ec => f.write_str("ec"),
        }
    }
}

/// Named elliptic curve selected by an EC key size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    P224,
    P256,
    P384,
    P521,
}

impl EcCurve {
    /// Select the curve for a key size.
    ///
    /// Sizes outside [`SUPPORTED_EC_SIZES`] map to P-384 instead of failing.
    /// [`AccountConfig::validate`] reports such sizes as a warning.
    pub fn from_key_size(size: u32) -> Self {
        match size {
            224 => EcCurve::P224,
            256 => EcCurve::P256,
            384 => EcCurve::P384,
            521 => EcCurve::P521,
            _ => EcCurve::P384,
        }
    }

    /// Key size in bits
    pub fn bits(self) -> u32 {
        match self {
            EcCurve::P224 => 224,
            EcCurve::P256 => 256,
            EcCurve::P384 => 384,
            EcCurve::P521 => 521,
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.bits())
    }
}

/// Desired account key type and size
///
/// For RSA `size` is the modulus length in bits. For EC it selects a curve
/// through [`EcCurve::from_key_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTypeConfig {
    pub family: KeyFamily,
    pub size: u32,
}

impl KeyTypeConfig {
    pub fn rsa(bits: u32) -> Self {
        Self {
            family: KeyFamily::Rsa,
            size: bits,
        }
    }

    pub fn ec(size: u32) -> Self {
        Self {
            family: KeyFamily::Ec,
            size,
        }
    }

    /// The curve an EC config resolves to, `None` for RSA
    pub fn curve(&self) -> Option<EcCurve> {
        match self.family {
            KeyFamily::Rsa => None,
            KeyFamily::Ec => Some(EcCurve::from_key_size(self.size)),
        }
    }
}

impl Default for KeyTypeConfig {
    fn default() -> Self {
        Self::rsa(default_rsa_bits())
    }
}

impl fmt::Display for KeyTypeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.curve() {
            Some(curve) => write!(f, "ec/{}", curve),
            None => write!(f, "rsa/{}", self.size),
        }
    }
}

// ============================================================================
// Settings provider
// ============================================================================

/// Source of the settings the provisioner reads on every run
///
/// The provisioner does not own its configuration; embedders can back this
/// with whatever configuration system they already have.
pub trait AccountSettings: Send + Sync {
    /// ACME directory endpoint
    fn directory_url(&self) -> &str;

    /// Family of newly generated account keys
    fn key_type(&self) -> KeyFamily;

    /// Size of newly generated account keys
    fn key_size(&self) -> u32;

    /// Contact email registered with the authority
    fn contact_email(&self) -> &str;

    /// Key type and size combined
    fn key_config(&self) -> KeyTypeConfig {
        KeyTypeConfig {
            family: self.key_type(),
            size: self.key_size(),
        }
    }
}

// ============================================================================
// Account configuration
// ============================================================================

/// Complete account configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AccountConfig {
    /// ACME directory endpoint
    #[validate(url)]
    pub directory_url: String,

    /// Contact email (normalized to a lower-case `mailto:` URI on use)
    #[validate(email)]
    pub email: String,

    /// Account key type and size
    #[serde(default)]
    pub key: KeyTypeConfig,

    /// Directory holding the stored account
    #[serde(default = "default_storage")]
    pub storage: PathBuf,
}

fn default_rsa_bits() -> u32 {
    2048
}

fn default_storage() -> PathBuf {
    PathBuf::from("/var/lib/acme-account")
}

impl AccountConfig {
    /// Create a configuration for the given contact email with defaults
    /// for everything else.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            directory_url: LETSENCRYPT_DIRECTORY.to_string(),
            email: email.into(),
            key: KeyTypeConfig::default(),
            storage: default_storage(),
        }
    }

    /// Load configuration from a KDL file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Loading account configuration");
        Self::from_kdl(&content)
    }

    /// Parse configuration from KDL source
    pub fn from_kdl(source: &str) -> Result<Self, ConfigError> {
        kdl::parse_account_config(source)
    }

    /// Apply `ACME_ACCOUNT_*` environment variable overrides
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from an explicit set of variables
    ///
    /// Only variables carrying [`ENV_PREFIX`] are considered.
    pub fn apply_overrides<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_iter(vars)?;

        if let Some(url) = overrides.directory_url {
            trace!(directory_url = %url, "Directory URL overridden from environment");
            self.directory_url = url;
        }
        if let Some(email) = overrides.email {
            self.email = email;
        }
        if let Some(key_type) = overrides.key_type {
            self.key.family = key_type.parse()?;
        }
        if let Some(key_size) = overrides.key_size {
            self.key.size = key_size;
        }
        if let Some(storage) = overrides.storage {
            self.storage = storage;
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        validate::validate_account_config(self)
    }
}

impl AccountSettings for AccountConfig {
    fn directory_url(&self) -> &str {
        &self.directory_url
    }

    fn key_type(&self) -> KeyFamily {
        self.key.family
    }

    fn key_size(&self) -> u32 {
        self.key.size
    }

    fn contact_email(&self) -> &str {
        &self.email
    }
}

#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    directory_url: Option<String>,
    email: Option<String>,
    key_type: Option<String>,
    key_size: Option<u32>,
    storage: Option<PathBuf>,
}
