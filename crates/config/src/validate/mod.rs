//! Configuration validation
//!
//! Collects every problem in one pass instead of stopping at the first, so
//! `acme-account check` can report them together. Errors make the
//! configuration unusable; warnings describe settings that work but probably
//! don't do what the operator expects.

use std::fmt;

use url::Url;
use validator::Validate;

use crate::{AccountConfig, EcCurve, KeyFamily, SUPPORTED_EC_SIZES};

/// RSA keys below this size are accepted but flagged
const RECOMMENDED_RSA_BITS: u32 = 2048;

/// Area of the configuration an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Directory,
    Contact,
    Key,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Directory => f.write_str("directory"),
            ErrorCategory::Contact => f.write_str("contact"),
            ErrorCategory::Key => f.write_str("key"),
        }
    }
}

/// A problem that makes the configuration unusable
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// A setting that is usable but suspicious
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of validating a configuration
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// True when there are no errors (warnings are allowed)
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validate a complete account configuration
pub fn validate_account_config(config: &AccountConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    result.merge(validate_fields(config));
    result.merge(validate_directory_scheme(&config.directory_url));
    result.merge(validate_key(config));

    result
}

/// Field-level checks derived from the `validator` annotations
fn validate_fields(config: &AccountConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.email.trim().is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Contact,
            "Contact email is empty",
        ));
        return result;
    }

    if let Err(errors) = Validate::validate(config) {
        for (field, _) in errors.field_errors() {
            let field = field.to_string();
            match field.as_str() {
                "email" => result.add_error(ValidationError::new(
                    ErrorCategory::Contact,
                    format!("Contact email '{}' is not a valid address", config.email),
                )),
                "directory_url" => result.add_error(ValidationError::new(
                    ErrorCategory::Directory,
                    format!("Directory URL '{}' is not a valid URL", config.directory_url),
                )),
                other => result.add_error(ValidationError::new(
                    ErrorCategory::Key,
                    format!("Invalid setting '{}'", other),
                )),
            }
        }
    }

    result
}

fn validate_directory_scheme(directory_url: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    // Unparseable URLs are already reported by the field checks
    if let Ok(url) = Url::parse(directory_url) {
        match url.scheme() {
            "https" => {}
            "http" => result.add_warning(ValidationWarning::new(format!(
                "Directory URL '{}' uses plain HTTP (only suitable for local test authorities)",
                directory_url
            ))),
            scheme => result.add_error(ValidationError::new(
                ErrorCategory::Directory,
                format!(
                    "Directory URL '{}' has unsupported scheme '{}'",
                    directory_url, scheme
                ),
            )),
        }
    }

    result
}

fn validate_key(config: &AccountConfig) -> ValidationResult {
    let mut result = ValidationResult::new();
    let size = config.key.size;

    match config.key.family {
        KeyFamily::Rsa if size == 0 => {
            result.add_error(ValidationError::new(
                ErrorCategory::Key,
                "RSA key size must be greater than zero",
            ));
        }
        KeyFamily::Rsa if size < RECOMMENDED_RSA_BITS => {
            result.add_warning(ValidationWarning::new(format!(
                "RSA key size {} is below {} bits and may be rejected by the authority",
                size, RECOMMENDED_RSA_BITS
            )));
        }
        KeyFamily::Rsa => {}
        KeyFamily::Ec => {
            if !SUPPORTED_EC_SIZES.contains(&size) {
                result.add_warning(ValidationWarning::new(format!(
                    "EC key size {} does not name a curve, falling back to {}",
                    size,
                    EcCurve::P384
                )));
            } else if EcCurve::from_key_size(size) == EcCurve::P224 {
                result.add_warning(ValidationWarning::new(
                    "EC key size 224 selects P-224, which cannot sign ACME requests",
                ));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyTypeConfig;

    fn config() -> AccountConfig {
        AccountConfig::new("admin@example.com")
    }

    #[test]
    fn test_default_config_is_clean() {
        let result = config().validate();
        assert!(result.is_ok());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_email() {
        let result = AccountConfig::new("not-an-email").validate();

        assert!(!result.is_ok());
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Contact));
    }

    #[test]
    fn test_empty_email() {
        let result = AccountConfig::new("  ").validate();

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("empty"));
    }

    #[test]
    fn test_invalid_directory_url() {
        let config = AccountConfig {
            directory_url: "not a url".to_string(),
            ..config()
        };
        let result = config.validate();

        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Directory));
    }

    #[test]
    fn test_unsupported_scheme() {
        let config = AccountConfig {
            directory_url: "ftp://acme.example.com/directory".to_string(),
            ..config()
        };
        let result = config.validate();

        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("unsupported scheme")));
    }

    #[test]
    fn test_http_directory_warns() {
        let config = AccountConfig {
            directory_url: "http://localhost:14000/dir".to_string(),
            ..config()
        };
        let result = config.validate();

        assert!(result.is_ok());
        assert!(result.warnings.iter().any(|w| w.message.contains("plain HTTP")));
    }

    #[test]
    fn test_ec_fallback_is_flagged() {
        let config = AccountConfig {
            key: KeyTypeConfig::ec(512),
            ..config()
        };
        let result = config.validate();

        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("falling back to P-384"));
    }

    #[test]
    fn test_p224_is_flagged() {
        let config = AccountConfig {
            key: KeyTypeConfig::ec(224),
            ..config()
        };
        let result = config.validate();

        assert!(result.is_ok());
        assert!(result.warnings[0].message.contains("P-224"));
    }

    #[test]
    fn test_small_rsa_key() {
        let config = AccountConfig {
            key: KeyTypeConfig::rsa(1024),
            ..config()
        };
        let result = config.validate();

        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_zero_rsa_key() {
        let config = AccountConfig {
            key: KeyTypeConfig::rsa(0),
            ..config()
        };

        assert!(!config.validate().is_ok());
    }
}
