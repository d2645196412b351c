//! Account configuration KDL parsing.

use std::path::PathBuf;

use ::kdl::{KdlDocument, KdlValue};
use tracing::{trace, warn};

use crate::{
    default_rsa_bits, default_storage, AccountConfig, ConfigError, KeyFamily, KeyTypeConfig,
    LETSENCRYPT_DIRECTORY, LETSENCRYPT_STAGING_DIRECTORY,
};

const BLOCK_NAME: &str = "acme-account";

const KNOWN_SETTINGS: [&str; 6] = [
    "directory-url",
    "email",
    "key-type",
    "key-size",
    "staging",
    "storage",
];

/// Parse the `acme-account` block of a KDL document
pub fn parse_account_config(source: &str) -> Result<AccountConfig, ConfigError> {
    let doc: KdlDocument = source.parse()?;

    let block = doc
        .get(BLOCK_NAME)
        .and_then(|node| node.children())
        .ok_or(ConfigError::MissingBlock)?;

    for node in block.nodes() {
        let name = node.name().value();
        if !KNOWN_SETTINGS.contains(&name) {
            warn!(setting = %name, "Ignoring unknown account setting");
        }
    }

    let staging = get_bool(block, "staging")?.unwrap_or(false);
    let directory_url = match get_string(block, "directory-url")? {
        Some(url) => url,
        None if staging => LETSENCRYPT_STAGING_DIRECTORY.to_string(),
        None => LETSENCRYPT_DIRECTORY.to_string(),
    };

    let email = get_string(block, "email")?.ok_or(ConfigError::MissingField("email"))?;

    let family = match get_string(block, "key-type")? {
        Some(value) => value.parse()?,
        None => KeyFamily::Rsa,
    };
    let size = match get_u32(block, "key-size")? {
        Some(size) => size,
        None => match family {
            KeyFamily::Rsa => default_rsa_bits(),
            KeyFamily::Ec => 384,
        },
    };

    let storage = get_string(block, "storage")?
        .map(PathBuf::from)
        .unwrap_or_else(default_storage);

    let config = AccountConfig {
        directory_url,
        email,
        key: KeyTypeConfig { family, size },
        storage,
    };

    trace!(
        directory_url = %config.directory_url,
        key = %config.key,
        storage = %config.storage.display(),
        "Parsed account configuration"
    );

    Ok(config)
}

fn get_string(doc: &KdlDocument, name: &'static str) -> Result<Option<String>, ConfigError> {
    match doc.get_arg(name) {
        None => Ok(None),
        Some(value) => value
            .as_string()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| type_error(name, "a string", value)),
    }
}

fn get_u32(doc: &KdlDocument, name: &'static str) -> Result<Option<u32>, ConfigError> {
    match doc.get_arg(name) {
        None => Ok(None),
        Some(value) => {
            let int = value
                .as_integer()
                .ok_or_else(|| type_error(name, "an integer", value))?;
            u32::try_from(int).map(Some).map_err(|_| ConfigError::InvalidValue {
                field: name,
                message: format!("{} is out of range", int),
            })
        }
    }
}

fn get_bool(doc: &KdlDocument, name: &'static str) -> Result<Option<bool>, ConfigError> {
    match doc.get_arg(name) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| type_error(name, "a boolean", value)),
    }
}

fn type_error(field: &'static str, expected: &str, value: &KdlValue) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: format!("expected {}, found {}", expected, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EcCurve;

    #[test]
    fn test_parse_full_block() {
        let config = parse_account_config(
            r#"
            acme-account {
                directory-url "https://acme.example.com/directory"
                email "Admin@Example.com"
                key-type "ec"
                key-size 256
                storage "/srv/acme"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.directory_url, "https://acme.example.com/directory");
        assert_eq!(config.email, "Admin@Example.com");
        assert_eq!(config.key, KeyTypeConfig::ec(256));
        assert_eq!(config.key.curve(), Some(EcCurve::P256));
        assert_eq!(config.storage, PathBuf::from("/srv/acme"));
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse_account_config(
            r#"
            acme-account {
                email "admin@example.com"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.directory_url, LETSENCRYPT_DIRECTORY);
        assert_eq!(config.key, KeyTypeConfig::rsa(2048));
        assert_eq!(config.storage, default_storage());
    }

    #[test]
    fn test_parse_ec_default_size() {
        let config = parse_account_config(
            r#"
            acme-account {
                email "admin@example.com"
                key-type "ec"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.key, KeyTypeConfig::ec(384));
    }

    #[test]
    fn test_staging_selects_staging_directory() {
        let config = parse_account_config(
            r#"
            acme-account {
                email "admin@example.com"
                staging #true
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.directory_url, LETSENCRYPT_STAGING_DIRECTORY);
    }

    #[test]
    fn test_missing_block() {
        let result = parse_account_config(r#"server { workers 4 }"#);
        assert!(matches!(result, Err(ConfigError::MissingBlock)));
    }

    #[test]
    fn test_missing_email() {
        let result = parse_account_config(r#"acme-account { key-type "rsa" }"#);
        assert!(matches!(result, Err(ConfigError::MissingField("email"))));
    }

    #[test]
    fn test_key_size_wrong_type() {
        let result = parse_account_config(
            r#"
            acme-account {
                email "admin@example.com"
                key-size "large"
            }
            "#,
        );

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "key-size", .. })
        ));
    }

    #[test]
    fn test_negative_key_size() {
        let result = parse_account_config(
            r#"
            acme-account {
                email "admin@example.com"
                key-size -1
            }
            "#,
        );

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "key-size", .. })
        ));
    }

    #[test]
    fn test_syntax_error() {
        let result = parse_account_config("acme-account {");
        assert!(matches!(result, Err(ConfigError::Syntax(_))));
    }
}
