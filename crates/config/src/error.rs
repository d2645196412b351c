//! Configuration error types.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while loading account configuration
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read configuration file {}: {source}", path.display())]
    #[diagnostic(code(acme_account::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// KDL syntax error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] ::kdl::KdlError),

    /// The document has no `acme-account` block
    #[error("missing `acme-account` configuration block")]
    #[diagnostic(
        code(acme_account::config::missing_block),
        help("wrap the settings in `acme-account {{ ... }}`")
    )]
    MissingBlock,

    /// A required setting is absent
    #[error("missing required setting `{0}`")]
    #[diagnostic(code(acme_account::config::missing_field))]
    MissingField(&'static str),

    /// A setting has the wrong type or an unusable value
    #[error("invalid value for `{field}`: {message}")]
    #[diagnostic(code(acme_account::config::invalid_value))]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// Environment overrides could not be deserialized
    #[error("invalid environment override: {0}")]
    #[diagnostic(code(acme_account::config::env))]
    Env(#[from] envy::Error),
}
