//! Error types for account provisioning.

use std::fmt;

use thiserror::Error;

use crate::store::StoreField;
use acme_account_config::KeyTypeConfig;

/// Errors surfaced by account provisioning
///
/// Nothing here is retried internally; the caller owns retry and backoff.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Key generation failed
    #[error("failed to generate {key_type} account key: {message}")]
    KeyGeneration {
        key_type: KeyTypeConfig,
        message: String,
    },

    /// Stored key material or registration data could not be decoded
    #[error("failed to decode account data: {0}")]
    Encoding(String),

    /// A required field is absent from the stored account data
    #[error("could not find `{field}` in the stored account data")]
    StoreLookup { field: StoreField },

    /// The account store itself failed
    #[error("account store error: {0}")]
    Store(#[from] StoreError),

    /// The authority rejected a register, fetch or update call
    #[error("failed to {action} ACME account '{uri}': {source}")]
    Protocol {
        action: ProtocolAction,
        uri: String,
        #[source]
        source: DirectoryError,
    },

    /// The account key cannot produce the requested signature
    #[error("failed to sign with account key: {0}")]
    Signing(String),
}

/// Directory operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolAction {
    Register,
    Fetch,
    Update,
}

impl fmt::Display for ProtocolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolAction::Register => f.write_str("register"),
            ProtocolAction::Fetch => f.write_str("retrieve"),
            ProtocolAction::Update => f.write_str("update"),
        }
    }
}

/// Account store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document exists but cannot be read back
    #[error("corrupt account document: {0}")]
    Corrupt(String),

    /// Backend-specific failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors reported by an [`AcmeDirectoryClient`](crate::AcmeDirectoryClient)
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The authority answered with an ACME problem document
    #[error("authority rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The request never got an answer
    #[error("transport error: {0}")]
    Transport(String),

    /// The terms-of-service callback refused the terms
    #[error("terms of service were not accepted")]
    TermsNotAccepted,

    /// The authority answered with something unusable
    #[error("invalid response from authority: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_message() {
        let err = AccountError::Protocol {
            action: ProtocolAction::Fetch,
            uri: "https://example/acct/1".to_string(),
            source: DirectoryError::Rejected {
                status: 404,
                detail: "account does not exist".to_string(),
            },
        };

        assert_eq!(
            err.to_string(),
            "failed to retrieve ACME account 'https://example/acct/1': \
             authority rejected request (404): account does not exist"
        );
    }

    #[test]
    fn test_store_lookup_message() {
        let err = AccountError::StoreLookup {
            field: StoreField::PrivateKey,
        };
        assert_eq!(
            err.to_string(),
            "could not find `acme-private-key` in the stored account data"
        );
    }
}
