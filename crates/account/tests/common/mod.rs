//! Shared fixtures for provisioner integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use acme_account::{
    AccountConfig, AccountRecord, AccountSession, AcmeDirectoryClient, DirectoryError,
    KeyTypeConfig, TosAgreement,
};
use async_trait::async_trait;
use parking_lot::Mutex;

pub const DIRECTORY_URL: &str = "https://acme.test/directory";
pub const TOS_URL: &str = "https://acme.test/terms";
pub const ACCOUNT_URI: &str = "https://acme.test/acct/1";

/// A call observed by [`RecordingDirectory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Register { contact: Vec<String>, tos_accepted: bool },
    GetAccount { uri: String },
    UpdateAccount { record: AccountRecord },
}

/// Directory double that records every call and keeps one account
pub struct RecordingDirectory {
    calls: Mutex<Vec<Call>>,
    account: Mutex<Option<AccountRecord>>,
    failure: Mutex<Option<FailOn>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Register,
    GetAccount,
    UpdateAccount,
}

impl RecordingDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            account: Mutex::new(None),
            failure: Mutex::new(None),
        })
    }

    /// Directory that already knows an account
    pub fn with_account(uri: &str, contact: &[&str]) -> Arc<Self> {
        let directory = Self::new();
        *directory.account.lock() = Some(AccountRecord {
            uri: uri.to_string(),
            contact: contact.iter().map(|c| c.to_string()).collect(),
        });
        directory
    }

    pub fn fail_on(&self, operation: FailOn) {
        *self.failure.lock() = Some(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn count(&self, predicate: fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn registers(&self) -> usize {
        self.count(|call| matches!(call, Call::Register { .. }))
    }

    pub fn fetches(&self) -> usize {
        self.count(|call| matches!(call, Call::GetAccount { .. }))
    }

    pub fn updates(&self) -> usize {
        self.count(|call| matches!(call, Call::UpdateAccount { .. }))
    }

    pub fn account(&self) -> Option<AccountRecord> {
        self.account.lock().clone()
    }

    fn check_failure(&self, operation: FailOn) -> Result<(), DirectoryError> {
        if *self.failure.lock() == Some(operation) {
            return Err(DirectoryError::Rejected {
                status: 500,
                detail: format!("{:?} rejected by test authority", operation),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AcmeDirectoryClient for RecordingDirectory {
    async fn register(
        &self,
        session: &AccountSession,
        contact: &[String],
        accept_tos: TosAgreement,
    ) -> Result<AccountRecord, DirectoryError> {
        assert_eq!(session.directory_url(), DIRECTORY_URL);

        let tos_accepted = accept_tos(TOS_URL);
        self.calls.lock().push(Call::Register {
            contact: contact.to_vec(),
            tos_accepted,
        });
        self.check_failure(FailOn::Register)?;

        if !tos_accepted {
            return Err(DirectoryError::TermsNotAccepted);
        }

        let record = AccountRecord {
            uri: ACCOUNT_URI.to_string(),
            contact: contact.to_vec(),
        };
        *self.account.lock() = Some(record.clone());
        Ok(record)
    }

    async fn get_account(
        &self,
        _session: &AccountSession,
        uri: &str,
    ) -> Result<AccountRecord, DirectoryError> {
        self.calls.lock().push(Call::GetAccount {
            uri: uri.to_string(),
        });
        self.check_failure(FailOn::GetAccount)?;

        match self.account.lock().as_ref() {
            Some(record) if record.uri == uri => Ok(record.clone()),
            _ => Err(DirectoryError::Rejected {
                status: 400,
                detail: "urn:ietf:params:acme:error:accountDoesNotExist".to_string(),
            }),
        }
    }

    async fn update_account(
        &self,
        _session: &AccountSession,
        record: &AccountRecord,
    ) -> Result<AccountRecord, DirectoryError> {
        self.calls.lock().push(Call::UpdateAccount {
            record: record.clone(),
        });
        self.check_failure(FailOn::UpdateAccount)?;

        *self.account.lock() = Some(record.clone());
        Ok(record.clone())
    }
}

pub fn config(email: &str) -> Arc<AccountConfig> {
    Arc::new(AccountConfig {
        directory_url: DIRECTORY_URL.to_string(),
        key: KeyTypeConfig::ec(256),
        ..AccountConfig::new(email)
    })
}
