//! In-memory account store.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::StoreError;
use crate::store::{AccountData, AccountStore};

/// Account store held in process memory
///
/// Nothing survives a restart, so this is meant for tests and for embedders
/// that persist the data themselves. Counts reads and writes, and can be told
/// to fail to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    data: Mutex<AccountData>,
    failure: Mutex<Option<String>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `data`
    pub fn with_data(data: AccountData) -> Self {
        Self {
            data: Mutex::new(data),
            ..Self::default()
        }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> AccountData {
        self.data.lock().clone()
    }

    /// Make every following `get` and `put` fail with `message`, or clear
    /// the failure with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock() = message.map(str::to_string);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match self.failure.lock().as_ref() {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self) -> Result<AccountData, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let data = self.data.lock().clone();
        trace!(fields = data.len(), "Read account data from memory store");
        Ok(data)
    }

    async fn put(&self, data: &AccountData) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        *self.data.lock() = data.clone();
        trace!(fields = data.len(), "Wrote account data to memory store");
        Ok(())
    }
}
