//! Bank data repository abstraction and an in-memory implementation

use crate::entry::BankEntry;
use crate::error::RepositoryError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Keyed storage for canonical bank entries.
///
/// Keys are `(country_code, bank_code)` compared as exact strings: no numeric
/// normalization, no leading-zero stripping. Implementations must tolerate
/// concurrent `find` and `upsert` calls from independent loads.
pub trait BankDataRepository: Send + Sync {
    /// Look up one bank. `Ok(None)` means "not found"; `Err` is a storage
    /// failure the caller must not mistake for absence.
    fn find(&self, country_code: &str, bank_code: &str) -> Result<Option<BankEntry>, RepositoryError>;

    /// Insert or replace the entry stored under its key
    fn upsert(&self, entry: &BankEntry) -> Result<(), RepositoryError>;

    /// Write a batch of entries. Stores with transactions override this so
    /// the batch lands entirely or not at all.
    fn upsert_many(&self, entries: &[BankEntry]) -> Result<usize, RepositoryError> {
        for entry in entries {
            self.upsert(entry)?;
        }
        Ok(entries.len())
    }

    /// Number of stored entries, optionally for one country
    fn count(&self, country_code: Option<&str>) -> Result<usize, RepositoryError>;
}

impl<R: BankDataRepository + ?Sized> BankDataRepository for Arc<R> {
    fn find(&self, country_code: &str, bank_code: &str) -> Result<Option<BankEntry>, RepositoryError> {
        (**self).find(country_code, bank_code)
    }

    fn upsert(&self, entry: &BankEntry) -> Result<(), RepositoryError> {
        (**self).upsert(entry)
    }

    fn upsert_many(&self, entries: &[BankEntry]) -> Result<usize, RepositoryError> {
        (**self).upsert_many(entries)
    }

    fn count(&self, country_code: Option<&str>) -> Result<usize, RepositoryError> {
        (**self).count(country_code)
    }
}

/// In-memory storage for tests and short-lived tools
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<(String, String), BankEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data
    pub fn clear(&self) -> Result<(), RepositoryError> {
        self.entries
            .write()
            .map_err(|_| RepositoryError::Poisoned)?
            .clear();
        Ok(())
    }
}

impl BankDataRepository for InMemoryStore {
    fn find(&self, country_code: &str, bank_code: &str) -> Result<Option<BankEntry>, RepositoryError> {
        let entries = self.entries.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(entries
            .get(&(country_code.to_string(), bank_code.to_string()))
            .cloned())
    }

    fn upsert(&self, entry: &BankEntry) -> Result<(), RepositoryError> {
        self.entries
            .write()
            .map_err(|_| RepositoryError::Poisoned)?
            .insert(
                (entry.country_code.clone(), entry.bank_code.clone()),
                entry.clone(),
            );
        Ok(())
    }

    fn count(&self, country_code: Option<&str>) -> Result<usize, RepositoryError> {
        let entries = self.entries.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(match country_code {
            Some(country) => entries.keys().filter(|(c, _)| c == country).count(),
            None => entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(country: &str, code: &str, bic: &str) -> BankEntry {
        BankEntry::new(country, code.to_string(), format!("Bank {code}"), bic.to_string())
    }

    #[test]
    fn test_find_is_exact_string_match() {
        let store = InMemoryStore::new();
        store.upsert(&entry("BE", "001", "GEBABEBB")).unwrap();

        assert_eq!(store.find("BE", "001").unwrap().unwrap().bic, "GEBABEBB");
        assert!(store.find("BE", "1").unwrap().is_none());
        assert!(store.find("NL", "001").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces() {
        let store = InMemoryStore::new();
        store.upsert(&entry("DE", "10000000", "OLD")).unwrap();
        store.upsert(&entry("DE", "10000000", "MARKDEF1100")).unwrap();

        assert_eq!(store.count(None).unwrap(), 1);
        assert_eq!(store.find("DE", "10000000").unwrap().unwrap().bic, "MARKDEF1100");
    }

    #[test]
    fn test_count_per_country() {
        let store = InMemoryStore::new();
        store.upsert(&entry("DE", "10000000", "A")).unwrap();
        store.upsert(&entry("DE", "12040000", "B")).unwrap();
        store.upsert(&entry("BE", "001", "C")).unwrap();

        assert_eq!(store.count(Some("DE")).unwrap(), 2);
        assert_eq!(store.count(Some("BE")).unwrap(), 1);
        assert_eq!(store.count(Some("LU")).unwrap(), 0);
        assert_eq!(store.count(None).unwrap(), 3);

        store.clear().unwrap();
        assert_eq!(store.count(None).unwrap(), 0);
    }

    #[test]
    fn test_upsert_many_default() {
        let store = InMemoryStore::new();
        let written = store
            .upsert_many(&[entry("LU", "001", "BCEELULL"), entry("LU", "002", "BILLLULL")])
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.count(Some("LU")).unwrap(), 2);
    }

    #[test]
    fn test_clones_share_storage() {
        let store = InMemoryStore::new();
        let shared = Arc::new(store.clone());
        shared.upsert(&entry("LU", "001", "BCEELULL")).unwrap();
        assert!(store.find("LU", "001").unwrap().is_some());
    }
}
