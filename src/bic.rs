// 🔎 BIC Resolution
// IBAN → bank code → repository entry → (override) → ValidationResult.bank_data

use crate::countries::CountryCodeLengthTable;
use crate::error::RepositoryError;
use crate::iban::{Iban, ValidationResult};
use crate::repository::BankDataRepository;
use crate::rules::BicOverrides;
use std::sync::LazyLock;
use tracing::debug;

static STANDARD_OVERRIDES: LazyLock<BicOverrides> = LazyLock::new(BicOverrides::standard);

/// Resolve with the process-wide length table and the standard overrides.
///
/// Missing information (unknown country, short BBAN, unknown bank code) is
/// appended to `result.messages`; only a repository failure is an `Err`.
pub fn resolve_bic<R>(iban: &Iban, result: ValidationResult, repo: &R) -> Result<ValidationResult, RepositoryError>
where
    R: BankDataRepository + ?Sized,
{
    BicResolver::new(CountryCodeLengthTable::global(), &STANDARD_OVERRIDES).resolve(iban, result, repo)
}

/// Resolver with an injected length table and override set
#[derive(Debug, Clone, Copy)]
pub struct BicResolver<'a> {
    table: &'a CountryCodeLengthTable,
    overrides: &'a BicOverrides,
}

impl<'a> BicResolver<'a> {
    pub fn new(table: &'a CountryCodeLengthTable, overrides: &'a BicOverrides) -> Self {
        BicResolver { table, overrides }
    }

    pub fn resolve<R>(
        &self,
        iban: &Iban,
        mut result: ValidationResult,
        repo: &R,
    ) -> Result<ValidationResult, RepositoryError>
    where
        R: BankDataRepository + ?Sized,
    {
        let country_code = iban.country_code();

        let Some(length) = self.table.get(country_code) else {
            result.add_message(format!(
                "Cannot get BIC. No information available for country {country_code}."
            ));
            return Ok(result);
        };

        let Some(bank_code) = iban.bban().get(..length) else {
            result.add_message(format!("Cannot get BIC for BBAN {}.", iban.bban()));
            return Ok(result);
        };

        let Some(mut entry) = repo.find(country_code, bank_code)? else {
            result.add_message(format!("No BIC found for bank code: {bank_code}"));
            return Ok(result);
        };

        if let Some(rule) = self.overrides.apply(&mut entry) {
            debug!(rule = %rule.id, bank_code, bic = %entry.bic, "BIC override applied");
        }

        result.bank_data = entry;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::BankEntry;
    use crate::repository::InMemoryStore;

    fn store_with(entries: &[BankEntry]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for entry in entries {
            store.upsert(entry).unwrap();
        }
        store
    }

    fn entry(country: &str, code: &str, name: &str, bic: &str) -> BankEntry {
        BankEntry::new(country, code.to_string(), name.to_string(), bic.to_string())
    }

    fn fresh(iban: &str) -> (Iban, ValidationResult) {
        (iban.parse().unwrap(), ValidationResult::new(true, "", iban))
    }

    struct FailingRepo;

    impl BankDataRepository for FailingRepo {
        fn find(&self, _: &str, _: &str) -> Result<Option<BankEntry>, RepositoryError> {
            Err(RepositoryError::Poisoned)
        }

        fn upsert(&self, _: &BankEntry) -> Result<(), RepositoryError> {
            Err(RepositoryError::Poisoned)
        }

        fn count(&self, _: Option<&str>) -> Result<usize, RepositoryError> {
            Err(RepositoryError::Poisoned)
        }
    }

    #[test]
    fn test_commerzbank_override() {
        let store = store_with(&[entry("DE", "12040000", "Commerzbank", "COBADEBB120")]);
        let (iban, result) = fresh("DE12120400000052065002");

        let result = resolve_bic(&iban, result, &store).unwrap();

        assert_eq!(result.bank_data.bic, "COBADEFFXXX");
        assert_eq!(result.bank_data.name, "Commerzbank");
        assert!(result.messages.is_empty());
        // stored entry is untouched
        assert_eq!(store.find("DE", "12040000").unwrap().unwrap().bic, "COBADEBB120");
    }

    #[test]
    fn test_plain_lookup_keeps_bic() {
        let store = store_with(&[entry("DE", "84050000", "Rhön-Rennsteig-Sparkasse", "HELADEF1RRS")]);
        let (iban, result) = fresh("DE06840500000000123456");

        let result = resolve_bic(&iban, result, &store).unwrap();

        assert_eq!(result.bank_data.bic, "HELADEF1RRS");
        assert_eq!(result.bank_data.bank_code, "84050000");
    }

    #[test]
    fn test_leading_zeros_are_kept() {
        let store = store_with(&[
            entry("BE", "001", "BNP Paribas Fortis", "GEBABEBB"),
            entry("BE", "1", "wrong key", "WRONG"),
        ]);
        let (iban, result) = fresh("BE71001234567869");

        let result = resolve_bic(&iban, result, &store).unwrap();

        assert_eq!(result.bank_data.bic, "GEBABEBB");
    }

    #[test]
    fn test_unknown_country() {
        let store = InMemoryStore::new();
        let (iban, result) = fresh("FR1420041010050500013M02606");

        let result = resolve_bic(&iban, result, &store).unwrap();

        assert_eq!(
            result.messages,
            vec!["Cannot get BIC. No information available for country FR."]
        );
        assert!(!result.has_bank_data());
    }

    #[test]
    fn test_bban_shorter_than_bank_code() {
        let store = InMemoryStore::new();
        let (iban, result) = fresh("DE121204");

        let result = resolve_bic(&iban, result, &store).unwrap();

        assert_eq!(result.messages, vec!["Cannot get BIC for BBAN 1204."]);
        assert!(!result.has_bank_data());
    }

    #[test]
    fn test_bank_code_not_found() {
        let store = InMemoryStore::new();
        let (iban, result) = fresh("NL91ABNA0417164300");

        let result = resolve_bic(&iban, result, &store).unwrap();

        assert_eq!(result.messages, vec!["No BIC found for bank code: ABNA"]);
        assert!(!result.has_bank_data());
    }

    #[test]
    fn test_messages_accumulate() {
        let store = InMemoryStore::new();
        let iban: Iban = "NL91ABNA0417164300".parse().unwrap();
        let result = ValidationResult::new(false, "Invalid checksum", "NL91ABNA0417164300");

        let result = resolve_bic(&iban, result, &store).unwrap();

        assert_eq!(
            result.messages,
            vec!["Invalid checksum", "No BIC found for bank code: ABNA"]
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let store = store_with(&[entry("LU", "001", "Spuerkeess", "BCEELULL")]);

        let (iban, first) = fresh("LU280019400644750000");
        let first = resolve_bic(&iban, first, &store).unwrap();
        let (_, second) = fresh("LU280019400644750000");
        let second = resolve_bic(&iban, second, &store).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.bank_data.bic, "BCEELULL");
    }

    #[test]
    fn test_repository_error_propagates() {
        let (iban, result) = fresh("DE12120400000052065002");
        let err = resolve_bic(&iban, result, &FailingRepo).unwrap_err();
        assert!(matches!(err, RepositoryError::Poisoned));
    }

    #[test]
    fn test_repository_not_queried_for_unknown_country() {
        let (iban, result) = fresh("FR1420041010050500013M02606");
        let result = resolve_bic(&iban, result, &FailingRepo).unwrap();
        assert_eq!(result.messages.len(), 1);
    }

    #[test]
    fn test_injected_table_and_overrides() {
        let table = CountryCodeLengthTable::from_pairs([("DE", 8)]);
        let overrides = BicOverrides::new();
        let resolver = BicResolver::new(&table, &overrides);
        let store = store_with(&[entry("DE", "12040000", "Commerzbank", "COBADEBB120")]);
        let (iban, result) = fresh("DE12120400000052065002");

        let result = resolver.resolve(&iban, result, &store).unwrap();

        assert_eq!(result.bank_data.bic, "COBADEBB120");
    }
}
