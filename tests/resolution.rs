// Fixture registries → loader → repository → BIC resolution

use iban_bic::{
    ingest_file, load_all, load_file, resolve_bic, BankDataRepository, BankEntry, Config,
    CountryCodeLengthTable, Iban, InMemoryStore, IngestItem, SourceFormat, SqliteStore,
    ValidationResult,
};
use std::collections::HashSet;
use std::path::PathBuf;

fn testdata() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn fixture_config(db: PathBuf) -> Config {
    Config {
        database_path: db,
        data_dir: testdata(),
        overrides_path: None,
    }
}

fn resolve(iban: &str, repo: &impl BankDataRepository) -> ValidationResult {
    let parsed: Iban = iban.parse().unwrap();
    resolve_bic(&parsed, ValidationResult::new(true, "", iban), repo).unwrap()
}

#[test]
fn bundesbank_load_keeps_head_office_rows() {
    let store = InMemoryStore::new();
    let report = load_file(
        SourceFormat::Bundesbank,
        &testdata().join("bundesbank.txt"),
        CountryCodeLengthTable::global(),
        &store,
    )
    .unwrap();

    assert_eq!(report.records, 6);
    assert_eq!(report.stored, 5);
    assert_eq!(report.duplicates, 1);
    assert!(!report.absent);
    assert_eq!(report.sha256.as_ref().map(String::len), Some(64));

    let commerzbank = store.find("DE", "12040000").unwrap().unwrap();
    assert_eq!(commerzbank.city, "Berlin");
    assert_eq!(commerzbank.bic, "COBADEBB120");
    assert!(store.find("DE", "84050000").unwrap().is_some());
}

#[test]
fn commerzbank_iban_resolves_to_head_office_bic() {
    let store = InMemoryStore::new();
    load_file(
        SourceFormat::Bundesbank,
        &testdata().join("bundesbank.txt"),
        CountryCodeLengthTable::global(),
        &store,
    )
    .unwrap();

    let result = resolve("DE12120400000052065002", &store);

    assert_eq!(result.bank_data.bic, "COBADEFFXXX");
    assert_eq!(result.bank_data.bank_code, "12040000");
    assert!(result.messages.is_empty());
}

#[test]
fn belgian_code_with_leading_zeros() {
    let store = InMemoryStore::new();
    load_file(
        SourceFormat::Belgium,
        &testdata().join("belgium.xlsx"),
        CountryCodeLengthTable::global(),
        &store,
    )
    .unwrap();

    assert_eq!(store.count(Some("BE")).unwrap(), 107);

    let result = resolve("BE71001234567869", &store);
    assert_eq!(result.bank_data.bank_code, "001");
    assert_eq!(result.bank_data.bic, "GEBABEBB");
}

#[test]
fn load_all_fixtures_into_sqlite_and_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture_config(dir.path().join("bankdata.db"));
    let store = SqliteStore::open(&config.database_path).unwrap();

    let results = load_all(&config, CountryCodeLengthTable::global(), &store);
    assert_eq!(results.len(), SourceFormat::ALL.len());
    for (format, result) in &results {
        let report = result.as_ref().unwrap_or_else(|e| panic!("{format}: {e:#}"));
        store.record_load(&report.to_load_record()).unwrap();
    }

    let expected = [("AT", 3), ("BE", 107), ("CH", 3), ("DE", 5), ("LI", 3), ("LU", 3), ("NL", 4)];
    for (country, count) in expected {
        assert_eq!(store.count(Some(country)).unwrap(), count, "{country}");
    }
    assert_eq!(store.recent_loads(20).unwrap().len(), 7);

    let cases = [
        ("AT020100000000123456", "NABAATWWXXX"),
        ("DE12120400000052065002", "COBADEFFXXX"),
        ("DE02840500000123456789", "HELADEF1RRS"),
        ("BE71001234567869", "GEBABEBB"),
        ("NL91ABNA0417164300", "ABNANL2A"),
        ("LU280019400644750000", "BCEELULL"),
        ("CH1000100000000000000", "SNBZCHZZXXX"),
        ("LI2108803000000000000", "BALPLI22"),
    ];
    for (iban, bic) in cases {
        let result = resolve(iban, &store);
        assert_eq!(result.bank_data.bic, bic, "{iban}: {:?}", result.messages);
    }

    let unknown = resolve("NL02XXXX0123456789", &store);
    assert_eq!(unknown.messages, vec!["No BIC found for bank code: XXXX"]);
}

#[test]
fn stored_entries_round_trip_field_for_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("bankdata.db")).unwrap();

    for format in SourceFormat::ALL {
        let path = testdata().join(format.default_file_name());
        load_file(format, &path, CountryCodeLengthTable::global(), &store).unwrap();

        let mut stream = ingest_file(format, &path).unwrap();
        let parsed: Vec<BankEntry> = stream.by_ref().flat_map(IngestItem::into_entries).collect();
        stream.finish().unwrap();

        let mut seen = HashSet::new();
        for entry in parsed {
            // later rows with a known key were skipped by the loader
            if !seen.insert((entry.country_code.clone(), entry.bank_code.clone())) {
                continue;
            }
            let stored = store.find(&entry.country_code, &entry.bank_code).unwrap();
            assert_eq!(stored.as_ref(), Some(&entry));
        }
    }
}

#[test]
fn reloading_a_file_is_idempotent() {
    let store = InMemoryStore::new();
    let path = testdata().join("luxembourg.xlsx");

    for _ in 0..2 {
        load_file(SourceFormat::Luxembourg, &path, CountryCodeLengthTable::global(), &store).unwrap();
    }

    assert_eq!(store.count(None).unwrap(), 3);
    let first = resolve("LU280019400644750000", &store);
    let second = resolve("LU280019400644750000", &store);
    assert_eq!(first, second);
}
