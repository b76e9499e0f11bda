// 🌍 Country-Code Length Table
// How many leading BBAN characters identify the bank, per country

use std::collections::HashMap;
use std::sync::LazyLock;

/// ISO 3166-1 alpha-2 code → length of the national bank code prefix.
///
/// Covers every country a registry parser or the resolver knows about.
const BANK_CODE_LENGTHS: &[(&str, usize)] = &[
    ("AT", 5),
    ("BE", 3),
    ("CH", 5),
    ("DE", 8),
    ("LI", 5),
    ("LU", 3),
    ("NL", 4),
];

static GLOBAL: LazyLock<CountryCodeLengthTable> =
    LazyLock::new(|| CountryCodeLengthTable::from_pairs(BANK_CODE_LENGTHS.iter().copied()));

/// Read-only lookup table, built once per process.
///
/// Parsers and the resolver take `&CountryCodeLengthTable` so they all slice
/// bank codes with the same instance; `global()` hands out that instance.
#[derive(Debug, Clone)]
pub struct CountryCodeLengthTable {
    lengths: HashMap<String, usize>,
}

impl CountryCodeLengthTable {
    /// The process-wide table
    pub fn global() -> &'static CountryCodeLengthTable {
        &GLOBAL
    }

    /// Build a table from explicit pairs (tests, embedding callers)
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let lengths = pairs
            .into_iter()
            .map(|(country, len)| (country.to_ascii_uppercase(), len))
            .collect();
        CountryCodeLengthTable { lengths }
    }

    /// Bank code length for a country, `None` if the country is not covered
    pub fn get(&self, country_code: &str) -> Option<usize> {
        self.lengths.get(country_code).copied()
    }

    pub fn contains(&self, country_code: &str) -> bool {
        self.lengths.contains_key(country_code)
    }

    /// Left-anchored bank code prefix of a BBAN.
    ///
    /// `None` when the country is unknown or the BBAN is too short; leading
    /// zeros are kept because repository keys are exact strings.
    pub fn bank_code<'a>(&self, country_code: &str, bban: &'a str) -> Option<&'a str> {
        let len = self.get(country_code)?;
        bban.get(..len)
    }

    /// Left-pad a registry bank code with zeros to the country's length.
    ///
    /// Codes already at (or beyond) the length are returned verbatim.
    pub fn pad_bank_code(&self, country_code: &str, code: &str) -> Option<String> {
        let len = self.get(country_code)?;
        Some(format!("{:0>width$}", code, width = len))
    }

    /// Covered country codes, sorted
    pub fn countries(&self) -> Vec<&str> {
        let mut countries: Vec<&str> = self.lengths.keys().map(String::as_str).collect();
        countries.sort_unstable();
        countries
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}
