// 🏦 Canonical bank entry - one institution as published by a national registry

use serde::{Deserialize, Serialize};

/// Format-independent representation of one registry record.
///
/// `bank_code` is stored exactly as extracted (leading zeros included);
/// repositories key on `(country_code, bank_code)` as byte-exact strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankEntry {
    #[serde(rename = "bankCode")]
    pub bank_code: String,
    pub name: String,
    pub zip: String,
    pub city: String,
    pub bic: String,
    #[serde(rename = "countryCode")]
    pub country_code: String,
}

impl BankEntry {
    /// Create an entry with the identifying fields; address fields start empty
    pub fn new(country_code: &str, bank_code: String, name: String, bic: String) -> Self {
        BankEntry {
            bank_code,
            name,
            zip: String::new(),
            city: String::new(),
            bic,
            country_code: country_code.to_string(),
        }
    }

    /// Builder pattern: add postal code and city
    pub fn with_address(mut self, zip: String, city: String) -> Self {
        self.zip = zip;
        self.city = city;
        self
    }

    /// Repository key
    pub fn key(&self) -> (&str, &str) {
        (&self.country_code, &self.bank_code)
    }

    /// Zero-valued entries are what an unresolved `ValidationResult` carries
    pub fn is_empty(&self) -> bool {
        *self == BankEntry::default()
    }
}

/// BICs are published with stray spaces and in mixed case ("GKCC BE BB")
pub fn normalize_bic(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}
