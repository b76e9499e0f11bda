// 🔢 IBAN + validation result
// Syntactic splitting only; checksum and BBAN-shape checks happen upstream

use crate::entry::BankEntry;
use crate::error::IbanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IBAN split into its parts. Read-only for the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iban {
    country_code: String,
    check_digits: String,
    bban: String,
    raw: String,
}

impl Iban {
    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn check_digits(&self) -> &str {
        &self.check_digits
    }

    pub fn bban(&self) -> &str {
        &self.bban
    }

    /// Input as given, before whitespace removal
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Compact form: country code + check digits + BBAN
    pub fn electronic(&self) -> String {
        format!("{}{}{}", self.country_code, self.check_digits, self.bban)
    }
}

impl FromStr for Iban {
    type Err = IbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();

        if compact.len() < 5 {
            return Err(IbanError::TooShort(s.to_string()));
        }
        if !compact.is_ascii() || !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IbanError::InvalidCharacters(s.to_string()));
        }

        let (country_code, rest) = compact.split_at(2);
        if !country_code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(IbanError::InvalidCountryCode(s.to_string()));
        }
        let (check_digits, bban) = rest.split_at(2);
        if !check_digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(IbanError::InvalidCheckDigits(s.to_string()));
        }

        Ok(Iban {
            country_code: country_code.to_string(),
            check_digits: check_digits.to_string(),
            bban: bban.to_string(),
            raw: s.to_string(),
        })
    }
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.electronic())
    }
}

/// Outcome of one validation request.
///
/// `messages` only ever grows; `bank_data` stays zero-valued until the
/// resolver finds the bank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub messages: Vec<String>,
    pub iban: String,
    #[serde(rename = "bankData")]
    pub bank_data: BankEntry,
}

impl ValidationResult {
    /// Start a result; an empty `message` adds no diagnostic
    pub fn new(valid: bool, message: &str, iban: &str) -> Self {
        let mut result = ValidationResult {
            valid,
            messages: Vec::new(),
            iban: iban.to_string(),
            bank_data: BankEntry::default(),
        };
        if !message.is_empty() {
            result.add_message(message);
        }
        result
    }

    /// Append a diagnostic; earlier ones are never overwritten
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn has_bank_data(&self) -> bool {
        !self.bank_data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iban_parts() {
        let iban: Iban = "DE12120400000052065002".parse().unwrap();
        assert_eq!(iban.country_code(), "DE");
        assert_eq!(iban.check_digits(), "12");
        assert_eq!(iban.bban(), "120400000052065002");
    }

    #[test]
    fn test_parse_iban_strips_spaces_and_case() {
        let iban: Iban = "be68 5390 0754 7034".parse().unwrap();
        assert_eq!(iban.country_code(), "BE");
        assert_eq!(iban.bban(), "539007547034");
        assert_eq!(iban.raw(), "be68 5390 0754 7034");
        assert_eq!(iban.to_string(), "BE68539007547034");
    }

    #[test]
    fn test_parse_iban_rejects_garbage() {
        assert!(matches!("DE1".parse::<Iban>(), Err(IbanError::TooShort(_))));
        assert!(matches!("1E12345".parse::<Iban>(), Err(IbanError::InvalidCountryCode(_))));
        assert!(matches!("DEAB12345".parse::<Iban>(), Err(IbanError::InvalidCheckDigits(_))));
        assert!(matches!("DE12-345".parse::<Iban>(), Err(IbanError::InvalidCharacters(_))));
    }

    #[test]
    fn test_validation_result_messages_accumulate() {
        let mut result = ValidationResult::new(true, "", "DE12120400000052065002");
        assert!(result.messages.is_empty());
        result.add_message("first");
        result.add_message("second");
        assert_eq!(result.messages, vec!["first", "second"]);
        assert!(!result.has_bank_data());
    }

    #[test]
    fn test_validation_result_initial_message() {
        let result = ValidationResult::new(false, "Invalid checksum", "XX00");
        assert_eq!(result.messages, vec!["Invalid checksum"]);
        assert!(!result.valid);
    }
}
