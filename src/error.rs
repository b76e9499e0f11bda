// ⚠️ Error types shared by parsers, ingestion and repositories
// Application layers (loader, config, CLI) wrap these in anyhow

use std::path::PathBuf;
use thiserror::Error;

/// A single registry record could not be turned into bank entries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("record too short: expected at least {expected} {unit}, got {actual}")]
    TooShort {
        expected: usize,
        actual: usize,
        unit: &'static str,
    },

    #[error("missing value for field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value {value:?} for field `{field}`")]
    InvalidField { field: &'static str, value: String },

    #[error("{format} parser expects a {expected}, got a {actual}")]
    WrongRecordKind {
        format: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("no bank code length known for country {0}")]
    UnknownCountry(String),
}

/// Terminal failure of one ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("could not read {format} workbook {path}: {reason}")]
    Workbook {
        format: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("{format} workbook {path} contains no worksheet")]
    EmptyWorkbook { format: &'static str, path: PathBuf },

    #[error("failed to read record {record} of {path}: {source}")]
    Read {
        path: PathBuf,
        record: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse record {record} of {path}: {source}")]
    Parse {
        path: PathBuf,
        record: usize,
        #[source]
        source: ParseError,
    },

    #[error("could not start ingestion producer: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ingestion producer for {0} panicked")]
    ProducerPanicked(PathBuf),
}

/// Storage-level failure ("transport error"); never retried here
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("repository lock poisoned")]
    Poisoned,
}

/// Malformed IBAN input handed to the CLI or tests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IbanError {
    #[error("IBAN {0:?} is too short")]
    TooShort(String),

    #[error("IBAN {0:?} does not start with a two-letter country code")]
    InvalidCountryCode(String),

    #[error("IBAN {0:?} has non-numeric check digits")]
    InvalidCheckDigits(String),

    #[error("IBAN {0:?} contains characters other than A-Z and 0-9")]
    InvalidCharacters(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown source format {0:?} (expected one of: at, de, be, nl, lu, ch, li)")]
pub struct UnknownFormat(pub String);
