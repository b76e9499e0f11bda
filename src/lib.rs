// IBAN → BIC - Core Library
// National bank registries in, bank metadata for an IBAN out

pub mod countries;  // Country-code → bank-code length table
pub mod entry;      // Canonical bank entry
pub mod error;
pub mod iban;
pub mod source;     // Line and workbook readers
pub mod parser;     // One parser per registry format
pub mod ingest;     // File → entry stream
pub mod repository;
pub mod db;         // SQLite repository + load audit
pub mod rules;      // BIC override rules
pub mod bic;        // BIC resolution
pub mod loader;
pub mod config;

// Re-export commonly used types
pub use bic::{resolve_bic, BicResolver};
pub use config::Config;
pub use countries::CountryCodeLengthTable;
pub use db::{setup_database, CountryStat, LoadRecord, SqliteStore};
pub use entry::{normalize_bic, BankEntry};
pub use error::{IbanError, IngestError, ParseError, RepositoryError, UnknownFormat};
pub use iban::{Iban, ValidationResult};
pub use ingest::{ingest_file, ingest_file_with, IngestItem, IngestStream, IngestSummary};
pub use loader::{load_all, load_file, LoadReport};
pub use parser::{
    detect_format, get_parser, Record, RecordParser, SourceFormat,
    AustriaParser, BundesbankParser, BelgiumParser, NetherlandsParser,
    LuxembourgParser, SwitzerlandParser, LiechtensteinParser,
};
pub use repository::{BankDataRepository, InMemoryStore};
pub use rules::{BankCodeCondition, BicOverrideRule, BicOverrides};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
