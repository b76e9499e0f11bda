// 🏗️ Registry Parser Framework
// One parser per national bank registry format, all behind RecordParser

use crate::countries::CountryCodeLengthTable;
use crate::entry::{normalize_bic, BankEntry};
use crate::error::{ParseError, UnknownFormat};
use anyhow::Result;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceFormat - which national registry a file comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    /// OeNB bank directory, `;`-separated text
    Austria,
    /// Bundesbank BLZ file, fixed-width text
    Bundesbank,
    /// NBB identification codes, spreadsheet with code ranges
    Belgium,
    Netherlands,
    Luxembourg,
    /// SIX bank master, spreadsheet
    Switzerland,
    Liechtenstein,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 7] = [
        SourceFormat::Austria,
        SourceFormat::Bundesbank,
        SourceFormat::Belgium,
        SourceFormat::Netherlands,
        SourceFormat::Luxembourg,
        SourceFormat::Switzerland,
        SourceFormat::Liechtenstein,
    ];

    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Austria => "Austria (OeNB)",
            SourceFormat::Bundesbank => "Germany (Bundesbank)",
            SourceFormat::Belgium => "Belgium (NBB)",
            SourceFormat::Netherlands => "Netherlands",
            SourceFormat::Luxembourg => "Luxembourg (BCL)",
            SourceFormat::Switzerland => "Switzerland (SIX)",
            SourceFormat::Liechtenstein => "Liechtenstein",
        }
    }

    /// Short code for CLI and storage
    pub fn code(&self) -> &'static str {
        match self {
            SourceFormat::Austria => "at",
            SourceFormat::Bundesbank => "de",
            SourceFormat::Belgium => "be",
            SourceFormat::Netherlands => "nl",
            SourceFormat::Luxembourg => "lu",
            SourceFormat::Switzerland => "ch",
            SourceFormat::Liechtenstein => "li",
        }
    }

    /// Country every entry of this source belongs to
    pub fn country_code(&self) -> &'static str {
        match self {
            SourceFormat::Austria => "AT",
            SourceFormat::Bundesbank => "DE",
            SourceFormat::Belgium => "BE",
            SourceFormat::Netherlands => "NL",
            SourceFormat::Luxembourg => "LU",
            SourceFormat::Switzerland => "CH",
            SourceFormat::Liechtenstein => "LI",
        }
    }

    /// File name looked up in the configured data directory
    pub fn default_file_name(&self) -> &'static str {
        match self {
            SourceFormat::Austria => "austria.csv",
            SourceFormat::Bundesbank => "bundesbank.txt",
            SourceFormat::Belgium => "belgium.xlsx",
            SourceFormat::Netherlands => "netherlands.xlsx",
            SourceFormat::Luxembourg => "luxembourg.xlsx",
            SourceFormat::Switzerland => "switzerland.xlsx",
            SourceFormat::Liechtenstein => "liechtenstein.xlsx",
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        !matches!(self, SourceFormat::Austria | SourceFormat::Bundesbank)
    }

    /// Leading records that carry no bank data.
    ///
    /// Austria: a title line followed by six preamble lines (the last one
    /// being the column header). Spreadsheets: title + header row, except
    /// Liechtenstein which only has the header row.
    pub fn header_rows(&self) -> usize {
        match self {
            SourceFormat::Austria => 1 + AUSTRIA_PREAMBLE_LINES,
            SourceFormat::Bundesbank => 0,
            SourceFormat::Liechtenstein => 1,
            SourceFormat::Belgium
            | SourceFormat::Netherlands
            | SourceFormat::Luxembourg
            | SourceFormat::Switzerland => 2,
        }
    }

    /// Text encoding of line-oriented sources
    pub fn encoding(&self) -> &'static Encoding {
        match self {
            SourceFormat::Austria | SourceFormat::Bundesbank => WINDOWS_1252,
            _ => UTF_8,
        }
    }

    /// One source record may describe several institutions
    pub fn groups_entries(&self) -> bool {
        matches!(self, SourceFormat::Belgium)
    }

    /// An unreadable source yields the `Absent` sentinel instead of an error
    pub fn degrades_when_unreadable(&self) -> bool {
        !self.is_spreadsheet() || matches!(self, SourceFormat::Liechtenstein)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "at" | "austria" | "oenb" => Ok(SourceFormat::Austria),
            "de" | "germany" | "bundesbank" => Ok(SourceFormat::Bundesbank),
            "be" | "belgium" | "nbb" => Ok(SourceFormat::Belgium),
            "nl" | "netherlands" => Ok(SourceFormat::Netherlands),
            "lu" | "luxembourg" | "bcl" => Ok(SourceFormat::Luxembourg),
            "ch" | "switzerland" | "six" => Ok(SourceFormat::Switzerland),
            "li" | "liechtenstein" => Ok(SourceFormat::Liechtenstein),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Record - one raw unit handed to a parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Decoded text line, terminator stripped
    Line(String),
    /// Spreadsheet row, one string per cell
    Row(Vec<String>),
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Line(_) => "text line",
            Record::Row(_) => "spreadsheet row",
        }
    }

    /// Empty line, or a row whose cells are all empty
    pub fn is_blank(&self) -> bool {
        match self {
            Record::Line(line) => line.is_empty(),
            Record::Row(cells) => cells.iter().all(|c| c.trim().is_empty()),
        }
    }
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// RecordParser - raw record → canonical bank entries
///
/// Parsers are pure: no I/O, no logging, the returned entries are the only
/// effect. Most formats return exactly one entry per record; Belgium returns
/// zero or more.
pub trait RecordParser: Send + Sync {
    fn parse(
        &self,
        record: &Record,
        table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError>;

    /// Get the source format this parser handles
    fn source_format(&self) -> SourceFormat;
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect source format from the file name
///
/// # Examples:
/// ```
/// # use iban_bic::parser::{detect_format, SourceFormat};
/// # use std::path::Path;
/// assert_eq!(detect_format(Path::new("blz_2026_09.txt")).unwrap(), SourceFormat::Bundesbank);
/// assert_eq!(detect_format(Path::new("Belgium-codes.xlsx")).unwrap(), SourceFormat::Belgium);
/// ```
pub fn detect_format(file_path: &Path) -> Result<SourceFormat> {
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let filename_lower = filename.to_lowercase();

    const PATTERNS: &[(&str, SourceFormat)] = &[
        ("austria", SourceFormat::Austria),
        ("oenb", SourceFormat::Austria),
        ("bundesbank", SourceFormat::Bundesbank),
        ("blz", SourceFormat::Bundesbank),
        ("belgium", SourceFormat::Belgium),
        ("netherlands", SourceFormat::Netherlands),
        ("luxembourg", SourceFormat::Luxembourg),
        ("switzerland", SourceFormat::Switzerland),
        ("bankenstamm", SourceFormat::Switzerland),
        ("liechtenstein", SourceFormat::Liechtenstein),
    ];

    PATTERNS
        .iter()
        .find(|(pattern, _)| filename_lower.contains(pattern))
        .map(|(_, format)| *format)
        .ok_or_else(|| anyhow::anyhow!("Could not detect source format from filename: {}", filename))
}

/// Get the parser for a source format
pub fn get_parser(format: SourceFormat) -> Box<dyn RecordParser> {
    match format {
        SourceFormat::Austria => Box::new(AustriaParser::new()),
        SourceFormat::Bundesbank => Box::new(BundesbankParser::new()),
        SourceFormat::Belgium => Box::new(BelgiumParser::new()),
        SourceFormat::Netherlands => Box::new(NetherlandsParser::new()),
        SourceFormat::Luxembourg => Box::new(LuxembourgParser::new()),
        SourceFormat::Switzerland => Box::new(SwitzerlandParser::new()),
        SourceFormat::Liechtenstein => Box::new(LiechtensteinParser::new()),
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

fn expect_line(record: &Record, format: SourceFormat) -> Result<&str, ParseError> {
    match record {
        Record::Line(line) => Ok(line),
        other => Err(ParseError::WrongRecordKind {
            format: format.name(),
            expected: "text line",
            actual: other.kind(),
        }),
    }
}

fn expect_row(record: &Record, format: SourceFormat) -> Result<&[String], ParseError> {
    match record {
        Record::Row(cells) => Ok(cells),
        other => Err(ParseError::WrongRecordKind {
            format: format.name(),
            expected: "spreadsheet row",
            actual: other.kind(),
        }),
    }
}

/// Trimmed cell, empty when the row is shorter than `idx`
fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|c| c.trim()).unwrap_or("")
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ParseError> {
    if value.is_empty() {
        Err(ParseError::MissingField(field))
    } else {
        Ok(value)
    }
}

fn require_digits<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ParseError> {
    let value = require(value, field)?;
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(value)
    } else {
        Err(ParseError::InvalidField {
            field,
            value: value.to_string(),
        })
    }
}

/// Zero-pad a numeric registry code to the country's bank code length
fn padded_code(
    table: &CountryCodeLengthTable,
    format: SourceFormat,
    code: &str,
) -> Result<String, ParseError> {
    table
        .pad_bank_code(format.country_code(), code)
        .ok_or_else(|| ParseError::UnknownCountry(format.country_code().to_string()))
}

// ============================================================================
// AUSTRIA - OeNB bank directory
// ============================================================================

/// Lines after the title line that precede the first bank row
pub const AUSTRIA_PREAMBLE_LINES: usize = 6;

// Kennzeichen;Identnummer;Bankleitzahl;Institutsart;Sektor;Firmenbuchnummer;
// Bankenname;Straße;PLZ;Ort;Politischer Bezirk;Postadresse / Straße;
// Postadresse / PLZ;Postadresse / Ort;Postfach;Bundesland;Telefon;Fax;
// E-Mail;SWIFT-Code;Homepage;Gruendungsdatum
const AT_BLZ: usize = 2;
const AT_NAME: usize = 6;
const AT_ZIP: usize = 8;
const AT_CITY: usize = 9;
const AT_SWIFT: usize = 19;

pub struct AustriaParser;

impl AustriaParser {
    pub fn new() -> Self {
        AustriaParser
    }
}

impl Default for AustriaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for AustriaParser {
    fn parse(
        &self,
        record: &Record,
        table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError> {
        use csv::ReaderBuilder;

        let line = expect_line(record, self.source_format())?;

        // Fields are quoted and may contain ';' themselves
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());

        let fields = match reader.records().next() {
            Some(Ok(fields)) => fields,
            Some(Err(e)) => {
                return Err(ParseError::InvalidField {
                    field: "record",
                    value: e.to_string(),
                })
            }
            None => return Err(ParseError::MissingField("record")),
        };

        if fields.len() <= AT_SWIFT {
            return Err(ParseError::TooShort {
                expected: AT_SWIFT + 1,
                actual: fields.len(),
                unit: "fields",
            });
        }

        let get = |idx: usize| fields.get(idx).map(str::trim).unwrap_or("");

        let blz = require_digits(get(AT_BLZ), "Bankleitzahl")?;
        let bank_code = padded_code(table, self.source_format(), blz)?;
        let name = require(get(AT_NAME), "Bankenname")?;

        let entry = BankEntry::new("AT", bank_code, name.to_string(), normalize_bic(get(AT_SWIFT)))
            .with_address(get(AT_ZIP).to_string(), get(AT_CITY).to_string());

        Ok(vec![entry])
    }

    fn source_format(&self) -> SourceFormat {
        SourceFormat::Austria
    }
}

// ============================================================================
// GERMANY - Bundesbank BLZ file
// ============================================================================

// 1-based, inclusive column ranges of the fixed-width record
const DE_BLZ: (usize, usize) = (1, 8);
const DE_NAME: (usize, usize) = (10, 67);
const DE_ZIP: (usize, usize) = (68, 72);
const DE_CITY: (usize, usize) = (73, 107);
const DE_BIC: (usize, usize) = (140, 150);

/// Full record width; lines are accepted once they reach the BIC column
pub const BUNDESBANK_RECORD_WIDTH: usize = 168;

pub struct BundesbankParser;

impl BundesbankParser {
    pub fn new() -> Self {
        BundesbankParser
    }
}

impl Default for BundesbankParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Columns are counted in characters: the file is single-byte encoded, so
/// after decoding one character is one original byte.
fn fixed_field(chars: &[char], (start, end): (usize, usize)) -> String {
    chars[start - 1..end.min(chars.len())]
        .iter()
        .collect::<String>()
        .trim()
        .to_string()
}

impl RecordParser for BundesbankParser {
    fn parse(
        &self,
        record: &Record,
        _table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError> {
        let line = expect_line(record, self.source_format())?;
        let chars: Vec<char> = line.chars().collect();

        if chars.len() < DE_BIC.1 {
            return Err(ParseError::TooShort {
                expected: DE_BIC.1,
                actual: chars.len(),
                unit: "characters",
            });
        }

        let blz = fixed_field(&chars, DE_BLZ);
        if blz.len() != DE_BLZ.1 || !blz.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseError::InvalidField {
                field: "Bankleitzahl",
                value: blz,
            });
        }

        let name = fixed_field(&chars, DE_NAME);
        require(&name, "Bezeichnung")?;

        let entry = BankEntry::new("DE", blz, name, normalize_bic(&fixed_field(&chars, DE_BIC)))
            .with_address(fixed_field(&chars, DE_ZIP), fixed_field(&chars, DE_CITY));

        Ok(vec![entry])
    }

    fn source_format(&self) -> SourceFormat {
        SourceFormat::Bundesbank
    }
}

// ============================================================================
// BELGIUM - NBB identification codes
// ============================================================================

// From | To | Biccode | Dutch | French | German | English
const BE_FROM: usize = 0;
const BE_TO: usize = 1;
const BE_BIC: usize = 2;
const BE_NAMES: [usize; 4] = [3, 4, 5, 6];

/// BIC column markers for unassigned or withdrawn code ranges
const BE_NO_BIC: &[&str] = &["-", "NAV", "VRIJ", "NAP", "N/A"];

pub struct BelgiumParser;

impl BelgiumParser {
    pub fn new() -> Self {
        BelgiumParser
    }
}

impl Default for BelgiumParser {
    fn default() -> Self {
        Self::new()
    }
}

fn belgian_code(value: &str, field: &'static str) -> Result<u16, ParseError> {
    require_digits(value, field)?
        .parse::<u16>()
        .ok()
        .filter(|code| *code <= 999)
        .ok_or_else(|| ParseError::InvalidField {
            field,
            value: value.to_string(),
        })
}

impl RecordParser for BelgiumParser {
    fn parse(
        &self,
        record: &Record,
        table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError> {
        let row = expect_row(record, self.source_format())?;
        if record.is_blank() {
            return Ok(Vec::new());
        }

        let bic = normalize_bic(cell(row, BE_BIC));
        if bic.is_empty() || BE_NO_BIC.contains(&bic.as_str()) {
            return Ok(Vec::new());
        }

        let from = belgian_code(cell(row, BE_FROM), "T_Identification_Number")?;
        let to = match cell(row, BE_TO) {
            "" => from,
            value => belgian_code(value, "T_Identification_Number_To")?,
        };
        if to < from {
            return Err(ParseError::InvalidField {
                field: "T_Identification_Number_To",
                value: cell(row, BE_TO).to_string(),
            });
        }

        // First usable language column wins
        let name = BE_NAMES
            .iter()
            .map(|idx| cell(row, *idx))
            .find(|name| !name.is_empty() && *name != "-")
            .ok_or(ParseError::MissingField("T_Institutions"))?;

        (from..=to)
            .map(|code| {
                let bank_code = padded_code(table, self.source_format(), &code.to_string())?;
                Ok(BankEntry::new("BE", bank_code, name.to_string(), bic.clone()))
            })
            .collect()
    }

    fn source_format(&self) -> SourceFormat {
        SourceFormat::Belgium
    }
}

// ============================================================================
// NETHERLANDS - BIC list
// ============================================================================

// BIC | Identifier | Naam betaaldienstverlener
const NL_BIC: usize = 0;
const NL_CODE: usize = 1;
const NL_NAME: usize = 2;

pub struct NetherlandsParser;

impl NetherlandsParser {
    pub fn new() -> Self {
        NetherlandsParser
    }
}

impl Default for NetherlandsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for NetherlandsParser {
    fn parse(
        &self,
        record: &Record,
        _table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError> {
        let row = expect_row(record, self.source_format())?;

        let code = require(cell(row, NL_CODE), "Identifier")?.to_ascii_uppercase();
        let name = require(cell(row, NL_NAME), "Naam betaaldienstverlener")?;

        Ok(vec![BankEntry::new(
            "NL",
            code,
            name.to_string(),
            normalize_bic(cell(row, NL_BIC)),
        )])
    }

    fn source_format(&self) -> SourceFormat {
        SourceFormat::Netherlands
    }
}

// ============================================================================
// LUXEMBOURG - BCL IBAN/BIC list
// ============================================================================

// Nom de l'institution | IBAN ID | Code BIC
const LU_NAME: usize = 0;
const LU_CODE: usize = 1;
const LU_BIC: usize = 2;

pub struct LuxembourgParser;

impl LuxembourgParser {
    pub fn new() -> Self {
        LuxembourgParser
    }
}

impl Default for LuxembourgParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for LuxembourgParser {
    fn parse(
        &self,
        record: &Record,
        _table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError> {
        let row = expect_row(record, self.source_format())?;

        let code = require(cell(row, LU_CODE), "IBAN ID")?;
        let name = require(cell(row, LU_NAME), "Nom de l'institution")?;

        Ok(vec![BankEntry::new(
            "LU",
            code.to_string(),
            name.to_string(),
            normalize_bic(cell(row, LU_BIC)),
        )])
    }

    fn source_format(&self) -> SourceFormat {
        SourceFormat::Luxembourg
    }
}

// ============================================================================
// SWITZERLAND - SIX bank master
// ============================================================================

// Gruppe | BCNr | Filial-ID | BCNr neu | SIC-Nr | Hauptsitz | BC-Art |
// gültig ab | SIC | euroSIC | Sprache | Kurzbez. | Bank/Institut | Domizil |
// Postadresse | PLZ | Ort | Telefon | Fax | Vorwahl | Landcode | Postkonto | SWIFT
const CH_CODE: usize = 1;
const CH_NAME: usize = 12;
const CH_ZIP: usize = 15;
const CH_CITY: usize = 16;
const CH_SWIFT: usize = 22;

pub struct SwitzerlandParser;

impl SwitzerlandParser {
    pub fn new() -> Self {
        SwitzerlandParser
    }
}

impl Default for SwitzerlandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for SwitzerlandParser {
    fn parse(
        &self,
        record: &Record,
        table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError> {
        let row = expect_row(record, self.source_format())?;

        let code = require_digits(cell(row, CH_CODE), "BCNr")?;
        let bank_code = padded_code(table, self.source_format(), code)?;
        let name = require(cell(row, CH_NAME), "Bank/Institut")?;

        let entry = BankEntry::new("CH", bank_code, name.to_string(), normalize_bic(cell(row, CH_SWIFT)))
            .with_address(cell(row, CH_ZIP).to_string(), cell(row, CH_CITY).to_string());

        Ok(vec![entry])
    }

    fn source_format(&self) -> SourceFormat {
        SourceFormat::Switzerland
    }
}

// ============================================================================
// LIECHTENSTEIN - bank list
// ============================================================================

// Bankleitzahl | Bank | BIC | PLZ | Ort
const LI_CODE: usize = 0;
const LI_NAME: usize = 1;
const LI_BIC: usize = 2;
const LI_ZIP: usize = 3;
const LI_CITY: usize = 4;

pub struct LiechtensteinParser;

impl LiechtensteinParser {
    pub fn new() -> Self {
        LiechtensteinParser
    }
}

impl Default for LiechtensteinParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for LiechtensteinParser {
    fn parse(
        &self,
        record: &Record,
        table: &CountryCodeLengthTable,
    ) -> Result<Vec<BankEntry>, ParseError> {
        let row = expect_row(record, self.source_format())?;

        let code = require_digits(cell(row, LI_CODE), "Bankleitzahl")?;
        let bank_code = padded_code(table, self.source_format(), code)?;
        let name = require(cell(row, LI_NAME), "Bank")?;

        let entry = BankEntry::new("LI", bank_code, name.to_string(), normalize_bic(cell(row, LI_BIC)))
            .with_address(cell(row, LI_ZIP).to_string(), cell(row, LI_CITY).to_string());

        Ok(vec![entry])
    }

    fn source_format(&self) -> SourceFormat {
        SourceFormat::Liechtenstein
    }
}

// ============================================================================
// TESTS
// ============================================================================
