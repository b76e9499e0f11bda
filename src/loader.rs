// 📥 Loader
// Drains ingestion streams into a repository and reports what happened

use crate::config::Config;
use crate::countries::CountryCodeLengthTable;
use crate::db::LoadRecord;
use crate::entry::BankEntry;
use crate::ingest::{ingest_file_with, IngestItem};
use crate::parser::SourceFormat;
use crate::repository::BankDataRepository;
use anyhow::{anyhow, Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};

/// Outcome of loading one registry file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub format: SourceFormat,
    pub path: PathBuf,
    /// `None` when the file could not be read
    pub sha256: Option<String>,
    pub records: usize,
    /// Entries written to the repository
    pub stored: usize,
    /// Entries skipped because an earlier row of the same file had the key
    pub duplicates: usize,
    /// The source was missing or empty
    pub absent: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    /// Audit-table row for this load
    pub fn to_load_record(&self) -> LoadRecord {
        LoadRecord {
            format: self.format.code().to_string(),
            path: self.path.display().to_string(),
            sha256: self.sha256.clone(),
            entries: self.stored,
            absent: self.absent,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Load one registry file into `repo`.
///
/// Within a file the first row for a `(country, bank_code)` key wins: the
/// Bundesbank file lists branch rows under the head office's BLZ. Nothing is
/// written unless the whole file ingests cleanly; the entries then go to the
/// repository as one batch.
pub fn load_file<R>(
    format: SourceFormat,
    path: &Path,
    table: &CountryCodeLengthTable,
    repo: &R,
) -> Result<LoadReport>
where
    R: BankDataRepository + ?Sized,
{
    let started_at = Utc::now();
    let sha256 = file_digest(path);

    let mut stream = ingest_file_with(format, path, table)
        .with_context(|| format!("Failed to open {} registry {:?}", format.name(), path))?;

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut entries: Vec<BankEntry> = Vec::new();
    let mut duplicates = 0;

    for item in stream.by_ref() {
        if item.is_absent() {
            warn!(format = format.code(), path = %path.display(), "registry file missing or empty");
            continue;
        }
        for entry in IngestItem::into_entries(item) {
            if !seen.insert((entry.country_code.clone(), entry.bank_code.clone())) {
                debug!(bank_code = %entry.bank_code, "skipping repeated bank code");
                duplicates += 1;
                continue;
            }
            entries.push(entry);
        }
    }

    let summary = stream
        .finish()
        .with_context(|| format!("Failed to ingest {:?}", path))?;

    let stored = repo
        .upsert_many(&entries)
        .with_context(|| format!("Failed to store {} entries", format.name()))?;

    let report = LoadReport {
        format,
        path: path.to_path_buf(),
        sha256,
        records: summary.records,
        stored,
        duplicates,
        absent: summary.absent,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        format = format.code(),
        records = report.records,
        stored = report.stored,
        duplicates = report.duplicates,
        absent = report.absent,
        "registry loaded"
    );

    Ok(report)
}

/// Load every configured registry concurrently, one thread per format.
///
/// Results come back in `SourceFormat::ALL` order; one failing format does
/// not stop the others.
pub fn load_all<R>(
    config: &Config,
    table: &CountryCodeLengthTable,
    repo: &R,
) -> Vec<(SourceFormat, Result<LoadReport>)>
where
    R: BankDataRepository + ?Sized,
{
    thread::scope(|scope| {
        let handles: Vec<_> = SourceFormat::ALL
            .iter()
            .map(|&format| {
                let path = config.source_path(format);
                let handle = scope.spawn(move || load_file(format, &path, table, repo));
                (format, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(format, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("{} loader thread panicked", format.name())));
                (format, result)
            })
            .collect()
    })
}

/// Hex SHA-256 of the file's bytes
fn file_digest(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}
