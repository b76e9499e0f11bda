// 🚚 Ingestion Pipeline
// File → raw records → parser → rendezvous channel, one producer thread per file

use crate::countries::CountryCodeLengthTable;
use crate::entry::BankEntry;
use crate::error::IngestError;
use crate::parser::{get_parser, Record, RecordParser, SourceFormat};
use crate::source::{read_workbook_rows, LineReader};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

// ============================================================================
// STREAM TYPES
// ============================================================================

/// One value on the output stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestItem {
    /// A record that describes one institution
    Entry(BankEntry),
    /// A record that describes several institutions, in source order
    Entries(Vec<BankEntry>),
    /// The source is missing or has no usable data; always the last item
    Absent,
}

impl IngestItem {
    pub fn is_absent(&self) -> bool {
        matches!(self, IngestItem::Absent)
    }

    /// Flatten into entries (empty for `Absent`)
    pub fn into_entries(self) -> Vec<BankEntry> {
        match self {
            IngestItem::Entry(entry) => vec![entry],
            IngestItem::Entries(entries) => entries,
            IngestItem::Absent => Vec::new(),
        }
    }
}

/// What a producer did before the stream closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub format: SourceFormat,
    /// Data records handed to the parser (headers and blank rows excluded)
    pub records: usize,
    pub entries: usize,
    /// The stream ended with the `Absent` sentinel
    pub absent: bool,
}

/// Consumer side of one ingestion.
///
/// Iterating yields items until the producer closes the channel. Call
/// `finish` afterwards to learn whether the stream ended on EOF or on a
/// parse/read failure. Dropping the stream early makes the producer stop at
/// its next send.
pub struct IngestStream {
    format: SourceFormat,
    path: PathBuf,
    receiver: Receiver<IngestItem>,
    producer: JoinHandle<Result<IngestSummary, IngestError>>,
}

impl IngestStream {
    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop consuming, wait for the producer and return its outcome
    pub fn finish(self) -> Result<IngestSummary, IngestError> {
        let IngestStream {
            path,
            receiver,
            producer,
            ..
        } = self;

        // Unblocks a producer still waiting on a rendezvous send
        drop(receiver);

        producer
            .join()
            .map_err(|_| IngestError::ProducerPanicked(path))?
    }
}

impl Iterator for IngestStream {
    type Item = IngestItem;

    fn next(&mut self) -> Option<IngestItem> {
        self.receiver.recv().ok()
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Stream the entries of a registry file, using the process-wide table
pub fn ingest_file(format: SourceFormat, path: impl AsRef<Path>) -> Result<IngestStream, IngestError> {
    ingest_file_with(format, path, CountryCodeLengthTable::global())
}

/// Stream the entries of a registry file.
///
/// Line formats never fail here: an unopenable file becomes a stream holding
/// a single `Absent`. Spreadsheets are materialized before the producer
/// starts, and an unreadable workbook is returned as `Err`, except for
/// formats that degrade to `Absent` (Liechtenstein).
///
/// The producer thread works on its own copy of `table`.
pub fn ingest_file_with(
    format: SourceFormat,
    path: impl AsRef<Path>,
    table: &CountryCodeLengthTable,
) -> Result<IngestStream, IngestError> {
    let path = path.as_ref().to_path_buf();
    let table = table.clone();

    if !format.is_spreadsheet() {
        let producer_path = path.clone();
        return spawn_producer(format, path, move |emitter| {
            produce_lines(format, &producer_path, &table, emitter)
        });
    }

    let rows = match read_workbook_rows(&path) {
        Ok(Some(rows)) => Some(rows),
        Ok(None) if format.degrades_when_unreadable() => None,
        Ok(None) => {
            return Err(IngestError::EmptyWorkbook {
                format: format.name(),
                path,
            })
        }
        Err(e) if format.degrades_when_unreadable() => {
            warn!(format = format.code(), path = %path.display(), error = %e, "workbook unreadable");
            None
        }
        Err(e) => {
            return Err(IngestError::Workbook {
                format: format.name(),
                path,
                reason: e.to_string(),
            })
        }
    };

    let producer_path = path.clone();
    spawn_producer(format, path, move |emitter| match rows {
        Some(rows) => produce_rows(format, &producer_path, rows, &table, emitter),
        None => {
            emitter.absent();
            Ok(())
        }
    })
}

// ============================================================================
// PRODUCERS
// ============================================================================

/// Sending half plus running counts
struct Emitter {
    format: SourceFormat,
    sender: Sender<IngestItem>,
    summary: IngestSummary,
}

impl Emitter {
    /// Forward one record's entries; false once the consumer is gone
    fn emit(&mut self, entries: Vec<BankEntry>) -> bool {
        self.summary.records += 1;
        if entries.is_empty() {
            return true;
        }
        self.summary.entries += entries.len();

        if self.format.groups_entries() {
            return self.sender.send(IngestItem::Entries(entries)).is_ok();
        }
        entries
            .into_iter()
            .all(|entry| self.sender.send(IngestItem::Entry(entry)).is_ok())
    }

    fn absent(&mut self) {
        self.summary.absent = true;
        // A consumer that already hung up doesn't need the sentinel
        let _ = self.sender.send(IngestItem::Absent);
    }
}

fn spawn_producer<F>(format: SourceFormat, path: PathBuf, body: F) -> Result<IngestStream, IngestError>
where
    F: FnOnce(&mut Emitter) -> Result<(), IngestError> + Send + 'static,
{
    // Capacity 0: every send waits for the consumer
    let (sender, receiver) = bounded(0);

    let mut emitter = Emitter {
        format,
        sender,
        summary: IngestSummary {
            format,
            records: 0,
            entries: 0,
            absent: false,
        },
    };

    let producer = thread::Builder::new()
        .name(format!("ingest-{}", format.code()))
        .spawn(move || {
            body(&mut emitter)?;
            debug!(
                format = emitter.format.code(),
                records = emitter.summary.records,
                entries = emitter.summary.entries,
                absent = emitter.summary.absent,
                "ingestion producer done"
            );
            Ok(emitter.summary)
            // sender drops here: the stream closes exactly once on every path
        })
        .map_err(IngestError::Spawn)?;

    Ok(IngestStream {
        format,
        path,
        receiver,
        producer,
    })
}

fn produce_lines(
    format: SourceFormat,
    path: &Path,
    table: &CountryCodeLengthTable,
    emitter: &mut Emitter,
) -> Result<(), IngestError> {
    let lines = match LineReader::open(path, format.encoding()) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(format = format.code(), path = %path.display(), error = %e, "source file unreadable");
            emitter.absent();
            return Ok(());
        }
    };

    let parser = get_parser(format);
    let header_lines = format.header_rows();
    let mut line_no = 0;

    for line in lines {
        line_no += 1;
        let line = line.map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            record: line_no,
            source,
        })?;

        // A blank title line means the export is empty
        if line_no == 1 && header_lines > 0 && line.is_empty() {
            emitter.absent();
            return Ok(());
        }
        if line_no <= header_lines {
            continue;
        }
        if line.is_empty() {
            debug!(format = format.code(), line = line_no, "empty line, ending stream");
            emitter.absent();
            return Ok(());
        }

        if !parse_and_emit(parser.as_ref(), Record::Line(line), line_no, path, table, emitter)? {
            return Ok(());
        }
    }

    if line_no == 0 {
        emitter.absent();
    }
    Ok(())
}

fn produce_rows(
    format: SourceFormat,
    path: &Path,
    rows: Vec<Vec<String>>,
    table: &CountryCodeLengthTable,
    emitter: &mut Emitter,
) -> Result<(), IngestError> {
    let parser = get_parser(format);

    for (idx, cells) in rows.into_iter().enumerate().skip(format.header_rows()) {
        let row_no = idx + 1;
        let record = Record::Row(cells);
        if record.is_blank() {
            debug!(format = format.code(), row = row_no, "skipping blank row");
            continue;
        }
        if !parse_and_emit(parser.as_ref(), record, row_no, path, table, emitter)? {
            return Ok(());
        }
    }
    Ok(())
}

/// Ok(false) when the consumer went away
fn parse_and_emit(
    parser: &dyn RecordParser,
    record: Record,
    record_no: usize,
    path: &Path,
    table: &CountryCodeLengthTable,
    emitter: &mut Emitter,
) -> Result<bool, IngestError> {
    let entries = parser
        .parse(&record, table)
        .map_err(|source| IngestError::Parse {
            path: path.to_path_buf(),
            record: record_no,
            source,
        })?;

    if entries.is_empty() {
        debug!(format = parser.source_format().code(), record = record_no, "record yields no entries");
    }

    let delivered = emitter.emit(entries);
    if !delivered {
        debug!(format = parser.source_format().code(), "consumer closed the stream");
    }
    Ok(delivered)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    fn austria_lines(data: &[&str]) -> Vec<u8> {
        let mut text = String::from("Bankstellenverzeichnis\n1\n\n3\n4\n5\nheader\n");
        for line in data {
            text.push_str(line);
            text.push('\n');
        }
        text.into_bytes()
    }

    const AT_ROW: &str = r#""Hauptanstalt";"11";"11000";"";"";"";"UniCredit Bank Austria AG";"";"1020";"Wien";"";"";"";"";"";"";"";"";"";"BKAUATWWXXX""#;

    #[test]
    fn test_item_helpers() {
        assert!(IngestItem::Absent.is_absent());
        assert!(IngestItem::Absent.into_entries().is_empty());
        let entry = BankEntry::default();
        assert_eq!(IngestItem::Entry(entry.clone()).into_entries(), vec![entry]);
    }

    #[test]
    fn test_missing_line_file_yields_single_absent() {
        let mut stream = ingest_file(SourceFormat::Bundesbank, "testdata/nope.txt").unwrap();
        assert_eq!(stream.next(), Some(IngestItem::Absent));
        assert_eq!(stream.next(), None);

        let summary = stream.finish().unwrap();
        assert!(summary.absent);
        assert_eq!(summary.entries, 0);
    }

    #[test]
    fn test_empty_line_file_yields_absent() {
        let file = temp_file(b"");
        let items: Vec<IngestItem> = ingest_file(SourceFormat::Bundesbank, file.path())
            .unwrap()
            .collect();
        assert_eq!(items, vec![IngestItem::Absent]);
    }

    #[test]
    fn test_austria_blank_title_yields_absent() {
        let file = temp_file(b"\nrest\n");
        let items: Vec<IngestItem> = ingest_file(SourceFormat::Austria, file.path())
            .unwrap()
            .collect();
        assert_eq!(items, vec![IngestItem::Absent]);
    }

    #[test]
    fn test_austria_empty_data_line_terminates_with_absent() {
        let file = temp_file(&austria_lines(&[AT_ROW, "", AT_ROW]));
        let mut stream = ingest_file(SourceFormat::Austria, file.path()).unwrap();

        let first = stream.next().unwrap();
        assert!(matches!(first, IngestItem::Entry(ref e) if e.bank_code == "11000"));
        assert_eq!(stream.next(), Some(IngestItem::Absent));
        assert_eq!(stream.next(), None);

        let summary = stream.finish().unwrap();
        assert_eq!(summary.entries, 1);
        assert!(summary.absent);
    }

    #[test]
    fn test_austria_headers_only_closes_without_absent() {
        let file = temp_file(&austria_lines(&[]));
        let items: Vec<IngestItem> = ingest_file(SourceFormat::Austria, file.path())
            .unwrap()
            .collect();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_failure_terminates_stream_and_reports_record() {
        let file = temp_file(&austria_lines(&[AT_ROW, "\"garbage\""]));
        let mut stream = ingest_file(SourceFormat::Austria, file.path()).unwrap();

        assert!(matches!(stream.next(), Some(IngestItem::Entry(_))));
        assert_eq!(stream.next(), None);

        match stream.finish() {
            Err(IngestError::Parse { record, .. }) => assert_eq!(record, 9),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_workbook_is_fatal() {
        let result = ingest_file(SourceFormat::Netherlands, "testdata/netherlands_missing.xlsx");
        assert!(matches!(result, Err(IngestError::Workbook { .. })));

        let result = ingest_file(SourceFormat::Switzerland, "testdata/not_a_workbook.xlsx");
        assert!(matches!(result, Err(IngestError::Workbook { .. })));
    }

    #[test]
    fn test_unreadable_liechtenstein_workbook_degrades() {
        let mut stream = ingest_file(SourceFormat::Liechtenstein, "testdata/not_a_workbook.xlsx").unwrap();
        assert_eq!(stream.next(), Some(IngestItem::Absent));
        assert_eq!(stream.next(), None);
        assert!(stream.finish().unwrap().absent);
    }

    #[test]
    fn test_early_drop_does_not_block_producer() {
        let mut stream = ingest_file(SourceFormat::Belgium, "testdata/belgium.xlsx").unwrap();
        assert!(stream.next().is_some());
        // finish() must return even though rows are still pending
        let summary = stream.finish().unwrap();
        assert!(summary.records >= 1);
        assert!(!summary.absent);
    }

    #[test]
    fn test_custom_table_reaches_parsers() {
        let table = CountryCodeLengthTable::from_pairs([("LI", 7)]);
        let mut stream =
            ingest_file_with(SourceFormat::Liechtenstein, "testdata/liechtenstein.xlsx", &table).unwrap();
        // the stream outlives the caller's table
        drop(table);
        match stream.next() {
            Some(IngestItem::Entry(entry)) => assert_eq!(entry.bank_code, "0008803"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
