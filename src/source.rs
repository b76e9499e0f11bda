// 📄 Raw record readers
// Text lines in legacy encodings, and spreadsheet rows as plain strings

use calamine::{open_workbook_auto, Data, Reader};
use encoding_rs::Encoding;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

// ============================================================================
// LINE READER
// ============================================================================

/// Iterates the lines of a byte stream, decoded with a fixed encoding.
///
/// Line terminators (`\n`, `\r\n`) are stripped. A UTF-8/UTF-16 BOM on the
/// first line overrides the configured encoding.
pub struct LineReader<R> {
    reader: R,
    encoding: &'static Encoding,
    buf: Vec<u8>,
    lines_read: usize,
}

impl LineReader<BufReader<File>> {
    pub fn open(path: &Path, encoding: &'static Encoding) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(LineReader::new(BufReader::new(file), encoding))
    }
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R, encoding: &'static Encoding) -> Self {
        LineReader {
            reader,
            encoding,
            buf: Vec::new(),
            lines_read: 0,
        }
    }

    /// Number of lines handed out so far (1-based number of the last line)
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    fn decode(&mut self) -> String {
        while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
            self.buf.pop();
        }
        if self.lines_read == 0 {
            let (text, actual, _) = self.encoding.decode(&self.buf);
            if actual != self.encoding {
                self.encoding = actual;
            }
            text.into_owned()
        } else {
            let (text, _) = self.encoding.decode_without_bom_handling(&self.buf);
            text.into_owned()
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let line = self.decode();
                self.lines_read += 1;
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

// ============================================================================
// WORKBOOK READER
// ============================================================================

/// Materialize the first worksheet of a workbook (xlsx, xls, ods).
///
/// Returns `Ok(None)` when the workbook has no worksheet at all. Rows are
/// padded by calamine to the sheet's used width; cells are rendered with
/// `cell_text`.
pub fn read_workbook_rows(path: &Path) -> Result<Option<Vec<Vec<String>>>, calamine::Error> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(None),
    };

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    Ok(Some(rows))
}

/// Plain-text rendering of a cell.
///
/// Registries store codes both as text and as numbers; integral floats are
/// printed without a decimal part so `100.0` reads as `"100"`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}
