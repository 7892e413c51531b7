//! CFACTS CSV export reader.

use super::mapping::{build_record, Field, RawFields};
use super::model::CfactsSystem;
use crate::error::{Result, RowLocator, SyncError};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// Header cell positions for the known fields.
#[derive(Debug)]
struct HeaderIndex {
    positions: HashMap<Field, usize>,
}

impl HeaderIndex {
    fn new(headers: &StringRecord) -> Result<Self> {
        let mut positions = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            if let Some(field) = Field::from_source(name) {
                positions.insert(field, idx);
            }
        }

        for field in Field::REQUIRED {
            if !positions.contains_key(&field) {
                return Err(SyncError::MissingColumn(field.source_name().to_string()));
            }
        }

        Ok(Self { positions })
    }
}

struct CsvRow<'a> {
    index: &'a HeaderIndex,
    record: &'a StringRecord,
}

impl RawFields for CsvRow<'_> {
    fn raw(&self, field: Field) -> Option<&str> {
        self.index
            .positions
            .get(&field)
            .and_then(|idx| self.record.get(*idx))
    }

    fn position(&self, field: Field) -> Option<usize> {
        self.index.positions.get(&field).map(|idx| idx + 1)
    }
}

fn malformed(err: csv::Error, fallback_line: u64) -> SyncError {
    let line = err.position().map(|p| p.line()).unwrap_or(fallback_line);
    SyncError::MalformedCsv {
        at: RowLocator::Line(line),
        message: err.to_string(),
    }
}

/// Parses a CFACTS export into records.
///
/// The first line is the header. Any bad row aborts the whole parse; no
/// partial result is returned. A header-only file yields no records.
pub fn parse_csv<R: Read>(input: R) -> Result<Vec<CfactsSystem>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers = reader.headers().map_err(|e| malformed(e, 1))?.clone();
    let index = HeaderIndex::new(&headers)?;

    let mut records = Vec::new();
    let mut record = StringRecord::new();
    let mut last_line = 1;

    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {},
            Ok(false) => break,
            Err(e) => return Err(malformed(e, last_line + 1)),
        }

        last_line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(last_line + 1);

        let row = CsvRow {
            index: &index,
            record: &record,
        };
        records.push(build_record(&row, RowLocator::Line(last_line))?);
    }

    debug!(records = records.len(), "Parsed CFACTS CSV");
    Ok(records)
}
