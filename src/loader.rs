use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::PayoutRecord;

pub const REQUIRED_COLUMNS: [&str; 3] = ["address", "finalTokens", "wonTickets"];

pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<PayoutRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| malformed(path, format!("cannot read file: {e}")))?;
    read_records(file, path)
}

pub fn load_records_from_reader<R: io::Read>(input: R) -> Result<Vec<PayoutRecord>> {
    read_records(input, Path::new("<input>"))
}

fn read_records<R: io::Read>(input: R, source: &Path) -> Result<Vec<PayoutRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| malformed(source, e.to_string()))?
        .clone();

    if headers.is_empty() {
        debug!("{} is empty", source.display());
        return Ok(Vec::new());
    }

    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(malformed(
                source,
                format!("missing required column `{column}`"),
            ));
        }
    }

    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(|e| malformed(source, e.to_string()))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let mut record: PayoutRecord = row
            .deserialize(Some(&headers))
            .map_err(|e| malformed(source, format!("line {line}: {e}")))?;

        let blank = [
            ("address", &record.address),
            ("finalTokens", &record.final_tokens),
            ("wonTickets", &record.won_tickets),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());

        if let Some((column, _)) = blank {
            return Err(malformed(source, format!("line {line}: empty `{column}`")));
        }

        record.line = line;
        records.push(record);
    }

    debug!("loaded {} records from {}", records.len(), source.display());

    Ok(records)
}

fn malformed(path: &Path, reason: String) -> Error {
    Error::MalformedInput {
        path: PathBuf::from(path),
        reason,
    }
}
