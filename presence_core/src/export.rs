//! CSV export of the record store for downstream attendance sync.

use crate::clock::LocalZone;
use crate::{Result, ScanRecord};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    token: &'a str,
    location: &'a str,
    status: u8,
    epoch: i64,
    local_time: String,
}

impl<'a> CsvRow<'a> {
    fn new(record: &'a ScanRecord, zone: &LocalZone) -> Self {
        CsvRow {
            token: record.token.as_str(),
            location: &record.location,
            status: record.status.code(),
            epoch: record.epoch,
            local_time: zone.rfc3339(record.epoch),
        }
    }
}

/// Write every record in the store to `csv_path`, replacing it
///
/// The CSV is fsynced before returning. Returns the number of rows.
pub fn export_csv(store_path: &Path, csv_path: &Path, zone: &LocalZone) -> Result<usize> {
    let records = crate::store::read_records(store_path)?;

    if let Some(parent) = csv_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(csv_path)?;
    let mut writer = csv::Writer::from_writer(file);
    for record in &records {
        writer.serialize(CsvRow::new(record, zone))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} records to {:?}", records.len(), csv_path);
    Ok(records.len())
}
