//! CSV export.
//!
//! Fixed header `Timestamp,Type,Data`; ISO-8601 millisecond timestamps; the
//! data field is the only one that can contain commas or quotes, so it is
//! always quoted with inner quotes doubled.

use crate::record::ScanRecord;

pub fn render(records: &[ScanRecord]) -> String {
    let mut output = String::from("Timestamp,Type,Data\n");

    for record in records {
        let timestamp = chrono::DateTime::from_timestamp_millis(record.timestamp)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            .unwrap_or_else(|| record.timestamp.to_string());

        let data = record.data.replace('"', "\"\"");
        output.push_str(&format!(
            "{timestamp},{},\"{data}\"\n",
            record.kind.as_str()
        ));
    }

    output
}
