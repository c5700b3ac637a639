//! Terminal table rendering for the scan history.
//!
//! One row per record, newest first:
//! - id and local-ish date columns for picking entries to remove
//! - kind column from the classifier
//! - payload truncated so one scan stays on one line

use crate::record::ScanRecord;

pub fn render(records: &[ScanRecord]) -> String {
    if records.is_empty() {
        return String::from("No scans recorded. Run 'qrlog add' to record one.\n");
    }

    let mut output = String::new();

    output.push_str(&format!(
        "{:<20} {:<20} {:<8} {}\n",
        "ID", "Date", "Type", "Data"
    ));
    output.push_str(&"-".repeat(72));
    output.push('\n');

    for record in records {
        let datetime = chrono::DateTime::from_timestamp_millis(record.timestamp)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());

        output.push_str(&format!(
            "{:<20} {:<20} {:<8} {}\n",
            record.id,
            datetime,
            record.kind.as_str(),
            truncate(&record.data, 40)
        ));
    }

    output.push_str(&format!("\n{} scans\n", records.len()));

    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
