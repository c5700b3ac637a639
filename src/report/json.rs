//! JSON output for the scan history.
//!
//! Renders the wire-format record array for scripting and piping.

use crate::record::ScanRecord;

pub fn render(records: &[ScanRecord]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| String::from("[]"))
}
