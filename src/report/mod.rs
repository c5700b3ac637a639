pub mod csv;
pub mod json;
pub mod table;

use crate::cli::HistoryArgs;
use crate::record::ScanRecord;

pub fn print_history(records: &[ScanRecord], args: &HistoryArgs) {
    let shown = match args.limit {
        Some(limit) => &records[..records.len().min(limit)],
        None => records,
    };

    if args.json {
        println!("{}", json::render(shown));
    } else {
        print!("{}", table::render(shown));
    }
}
