//! Read from and write to CSV files with well-known-text or coordinate columns.

pub use reader::{read_csv, read_csv_path, CsvReaderOptions};
pub use writer::{write_csv, write_csv_path, CsvOutput};

mod reader;
mod writer;

/// Extension of the sidecar file holding the CRS of a CSV file.
pub const PROJ4_EXTENSION: &str = "proj4";
