pub mod csv;
pub mod json;
pub mod text;

pub use csv::{escape_csv, to_csv};
pub use json::{ExportMetadata, JsonExport, export_json};
pub use text::{TextConfig, summarize};
