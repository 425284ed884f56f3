//! Raw dataset handling: CSV tables, cleaning and typed records.

pub mod cleaner;
pub mod records;
pub mod table;

pub use cleaner::{clean_records, CleaningStats};
pub use records::load_applications;
pub use table::{parse_number, RawTable};
