pub mod fundamentals_reader;

pub use fundamentals_reader::{read_fundamentals, read_fundamentals_from_path, read_fundamentals_xlsx, ColumnScheme};
