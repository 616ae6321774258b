use thiserror::Error;

/// Failures that abort a screening run.
///
/// Per-row conditions (missing history, unavailable quotes, empty results) are
/// carried as data on the rows and never show up here.
#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error("uploaded table is missing required column '{0}'")]
    MissingColumn(String),

    #[error("reference year {0} is outside 1900..=9999")]
    InvalidReferenceYear(i32),

    #[error("invalid {field} bounds: min {min} is greater than max {max}")]
    InvalidBounds {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("failed to read table row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("workbook has no worksheet")]
    EmptyWorkbook,

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub const MIN_REFERENCE_YEAR: i32 = 1900;
pub const MAX_REFERENCE_YEAR: i32 = 9999;

pub type Result<T> = std::result::Result<T, ScreenerError>;
