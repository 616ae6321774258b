//! Spreadsheet export of screened rows, as CSV or a workbook.

use rust_xlsxwriter::Workbook;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{AnalyzedStock, EnrichedStock, QuoteMetrics};

/// Header row shared by every export format.
pub const EXPORT_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "current_price",
    "price_change_pct",
    "pe_ratio",
    "eps_std_dev",
    "avg_eps",
    "avg_dividend",
    "payout_ratio",
];

/// Worksheet holding the exported rows.
pub const SHEET_NAME: &str = "Filtered Stocks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// `.xlsx` selects a workbook, anything else CSV.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => Self::Xlsx,
            _ => Self::Csv,
        }
    }
}

/// Result of an export request.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Encoded file bytes, header row included.
    Written(Vec<u8>),
    /// Nothing matched; no bytes are produced.
    NoRows,
}

/// One exported line. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub current_price: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps_std_dev: Option<f64>,
    pub avg_eps: Option<f64>,
    pub avg_dividend: Option<f64>,
    pub payout_ratio: Option<f64>,
}

impl<'a> ExportRecord<'a> {
    fn new(stock: &'a AnalyzedStock, quote: Option<&QuoteMetrics>) -> Self {
        Self {
            id: &stock.row.id,
            name: &stock.row.name,
            current_price: quote.map(|q| q.current_price),
            price_change_pct: quote.map(|q| q.price_change_pct),
            pe_ratio: quote.and_then(|q| q.pe_ratio),
            eps_std_dev: stock.metrics.eps_std_dev,
            avg_eps: stock.metrics.avg_eps,
            avg_dividend: stock.metrics.avg_dividend,
            payout_ratio: stock.metrics.payout_ratio,
        }
    }
}

impl ExportRecord<'_> {
    /// Numeric cells after `id` and `name`, in column order.
    fn values(&self) -> [Option<f64>; 7] {
        [
            self.current_price,
            self.price_change_pct,
            self.pe_ratio,
            self.eps_std_dev,
            self.avg_eps,
            self.avg_dividend,
            self.payout_ratio,
        ]
    }
}

impl<'a> From<&'a EnrichedStock> for ExportRecord<'a> {
    fn from(enriched: &'a EnrichedStock) -> Self {
        Self::new(&enriched.stock, enriched.quote.metrics())
    }
}

impl<'a> From<&'a AnalyzedStock> for ExportRecord<'a> {
    fn from(stock: &'a AnalyzedStock) -> Self {
        Self::new(stock, None)
    }
}

pub fn export<'a, I>(records: I, format: ExportFormat) -> Result<ExportOutcome>
where
    I: IntoIterator<Item = ExportRecord<'a>>,
{
    match format {
        ExportFormat::Csv => export_csv(records),
        ExportFormat::Xlsx => export_xlsx(records),
    }
}

/// Serialize records to CSV. Absent values become empty cells.
pub fn export_csv<'a, I>(records: I) -> Result<ExportOutcome>
where
    I: IntoIterator<Item = ExportRecord<'a>>,
{
    let mut records = records.into_iter().peekable();
    if records.peek().is_none() {
        warn!("No rows match the screening criteria; nothing to export");
        return Ok(ExportOutcome::NoRows);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut count = 0usize;
    for record in records {
        writer.serialize(record)?;
        count += 1;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;

    info!("📦 Exported {} rows ({} bytes)", count, bytes.len());
    Ok(ExportOutcome::Written(bytes))
}

/// Write records to a single-sheet workbook. Absent values leave the cell blank.
pub fn export_xlsx<'a, I>(records: I) -> Result<ExportOutcome>
where
    I: IntoIterator<Item = ExportRecord<'a>>,
{
    let mut records = records.into_iter().peekable();
    if records.peek().is_none() {
        warn!("No rows match the screening criteria; nothing to export");
        return Ok(ExportOutcome::NoRows);
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    for (col, header) in EXPORT_COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    let mut count = 0u32;
    for record in records {
        let row = count + 1;
        sheet.write_string(row, 0, record.id)?;
        sheet.write_string(row, 1, record.name)?;
        for (offset, value) in record.values().into_iter().enumerate() {
            if let Some(value) = value {
                sheet.write_number(row, offset as u16 + 2, value)?;
            }
        }
        count += 1;
    }
    let bytes = workbook.save_to_buffer()?;

    info!("📦 Exported {} rows to workbook ({} bytes)", count, bytes.len());
    Ok(ExportOutcome::Written(bytes))
}
