use calamine::{open_workbook_auto, open_workbook_from_rs, Data, Reader, Xlsx};
use csv::{ReaderBuilder, Trim};
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, ScreenerError};
use crate::models::FundamentalsRow;

/// Header labels of an uploaded fundamentals table.
///
/// Year columns are recognised as `"{year}{suffix}"`, surrounding whitespace ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnScheme {
    pub id_column: String,
    pub name_column: String,
    pub eps_suffix: String,
    pub dividend_suffix: String,
}

impl Default for ColumnScheme {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            name_column: "name".to_string(),
            eps_suffix: "EPS".to_string(),
            dividend_suffix: "total dividend".to_string(),
        }
    }
}

impl ColumnScheme {
    /// Labels used by Taiwan exchange fundamentals exports.
    pub fn taiwan() -> Self {
        Self {
            id_column: "代號".to_string(),
            name_column: "名稱".to_string(),
            eps_suffix: "年度每股盈餘(元)".to_string(),
            dividend_suffix: "合計股利".to_string(),
        }
    }

    fn year_of(header: &str, suffix: &str) -> Option<i32> {
        header.trim().strip_suffix(suffix)?.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Id,
    Name,
    Eps(i32),
    Dividend(i32),
    Ignored,
}

/// Resolved header positions.
#[derive(Debug)]
struct HeaderLayout {
    columns: Vec<Column>,
}

impl HeaderLayout {
    fn resolve<'h>(headers: impl IntoIterator<Item = &'h str>, scheme: &ColumnScheme) -> Result<Self> {
        let columns: Vec<Column> = headers
            .into_iter()
            .map(|header| {
                let header = header.trim();
                if header == scheme.id_column {
                    Column::Id
                } else if header == scheme.name_column {
                    Column::Name
                } else if let Some(year) = ColumnScheme::year_of(header, &scheme.eps_suffix) {
                    Column::Eps(year)
                } else if let Some(year) = ColumnScheme::year_of(header, &scheme.dividend_suffix) {
                    Column::Dividend(year)
                } else {
                    Column::Ignored
                }
            })
            .collect();

        if !columns.contains(&Column::Id) {
            return Err(ScreenerError::MissingColumn(scheme.id_column.clone()));
        }
        if !columns.contains(&Column::Name) {
            return Err(ScreenerError::MissingColumn(scheme.name_column.clone()));
        }

        debug!(
            "Resolved {} EPS and {} dividend columns",
            columns.iter().filter(|c| matches!(c, Column::Eps(_))).count(),
            columns.iter().filter(|c| matches!(c, Column::Dividend(_))).count()
        );
        Ok(Self { columns })
    }

    fn row<'c>(&self, cells: impl IntoIterator<Item = &'c str>) -> FundamentalsRow {
        let mut row = FundamentalsRow::new(String::new(), String::new());
        for (column, cell) in self.columns.iter().zip(cells) {
            match *column {
                Column::Id => row.id = cell.trim().to_string(),
                Column::Name => row.name = cell.trim().to_string(),
                Column::Eps(year) => {
                    row.eps_by_year.insert(year, parse_amount(cell));
                }
                Column::Dividend(year) => {
                    row.dividend_by_year.insert(year, parse_amount(cell));
                }
                Column::Ignored => {}
            }
        }
        row
    }
}

/// Parse a numeric cell; empty, unreadable or non-finite cells count as missing.
fn parse_amount(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    match cell.replace(',', "").parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            debug!("Treating unreadable cell '{}' as missing", cell);
            None
        }
    }
}

/// Read a fundamentals table from any CSV source.
///
/// Fails before producing any row when the identifier or name column is absent.
pub fn read_fundamentals<R: Read>(reader: R, scheme: &ColumnScheme) -> Result<Vec<FundamentalsRow>> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let layout = HeaderLayout::resolve(rdr.headers()?.iter(), scheme)?;

    let mut rows = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(|source| ScreenerError::Row { row: index + 1, source })?;
        rows.push(layout.row(record.iter()));
    }

    info!("📊 Loaded {} stocks from fundamentals table", rows.len());
    Ok(rows)
}

/// Read the first worksheet of an in-memory `.xlsx` workbook.
pub fn read_fundamentals_xlsx<RS: Read + Seek>(reader: RS, scheme: &ColumnScheme) -> Result<Vec<FundamentalsRow>> {
    let mut workbook: Xlsx<RS> = open_workbook_from_rs(reader).map_err(calamine::Error::from)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ScreenerError::EmptyWorkbook)?
        .map_err(calamine::Error::from)?;
    rows_from_sheet(range.rows(), scheme)
}

fn rows_from_sheet<'a>(
    mut sheet: impl Iterator<Item = &'a [Data]>,
    scheme: &ColumnScheme,
) -> Result<Vec<FundamentalsRow>> {
    let headers: Vec<String> = sheet.next().map(cells_as_text).unwrap_or_default();
    let layout = HeaderLayout::resolve(headers.iter().map(String::as_str), scheme)?;

    let rows: Vec<FundamentalsRow> = sheet
        .map(|cells| layout.row(cells_as_text(cells).iter().map(String::as_str)))
        .collect();

    info!("📊 Loaded {} stocks from workbook", rows.len());
    Ok(rows)
}

/// Spreadsheet cells as the text a CSV export of the same sheet would carry.
fn cells_as_text(cells: &[Data]) -> Vec<String> {
    cells
        .iter()
        .map(|cell| match cell {
            Data::Empty | Data::Error(_) => String::new(),
            Data::String(text) => text.clone(),
            Data::Float(value) => value.to_string(),
            Data::Int(value) => value.to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Spreadsheet extensions read through the workbook path; anything else is CSV.
const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

/// Read a table from disk, picking the workbook or CSV reader by extension.
pub fn read_fundamentals_from_path(path: impl AsRef<Path>, scheme: &ColumnScheme) -> Result<Vec<FundamentalsRow>> {
    let path = path.as_ref();
    if is_workbook(path) {
        debug!("Opening {} as a workbook", path.display());
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or(ScreenerError::EmptyWorkbook)??;
        return rows_from_sheet(range.rows(), scheme);
    }
    let file = std::fs::File::open(path)?;
    read_fundamentals(file, scheme)
}
