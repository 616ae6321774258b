//! Screening run as a chain of stages.
//!
//! `Uploaded -> MetricsComputed -> Filtered -> Enriched`, with export available from
//! `Filtered` and `Enriched`. Each transition consumes its stage, so a run can
//! never step backwards; a new upload starts a new chain.

use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::analysis::{metrics_calculator, screening_filter, QuoteEnricher, ScreeningBounds};
use crate::data::{read_fundamentals, read_fundamentals_from_path, ColumnScheme};
use crate::error::{Result, ScreenerError, MAX_REFERENCE_YEAR, MIN_REFERENCE_YEAR};
use crate::export::{self, ExportFormat, ExportOutcome, ExportRecord};
use crate::models::{AnalyzedStock, EnrichedStock, FundamentalsRow};

/// Parsed table, no metrics yet.
#[derive(Debug, Clone)]
pub struct Uploaded {
    rows: Vec<FundamentalsRow>,
}

impl Uploaded {
    pub fn new(rows: Vec<FundamentalsRow>) -> Self {
        Self { rows }
    }

    pub fn from_reader<R: Read>(reader: R, scheme: &ColumnScheme) -> Result<Self> {
        read_fundamentals(reader, scheme).map(Self::new)
    }

    /// `.xlsx` and other workbook extensions are read as spreadsheets, anything else as CSV.
    pub fn from_path(path: impl AsRef<Path>, scheme: &ColumnScheme) -> Result<Self> {
        read_fundamentals_from_path(path, scheme).map(Self::new)
    }

    pub fn rows(&self) -> &[FundamentalsRow] {
        &self.rows
    }

    pub fn compute_metrics(self, reference_year: i32) -> Result<MetricsComputed> {
        if !(MIN_REFERENCE_YEAR..=MAX_REFERENCE_YEAR).contains(&reference_year) {
            return Err(ScreenerError::InvalidReferenceYear(reference_year));
        }
        let stocks = metrics_calculator::compute_all(self.rows, reference_year);
        info!("📈 Computed metrics for {} stocks against {}", stocks.len(), reference_year);
        Ok(MetricsComputed { reference_year, stocks })
    }
}

/// Metrics attached to every row.
#[derive(Debug, Clone)]
pub struct MetricsComputed {
    reference_year: i32,
    stocks: Vec<AnalyzedStock>,
}

impl MetricsComputed {
    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    pub fn stocks(&self) -> &[AnalyzedStock] {
        &self.stocks
    }

    /// Single-stock inspection by identifier prefix; does not advance the run.
    pub fn lookup(&self, prefix: &str) -> Vec<&AnalyzedStock> {
        screening_filter::lookup_by_prefix(&self.stocks, prefix)
    }

    pub fn screen(self, bounds: &ScreeningBounds) -> Result<Filtered> {
        bounds.validate()?;
        let stocks = screening_filter::apply(self.stocks, bounds);
        Ok(Filtered {
            bounds: *bounds,
            stocks,
        })
    }
}

/// Rows that passed screening.
#[derive(Debug, Clone)]
pub struct Filtered {
    bounds: ScreeningBounds,
    stocks: Vec<AnalyzedStock>,
}

impl Filtered {
    pub fn bounds(&self) -> &ScreeningBounds {
        &self.bounds
    }

    pub fn stocks(&self) -> &[AnalyzedStock] {
        &self.stocks
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// Fetch quotes for the survivors only.
    pub async fn enrich(self, enricher: &QuoteEnricher, as_of: NaiveDate) -> Enriched {
        if self.stocks.is_empty() {
            info!("No screened stocks to enrich");
        }
        Enriched {
            stocks: enricher.enrich_all(self.stocks, as_of).await,
        }
    }

    /// CSV export without quote columns.
    pub fn export(&self) -> Result<ExportOutcome> {
        self.export_as(ExportFormat::Csv)
    }

    pub fn export_as(&self, format: ExportFormat) -> Result<ExportOutcome> {
        export::export(self.stocks.iter().map(ExportRecord::from), format)
    }
}

/// Survivors with live-quote metrics.
#[derive(Debug, Clone)]
pub struct Enriched {
    stocks: Vec<EnrichedStock>,
}

impl Enriched {
    pub fn stocks(&self) -> &[EnrichedStock] {
        &self.stocks
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    pub fn export(&self) -> Result<ExportOutcome> {
        self.export_as(ExportFormat::Csv)
    }

    pub fn export_as(&self, format: ExportFormat) -> Result<ExportOutcome> {
        export::export(self.stocks.iter().map(ExportRecord::from), format)
    }
}
