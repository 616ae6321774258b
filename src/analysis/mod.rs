pub mod metrics_calculator;
pub mod quote_enricher;
pub mod screening_filter;

pub use quote_enricher::{EnrichmentSettings, QuoteEnricher};
pub use screening_filter::ScreeningBounds;
