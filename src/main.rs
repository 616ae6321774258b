use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fundamentals_screener::analysis::{EnrichmentSettings, QuoteEnricher, ScreeningBounds};
use fundamentals_screener::api::YahooQuoteClient;
use fundamentals_screener::data::ColumnScheme;
use fundamentals_screener::export::{ExportFormat, ExportOutcome};
use fundamentals_screener::models::{AnalyzedStock, Config};
use fundamentals_screener::pipeline::Uploaded;

#[derive(Parser, Debug)]
#[command(version, about = "Screen stocks on five-year EPS and dividend history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute metrics, apply the range screen and optionally fetch quotes and export.
    Screen(ScreenArgs),
    /// Show metrics for stocks whose identifier starts with a prefix.
    Lookup(LookupArgs),
}

#[derive(Args, Debug)]
struct TableArgs {
    /// Fundamentals table (.xlsx workbook or CSV)
    #[arg(short, long)]
    input: PathBuf,

    /// Year the trailing five-year window ends before
    #[arg(short, long, default_value_t = 2023)]
    reference_year: i32,

    /// Header labels of the table
    #[arg(long, value_enum, default_value_t = Labels::English)]
    labels: Labels,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Labels {
    English,
    Taiwan,
}

impl From<Labels> for ColumnScheme {
    fn from(labels: Labels) -> Self {
        match labels {
            Labels::English => ColumnScheme::default(),
            Labels::Taiwan => ColumnScheme::taiwan(),
        }
    }
}

#[derive(Args, Debug)]
struct ScreenArgs {
    #[command(flatten)]
    table: TableArgs,

    #[arg(long, default_value_t = 1.0)]
    eps_min: f64,
    #[arg(long, default_value_t = 1000.0)]
    eps_max: f64,
    #[arg(long, default_value_t = 1.0)]
    dividend_min: f64,
    #[arg(long, default_value_t = 1000.0)]
    dividend_max: f64,
    #[arg(long, default_value_t = 0.0)]
    std_dev_min: f64,
    #[arg(long, default_value_t = 1.0)]
    std_dev_max: f64,
    #[arg(long, default_value_t = 0.7)]
    payout_min: f64,
    #[arg(long, default_value_t = 1.0)]
    payout_max: f64,

    /// Fetch the latest quote for every screened stock
    #[arg(long)]
    enrich: bool,

    /// Write the result to this path; `.xlsx` writes a workbook, anything else CSV
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ScreenArgs {
    fn bounds(&self) -> ScreeningBounds {
        ScreeningBounds {
            eps_min: self.eps_min,
            eps_max: self.eps_max,
            dividend_min: self.dividend_min,
            dividend_max: self.dividend_max,
            std_dev_min: self.std_dev_min,
            std_dev_max: self.std_dev_max,
            payout_min: self.payout_min,
            payout_max: self.payout_max,
        }
    }
}

#[derive(Args, Debug)]
struct LookupArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Identifier prefix, e.g. `23`
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fundamentals_screener=info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Screen(args) => run_screen(args).await,
        Commands::Lookup(args) => run_lookup(args),
    }
}

fn load(table: &TableArgs) -> Result<Uploaded> {
    let scheme = ColumnScheme::from(table.labels);
    Uploaded::from_path(&table.input, &scheme)
        .with_context(|| format!("failed to load {}", table.input.display()))
}

fn run_lookup(args: LookupArgs) -> Result<()> {
    let computed = load(&args.table)?.compute_metrics(args.table.reference_year)?;
    let matches = computed.lookup(&args.prefix);
    if matches.is_empty() {
        warn!("No stock identifier starts with '{}'", args.prefix);
        println!("No stock found for '{}'", args.prefix);
        return Ok(());
    }
    for stock in matches {
        print_stock(stock);
    }
    Ok(())
}

async fn run_screen(args: ScreenArgs) -> Result<()> {
    let bounds = args.bounds();
    let filtered = load(&args.table)?
        .compute_metrics(args.table.reference_year)?
        .screen(&bounds)?;

    if filtered.is_empty() {
        println!("No stocks match the screening criteria.");
        return Ok(());
    }

    let export_format = export_format(args.output.as_deref());
    let outcome = if args.enrich {
        let config = Config::from_env();
        info!("📋 Quote source: {} (suffix '{}')", config.quote_base_url, config.exchange_suffix);
        let client = YahooQuoteClient::new(&config)?;
        let enricher = QuoteEnricher::new(Arc::new(client), EnrichmentSettings::from(&config));
        let today = chrono::Local::now().date_naive();

        let enriched = filtered.enrich(&enricher, today).await;
        for item in enriched.stocks() {
            print_stock(&item.stock);
            match item.quote.metrics() {
                Some(quote) => println!(
                    "    price {:.2}  change {:+.2}%  P/E {}",
                    quote.current_price,
                    quote.price_change_pct * 100.0,
                    fmt_opt(quote.pe_ratio)
                ),
                None => println!("    quote unavailable"),
            }
        }
        export_format.map(|f| enriched.export_as(f)).transpose()?
    } else {
        filtered.stocks().iter().for_each(print_stock);
        export_format.map(|f| filtered.export_as(f)).transpose()?
    };

    if let (Some(path), Some(outcome)) = (args.output, outcome) {
        match outcome {
            ExportOutcome::Written(bytes) => {
                std::fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
                println!("Exported to {}", path.display());
            }
            ExportOutcome::NoRows => {
                info!("Export requested but there are no rows");
                println!("No rows to export.");
            }
        }
    }
    Ok(())
}

/// Nothing is encoded unless a destination was given.
fn export_format(output: Option<&Path>) -> Option<ExportFormat> {
    output.map(ExportFormat::for_path)
}

fn print_stock(stock: &AnalyzedStock) {
    let m = &stock.metrics;
    println!(
        "{:<8} {:<20} std {:>8}  avg EPS {:>8}  avg div {:>8}  payout {:>8}",
        stock.row.id,
        stock.row.name,
        fmt_opt(m.eps_std_dev),
        fmt_opt(m.avg_eps),
        fmt_opt(m.avg_dividend),
        fmt_opt(m.payout_ratio)
    );
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}
