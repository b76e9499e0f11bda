use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use iban_bic::{
    detect_format, load_all, load_file, BicOverrides, BicResolver, Config,
    CountryCodeLengthTable, Iban, LoadReport, SourceFormat, SqliteStore, ValidationResult,
};

#[derive(Parser)]
#[command(name = "iban-bic")]
#[command(about = "Load national bank registries and resolve IBANs to bank data and BIC")]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides config and IBAN_BIC_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Registry directory (overrides config and IBAN_BIC_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load one registry file (at, de, be, nl, lu, ch, li)
    Load {
        format: SourceFormat,
        /// Defaults to <data-dir>/<registry file name>
        path: Option<PathBuf>,
    },

    /// Load every registry from the data directory
    LoadAll,

    /// Resolve IBANs and print the results as JSON
    Lookup {
        #[arg(required = true)]
        ibans: Vec<String>,
    },

    /// Guess the registry format from a file name
    Detect { path: PathBuf },

    /// Entries per country and recent loads
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Load { format, path } => {
            let path = path.unwrap_or_else(|| config.source_path(format));
            run_load(&config, format, path)
        }
        Command::LoadAll => run_load_all(&config),
        Command::Lookup { ibans } => run_lookup(&config, &ibans),
        Command::Detect { path } => {
            let format = detect_format(&path)?;
            println!("{} ({})", format.name(), format.code());
            Ok(())
        }
        Command::Stats => run_stats(&config),
    }
}

/// Config file → environment → command line flags
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env_overrides();

    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))
}

fn run_load(config: &Config, format: SourceFormat, path: PathBuf) -> Result<()> {
    println!("📂 Loading {} registry from {}", format.name(), path.display());

    let store = open_store(config)?;
    let report = load_file(format, &path, CountryCodeLengthTable::global(), &store)?;
    store.record_load(&report.to_load_record())?;

    print_report(&report);
    Ok(())
}

fn run_load_all(config: &Config) -> Result<()> {
    println!("📂 Loading all registries from {}", config.data_dir.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = open_store(config)?;
    let results = load_all(config, CountryCodeLengthTable::global(), &store);

    let mut failed = 0;
    for (format, result) in &results {
        match result {
            Ok(report) => {
                store.record_load(&report.to_load_record())?;
                print_report(report);
            }
            Err(e) => {
                failed += 1;
                eprintln!("❌ {}: {:#}", format.name(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} registries failed to load", failed, results.len());
    }
    Ok(())
}

fn print_report(report: &LoadReport) {
    if report.absent && report.stored == 0 {
        println!("⚠️  {}: no data in {}", report.format.name(), report.path.display());
        return;
    }
    println!(
        "✓ {}: {} entries stored ({} records, {} repeated codes skipped)",
        report.format.name(),
        report.stored,
        report.records,
        report.duplicates
    );
}

fn run_lookup(config: &Config, ibans: &[String]) -> Result<()> {
    let store = open_store(config)?;
    let overrides = match &config.overrides_path {
        Some(path) => BicOverrides::from_file(path)?,
        None => BicOverrides::standard(),
    };
    let resolver = BicResolver::new(CountryCodeLengthTable::global(), &overrides);

    for raw in ibans {
        let result = match raw.parse::<Iban>() {
            Ok(iban) => {
                let result = ValidationResult::new(true, "", &iban.to_string());
                resolver
                    .resolve(&iban, result, &store)
                    .with_context(|| format!("Failed to resolve BIC for {}", raw))?
            }
            Err(e) => ValidationResult::new(false, &e.to_string(), raw),
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}

fn run_stats(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    println!("🏦 Banks per country");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let stats = store.country_stats()?;
    if stats.is_empty() {
        println!("   (empty - run `iban-bic load-all` first)");
    }
    for stat in &stats {
        println!("   {}  {:>6}", stat.country_code, stat.bank_count);
    }

    println!("\n📜 Recent loads");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for load in store.recent_loads(10)? {
        println!(
            "   {}  {:<3} {:>6} entries  {}",
            load.finished_at.format("%Y-%m-%d %H:%M:%S"),
            load.format,
            load.entries,
            load.path
        );
    }

    Ok(())
}
