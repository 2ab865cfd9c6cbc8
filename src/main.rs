use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod config;
mod conl_ser;
mod crawl;
mod export;
mod extract;
mod fetch;
mod markup;
mod store;
mod types;
mod utils;

use config::{CrawlConfig, DEFAULT_CONFIG_FILE};
use conl_ser::ToConl;
use crawl::Crawler;
use export::ExportFormat;
use fetch::HttpClient;
use store::Store;
use utils::{format_duration, osc8_file_link};

#[derive(Parser)]
#[command(name = "quotes-scraper")]
#[command(about = "Scrape tagged quotes, authors, bios and portraits into SQLite")]
struct Cli {
    /// CONL config file (default: quotes.conl if present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the Authors and Quotes tables
    Init,
    /// Crawl listing pages and store every quote found
    Crawl {
        /// First listing page
        #[arg(long)]
        from: Option<u32>,
        /// Last listing page (inclusive)
        #[arg(long)]
        to: Option<u32>,
        /// Quote tag to crawl
        #[arg(long)]
        tag: Option<String>,
        /// Quiet mode - suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show how many authors and quotes are stored
    Stats,
    /// Export stored authors and quotes
    Export {
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the default configuration file
    Config {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn run_init(config: &CrawlConfig) -> Result<()> {
    let store = Store::open(Path::new(&config.database_path))?;
    store.initialize_schema()?;
    println!("Created tables in {}", config.database_path);
    Ok(())
}

fn run_crawl(config: &CrawlConfig, quiet: bool) -> Result<()> {
    let t0 = Instant::now();
    let mut store = Store::open(Path::new(&config.database_path))?;
    store.ensure_schema()?;

    let client = HttpClient::new(config)?;
    let crawler = Crawler::new(&client, config, quiet)?;

    if !quiet {
        println!(
            "Crawling '{}' pages {}..={} into {}\n",
            config.tag, config.first_page, config.last_page, config.database_path
        );
    }

    let summary = crawler.run(&mut store)?;

    if !quiet {
        println!(
            "\nDone! {} pages, {} of {} quotes collected ({} skipped). Saved {} authors, {} quotes ({} duplicates) in {}",
            summary.pages,
            summary.quotes_added,
            summary.quotes_seen,
            summary.quotes_skipped,
            summary.stored.authors_inserted,
            summary.stored.quotes_inserted,
            summary.stored.quotes_skipped,
            format_duration(t0.elapsed())
        );
    }
    Ok(())
}

fn run_stats(config: &CrawlConfig) -> Result<()> {
    let store = Store::open(Path::new(&config.database_path))?;
    if !store.has_schema()? {
        bail!(
            "{} has no tables. Run 'init' or 'crawl' first.",
            config.database_path
        );
    }
    let counts = store.counts()?;
    println!("Authors:      {}", counts.authors);
    println!("Quotes:       {}", counts.quotes);
    println!("  with work:  {}", counts.cited);
    Ok(())
}

fn run_write_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    fs::write(output, CrawlConfig::default().to_conl())?;
    let display = output.display().to_string();
    println!("Wrote {}", osc8_file_link(&display, &display));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli { config, command } = Cli::parse();
    let config_path = config.as_deref();

    match command {
        Commands::Init => run_init(&CrawlConfig::load(config_path)?),
        Commands::Crawl {
            from,
            to,
            tag,
            quiet,
        } => {
            let mut config = CrawlConfig::load(config_path)?;
            if let Some(from) = from {
                config.first_page = from;
            }
            if let Some(to) = to {
                config.last_page = to;
            }
            if let Some(tag) = tag {
                config.tag = tag;
            }
            config.validate()?;
            run_crawl(&config, quiet)
        }
        Commands::Stats => run_stats(&CrawlConfig::load(config_path)?),
        Commands::Export { format, output } => {
            let config = CrawlConfig::load(config_path)?;
            let store = Store::open(Path::new(&config.database_path))?;
            export::run_export(&store, format, output.as_deref())?;
            if let Some(path) = output {
                let display = path.display().to_string();
                eprintln!("Exported to {}", osc8_file_link(&display, &display));
            }
            Ok(())
        }
        Commands::Config { output, force } => run_write_config(&output, force),
    }
}
