//! Dump the stored authors and quotes as JSON or CSV

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::store::Store;
use crate::types::{QuoteRecord, StoredAuthor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Authors (portraits base64-encoded) and quotes
    Json,
    /// Quotes only, one row each
    Csv,
}

#[derive(Serialize)]
struct Dump {
    authors: Vec<StoredAuthor>,
    quotes: Vec<QuoteRecord>,
}

/// Write the store to `output`, or to stdout when no path is given
pub fn run_export(store: &Store, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    write_export(store, format, writer)
}

fn write_export<W: Write>(store: &Store, format: ExportFormat, mut writer: W) -> Result<()> {
    match format {
        ExportFormat::Json => {
            let dump = Dump {
                authors: store.authors()?,
                quotes: store.quotes()?,
            };
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
        ExportFormat::Csv => {
            let mut rows = csv::Writer::from_writer(writer);
            for quote in store.quotes()? {
                rows.serialize(&quote)?;
            }
            rows.flush()?;
        }
    }
    Ok(())
}
