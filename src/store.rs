//! SQLite persistence for authors and quotes

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use tracing::warn;

use crate::types::{PageResult, QuoteRecord, StoredAuthor};

/// Outcome of writing one page's results
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    pub authors_inserted: usize,
    pub authors_existing: usize,
    pub quotes_inserted: usize,
    pub quotes_skipped: usize,
}

impl FlushStats {
    pub fn add(&mut self, other: &FlushStats) {
        self.authors_inserted += other.authors_inserted;
        self.authors_existing += other.authors_existing;
        self.quotes_inserted += other.quotes_inserted;
        self.quotes_skipped += other.quotes_skipped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub authors: u32,
    pub quotes: u32,
    pub cited: u32,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Create the Authors and Quotes tables.
    ///
    /// Fails if either table already exists.
    pub fn initialize_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        self.conn
            .execute_batch(schema)
            .context("Failed to create tables (already initialized?)")?;
        Ok(())
    }

    pub fn has_schema(&self) -> Result<bool> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('Authors', 'Quotes')",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 2)
    }

    /// Create the tables on a fresh database, leave an initialized one alone
    pub fn ensure_schema(&self) -> Result<()> {
        if !self.has_schema()? {
            self.initialize_schema()?;
        }
        Ok(())
    }

    /// Write one page's results in a single transaction.
    ///
    /// Authors already present are left untouched. A quote whose text is
    /// already stored is skipped without failing the rest of the page.
    pub fn flush(&mut self, page: PageResult) -> Result<FlushStats> {
        let mut stats = FlushStats::default();
        let tx = self.conn.transaction()?;

        for (name, entry) in page {
            if author_exists(&tx, &name)? {
                stats.authors_existing += 1;
            } else {
                tx.execute(
                    "INSERT INTO Authors (Name, Info, Image) VALUES (?1, ?2, ?3)",
                    params![name, entry.bio, entry.image],
                )
                .with_context(|| format!("Failed to insert author {}", name))?;
                stats.authors_inserted += 1;
            }

            for quote in &entry.quotes {
                let result = tx.execute(
                    "INSERT INTO Quotes (Quote, Author, Cited_Work) VALUES (?1, ?2, ?3)",
                    params![quote.text, quote.author, quote.work],
                );

                match result {
                    Ok(_) => stats.quotes_inserted += 1,
                    Err(rusqlite::Error::SqliteFailure(err, msg))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        warn!(
                            author = %quote.author,
                            error = msg.as_deref().unwrap_or("constraint violation"),
                            "Skipping quote already in database"
                        );
                        stats.quotes_skipped += 1;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("Failed to insert quote by {}", quote.author)
                        })
                    }
                }
            }
        }

        tx.commit()?;
        Ok(stats)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let authors: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM Authors", [], |row| row.get(0))?;
        let quotes: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM Quotes", [], |row| row.get(0))?;
        let cited: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM Quotes WHERE Cited_Work IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreCounts {
            authors,
            quotes,
            cited,
        })
    }

    pub fn quotes(&self) -> Result<Vec<QuoteRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT Quote, Author, Cited_Work FROM Quotes ORDER BY Author, Quote")?;
        let rows = stmt.query_map([], |row| {
            Ok(QuoteRecord {
                text: row.get(0)?,
                author: row.get(1)?,
                work: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn authors(&self) -> Result<Vec<StoredAuthor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT Name, Info, Image FROM Authors ORDER BY Name")?;
        let rows = stmt.query_map([], |row| {
            let image: Vec<u8> = row.get(2)?;
            Ok(StoredAuthor {
                name: row.get(0)?,
                info: row.get(1)?,
                image: BASE64_STANDARD.encode(image),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn author_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM Authors WHERE Name = ?1", [name], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}
