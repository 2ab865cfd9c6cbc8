//! Scraped quote and author types

use serde::Serialize;
use std::collections::BTreeMap;

/// One quote as extracted from a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteRecord {
    #[serde(rename = "quote")]
    pub text: String,
    pub author: String,
    /// Title of the cited work, when the quote block names one
    #[serde(rename = "cited_work")]
    pub work: Option<String>,
}

/// Everything collected for a single author during one listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorEntry {
    pub image: Vec<u8>,
    pub bio: String,
    pub quotes: Vec<QuoteRecord>,
}

/// Per-page accumulation keyed by author name.
///
/// Owned by the crawl loop while a page is processed, then moved into
/// [`crate::store::Store::flush`] and dropped.
#[derive(Debug, Default)]
pub struct PageResult {
    authors: BTreeMap<String, AuthorEntry>,
}

impl PageResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a quote to an author already seen on this page.
    ///
    /// Returns the quote back if the author has no entry yet.
    pub fn append_quote(&mut self, quote: QuoteRecord) -> Result<(), QuoteRecord> {
        match self.authors.get_mut(&quote.author) {
            Some(entry) => {
                entry.quotes.push(quote);
                Ok(())
            }
            None => Err(quote),
        }
    }

    /// Record a quote, creating the author's entry on first sight.
    ///
    /// `bio` and `image` are only used when the author is new on this page.
    pub fn add_quote(&mut self, quote: QuoteRecord, bio: String, image: Vec<u8>) {
        if let Err(quote) = self.append_quote(quote) {
            self.authors.insert(
                quote.author.clone(),
                AuthorEntry {
                    image,
                    bio,
                    quotes: vec![quote],
                },
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn author_count(&self) -> usize {
        self.authors.len()
    }

    pub fn quote_count(&self) -> usize {
        self.authors.values().map(|a| a.quotes.len()).sum()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&AuthorEntry> {
        self.authors.get(name)
    }
}

impl IntoIterator for PageResult {
    type Item = (String, AuthorEntry);
    type IntoIter = std::collections::btree_map::IntoIter<String, AuthorEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.authors.into_iter()
    }
}

/// Author row as stored in the database
#[derive(Debug, Clone, Serialize)]
pub struct StoredAuthor {
    pub name: String,
    pub info: String,
    /// Portrait bytes, base64-encoded for export
    pub image: String,
}
