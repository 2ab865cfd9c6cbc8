use anyhow::Result;
use scraper::{ElementRef, Html};
use std::fmt;
use std::io::{self, Write};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::extract::{
    author_link, extract_bio, extract_quote, image_page_link, image_source_link, quote_blocks,
    resolve_on_site,
};
use crate::fetch::{Fetch, FetchResponse};
use crate::store::{FlushStats, Store};
use crate::types::PageResult;
use crate::utils::osc8_link;

/// Why a single quote was left out of a page's results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoQuoteText,
    NoAuthorLink,
    ForeignAuthorLink(String),
    NoBio,
    NoImagePage,
    NoImageSource,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoQuoteText => write!(f, "quote block has no text or author"),
            SkipReason::NoAuthorLink => write!(f, "quote block has no author link"),
            SkipReason::ForeignAuthorLink(href) => {
                write!(f, "author link points outside the site: {}", href)
            }
            SkipReason::NoBio => write!(f, "no info about the author"),
            SkipReason::NoImagePage => write!(f, "author page has no image link"),
            SkipReason::NoImageSource => write!(f, "image page has no image source"),
        }
    }
}

#[derive(Debug)]
enum QuoteOutcome {
    Added { author_url: Url },
    Skipped(SkipReason),
}

/// Counts for one listing page before it is stored
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageTally {
    pub blocks: usize,
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages: usize,
    pub quotes_seen: usize,
    pub quotes_added: usize,
    pub quotes_skipped: usize,
    pub stored: FlushStats,
}

pub struct Crawler<'a, F: Fetch> {
    fetcher: &'a F,
    config: &'a CrawlConfig,
    site: Url,
    quiet: bool,
}

impl<'a, F: Fetch> Crawler<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a CrawlConfig, quiet: bool) -> Result<Self> {
        let site = config.site_url()?;
        Ok(Self {
            fetcher,
            config,
            site,
            quiet,
        })
    }

    /// Crawl every configured listing page, storing each page before the next
    pub fn run(&self, store: &mut Store) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();

        for page_number in self.config.first_page..=self.config.last_page {
            let (page, tally) = self.crawl_page(page_number)?;

            let stats = if page.is_empty() {
                FlushStats::default()
            } else {
                store.flush(page)?
            };
            info!(
                page = page_number,
                authors = stats.authors_inserted,
                known_authors = stats.authors_existing,
                quotes = stats.quotes_inserted,
                duplicates = stats.quotes_skipped,
                "Saved page"
            );

            summary.pages += 1;
            summary.quotes_seen += tally.blocks;
            summary.quotes_added += tally.added;
            summary.quotes_skipped += tally.skipped;
            summary.stored.add(&stats);

            if tally.blocks == 0 && self.config.stop_when_empty {
                info!(page = page_number, "Listing page has no quotes, stopping");
                break;
            }
        }

        Ok(summary)
    }

    /// Fetch one listing page and collect every usable quote on it
    fn crawl_page(&self, page_number: u32) -> Result<(PageResult, PageTally)> {
        let mut stdout = io::stdout();
        let listing_url = self.config.listing_url(page_number)?;
        let listing = self.get(&listing_url)?;
        let document = Html::parse_document(&listing.text());

        let blocks = quote_blocks(&document);
        let mut page = PageResult::new();
        let mut tally = PageTally {
            blocks: blocks.len(),
            ..PageTally::default()
        };

        if !self.quiet {
            let index = page_number.saturating_sub(self.config.first_page) + 1;
            let total = self.config.last_page.saturating_sub(self.config.first_page) + 1;
            print!(
                "[{:02}/{:02}] Page {} Quotes: [",
                index,
                total,
                osc8_link(listing_url.as_str(), &page_number.to_string())
            );
            stdout.flush()?;
        }

        for block in blocks {
            match self.process_quote(block, &mut page)? {
                QuoteOutcome::Added { author_url } => {
                    tally.added += 1;
                    if !self.quiet {
                        print!("{}", osc8_link(author_url.as_str(), "."));
                        stdout.flush()?;
                    }
                }
                QuoteOutcome::Skipped(reason) => {
                    tally.skipped += 1;
                    info!(page = page_number, %reason, "Skipping quote");
                    if !self.quiet {
                        print!("x");
                        stdout.flush()?;
                    }
                }
            }
        }

        if !self.quiet {
            println!(
                "] {} quotes by {} authors",
                page.quote_count(),
                page.author_count()
            );
        }

        Ok((page, tally))
    }

    fn process_quote(&self, block: ElementRef<'_>, page: &mut PageResult) -> Result<QuoteOutcome> {
        let Some(quote) = extract_quote(block) else {
            return Ok(QuoteOutcome::Skipped(SkipReason::NoQuoteText));
        };
        debug!(author = %quote.author, "Loading quote");

        let Some(href) = author_link(block) else {
            return Ok(QuoteOutcome::Skipped(SkipReason::NoAuthorLink));
        };
        let Some(author_url) = resolve_on_site(href, &self.site) else {
            return Ok(QuoteOutcome::Skipped(SkipReason::ForeignAuthorLink(
                href.to_string(),
            )));
        };

        // Bio and portrait were already fetched for this author on this page
        let quote = match page.append_quote(quote) {
            Ok(()) => return Ok(QuoteOutcome::Added { author_url }),
            Err(quote) => quote,
        };

        let bio_page = Html::parse_document(&self.get(&author_url)?.text());
        let Some(bio) = extract_bio(&bio_page, &self.site) else {
            return Ok(QuoteOutcome::Skipped(SkipReason::NoBio));
        };

        let Some(image_page_url) = image_page_link(&bio_page).and_then(|href| self.site.join(href).ok())
        else {
            return Ok(QuoteOutcome::Skipped(SkipReason::NoImagePage));
        };

        let image_page = Html::parse_document(&self.get(&image_page_url)?.text());
        let Some(image_url) = image_source_link(&image_page).and_then(|href| self.site.join(href).ok())
        else {
            return Ok(QuoteOutcome::Skipped(SkipReason::NoImageSource));
        };

        let image = self.get(&image_url)?;
        page.add_quote(quote, bio, image.body);

        Ok(QuoteOutcome::Added { author_url })
    }

    fn get(&self, url: &Url) -> Result<FetchResponse> {
        let response = self.fetcher.fetch(url.as_str())?;
        if response.is_success() {
            info!(
                %url,
                status = response.status,
                elapsed_ms = response.elapsed.as_millis() as u64,
                "Loaded"
            );
        } else {
            warn!(
                %url,
                status = response.status,
                elapsed_ms = response.elapsed.as_millis() as u64,
                "Unexpected status"
            );
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FakeFetcher {
        pages: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(pages: &[(&str, &[u8])]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_vec()))
                    .collect(),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetch for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<FetchResponse> {
            self.requests.borrow_mut().push(url.to_string());
            let (status, body) = match self.pages.get(url) {
                Some(body) => (200, body.clone()),
                None => (404, Vec::new()),
            };
            Ok(FetchResponse {
                status,
                elapsed: Duration::from_millis(1),
                body,
            })
        }
    }

    const LISTING: &str = "https://www.goodreads.com/quotes/tag/philosophy?page=1";
    const AUTHOR: &str = "https://www.goodreads.com/author/show/4.Seneca";
    const IMAGE_PAGE: &str = "https://www.goodreads.com/photo/author/4.Seneca";
    const IMAGE: &str = "https://images.gr-assets.com/seneca.jpg";

    const TWO_QUOTES: &str = r#"<html><body>
        <div class="quote"><div class="quoteDetails">
          <a class="leftAlignedImage" href="/author/show/4.Seneca"><img src="t.jpg"></a>
          <div class="quoteText">“First.”<br> ― <span class="authorOrTitle">Seneca,</span>
            <span id="quote_book_link_1"><a href="/work/quotes/1">Letters from a Stoic</a></span>
          </div>
        </div></div>
        <div class="quote"><div class="quoteDetails">
          <a class="leftAlignedImage" href="/author/show/4.Seneca"><img src="t.jpg"></a>
          <div class="quoteText">“Second.”<br> ― <span class="authorOrTitle">Seneca</span></div>
        </div></div>
    </body></html>"#;

    const BIO: &str = r#"<html><body>
        <div class="authorLeftContainer"><a href="/photo/author/4.Seneca"><img src="t.jpg"></a></div>
        <div class="aboutAuthorInfo"><span id="freeText4">Roman Stoic philosopher.</span></div>
    </body></html>"#;

    const PHOTOS: &str = r#"<html><body>
        <div class="left"><div><a href="https://images.gr-assets.com/seneca.jpg">full size</a></div></div>
    </body></html>"#;

    fn config(last_page: u32) -> CrawlConfig {
        CrawlConfig {
            last_page,
            ..CrawlConfig::default()
        }
    }

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.initialize_schema().unwrap();
        store
    }

    #[test]
    fn test_same_author_with_and_without_work() {
        let fetcher = FakeFetcher::new(&[
            (LISTING, TWO_QUOTES.as_bytes()),
            (AUTHOR, BIO.as_bytes()),
            (IMAGE_PAGE, PHOTOS.as_bytes()),
            (IMAGE, &b"JPEG"[..]),
        ]);
        let config = config(1);
        let crawler = Crawler::new(&fetcher, &config, true).unwrap();

        let (page, tally) = crawler.crawl_page(1).unwrap();
        assert_eq!(tally, PageTally { blocks: 2, added: 2, skipped: 0 });
        assert_eq!(page.author_count(), 1);

        let seneca = page.get("Seneca").unwrap();
        assert_eq!(seneca.bio, "Roman Stoic philosopher.");
        assert_eq!(seneca.image, b"JPEG".to_vec());
        assert_eq!(seneca.quotes.len(), 2);
        assert_eq!(seneca.quotes[0].text, "First.");
        assert_eq!(seneca.quotes[0].work.as_deref(), Some("Letters from a Stoic"));
        assert_eq!(seneca.quotes[1].text, "Second.");
        assert_eq!(seneca.quotes[1].work, None);

        // Second quote reuses the author fetched for the first
        assert_eq!(
            *fetcher.requests.borrow(),
            vec![LISTING, AUTHOR, IMAGE_PAGE, IMAGE]
        );
    }

    #[test]
    fn test_run_stores_page() {
        let fetcher = FakeFetcher::new(&[
            (LISTING, TWO_QUOTES.as_bytes()),
            (AUTHOR, BIO.as_bytes()),
            (IMAGE_PAGE, PHOTOS.as_bytes()),
            (IMAGE, &b"JPEG"[..]),
        ]);
        let config = config(1);
        let mut store = store();

        let summary = Crawler::new(&fetcher, &config, true)
            .unwrap()
            .run(&mut store)
            .unwrap();
        assert_eq!(summary.pages, 1);
        assert_eq!(summary.stored.authors_inserted, 1);
        assert_eq!(summary.stored.quotes_inserted, 2);

        let counts = store.counts().unwrap();
        assert_eq!((counts.authors, counts.quotes, counts.cited), (1, 2, 1));

        let quotes = store.quotes().unwrap();
        let second = quotes.iter().find(|q| q.text == "Second.").unwrap();
        assert_eq!(second.work, None);
    }

    #[test]
    fn test_foreign_link_and_missing_bio_skipped() {
        let listing = r#"
            <div class="quote"><a href="https://example.org/someone">x</a>
              <div class="quoteText">“Elsewhere.”<span>Someone</span></div></div>
            <div class="quote"><a href="/author/show/9.Nobody">x</a>
              <div class="quoteText">“Unknown.”<span>Nobody</span></div></div>
            <div class="quote"><div class="quoteText">“No link.”<span>Linkless</span></div></div>
        "#;
        let fetcher = FakeFetcher::new(&[
            (LISTING, listing.as_bytes()),
            (
                "https://www.goodreads.com/author/show/9.Nobody",
                &b"<div class=\"aboutAuthorInfo\"></div>"[..],
            ),
        ]);
        let config = config(1);
        let crawler = Crawler::new(&fetcher, &config, true).unwrap();

        let (page, tally) = crawler.crawl_page(1).unwrap();
        assert!(page.is_empty());
        assert_eq!(tally, PageTally { blocks: 3, added: 0, skipped: 3 });
        assert_eq!(fetcher.requests.borrow().len(), 2);
    }

    #[test]
    fn test_missing_image_link_skipped() {
        let bio_without_photo = r#"<div class="aboutAuthorInfo"><span>Bio.</span></div>"#;
        let fetcher = FakeFetcher::new(&[
            (LISTING, TWO_QUOTES.as_bytes()),
            (AUTHOR, bio_without_photo.as_bytes()),
        ]);
        let config = config(1);
        let crawler = Crawler::new(&fetcher, &config, true).unwrap();

        let (page, tally) = crawler.crawl_page(1).unwrap();
        assert!(page.is_empty());
        assert_eq!(tally.skipped, 2);
    }

    #[test]
    fn test_stop_when_empty() {
        let fetcher = FakeFetcher::new(&[
            (LISTING, TWO_QUOTES.as_bytes()),
            (AUTHOR, BIO.as_bytes()),
            (IMAGE_PAGE, PHOTOS.as_bytes()),
            (IMAGE, &b"JPEG"[..]),
        ]);
        let config = CrawlConfig {
            last_page: 3,
            stop_when_empty: true,
            ..CrawlConfig::default()
        };
        let mut store = store();

        let summary = Crawler::new(&fetcher, &config, true)
            .unwrap()
            .run(&mut store)
            .unwrap();
        assert_eq!(summary.pages, 2);
        assert!(!fetcher
            .requests
            .borrow()
            .iter()
            .any(|url| url.ends_with("page=3")));
    }

    #[test]
    fn test_fixed_range_without_stop() {
        let fetcher = FakeFetcher::new(&[]);
        let config = config(3);
        let mut store = store();

        let summary = Crawler::new(&fetcher, &config, true)
            .unwrap()
            .run(&mut store)
            .unwrap();
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.quotes_seen, 0);
        assert_eq!(fetcher.requests.borrow().len(), 3);
    }

    #[test]
    fn test_progress_line_for_range_not_starting_at_one() {
        let fetcher = FakeFetcher::new(&[]);
        let mut config = config(4);
        config.first_page = 3;
        let mut store = store();

        let summary = Crawler::new(&fetcher, &config, false)
            .unwrap()
            .run(&mut store)
            .unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(fetcher.requests.borrow().len(), 2);
    }
}
