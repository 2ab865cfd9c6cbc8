//! Field extraction from listing, bio, and image pages

use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::markup::{inner_html_with, is_within, replace_last, text_without_scripts, Disposition};
use crate::types::QuoteRecord;

static QUOTE_BLOCK: LazyLock<Selector> = LazyLock::new(|| selector("div.quote"));
static QUOTE_TEXT: LazyLock<Selector> = LazyLock::new(|| selector("div.quoteText"));
static ABOUT_AUTHOR: LazyLock<Selector> = LazyLock::new(|| selector("div.aboutAuthorInfo"));
static AUTHOR_LEFT: LazyLock<Selector> = LazyLock::new(|| selector("div.authorLeftContainer"));
static IMAGE_LEFT: LazyLock<Selector> = LazyLock::new(|| selector("div.left"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span"));
static DIV: LazyLock<Selector> = LazyLock::new(|| selector("div"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));

/// Glyphs the site wraps around quote text
const DECORATIONS: &[char] = &['\u{2015}', '\u{2014}', '\u{201C}', '\u{201D}'];

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// All quote blocks on a listing page, in document order
pub fn quote_blocks(page: &Html) -> Vec<ElementRef<'_>> {
    page.select(&QUOTE_BLOCK).collect()
}

/// Extract quote text, author name, and optional cited work from a quote block.
///
/// Returns `None` when the block has no text container or no author label.
pub fn extract_quote(block: ElementRef<'_>) -> Option<QuoteRecord> {
    let container = block.select(&QUOTE_TEXT).next()?;

    let author_label = container.select(&SPAN).next()?;
    let author = text_without_scripts(author_label)
        .replace(',', "")
        .trim()
        .to_string();

    let work_label = container
        .select(&SPAN)
        .find(|span| span.id() != author_label.id() && !is_within(*span, author_label));
    let work = work_label.map(|label| text_without_scripts(label).trim().to_string());

    let rendered = inner_html_with(container, |el| {
        if el.value().name() == "script" || el.id() == author_label.id() {
            return Disposition::Drop;
        }
        if work_label.is_some_and(|label| label.id() == el.id()) {
            return Disposition::Drop;
        }
        Disposition::Keep
    });

    let cleaned = rendered
        .replace("<div>", "")
        .replace("</div>", "")
        .replace(DECORATIONS, "");
    let text = replace_last(&cleaned, "<br/>", "").trim().to_string();

    Some(QuoteRecord { text, author, work })
}

/// The href of the first link in a quote block (the author's profile)
pub fn author_link(block: ElementRef<'_>) -> Option<&str> {
    block.select(&ANCHOR).next()?.value().attr("href")
}

/// Resolve `href` against the site, keeping it only if it stays on the site's domain
pub fn resolve_on_site(href: &str, site: &Url) -> Option<Url> {
    let resolved = site.join(href).ok()?;
    is_self_domain(&resolved, site).then_some(resolved)
}

/// Whether `url` is on the site's own domain (or a subdomain of it)
pub fn is_self_domain(url: &Url, site: &Url) -> bool {
    let (Some(host), Some(site_host)) = (url.host_str(), site.host_str()) else {
        return false;
    };
    let domain = site_host.strip_prefix("www.").unwrap_or(site_host);
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Extract an author's biography from their profile page.
///
/// The panel either holds a short label followed by an expanded one, or a
/// single label with the whole text. `None` means no bio is available and
/// the author must be skipped.
pub fn extract_bio(page: &Html, site: &Url) -> Option<String> {
    let panel = page.select(&ABOUT_AUTHOR).next()?;
    let first = panel.select(&SPAN).next()?;
    let label = expanded_label(first).unwrap_or(first);

    let rendered = inner_html_with(label, |el| {
        if el.value().name() != "a" {
            return Disposition::Keep;
        }
        let links_home = el
            .value()
            .attr("href")
            .and_then(|href| absolute_target(href, site))
            .is_some_and(|url| is_self_domain(&url, site));
        if links_home {
            Disposition::Unwrap
        } else {
            Disposition::Keep
        }
    });

    Some(
        rendered
            .replace("<span>", "")
            .replace("</span>", "")
            .trim()
            .to_string(),
    )
}

/// The target of an href that names its host. Relative links have none.
fn absolute_target(href: &str, site: &Url) -> Option<Url> {
    if href.starts_with("//") {
        return site.join(href).ok();
    }
    Url::parse(href).ok()
}

/// The "show more" label that follows the short one, skipping whitespace between them
fn expanded_label(first: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let next = first
        .next_siblings()
        .find(|node| !matches!(node.value(), Node::Text(t) if t.trim().is_empty()))?;
    ElementRef::wrap(next).filter(|el| el.value().name() == "span")
}

/// Link from an author's profile to their image listing page
pub fn image_page_link(page: &Html) -> Option<&str> {
    page.select(&AUTHOR_LEFT)
        .next()?
        .select(&ANCHOR)
        .next()?
        .value()
        .attr("href")
}

/// Link to the full-size portrait on an image listing page
pub fn image_source_link(page: &Html) -> Option<&str> {
    page.select(&IMAGE_LEFT)
        .next()?
        .select(&DIV)
        .next()?
        .select(&ANCHOR)
        .next()?
        .value()
        .attr("href")
}
