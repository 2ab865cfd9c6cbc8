//! Markup rendering over a parsed tree without mutating it.
//!
//! Extraction never edits the document. Instead each caller decides, per
//! element, whether it is kept, dropped with its subtree, or unwrapped
//! (children kept in place), and the inner markup is rendered accordingly.

use scraper::{ElementRef, Node};

/// What to do with an element when rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Drop,
    Unwrap,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Render the children of `root`, without `root`'s own tags.
///
/// Void elements are written self-closed (`<br/>`), text is escaped.
pub fn inner_html_with<F>(root: ElementRef<'_>, mut disposition: F) -> String
where
    F: FnMut(ElementRef<'_>) -> Disposition,
{
    let mut out = String::new();
    render_children(root, &mut disposition, &mut out);
    out
}

fn render_children<F>(parent: ElementRef<'_>, disposition: &mut F, out: &mut String)
where
    F: FnMut(ElementRef<'_>) -> Disposition,
{
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Element(_) => {
                let Some(element) = ElementRef::wrap(child) else {
                    continue;
                };
                match disposition(element) {
                    Disposition::Drop => {}
                    Disposition::Unwrap => render_children(element, disposition, out),
                    Disposition::Keep => render_element(element, disposition, out),
                }
            }
            _ => {}
        }
    }
}

fn render_element<F>(element: ElementRef<'_>, disposition: &mut F, out: &mut String)
where
    F: FnMut(ElementRef<'_>) -> Disposition,
{
    let name = element.value().name();
    out.push('<');
    out.push_str(name);
    for (key, value) in element.value().attrs() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }

    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }

    out.push('>');
    render_children(element, disposition, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

/// Text content of `root`, leaving out anything inside `<script>`
pub fn text_without_scripts(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);
    out
}

fn collect_text(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() != "script" => {
                if let Some(element) = ElementRef::wrap(child) {
                    collect_text(element, out);
                }
            }
            _ => {}
        }
    }
}

/// Whether `element` sits anywhere inside `ancestor`
pub fn is_within(element: ElementRef<'_>, ancestor: ElementRef<'_>) -> bool {
    element.ancestors().any(|node| node.id() == ancestor.id())
}

/// Replace only the last occurrence of `find`
pub fn replace_last(s: &str, find: &str, replace: &str) -> String {
    match s.rfind(find) {
        Some(idx) => format!("{}{}{}", &s[..idx], replace, &s[idx + find.len()..]),
        None => s.to_string(),
    }
}
