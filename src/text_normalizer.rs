//! HTML to clean text conversion and press-release preprocessing
//!
//! `normalize` produces the line-oriented text every extractor consumes.
//! `preprocess_press_release` additionally strips wire-service boilerplate and
//! windows the text to the paragraphs that talk about trials and deals.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use unicode_normalization::UnicodeNormalization;

/// Elements whose whole subtree is dropped before text extraction
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "noscript", "template", "svg",
];

/// Additional chrome dropped by `clean_html`
const CLEAN_SKIPPED_ELEMENTS: &[&str] = &["aside", "form", "button", "iframe"];

/// Elements that start a new line in the extracted text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "h1", "h2",
    "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table", "td", "th",
    "title", "tr", "ul",
];

/// Navigation noise; an element whose own short text contains one of these is dropped
const NOISE_PATTERNS: &[&str] = &[
    "skip to main content",
    "skip to content",
    "menu",
    "navigation",
    "cookie notice",
    "privacy policy",
];

/// Elements with more direct text than this are treated as content, never noise
const NOISE_TEXT_MAX_CHARS: usize = 80;

/// Document containers that are never dropped as noise
const CONTAINER_ELEMENTS: &[&str] = &["html", "head", "body", "main", "article"];

// The unwraps below are on compile-time constant patterns that are known to be valid.
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(?:[a-zA-Z]+|#[0-9]+);").unwrap());
static BLANK_LINE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").unwrap());

/// Wire-service artifacts, each removed to the end of its line
static ARTIFACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)FOR IMMEDIATE RELEASE",
        r"(?im)FOR RELEASE UPON RECEIPT",
        r"(?im)Media Contacts?:.*$",
        r"(?im)Investor Contacts?:.*$",
        r"(?im)CONTACTS?:.*$",
        r"(?im)SOURCE:.*$",
        r"(?im)©.*$",
        r"(?im)All rights reserved.*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Headings of boilerplate sections; a paragraph is cut from its heading onwards
static BOILERPLATE_HEADING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:About the Company|Forward[- ]Looking Statements|Investor Relations|Media Relations|Legal Notice)\b",
    )
    .unwrap()
});

/// A paragraph survives press-release filtering if it mentions one of these
static KEY_TERM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)clinical trial|\bphase\s+(?:[123]|I{1,3})[ab]?\b|regulatory|approval|partnership|collaboration|licen[sc]e|acquisition",
    )
    .unwrap()
});

/// Convert raw HTML into newline-separated, whitespace-normalized text.
///
/// Script, style, nav, header and footer subtrees are dropped. Every remaining
/// line is trimmed with internal runs of whitespace collapsed, and empty lines
/// are removed. Running the output through `normalize` again is a no-op.
pub fn normalize(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);
    let mut buffer = String::with_capacity(raw_html.len() / 2);
    collect_text(document.root_element(), &mut buffer, SKIPPED_ELEMENTS, false);
    normalize_lines(&buffer)
}

/// Convert raw HTML into a single line of text with page chrome removed.
///
/// Stricter than `normalize`: asides, forms and buttons are dropped too, as is
/// any element whose own short text reads like navigation ("Skip to main
/// content", "Cookie notice"). Remaining text is joined with single spaces.
pub fn clean_html(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);
    let skipped: Vec<&str> = SKIPPED_ELEMENTS
        .iter()
        .chain(CLEAN_SKIPPED_ELEMENTS.iter())
        .copied()
        .collect();
    let mut buffer = String::with_capacity(raw_html.len() / 2);
    collect_text(document.root_element(), &mut buffer, &skipped, true);
    collapse_whitespace(&buffer)
}

fn collect_text(element: ElementRef<'_>, out: &mut String, skipped: &[&str], drop_noise: bool) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if skipped.contains(&name) {
                    continue;
                }
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                if drop_noise && !CONTAINER_ELEMENTS.contains(&name) && is_noise_element(child_element) {
                    continue;
                }

                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child_element, out, skipped, drop_noise);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn is_noise_element(element: ElementRef<'_>) -> bool {
    let own_text: String = element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(&**text),
            _ => None,
        })
        .collect();
    let own_text = own_text.trim();

    if own_text.is_empty() || own_text.chars().count() > NOISE_TEXT_MAX_CHARS {
        return false;
    }

    let lower = own_text.to_lowercase();
    NOISE_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Trim every line, collapse internal whitespace and drop empty lines
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace every run of whitespace (newlines included) with a single space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip press-release boilerplate and keep the paragraphs worth extracting from.
///
/// Steps, in order: Unicode (NFKC) normalization, tag and entity removal,
/// wire-service artifact removal, paragraph splitting, boilerplate section
/// removal, per-paragraph whitespace collapsing, key-term paragraph filtering
/// and word truncation. When no paragraph mentions a key term, every paragraph
/// is kept.
///
/// Paragraphs are separated by blank lines. Text without any blank line, such
/// as the output of `normalize`, has one paragraph per line and is re-joined
/// with single newlines. A boilerplate heading removes the rest of its own
/// paragraph only.
pub fn preprocess_press_release(text: &str, max_words: usize) -> String {
    let text: String = text.nfkc().collect();
    let text = text.replace("\r\n", "\n");
    let line_per_paragraph = !BLANK_LINE_REGEX.is_match(text.trim());

    let text = TAG_REGEX.replace_all(&text, " ");
    let mut text = ENTITY_REGEX.replace_all(&text, " ").into_owned();

    for pattern in ARTIFACT_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }

    let (raw_paragraphs, separator): (Vec<&str>, &str) = if line_per_paragraph {
        (text.lines().collect(), "\n")
    } else {
        (BLANK_LINE_REGEX.split(&text).collect(), "\n\n")
    };

    let paragraphs: Vec<String> = raw_paragraphs
        .into_iter()
        .map(strip_boilerplate_section)
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .collect();

    let relevant: Vec<&String> = paragraphs
        .iter()
        .filter(|p| KEY_TERM_REGEX.is_match(p))
        .collect();

    let kept = if relevant.is_empty() {
        paragraphs.iter().map(String::as_str).collect::<Vec<_>>().join(separator)
    } else {
        relevant.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(separator)
    };

    truncate_words(&kept, max_words)
}

/// The part of a paragraph before its first boilerplate heading
fn strip_boilerplate_section(paragraph: &str) -> &str {
    match BOILERPLATE_HEADING_REGEX.find(paragraph) {
        Some(heading) => &paragraph[..heading.start()],
        None => paragraph,
    }
}

/// Keep at most `max_words` whitespace-delimited words.
///
/// Text within the limit is returned unchanged. Longer text is cut at a word
/// boundary, re-joined with single spaces and suffixed with "...".
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();

    if words.next().is_none() {
        return text.to_string();
    }

    format!("{}...", kept.join(" "))
}
