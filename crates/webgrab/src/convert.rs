//! Content conversion utilities
//!
//! HTML to markdown/plain text, JSON validation, and whitespace cleanup.
//! All pure functions; the fetch paths pick which one to apply based on the
//! requested output format.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::FetchError;

/// Elements whose content is dropped entirely
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "head"];

/// Check if content is HTML based on content type and body
pub fn is_html(content_type: &Option<String>, body: &str) -> bool {
    if let Some(ct) = content_type {
        let ct = ct.to_lowercase();
        if ct.contains("text/html") || ct.contains("application/xhtml") {
            return true;
        }
    }
    let head = body.trim_start();
    head.starts_with("<!DOCTYPE") || head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Check if content looks like JSON based on content type and body
pub fn is_json(content_type: &Option<String>, body: &str) -> bool {
    if let Some(ct) = content_type {
        if ct.to_lowercase().contains("application/json") {
            return true;
        }
    }
    let head = body.trim_start();
    head.starts_with('{') || head.starts_with('[')
}

/// Parse and validate a JSON body
pub fn parse_json(text: &str) -> Result<serde_json::Value, FetchError> {
    serde_json::from_str(text).map_err(|e| FetchError::Parse(format!("invalid JSON: {e}")))
}

/// One scanned `<...>` tag
struct Tag {
    name: String,
    closing: bool,
    raw: String,
}

/// Consume a tag after its `<` has been read
fn read_tag(chars: &mut Peekable<Chars<'_>>) -> Tag {
    let mut raw = String::new();
    for ch in chars.by_ref() {
        if ch == '>' {
            break;
        }
        raw.push(ch);
    }
    let lower = raw.to_lowercase();
    let closing = lower.starts_with('/');
    let body = if closing { &lower[1..] } else { &lower[..] };
    let name = body.split_whitespace().next().unwrap_or("").to_string();
    Tag { name, closing, raw }
}

/// Tracks nesting inside elements whose content is skipped
#[derive(Default)]
struct SkipTracker {
    stack: Vec<String>,
}

impl SkipTracker {
    /// Update for a tag; returns true when the tag itself was a skip element
    fn observe(&mut self, tag: &Tag) -> bool {
        if !SKIP_TAGS.contains(&tag.name.as_str()) {
            return false;
        }
        if tag.closing {
            if let Some(pos) = self.stack.iter().rposition(|t| *t == tag.name) {
                self.stack.remove(pos);
            }
        } else if !tag.raw.ends_with('/') {
            self.stack.push(tag.name.clone());
        }
        true
    }

    fn skipping(&self) -> bool {
        !self.stack.is_empty()
    }
}

/// Extract an attribute value from a raw tag body
fn tag_attribute(raw: &str, attr: &str) -> Option<String> {
    let needle = format!("{attr}=");
    let start = raw.to_lowercase().find(&needle)?;
    let rest = raw[start + needle.len()..].trim_start();
    for quote in ['"', '\''] {
        if let Some(rest) = rest.strip_prefix(quote) {
            return rest.find(quote).map(|end| rest[..end].to_string());
        }
    }
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '>')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(rest[..end].to_string())
    }
}

/// Decode one HTML entity after its `&` has been read
fn read_entity(chars: &mut Peekable<Chars<'_>>) -> char {
    let mut entity = String::new();
    while let Some(&next) = chars.peek() {
        if next == ';' {
            chars.next();
            break;
        }
        if next.is_whitespace() || entity.len() > 10 {
            return '&';
        }
        entity.push(next);
        chars.next();
    }
    match entity.as_str() {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" | "#39" => '\'',
        "nbsp" => ' ',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        _ => entity
            .strip_prefix('#')
            .and_then(|num| {
                if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    num.parse().ok()
                }
            })
            .and_then(char::from_u32)
            .unwrap_or('&'),
    }
}

/// Convert HTML to markdown
pub fn html_to_markdown(html: &str) -> String {
    let mut out = String::new();
    let mut skip = SkipTracker::default();
    let mut list_depth = 0usize;
    let mut in_pre = false;
    let mut in_blockquote = false;

    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' {
            let tag = read_tag(&mut chars);
            if skip.observe(&tag) || skip.skipping() {
                continue;
            }

            if let Some(level) = heading_level(&tag.name) {
                if tag.closing {
                    out.push_str("\n\n");
                } else {
                    out.push('\n');
                    for _ in 0..level {
                        out.push('#');
                    }
                    out.push(' ');
                }
                continue;
            }

            match tag.name.as_str() {
                "p" | "div" | "section" | "article" | "main" | "header" | "footer" => {
                    if tag.closing {
                        out.push_str("\n\n");
                    }
                }
                "br" => out.push('\n'),
                "hr" => out.push_str("\n---\n"),
                "ul" | "ol" => {
                    if tag.closing {
                        list_depth = list_depth.saturating_sub(1);
                        if list_depth == 0 {
                            out.push('\n');
                        }
                    } else {
                        list_depth += 1;
                    }
                }
                "li" => {
                    if !tag.closing {
                        out.push('\n');
                        out.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                        out.push_str("- ");
                    }
                }
                "strong" | "b" => out.push_str("**"),
                "em" | "i" => out.push('*'),
                "pre" => {
                    out.push_str("\n```\n");
                    in_pre = !tag.closing;
                }
                "code" => {
                    if !in_pre {
                        out.push('`');
                    }
                }
                "blockquote" => {
                    if tag.closing {
                        in_blockquote = false;
                        out.push('\n');
                    } else {
                        in_blockquote = true;
                        out.push_str("\n> ");
                    }
                }
                "a" => {
                    if !tag.closing {
                        if let Some(href) = tag_attribute(&tag.raw, "href") {
                            out.push('[');
                            out.push_str(&format!("]({href})"));
                        }
                    }
                }
                _ => {}
            }
        } else if !skip.skipping() {
            let decoded = if c == '&' { read_entity(&mut chars) } else { c };
            if in_blockquote && decoded == '\n' {
                out.push_str("\n> ");
            } else {
                out.push(decoded);
            }
        }
    }

    clean_whitespace(&out)
}

/// Convert HTML to plain text
pub fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut skip = SkipTracker::default();

    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '<' {
            let tag = read_tag(&mut chars);
            if skip.observe(&tag) || skip.skipping() {
                continue;
            }
            let block = heading_level(&tag.name).is_some()
                || matches!(tag.name.as_str(), "p" | "div" | "li" | "tr");
            if tag.name == "br" || (block && tag.closing) {
                out.push('\n');
            } else if block && !tag.closing && tag.name != "div" && tag.name != "li" {
                out.push('\n');
            }
        } else if !skip.skipping() {
            let decoded = if c == '&' { read_entity(&mut chars) } else { c };
            out.push(decoded);
        }
    }

    clean_whitespace(&out)
}

fn heading_level(name: &str) -> Option<usize> {
    let level = name.strip_prefix('h')?.parse::<usize>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

/// Collapse whitespace runs, trim, keep at most two consecutive newlines
pub fn clean_whitespace(s: &str) -> String {
    let mut result = String::new();
    let mut last_was_space = false;
    let mut newline_run = 0;

    for c in s.chars() {
        if c == '\n' {
            if last_was_space && result.ends_with(' ') {
                result.pop();
            }
            newline_run += 1;
            last_was_space = true;
            if newline_run <= 2 {
                result.push(c);
            }
        } else if c.is_whitespace() {
            newline_run = 0;
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else {
            newline_run = 0;
            last_was_space = false;
            result.push(c);
        }
    }

    result.trim().to_string()
}

/// Keep at most two consecutive newlines
pub fn filter_excessive_newlines(s: &str) -> String {
    let mut result = String::new();
    let mut newline_run = 0;
    for c in s.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                result.push(c);
            }
        } else {
            newline_run = 0;
            result.push(c);
        }
    }
    result
}
