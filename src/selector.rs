//! Selector strings and the small query grammar shared by every `Page`.
//!
//! A selector is one or more segments joined by ` >> `. Each segment is a CSS
//! selector that may end in `:has-text("...")`. A later segment only matches
//! beneath the elements produced by the segment before it.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

const CHAIN: &str = " >> ";
const HAS_TEXT: &str = ":has-text(";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// One ` >> `-separated piece of a query, as handed to the in-page resolver.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub css: String,
    pub has_text: Option<String>,
    #[serde(skip)]
    compiled: Selector,
}

#[derive(Debug, Clone)]
pub struct Query {
    raw: String,
    segments: Vec<Segment>,
}

impl Query {
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        let invalid = |reason: String| SelectorError {
            selector: raw.to_string(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("empty selector".to_string()));
        }

        let mut segments = Vec::new();
        for part in raw.split(CHAIN) {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid("empty segment in chain".to_string()));
            }
            let (css, has_text) = split_has_text(part).map_err(invalid)?;
            let compiled = Selector::parse(&css).map_err(|e| invalid(e.to_string()))?;
            segments.push(Segment {
                css,
                has_text,
                compiled,
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All matches in the document, in document order.
    pub fn select<'a>(&self, html: &'a Html) -> Vec<ElementRef<'a>> {
        self.select_in(html.root_element())
    }

    /// Matches strictly beneath `root`, in document order.
    pub fn select_in<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        let mut current: Vec<ElementRef<'a>> = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            let candidates = root.select(&segment.compiled);
            let found: Vec<ElementRef<'a>> = if i == 0 {
                candidates.collect()
            } else {
                let scope: HashSet<_> = current.iter().map(|el| el.id()).collect();
                candidates
                    .filter(|el| el.ancestors().any(|a| scope.contains(&a.id())))
                    .collect()
            };
            current = segment.keep_text_matches(found);
        }

        current
    }

    /// Wraps `body` in a script that first resolves this query into `__els`
    /// inside the page. Throws in the page when the CSS is rejected there.
    pub fn resolver_script(&self, body: &str) -> String {
        let segments = serde_json::to_string(&self.segments).unwrap_or_else(|_| "[]".to_string());
        format!(
            r#"(() => {{
    const __segments = {segments};
    const __norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
    let __els = null;
    for (const seg of __segments) {{
        let found = Array.from(document.querySelectorAll(seg.css));
        if (__els !== null) {{
            const scope = __els;
            found = found.filter(el => scope.some(s => s !== el && s.contains(el)));
        }}
        if (seg.has_text !== null) {{
            const needle = __norm(seg.has_text);
            found = found.filter(el => __norm(el.textContent).includes(needle));
            const kept = found;
            found = kept.filter(el => !kept.some(o => o !== el && el.contains(o)));
        }}
        __els = found;
    }}
    __els = __els || [];
    {body}
}})()"#
        )
    }
}

impl Segment {
    fn keep_text_matches<'a>(&self, found: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
        let Some(needle) = self.has_text.as_deref().map(normalize) else {
            return found;
        };

        let matching: Vec<ElementRef<'a>> = found
            .into_iter()
            .filter(|el| normalize(&text_of(el)).contains(&needle))
            .collect();

        // Innermost only: drop any element that contains another match.
        matching
            .iter()
            .copied()
            .filter(|el| {
                !matching.iter().any(|other| {
                    other.id() != el.id() && other.ancestors().any(|a| a.id() == el.id())
                })
            })
            .collect()
    }
}

fn split_has_text(part: &str) -> Result<(String, Option<String>), String> {
    let Some(start) = part.rfind(HAS_TEXT) else {
        return Ok((part.to_string(), None));
    };
    let Some(inner) = part[start + HAS_TEXT.len()..].strip_suffix(')') else {
        return Err(":has-text(...) must close the segment".to_string());
    };

    let inner = inner.trim();
    let text = ['"', '\'']
        .iter()
        .find_map(|q| inner.strip_prefix(*q).and_then(|s| s.strip_suffix(*q)))
        .unwrap_or(inner);
    if text.is_empty() {
        return Err(":has-text() needs a non-empty text".to_string());
    }

    let css = part[..start].trim();
    let css = if css.is_empty() { "*" } else { css };
    Ok((css.to_string(), Some(text.to_string())))
}

/// Concatenated text content of an element.
pub fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
