//! Shared pagination helpers.
//!
//! Cursors in this crate are `|`-joined lists of parts, each part percent-encoded
//! with the `encodeURIComponent` character set so a value containing `|` survives
//! the round trip.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

const CURSOR_SEPARATOR: char = '|';

/// Characters escaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_cursor_parts<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|part| utf8_percent_encode(part.as_ref(), COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join(&CURSOR_SEPARATOR.to_string())
}

/// Splits and decodes a cursor. `None` when any part is not valid UTF-8 once decoded.
pub fn decode_cursor_parts(raw: &str) -> Option<Vec<String>> {
    raw.split(CURSOR_SEPARATOR)
        .map(|part| {
            percent_decode_str(part)
                .decode_utf8()
                .ok()
                .map(|decoded| decoded.into_owned())
        })
        .collect()
}

/// Quotes a value for use inside an `or()`/`and()` list when it carries reserved characters.
pub fn quote_filter_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| matches!(ch, ',' | '(' | ')' | '"' | '\\') || ch.is_whitespace());
    if !needs_quotes {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Page position and the rows fetched for it.
///
/// Callers fetch `limit + 1` rows; the extra row only signals that another page exists.
pub struct PaginationInput<'a, T> {
    pub page: u32,
    pub limit: u32,
    pub rows: Vec<T>,
    pub cursor_encoder: Option<&'a (dyn Fn(&T) -> String + Send + Sync)>,
}

impl<'a, T> PaginationInput<'a, T> {
    pub fn new(page: u32, limit: u32, rows: Vec<T>) -> Self {
        Self {
            page,
            limit,
            rows,
            cursor_encoder: None,
        }
    }

    pub fn with_cursor_encoder(mut self, encoder: &'a (dyn Fn(&T) -> String + Send + Sync)) -> Self {
        self.cursor_encoder = Some(encoder);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
    pub next_page: Option<u32>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

pub fn derive_pagination<T>(input: PaginationInput<'_, T>) -> Paginated<T> {
    let PaginationInput {
        page,
        limit,
        mut rows,
        cursor_encoder,
    } = input;

    let page = page.max(1);
    let limit = limit.max(1);
    let keep = limit as usize;

    let has_more = rows.len() > keep;
    rows.truncate(keep);

    let next_cursor = match (has_more, cursor_encoder, rows.last()) {
        (true, Some(encode), Some(last)) => Some(encode(last)),
        _ => None,
    };

    Paginated {
        items: rows,
        pagination: Pagination {
            page,
            limit,
            has_more,
            next_page: has_more.then(|| page.saturating_add(1)),
            next_cursor,
        },
    }
}

/// Zero-based row offset for a 1-based page.
pub fn page_offset(page: u32, limit: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(limit.max(1))
}
