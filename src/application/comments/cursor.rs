//! Opaque keyset cursors for the comment listing.
//!
//! A cursor records the sort it was issued for together with the sort key of the
//! last comment on a page. Decoding never fails loudly: anything malformed is
//! simply "no cursor", and the listing starts again from the top.

use crate::application::pagination::{decode_cursor_parts, encode_cursor_parts, quote_filter_value};
use crate::domain::comments::{Comment, CommentSort};

#[derive(Debug, Clone, PartialEq)]
pub enum CommentCursor {
    Newest {
        created_at: String,
        id: String,
    },
    Oldest {
        created_at: String,
        id: String,
    },
    Popular {
        /// `None` means the comment had no reactions.
        reaction_count: Option<f64>,
        created_at: String,
        id: String,
    },
}

impl CommentCursor {
    /// Cursor positioned after `comment` in a listing sorted by `sort`.
    pub fn after(sort: CommentSort, comment: &Comment) -> Self {
        let created_at = comment.created_at.clone();
        let id = comment.id.to_string();
        match sort {
            CommentSort::Newest => CommentCursor::Newest { created_at, id },
            CommentSort::Oldest => CommentCursor::Oldest { created_at, id },
            CommentSort::Popular => CommentCursor::Popular {
                reaction_count: comment.reaction_count.map(|count| count as f64),
                created_at,
                id,
            },
        }
    }

    pub fn sort(&self) -> CommentSort {
        match self {
            CommentCursor::Newest { .. } => CommentSort::Newest,
            CommentCursor::Oldest { .. } => CommentSort::Oldest,
            CommentCursor::Popular { .. } => CommentSort::Popular,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            CommentCursor::Newest { created_at, id } | CommentCursor::Oldest { created_at, id } => {
                encode_cursor_parts(&[self.sort().as_str(), created_at.as_str(), id.as_str()])
            }
            CommentCursor::Popular {
                reaction_count,
                created_at,
                id,
            } => {
                let count = reaction_count.map_or_else(|| "null".to_string(), |n| n.to_string());
                encode_cursor_parts(&[
                    self.sort().as_str(),
                    count.as_str(),
                    created_at.as_str(),
                    id.as_str(),
                ])
            }
        }
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let parts = decode_cursor_parts(raw)?;
        let sort = CommentSort::parse(parts.first()?)?;

        match sort {
            CommentSort::Newest | CommentSort::Oldest => {
                if parts.len() < 3 {
                    return None;
                }
                let created_at = non_empty(&parts[1])?;
                let id = non_empty(&parts[2])?;
                Some(if sort == CommentSort::Newest {
                    CommentCursor::Newest { created_at, id }
                } else {
                    CommentCursor::Oldest { created_at, id }
                })
            }
            CommentSort::Popular => {
                if parts.len() < 4 {
                    return None;
                }
                let reaction_count = parse_reaction_count(&parts[1])?;
                let created_at = non_empty(&parts[2])?;
                let id = non_empty(&parts[3])?;
                Some(CommentCursor::Popular {
                    reaction_count,
                    created_at,
                    id,
                })
            }
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Outer `None` is a malformed value; inner `None` is the literal `null`.
fn parse_reaction_count(value: &str) -> Option<Option<f64>> {
    if value == "null" {
        return Some(None);
    }
    let parsed = value.trim().parse::<f64>().ok()?;
    parsed.is_finite().then_some(Some(parsed))
}

/// PostgREST conditions selecting the rows strictly after `cursor` under `sort`.
///
/// The caller ORs the returned conditions together (`or=(a,b,...)`). An empty
/// vector means "start from the top": no cursor, or a cursor issued for another sort.
pub fn build_cursor_conditions(sort: CommentSort, cursor: Option<&CommentCursor>) -> Vec<String> {
    let Some(cursor) = cursor else {
        return Vec::new();
    };
    if cursor.sort() != sort {
        return Vec::new();
    }

    match cursor {
        CommentCursor::Newest { created_at, id } => {
            let created_at = quote_filter_value(created_at);
            let id = quote_filter_value(id);
            vec![
                format!("created_at.lt.{created_at}"),
                format!("and(created_at.eq.{created_at},id.lt.{id})"),
            ]
        }
        CommentCursor::Oldest { created_at, id } => {
            let created_at = quote_filter_value(created_at);
            let id = quote_filter_value(id);
            vec![
                format!("created_at.gt.{created_at}"),
                format!("and(created_at.eq.{created_at},id.gt.{id})"),
            ]
        }
        CommentCursor::Popular {
            reaction_count,
            created_at,
            id,
        } => {
            let created_at = quote_filter_value(created_at);
            let id = quote_filter_value(id);
            match reaction_count {
                Some(count) => {
                    // Rows without reactions sort after every counted row.
                    vec![
                        format!("reaction_count.lt.{count}"),
                        "reaction_count.is.null".to_string(),
                        format!("and(reaction_count.eq.{count},created_at.lt.{created_at})"),
                        format!(
                            "and(reaction_count.eq.{count},created_at.eq.{created_at},id.lt.{id})"
                        ),
                    ]
                }
                None => vec![
                    format!("and(reaction_count.is.null,created_at.lt.{created_at})"),
                    format!("and(reaction_count.is.null,created_at.eq.{created_at},id.lt.{id})"),
                ],
            }
        }
    }
}
