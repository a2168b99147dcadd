//! In-memory search, sort and pagination
//!
//! Every list view loads a whole collection and narrows it here: a
//! case-insensitive substring search over the record's searchable text, an
//! optional sort, then a fixed-size 1-based page.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Default number of records per page
pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Query string of a list endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListQuery {
    /// Free-text search
    #[serde(default)]
    pub search: Option<String>,
    /// Sort key
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub direction: Option<SortDirection>,
    /// 1-based page number
    #[serde(default)]
    pub page: Option<usize>,
}

impl ListQuery {
    /// Lower-cased, trimmed search term; `None` when blank
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1)
    }

    pub fn direction_or(&self, default: SortDirection) -> SortDirection {
        self.direction.unwrap_or(default)
    }
}

/// One page of a filtered listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

/// Slice a 1-based page out of `items`
///
/// Page 0 is treated as page 1. A page past the end is empty.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page);

    let start = (page - 1).saturating_mul(per_page);
    let items = items.into_iter().skip(start).take(per_page).collect();

    Page {
        items,
        page,
        per_page,
        total_items,
        total_pages,
    }
}

/// Whether any of the haystacks contains the lower-cased needle
pub fn matches_search<I, S>(needle: &str, haystacks: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    haystacks
        .into_iter()
        .any(|h| h.as_ref().to_lowercase().contains(needle))
}

/// Text a value contributes to search; `None` for empty values
pub fn search_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(search_text).collect();
            (!parts.is_empty()).then(|| parts.join(","))
        }
        Value::Object(_) => None,
    }
}

/// Order two optional JSON values
///
/// Numbers compare numerically, strings case-insensitively; missing and
/// `null` values sort first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => compare_text(
            &search_text(x).unwrap_or_default(),
            &search_text(y).unwrap_or_default(),
        ),
    }
}

/// Case-insensitive string ordering
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Compare two floats, treating NaN as equal
pub fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
