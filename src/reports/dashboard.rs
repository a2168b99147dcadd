//! Dashboard statistics over the general records collection

use serde::Serialize;

use super::{field_f64, field_str};
use crate::store::Document;

/// How many records the dashboard lists as recent
pub const RECENT_RECORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_records: usize,
    pub active_records: usize,
    pub featured_records: usize,
    pub total_quantity: f64,
    /// Buckets in order of first appearance
    pub category_distribution: Vec<Bucket>,
    pub priority_distribution: Vec<Bucket>,
    pub recent_records: Vec<Document>,
}

fn distribution<'a, I>(names: I) -> Vec<Bucket>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut buckets: Vec<Bucket> = Vec::new();
    for name in names {
        match buckets.iter_mut().find(|b| b.name == name) {
            Some(bucket) => bucket.value += 1,
            None => buckets.push(Bucket {
                name: name.to_string(),
                value: 1,
            }),
        }
    }
    buckets
}

/// Blank or missing values fall back to `default`
fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.filter(|v| !v.is_empty()).unwrap_or(default)
}

pub fn build_dashboard(records: &[Document]) -> Dashboard {
    let active = records
        .iter()
        .filter(|r| field_str(r, "status") == Some("active"))
        .count();
    let featured = records
        .iter()
        .filter(|r| r.get("isFeatured").and_then(|v| v.as_bool()) == Some(true))
        .count();

    Dashboard {
        total_records: records.len(),
        active_records: active,
        featured_records: featured,
        total_quantity: records.iter().map(|r| field_f64(r, "quantity")).sum(),
        category_distribution: distribution(
            records
                .iter()
                .map(|r| or_default(field_str(r, "category"), "Sin Categoría")),
        ),
        priority_distribution: distribution(
            records
                .iter()
                .map(|r| or_default(field_str(r, "priority"), "low")),
        ),
        recent_records: records.iter().take(RECENT_RECORDS).cloned().collect(),
    }
}
