//! Reports, insights and dashboard
//!
//! All three read raw documents rather than typed records, so a document
//! with missing or odd fields still counts (as zero, or under a fallback
//! bucket) instead of being skipped. Nothing is cached: every call
//! reloads the collections it needs.
//!
//! - **report**: patient / consultation / invoice totals and rates
//! - **insights**: rule-based hints about the practice
//! - **dashboard**: counters and distributions over `patients`

pub mod dashboard;
pub mod insights;
pub mod report;

pub use dashboard::{build_dashboard, Bucket, Dashboard};
pub use insights::{build_insights, Insight, InsightKind};
pub use report::{build_report, Report};

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::crud::ServiceResult;
use crate::store::{Document, DocumentStore};

/// `part / whole` as a percentage; zero when `whole` is zero
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub(crate) fn field_str<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get_str(key)
}

/// Numeric field; missing or non-numeric values count as zero
pub(crate) fn field_f64(doc: &Document, key: &str) -> f64 {
    doc.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

/// RFC 3339 timestamp field
pub(crate) fn field_time(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    field_str(doc, key)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Loads the collections each view needs and computes it
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn DocumentStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn load(&self, collection: &str) -> ServiceResult<Vec<Document>> {
        Ok(self.store.get_all(collection).await?)
    }

    pub async fn report(&self, now: DateTime<Utc>) -> ServiceResult<Report> {
        let patients = self.load("patients").await?;
        let consultations = self.load("consultations").await?;
        let invoices = self.load("invoices").await?;
        Ok(build_report(&patients, &consultations, &invoices, now))
    }

    pub async fn insights(&self, now: DateTime<Utc>) -> ServiceResult<Vec<Insight>> {
        let patients = self.load("patients").await?;
        let appointments = self.load("appointments").await?;
        let sessions = self.load("sessions").await?;
        let insights = build_insights(&patients, &appointments, &sessions, now);
        tracing::debug!(count = insights.len(), "Insights generated");
        Ok(insights)
    }

    pub async fn dashboard(&self) -> ServiceResult<Dashboard> {
        Ok(build_dashboard(&self.load("patients").await?))
    }
}
