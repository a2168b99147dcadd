//! Practice report: totals and rates

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

use super::{field_f64, field_str, field_time, percent};
use crate::store::Document;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_patients: usize,
    pub active_patients: usize,
    pub total_consultations: usize,
    pub completed_consultations: usize,
    pub pending_consultations: usize,
    pub cancelled_consultations: usize,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub pending_invoices: usize,
    /// Sum of paid invoice totals
    pub total_revenue: f64,
    pub pending_revenue: f64,
    /// Paid in the current calendar month, up to `now`
    pub month_revenue: f64,
    pub avg_revenue_per_patient: f64,
    /// Percentage of consultations completed
    pub completion_rate: f64,
    /// Percentage of invoices paid
    pub collection_rate: f64,
}

fn first_day_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

fn has_status(doc: &Document, statuses: &[&str]) -> bool {
    field_str(doc, "status").is_some_and(|s| statuses.contains(&s))
}

/// Compute the report from raw patient, consultation and invoice documents
pub fn build_report(
    patients: &[Document],
    consultations: &[Document],
    invoices: &[Document],
    now: DateTime<Utc>,
) -> Report {
    let active_patients = patients.iter().filter(|p| has_status(p, &["active"])).count();

    let completed = consultations
        .iter()
        .filter(|c| has_status(c, &["completed"]))
        .count();
    let pending = consultations
        .iter()
        .filter(|c| has_status(c, &["scheduled", "pending"]))
        .count();
    let cancelled = consultations
        .iter()
        .filter(|c| has_status(c, &["cancelled"]))
        .count();

    let paid: Vec<&Document> = invoices.iter().filter(|i| has_status(i, &["paid"])).collect();
    let pending_invoices: Vec<&Document> =
        invoices.iter().filter(|i| has_status(i, &["pending"])).collect();

    let total = |docs: &[&Document]| docs.iter().map(|d| field_f64(d, "total")).sum::<f64>();
    let total_revenue = total(&paid);
    let pending_revenue = total(&pending_invoices);

    let month_start = first_day_of_month(now);
    let month_revenue = paid
        .iter()
        .filter(|inv| {
            field_time(inv, "paidDate")
                .or_else(|| field_time(inv, "issueDate"))
                .is_some_and(|at| at >= month_start && at <= now)
        })
        .map(|inv| field_f64(inv, "total"))
        .sum();

    let avg_revenue_per_patient = if active_patients > 0 {
        total_revenue / active_patients as f64
    } else {
        0.0
    };

    Report {
        total_patients: patients.len(),
        active_patients,
        total_consultations: consultations.len(),
        completed_consultations: completed,
        pending_consultations: pending,
        cancelled_consultations: cancelled,
        total_invoices: invoices.len(),
        paid_invoices: paid.len(),
        pending_invoices: pending_invoices.len(),
        total_revenue,
        pending_revenue,
        month_revenue,
        avg_revenue_per_patient,
        completion_rate: percent(completed, consultations.len()),
        collection_rate: percent(paid.len(), invoices.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: serde_json::Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_empty_collections_have_zero_rates() {
        let report = build_report(&[], &[], &[], Utc::now());
        assert_eq!(report, Report::default());
        assert_eq!(report.completion_rate, 0.0);
        assert_eq!(report.collection_rate, 0.0);
    }

    #[test]
    fn test_totals_and_rates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let patients = vec![
            doc("p1", json!({"status": "active"})),
            doc("p2", json!({"status": "active"})),
            doc("p3", json!({"status": "inactive"})),
        ];
        let consultations = vec![
            doc("c1", json!({"status": "completed"})),
            doc("c2", json!({"status": "scheduled"})),
            doc("c3", json!({"status": "pending"})),
            doc("c4", json!({"status": "cancelled"})),
        ];
        let invoices = vec![
            doc("i1", json!({"status": "paid", "total": 100.0, "paidDate": "2024-03-02T10:00:00Z"})),
            doc("i2", json!({"status": "paid", "total": 300.0, "paidDate": "2024-02-27T10:00:00Z"})),
            doc("i3", json!({"status": "paid", "total": 50.0, "issueDate": "2024-03-10T00:00:00Z"})),
            doc("i4", json!({"status": "pending", "total": 80.0})),
        ];

        let report = build_report(&patients, &consultations, &invoices, now);
        assert_eq!(report.active_patients, 2);
        assert_eq!(report.completed_consultations, 1);
        assert_eq!(report.pending_consultations, 2);
        assert_eq!(report.cancelled_consultations, 1);
        assert_eq!(report.total_revenue, 450.0);
        assert_eq!(report.pending_revenue, 80.0);
        assert_eq!(report.month_revenue, 150.0);
        assert_eq!(report.avg_revenue_per_patient, 225.0);
        assert_eq!(report.completion_rate, 25.0);
        assert_eq!(report.collection_rate, 75.0);
    }

    #[test]
    fn test_future_payment_excluded_from_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let invoices = vec![doc(
            "i1",
            json!({"status": "paid", "total": 10.0, "paidDate": "2024-03-06T00:00:00Z"}),
        )];
        let report = build_report(&[], &[], &invoices, now);
        assert_eq!(report.month_revenue, 0.0);
        assert_eq!(report.total_revenue, 10.0);
    }
}
