//! Rule-based practice insights
//!
//! Each rule looks at patients, appointments and sessions and emits at
//! most one [`Insight`]. Rules whose ratio would divide by zero are
//! skipped.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;

use super::{field_str, field_time, percent};
use crate::store::Document;

/// Cancellation percentage above which a warning is raised
pub const CANCELLATION_WARNING_RATE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Success,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
}

impl Insight {
    fn new(kind: InsightKind, title: &str, description: String) -> Self {
        Self {
            kind,
            title: title.to_string(),
            description,
        }
    }
}

pub fn build_insights(
    patients: &[Document],
    appointments: &[Document],
    sessions: &[Document],
    now: DateTime<Utc>,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    let active: Vec<&Document> = patients
        .iter()
        .filter(|p| field_str(p, "status") == Some("active"))
        .collect();

    if !active.is_empty() {
        insights.push(Insight::new(
            InsightKind::Success,
            "Base de Pacientes Saludable",
            format!(
                "Tienes {} pacientes activos. Esto representa un {:.0}% de tu base total.",
                active.len(),
                percent(active.len(), patients.len())
            ),
        ));
    }

    if !appointments.is_empty() {
        let cancelled = appointments
            .iter()
            .filter(|a| matches!(field_str(a, "status"), Some("cancelled" | "no_show")))
            .count();
        let rate = percent(cancelled, appointments.len());
        if rate > CANCELLATION_WARNING_RATE {
            insights.push(Insight::new(
                InsightKind::Warning,
                "Alta Tasa de Cancelaciones",
                format!(
                    "El {:.1}% de tus citas han sido canceladas o no asistidas. Considera implementar recordatorios automáticos.",
                    rate
                ),
            ));
        }
    }

    if !active.is_empty() {
        let average = sessions.len() as f64 / active.len() as f64;
        if average > 5.0 {
            insights.push(Insight::new(
                InsightKind::Success,
                "Excelente Retención de Pacientes",
                format!(
                    "Tus pacientes tienen un promedio de {:.1} sesiones, lo que indica una buena adherencia al tratamiento.",
                    average
                ),
            ));
        } else if average < 3.0 {
            insights.push(Insight::new(
                InsightKind::Info,
                "Oportunidad de Mejora en Retención",
                format!(
                    "El promedio de sesiones por paciente es {:.1}. Considera estrategias para mejorar la continuidad del tratamiento.",
                    average
                ),
            ));
        }
    }

    let next_week = now + Duration::days(7);
    let upcoming = appointments
        .iter()
        .filter(|a| field_str(a, "status") == Some("scheduled"))
        .filter(|a| field_time(a, "date").is_some_and(|at| at >= now && at <= next_week))
        .count();
    if upcoming > 0 {
        insights.push(Insight::new(
            InsightKind::Info,
            "Citas Próximas",
            format!(
                "Tienes {} citas programadas para los próximos 7 días. Asegúrate de confirmarlas.",
                upcoming
            ),
        ));
    }

    let month_ago = now - Duration::days(30);
    let recently_seen: HashSet<&str> = sessions
        .iter()
        .filter(|s| field_time(s, "date").is_some_and(|at| at >= month_ago))
        .filter_map(|s| field_str(s, "patientId"))
        .collect();
    let unseen = active
        .iter()
        .filter(|p| !recently_seen.contains(p.id.as_str()))
        .count();
    if unseen > 0 {
        insights.push(Insight::new(
            InsightKind::Warning,
            "Pacientes sin Sesiones Recientes",
            format!(
                "{} pacientes activos no han tenido sesiones en los últimos 30 días. Considera hacer seguimiento.",
                unseen
            ),
        ));
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn doc(id: &str, value: serde_json::Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn titles(insights: &[Insight]) -> Vec<&str> {
        insights.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_empty_data_yields_no_insights() {
        assert!(build_insights(&[], &[], &[], now()).is_empty());
    }

    #[test]
    fn test_cancellations_and_upcoming() {
        let appointments = vec![
            doc("a1", json!({"status": "cancelled", "date": "2024-03-01T10:00:00Z"})),
            doc("a2", json!({"status": "no_show", "date": "2024-03-02T10:00:00Z"})),
            doc("a3", json!({"status": "scheduled", "date": "2024-03-22T10:00:00Z"})),
            doc("a4", json!({"status": "scheduled", "date": "2024-04-22T10:00:00Z"})),
        ];
        let insights = build_insights(&[], &appointments, &[], now());
        assert_eq!(titles(&insights), vec!["Alta Tasa de Cancelaciones", "Citas Próximas"]);
        assert!(insights[0].description.starts_with("El 50.0%"));
        assert!(insights[1].description.starts_with("Tienes 1 citas"));
    }

    #[test]
    fn test_patient_rules() {
        let patients = vec![
            doc("p1", json!({"status": "active"})),
            doc("p2", json!({"status": "active"})),
            doc("p3", json!({"status": "completed"})),
            doc("p4", json!({"status": "inactive"})),
        ];
        let sessions = vec![
            doc("s1", json!({"patientId": "p1", "date": "2024-03-10T10:00:00Z"})),
            doc("s2", json!({"patientId": "p2", "date": "2024-01-10T10:00:00Z"})),
        ];

        let insights = build_insights(&patients, &[], &sessions, now());
        assert_eq!(
            titles(&insights),
            vec![
                "Base de Pacientes Saludable",
                "Oportunidad de Mejora en Retención",
                "Pacientes sin Sesiones Recientes"
            ]
        );
        assert!(insights[0].description.contains("un 50% de tu base"));
        assert!(insights[1].description.contains("es 1.0."));
        assert!(insights[2].description.starts_with("1 pacientes activos"));
        assert_eq!(insights[2].kind, InsightKind::Warning);
    }

    #[test]
    fn test_high_retention() {
        let patients = vec![doc("p1", json!({"status": "active"}))];
        let sessions: Vec<Document> = (0..6)
            .map(|n| doc(&format!("s{n}"), json!({"patientId": "p1", "date": "2024-03-15T10:00:00Z"})))
            .collect();
        let insights = build_insights(&patients, &[], &sessions, now());
        assert_eq!(
            titles(&insights),
            vec!["Base de Pacientes Saludable", "Excelente Retención de Pacientes"]
        );
    }
}
