//! Calendar view and schedule conflicts
//!
//! Consultations and appointments are merged into one list of
//! [`CalendarEvent`]s. Each event covers the half-open interval
//! `[start, start + duration)`, so back-to-back events do not conflict.
//! Conflicts are recomputed from scratch every time events are loaded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::clinic::{Appointment, Consultation};
use crate::crud::ServiceResult;
use crate::store::{Collection, DocumentStore, Stored};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Consultation,
    Appointment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Id of the underlying consultation or appointment
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: EventSource,
    pub status: String,
    pub has_conflict: bool,
}

impl CalendarEvent {
    pub fn overlaps(&self, other: &CalendarEvent) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl From<&Stored<Consultation>> for CalendarEvent {
    fn from(c: &Stored<Consultation>) -> Self {
        let patient = non_empty(&c.patient_name).unwrap_or("Sin nombre");
        let reason = non_empty(&c.reason).unwrap_or("Consulta");
        Self {
            id: c.id.clone(),
            title: format!("{} - {}", patient, reason),
            start: c.date,
            end: c.end(),
            source: EventSource::Consultation,
            status: c.status.as_str().to_string(),
            has_conflict: false,
        }
    }
}

impl From<&Stored<Appointment>> for CalendarEvent {
    fn from(a: &Stored<Appointment>) -> Self {
        let patient = non_empty(&a.patient_name).unwrap_or("Sin nombre");
        Self {
            id: a.id.clone(),
            title: format!("{} - {}", patient, a.kind.label()),
            start: a.date,
            end: a.end(),
            source: EventSource::Appointment,
            status: a.status.as_str().to_string(),
            has_conflict: false,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Flag every event that overlaps at least one other event
///
/// Pairwise comparison; fine for a clinic's calendar size.
pub fn detect_conflicts(events: &mut [CalendarEvent]) {
    let flags: Vec<bool> = events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            events
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && event.overlaps(other))
        })
        .collect();

    for (event, conflict) in events.iter_mut().zip(flags) {
        event.has_conflict = conflict;
    }
}

/// Events starting on the given (UTC) calendar day
pub fn events_on_day(events: &[CalendarEvent], day: NaiveDate) -> Vec<CalendarEvent> {
    events
        .iter()
        .filter(|e| e.start.date_naive() == day)
        .cloned()
        .collect()
}

/// Loads the merged calendar from the store
#[derive(Clone)]
pub struct CalendarService {
    consultations: Collection<Consultation>,
    appointments: Collection<Appointment>,
}

impl CalendarService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            consultations: Collection::new(Arc::clone(&store)),
            appointments: Collection::new(store),
        }
    }

    /// Every consultation and appointment, by start time, with conflicts flagged
    pub async fn events(&self) -> ServiceResult<Vec<CalendarEvent>> {
        let consultations = self.consultations.all().await?;
        let appointments = self.appointments.all().await?;

        let mut events: Vec<CalendarEvent> = consultations
            .iter()
            .map(CalendarEvent::from)
            .chain(appointments.iter().map(CalendarEvent::from))
            .collect();
        events.sort_by_key(|e| e.start);
        detect_conflicts(&mut events);

        let conflicts = events.iter().filter(|e| e.has_conflict).count();
        tracing::debug!(events = events.len(), conflicts, "Calendar loaded");
        Ok(events)
    }

    /// Events of one day; conflicts are still computed over the whole calendar
    pub async fn day(&self, day: NaiveDate) -> ServiceResult<Vec<CalendarEvent>> {
        Ok(events_on_day(&self.events().await?, day))
    }
}
