//! Clinic Services
//!
//! Hand-written services for the built-in collections. Unlike the generic
//! [`EntityEngine`](crate::crud::EntityEngine), each service knows its
//! record shape and applies field-specific rules (formats, ranges, date
//! ordering) before writing.
//!
//! - **patients**: the general records collection (`patients`)
//! - **offices**: consulting rooms with equipment and weekly schedule
//! - **consultations**: scheduled encounters, cascade delete of the linked invoice
//! - **appointments**: patient/office bookings
//! - **sessions**: clinical session notes
//! - **users**: roles and permission bags
//! - **notifications**: in-app notifications and per-user subscriptions
//!
//! Every list operation loads the whole collection and narrows it in
//! memory (search, sort, fixed-size pages).

pub mod appointments;
pub mod consultations;
pub mod form;
pub mod notifications;
pub mod offices;
pub mod patients;
pub mod sessions;
pub mod users;

pub use appointments::{Appointment, AppointmentForm, AppointmentService};
pub use consultations::{Consultation, ConsultationForm, ConsultationService};
pub use notifications::{
    Notification, NotificationChange, NotificationService, NotificationSubscription, NotificationType,
};
pub use offices::{Office, OfficeForm, OfficeService};
pub use patients::{Patient, PatientForm, PatientService};
pub use sessions::{Session, SessionForm, SessionService};
pub use users::{Permissions, User, UserForm, UserRole, UserService};

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use crate::crud::{paginate, ListQuery, Page, SortDirection, DEFAULT_PAGE_SIZE};
use crate::store::{DocumentStore, Stored};

/// Dependencies shared by every clinic service
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn DocumentStore>,
    pub notifications: NotificationService,
    pub page_size: usize,
}

impl ServiceContext {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            notifications: NotificationService::new(Arc::clone(&store)),
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// How a record type is searched and sorted in its list view
pub(crate) trait Listed {
    type SortKey: FromStr + Copy;

    const DEFAULT_SORT: Self::SortKey;
    const DEFAULT_DIRECTION: SortDirection;

    /// Whether the lower-cased needle occurs in the record's searchable text
    fn matches(&self, needle: &str) -> bool;

    fn compare(&self, other: &Self, key: Self::SortKey) -> Ordering;
}

/// Search, sort and paginate loaded records
///
/// An unknown sort key falls back to the record type's default.
pub(crate) fn list_records<T: Listed>(
    mut records: Vec<Stored<T>>,
    query: &ListQuery,
    page_size: usize,
) -> Page<Stored<T>> {
    if let Some(needle) = query.search_term() {
        records.retain(|r| r.record.matches(&needle));
    }

    let key = query
        .sort
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(T::DEFAULT_SORT);
    let direction = query.direction_or(T::DEFAULT_DIRECTION);
    records.sort_by(|a, b| direction.apply(a.record.compare(&b.record, key)));

    paginate(records, query.page(), page_size)
}
