//! Application State
//!
//! Built once at start-up and shared read-only (behind an `Arc`) by every
//! handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::billing::{InvoiceNumbering, InvoiceService};
use crate::calendar::CalendarService;
use crate::clinic::{
    AppointmentService, ConsultationService, NotificationService, OfficeService,
    PatientService, ServiceContext, SessionService, UserService,
};
use crate::config::Config;
use crate::crud::EntityEngine;
use crate::project::ProjectConfig;
use crate::reports::ReportService;
use crate::store::DocumentStore;
use crate::websocket::{ConnectionHub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub project: Arc<ProjectConfig>,
    /// Generic engines keyed by entity name
    pub entities: Arc<HashMap<String, EntityEngine>>,
    pub patients: PatientService,
    pub offices: OfficeService,
    pub consultations: ConsultationService,
    pub appointments: AppointmentService,
    pub sessions: SessionService,
    pub invoices: InvoiceService,
    pub users: UserService,
    pub notifications: NotificationService,
    pub calendar: CalendarService,
    pub reports: ReportService,
    /// WebSocket connection hub for real-time notifications
    pub ws_hub: ConnectionHub,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// State with default service settings
    pub fn new(store: Arc<dyn DocumentStore>, project: ProjectConfig) -> Self {
        Self::configured(store, project, &Config::default())
    }

    /// State using the page size and billing settings of `config`
    pub fn configured(store: Arc<dyn DocumentStore>, project: ProjectConfig, config: &Config) -> Self {
        let page_size = config.project.items_per_page;
        let ctx = ServiceContext::new(Arc::clone(&store)).with_page_size(page_size);

        let entities = project
            .entities
            .iter()
            .map(|entity| {
                let engine = EntityEngine::new(Arc::clone(&store), entity.clone())
                    .with_page_size(page_size);
                (entity.name.clone(), engine)
            })
            .collect();

        let invoices = InvoiceService::new(ctx.clone())
            .with_numbering(InvoiceNumbering::new(&config.billing.invoice_prefix))
            .with_tax_rate(config.billing.tax_rate);

        Self {
            project: Arc::new(project),
            entities: Arc::new(entities),
            patients: PatientService::new(ctx.clone()),
            offices: OfficeService::new(ctx.clone()),
            consultations: ConsultationService::new(ctx.clone()),
            appointments: AppointmentService::new(ctx.clone()),
            sessions: SessionService::new(ctx.clone()),
            invoices,
            users: UserService::new(ctx.clone()),
            notifications: ctx.notifications.clone(),
            calendar: CalendarService::new(Arc::clone(&store)),
            reports: ReportService::new(Arc::clone(&store)),
            ws_hub: ConnectionHub::new(HubConfig::default()),
            start_time: Instant::now(),
            store,
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntityEngine> {
        self.entities.get(name)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}
