//! # ClinicDesk
//!
//! Practice management backend for a small clinic: patients, offices,
//! consultations, appointments, sessions, invoices and payments, plus
//! custom entities declared in a JSON project configuration.
//!
//! ## Features
//!
//! - **Document store**: collections of JSON documents behind one trait,
//!   in memory or in a SQLite file
//! - **Config-driven CRUD**: entities, forms and table columns come from
//!   the project configuration
//! - **Scheduling**: office calendar with overlap detection
//! - **Billing**: sequential invoice numbers and payment registration
//! - **Real-time**: notifications pushed over WebSocket
//! - **Reports**: totals, rule-based insights and a patient dashboard
//!
//! ## Modules
//!
//! - [`store`]: Document store trait and backends
//! - [`project`]: Project configuration (branding, menu, entities)
//! - [`crud`]: Generic entity engine, listing and validation
//! - [`clinic`]: Clinical services and notifications
//! - [`billing`]: Invoices, numbering and payments
//! - [`calendar`]: Daily office calendar and conflict detection
//! - [`reports`]: Reports, insights and dashboard
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clinicdesk::clinic::OfficeForm;
//! use clinicdesk::project::ProjectConfig;
//! use clinicdesk::store::MemoryStore;
//! use clinicdesk::AppState;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let state = AppState::new(store, ProjectConfig::embedded()?);
//!
//!     let form = OfficeForm {
//!         name: Some("Consultorio 1".into()),
//!         address: Some("Av. Central 120".into()),
//!         capacity: Some(4.0),
//!         ..Default::default()
//!     };
//!     let office = state.offices.create(&form, "admin").await?;
//!     println!("Created office {}", office.id);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod billing;
pub mod calendar;
pub mod clinic;
pub mod config;
pub mod crud;
pub mod project;
pub mod reports;
pub mod saga;
pub mod store;
pub mod websocket;

// Re-export top-level types for convenience
pub use store::{
    Document, DocumentStore, Fields, MemoryStore, Record, SqliteStore, StoreError, StoreResult,
    Stored,
};

pub use project::{EntityConfig, EntityField, FieldKind, ProjectConfig, ProjectConfigError};

pub use crud::{EntityEngine, ListQuery, Page, ServiceError, ServiceResult, ValidationErrors};

pub use api::{build_router, serve, Actor, ApiError, AppState};

pub use websocket::{
    spawn_notification_forwarder, websocket_handler, ClientMessage, ConnectionHub, HubConfig,
    HubError, ServerMessage, WsEvent,
};

pub use config::{Config, ConfigError, LoggingConfig, StorageBackend};
