//! Generic CRUD
//!
//! - **engine**: `EntityEngine`, CRUD driven entirely by an `EntityConfig`
//! - **listing**: search / sort / pagination shared by every list view
//! - **validation**: flat field → message error map
//! - **error**: `ServiceError` shared with the clinic services

pub mod engine;
pub mod error;
pub mod listing;
pub mod validation;

pub use engine::EntityEngine;
pub use error::{ServiceError, ServiceResult};
pub use listing::{paginate, ListQuery, Page, SortDirection, DEFAULT_PAGE_SIZE};
pub use validation::ValidationErrors;
