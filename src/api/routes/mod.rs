//! API Routes
//!
//! Route handlers organized by functionality.

pub mod config;
pub mod consultations;
pub mod entities;
pub mod health;
pub mod invoices;
pub mod notifications;
pub mod records;
pub mod reports;
pub mod users;
