//! Data Transfer Objects
//!
//! Request and response types that only exist at the HTTP boundary.
//! Records, forms and pages are serialized straight from their service
//! types.

use serde::{Deserialize, Serialize};

use crate::project::{EntityConfig, MenuItemConfig, ProjectConfig, ThemeConfig};

// ============================================
// PROJECT CONFIG DTOs
// ============================================

/// Branding, menu and entity declarations for the dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub project_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub login_title: String,
    pub login_subtitle: String,
    /// Menu entries the caller may see
    pub menu_items: Vec<MenuItemConfig>,
    pub entities: Vec<EntityConfig>,
    pub theme: ThemeConfig,
}

impl ConfigResponse {
    pub fn new(project: &ProjectConfig, menu_items: Vec<MenuItemConfig>) -> Self {
        Self {
            project_name: project.project_name.clone(),
            description: project.description.clone(),
            logo_url: project.logo_url.clone(),
            login_title: project.login_title.clone(),
            login_subtitle: project.login_subtitle.clone(),
            menu_items,
            entities: project.entities.clone(),
            theme: project.theme.clone(),
        }
    }
}

// ============================================
// CALENDAR DTOs
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    /// `YYYY-MM-DD`; the whole calendar when absent
    #[serde(default)]
    pub day: Option<String>,
}

// ============================================
// NOTIFICATION DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    /// Notifications that changed from unread to read
    pub updated: usize,
}

// ============================================
// BILLING DTOs
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextNumberResponse {
    pub invoice_number: String,
}

// ============================================
// HEALTH DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// "ok" or "error"
    pub storage: String,
    /// Store backend name
    pub backend: String,
    pub websocket_connections: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
