//! Project Configuration
//!
//! The JSON document that brands the dashboard and declares its dynamic
//! entities. It is loaded once at start-up and shared read-only through
//! the application state.
//!
//! ```json
//! {
//!   "projectName": "ClinicDesk",
//!   "menuItems": [{"path": "/billing", "label": "Facturación", "icon": "FaFile", "permission": "canManageBilling"}],
//!   "entities": [{"name": "suppliers", "label": "Proveedores", "icon": "FaTruck",
//!                 "schema": [{"name": "name", "label": "Nombre", "type": "text", "required": true}]}]
//! }
//! ```

mod field;

pub use field::{is_blank, EntityField, FieldKind};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::store::{validate_collection, Fields};

/// Project configuration shipped with the binary
const EMBEDDED_PROJECT: &str = include_str!("../../config/project.json");

/// Collections owned by the system that entities may not reuse
pub const RESERVED_COLLECTIONS: &[&str] = &["users", "notifications", "payments"];

/// Number of leading fields shown as table columns
pub const TABLE_COLUMN_LIMIT: usize = 5;

/// Branding, menu and dynamic entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub login_title: String,
    #[serde(default)]
    pub login_subtitle: String,
    #[serde(default)]
    pub menu_items: Vec<MenuItemConfig>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub theme: ThemeConfig,
}

/// A navigation entry, optionally gated by a permission name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemConfig {
    pub path: String,
    pub label: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub background_color: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary_color: "#1b527c".to_string(),
            secondary_color: "#2d9bf0".to_string(),
            accent_color: "#55bff3".to_string(),
            background_color: "#f8fafc".to_string(),
        }
    }
}

/// A JSON-declared record type driving the generic CRUD engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Collection and route name, e.g. `suppliers`
    pub name: String,
    /// Menu label, e.g. `Proveedores`
    pub label: String,
    #[serde(default)]
    pub icon: String,
    pub schema: Vec<EntityField>,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>, label: impl Into<String>, schema: Vec<EntityField>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            icon: String::new(),
            schema,
        }
    }

    pub fn field(&self, name: &str) -> Option<&EntityField> {
        self.schema.iter().find(|f| f.name == name)
    }

    /// Fields shown as table columns
    pub fn table_columns(&self) -> &[EntityField] {
        let end = self.schema.len().min(TABLE_COLUMN_LIMIT);
        &self.schema[..end]
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &EntityField> {
        self.schema.iter().filter(|f| f.required)
    }

    /// Empty form: every declared field set to `""`
    pub fn blank_record(&self) -> Fields {
        self.schema
            .iter()
            .map(|f| (f.name.clone(), Value::String(String::new())))
            .collect()
    }

    fn check(&self) -> Result<(), ProjectConfigError> {
        validate_collection(&self.name).map_err(|_| {
            ProjectConfigError::Invalid(format!("entity name {:?} is not a valid collection", self.name))
        })?;

        if RESERVED_COLLECTIONS.contains(&self.name.as_str()) {
            return Err(ProjectConfigError::Invalid(format!(
                "entity name {:?} is reserved",
                self.name
            )));
        }

        if self.schema.is_empty() {
            return Err(ProjectConfigError::Invalid(format!(
                "entity {:?} declares no fields",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.schema {
            if field.name.is_empty() || field.name == "id" {
                return Err(ProjectConfigError::Invalid(format!(
                    "entity {:?} has an invalid field name {:?}",
                    self.name, field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ProjectConfigError::Invalid(format!(
                    "entity {:?} declares field {:?} twice",
                    self.name, field.name
                )));
            }
        }

        Ok(())
    }
}

impl ProjectConfig {
    /// Load and validate a project file
    pub fn load(path: &Path) -> Result<Self, ProjectConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProjectConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: ProjectConfig =
            serde_json::from_str(&content).map_err(|e| ProjectConfigError::Parse {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// The project configuration compiled into the binary
    pub fn embedded() -> Result<Self, ProjectConfigError> {
        let config: ProjectConfig =
            serde_json::from_str(EMBEDDED_PROJECT).map_err(|e| ProjectConfigError::Parse {
                path: PathBuf::from("config/project.json"),
                error: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a path when given, else use the embedded configuration
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, ProjectConfigError> {
        match path {
            Some(path) => {
                let config = Self::load(path)?;
                tracing::info!(path = ?path, entities = config.entities.len(), "Loaded project config");
                Ok(config)
            }
            None => {
                tracing::info!("Using embedded project config");
                Self::embedded()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ProjectConfigError> {
        if self.project_name.trim().is_empty() {
            return Err(ProjectConfigError::Invalid(
                "projectName cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for entity in &self.entities {
            entity.check()?;
            if !names.insert(entity.name.as_str()) {
                return Err(ProjectConfigError::Invalid(format!(
                    "entity {:?} declared twice",
                    entity.name
                )));
            }
        }

        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Menu entries visible to a user holding the given permissions
    pub fn menu_for<F>(&self, has_permission: F) -> Vec<MenuItemConfig>
    where
        F: Fn(&str) -> bool,
    {
        self.menu_items
            .iter()
            .filter(|item| item.permission.as_deref().map_or(true, &has_permission))
            .cloned()
            .collect()
    }
}

/// Project configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectConfigError {
    #[error("Failed to read project config {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse project config {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid project config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_entity() -> EntityConfig {
        EntityConfig::new(
            "suppliers",
            "Proveedores",
            vec![
                EntityField::new("name", "Nombre", FieldKind::Text).required(),
                EntityField::new("email", "Email", FieldKind::Email),
                EntityField::new("phone", "Teléfono", FieldKind::Phone),
                EntityField::new("city", "Ciudad", FieldKind::Text),
                EntityField::new("rating", "Valoración", FieldKind::Rating),
                EntityField::new("notes", "Notas", FieldKind::Textarea),
            ],
        )
    }

    #[test]
    fn test_embedded_config_is_valid() {
        let config = ProjectConfig::embedded().unwrap();
        assert!(!config.entities.is_empty());
        assert!(config.entity("suppliers").is_some());
    }

    #[test]
    fn test_table_columns_limited_to_five() {
        let entity = sample_entity();
        let columns: Vec<&str> = entity
            .table_columns()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(columns, vec!["name", "email", "phone", "city", "rating"]);
    }

    #[test]
    fn test_blank_record() {
        let blank = sample_entity().blank_record();
        assert_eq!(blank.len(), 6);
        assert_eq!(blank.get("name"), Some(&json!("")));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_reserved() {
        let mut config = ProjectConfig::embedded().unwrap();
        config.entities = vec![sample_entity(), sample_entity()];
        assert!(config.validate().is_err());

        let mut reserved = sample_entity();
        reserved.name = "users".to_string();
        config.entities = vec![reserved];
        assert!(config.validate().is_err());

        let mut dup_field = sample_entity();
        dup_field
            .schema
            .push(EntityField::new("name", "Otro", FieldKind::Text));
        config.entities = vec![dup_field];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_menu_filtered_by_permission() {
        let config: ProjectConfig = serde_json::from_value(json!({
            "projectName": "Test",
            "menuItems": [
                {"path": "/dashboard", "label": "Inicio", "icon": "FaHome"},
                {"path": "/billing", "label": "Facturas", "icon": "FaFile", "permission": "canManageBilling"}
            ]
        }))
        .unwrap();

        assert_eq!(config.menu_for(|_| false).len(), 1);
        assert_eq!(config.menu_for(|p| p == "canManageBilling").len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProjectConfig::load(Path::new("/nonexistent/project.json")).unwrap_err();
        assert!(matches!(err, ProjectConfigError::Io { .. }));
    }
}
