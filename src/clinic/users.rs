//! Users, roles and permissions
//!
//! User documents are keyed by the user's uid. Permissions are derived
//! from the role when a user is saved; every role currently receives the
//! full permission set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::form::{self, required_text, text};
use super::notifications::NotificationType;
use super::ServiceContext;
use crate::crud::{ServiceError, ServiceResult, ValidationErrors};
use crate::store::{Collection, Record, Stored};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Psychologist,
    Receptionist,
}

impl UserRole {
    pub fn label(self) -> &'static str {
        match self {
            UserRole::Admin => "Administrador",
            UserRole::Psychologist => "Psicólogo",
            UserRole::Receptionist => "Recepcionista",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub can_manage_users: bool,
    pub can_manage_patients: bool,
    pub can_manage_appointments: bool,
    pub can_manage_offices: bool,
    pub can_manage_billing: bool,
    pub can_view_reports: bool,
    pub can_manage_sessions: bool,
}

impl Permissions {
    pub fn for_role(_role: UserRole) -> Self {
        Self {
            can_manage_users: true,
            can_manage_patients: true,
            can_manage_appointments: true,
            can_manage_offices: true,
            can_manage_billing: true,
            can_view_reports: true,
            can_manage_sessions: true,
        }
    }

    /// Look up a permission by its wire name (`canManageBilling`, ...)
    ///
    /// Unknown names are denied.
    pub fn has(&self, name: &str) -> bool {
        match name {
            "canManageUsers" => self.can_manage_users,
            "canManagePatients" => self.can_manage_patients,
            "canManageAppointments" => self.can_manage_appointments,
            "canManageOffices" => self.can_manage_offices,
            "canManageBilling" => self.can_manage_billing,
            "canViewReports" => self.can_view_reports,
            "canManageSessions" => self.can_manage_sessions,
            _ => false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub display_name: String,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserForm {
    /// Required on create; ignored on update
    pub uid: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

impl UserForm {
    pub fn validate(&self) -> Result<User, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = required_text(&mut errors, "email", &self.email, "El campo Email es obligatorio");
        if !email.is_empty() && !form::is_valid_email(&email) {
            errors.add("email", "Email inválido");
        }
        let display_name = required_text(
            &mut errors,
            "displayName",
            &self.display_name,
            "El campo Nombre es obligatorio",
        );

        let role_raw = text(&self.role);
        let role = if role_raw.is_empty() {
            errors.add("role", "El campo Rol es obligatorio");
            None
        } else {
            let parsed: Option<UserRole> =
                serde_json::from_value(serde_json::Value::String(role_raw)).ok();
            errors.check(parsed.is_none(), "role", "Opción inválida para Rol");
            parsed
        };

        errors.into_result()?;
        let role = role.unwrap_or_default();
        let photo_url = text(&self.photo_url);

        Ok(User {
            email,
            display_name,
            photo_url: (!photo_url.is_empty()).then_some(photo_url),
            role,
            permissions: Permissions::for_role(role),
            is_active: self.is_active.unwrap_or(true),
            created_at: None,
            updated_at: None,
        })
    }
}

#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
    users: Collection<User>,
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            users: Collection::new(ctx.store.clone()),
            ctx,
        }
    }

    /// All users, ordered by display name
    pub async fn all(&self) -> ServiceResult<Vec<Stored<User>>> {
        let mut users = self.users.all().await?;
        users.sort_by_key(|u| u.display_name.to_lowercase());
        Ok(users)
    }

    pub async fn get(&self, uid: &str) -> ServiceResult<Stored<User>> {
        Ok(self.users.require(uid).await?)
    }

    /// Display name of a user, or an empty string when unknown
    pub async fn display_name(&self, uid: &str) -> String {
        match self.users.get(uid).await {
            Ok(Some(user)) => user.record.display_name,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::warn!(uid = %uid, error = %e, "Failed to look up user");
                String::new()
            }
        }
    }

    /// Create a user document under the uid given in the form
    pub async fn create(&self, form: &UserForm, actor: &str) -> ServiceResult<Stored<User>> {
        let uid = text(&form.uid);
        let mut record = match (uid.is_empty(), form.validate()) {
            (false, Ok(record)) => record,
            (true, Ok(_)) => {
                return Err(ServiceError::invalid("uid", "El campo UID es obligatorio"))
            }
            (missing_uid, Err(mut errors)) => {
                errors.check(missing_uid, "uid", "El campo UID es obligatorio");
                return Err(errors.into());
            }
        };

        if self.users.get(&uid).await?.is_some() {
            return Err(ServiceError::invalid("uid", "El usuario ya existe"));
        }

        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);
        self.users.set(&uid, &record).await?;
        tracing::info!(uid = %uid, role = ?record.role, actor = %actor, "User created");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::UserCreated,
                "Nuevo usuario",
                &format!(
                    "El usuario \"{}\" ha sido creado como {}.",
                    record.display_name,
                    record.role.label()
                ),
                Some(&uid),
            )
            .await;

        Ok(Stored { id: uid, record })
    }

    pub async fn update(&self, uid: &str, form: &UserForm, actor: &str) -> ServiceResult<Stored<User>> {
        let existing = self.get(uid).await?;
        let mut record = form.validate()?;
        record.created_at = existing.record.created_at;
        record.updated_at = Some(Utc::now());

        self.users.set(uid, &record).await?;
        tracing::info!(uid = %uid, actor = %actor, "User updated");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::UserUpdated,
                "Usuario actualizado",
                &format!(
                    "El usuario \"{}\" ha sido actualizado exitosamente.",
                    record.display_name
                ),
                Some(uid),
            )
            .await;

        Ok(Stored {
            id: uid.to_string(),
            record,
        })
    }

    pub async fn delete(&self, uid: &str, actor: &str) -> ServiceResult<()> {
        let existing = self.get(uid).await?;
        self.users.delete(uid).await?;
        tracing::info!(uid = %uid, actor = %actor, "User deleted");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::UserDeleted,
                "Usuario eliminado",
                &format!(
                    "El usuario \"{}\" ha sido eliminado del sistema.",
                    existing.display_name
                ),
                Some(uid),
            )
            .await;

        Ok(())
    }
}
