//! Offices (consulting rooms)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::form::{required_text, text};
use super::notifications::NotificationType;
use super::{list_records, Listed, ServiceContext};
use crate::crud::listing::{compare_text, matches_search};
use crate::crud::{ListQuery, Page, ServiceError, ServiceResult, SortDirection, ValidationErrors};
use crate::store::{Collection, Record, Stored};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub is_open: bool,
    pub open_time: String,
    pub close_time: String,
}

impl DaySchedule {
    fn open(from: &str, to: &str) -> Self {
        Self {
            is_open: true,
            open_time: from.to_string(),
            close_time: to.to_string(),
        }
    }

    fn closed(from: &str, to: &str) -> Self {
        Self {
            is_open: false,
            ..Self::open(from, to)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub monday: DaySchedule,
    pub tuesday: DaySchedule,
    pub wednesday: DaySchedule,
    pub thursday: DaySchedule,
    pub friday: DaySchedule,
    pub saturday: DaySchedule,
    pub sunday: DaySchedule,
}

/// Weekdays 09:00-18:00, weekend closed
impl Default for WeeklySchedule {
    fn default() -> Self {
        let weekday = DaySchedule::open("09:00", "18:00");
        let weekend = DaySchedule::closed("09:00", "14:00");
        Self {
            monday: weekday.clone(),
            tuesday: weekday.clone(),
            wednesday: weekday.clone(),
            thursday: weekday.clone(),
            friday: weekday,
            saturday: weekend.clone(),
            sunday: weekend,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Office {
    pub name: String,
    pub address: String,
    pub capacity: u32,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub schedule: WeeklySchedule,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Office {
    const COLLECTION: &'static str = "offices";
}

impl Office {
    pub fn status_label(&self) -> &'static str {
        if self.is_active {
            "activo"
        } else {
            "inactivo"
        }
    }
}

/// Submitted office form; `equipment` is a comma-separated list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfficeForm {
    pub name: Option<String>,
    pub address: Option<String>,
    pub capacity: Option<f64>,
    pub equipment: Option<String>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

impl OfficeForm {
    pub fn validate(&self, actor: &str) -> Result<Office, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = required_text(&mut errors, "name", &self.name, "El campo Nombre es obligatorio");
        let address = required_text(
            &mut errors,
            "address",
            &self.address,
            "El campo Dirección es obligatorio",
        );

        let capacity = match self.capacity {
            None => {
                errors.add("capacity", "El campo Capacidad es obligatorio");
                0
            }
            Some(c) if c.is_finite() && c >= 1.0 => c as u32,
            Some(_) => {
                errors.add("capacity", "La capacidad debe ser un número mayor a 0");
                0
            }
        };

        errors.into_result()?;

        let equipment = text(&self.equipment)
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Office {
            name,
            address,
            capacity,
            equipment,
            schedule: WeeklySchedule::default(),
            is_active: self.is_active.unwrap_or(true),
            notes: text(&self.notes),
            created_by: actor.to_string(),
            created_at: None,
            updated_at: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeSort {
    Name,
    Address,
    Capacity,
    Status,
}

impl FromStr for OfficeSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(OfficeSort::Name),
            "address" => Ok(OfficeSort::Address),
            "capacity" => Ok(OfficeSort::Capacity),
            "status" => Ok(OfficeSort::Status),
            _ => Err(()),
        }
    }
}

impl Listed for Office {
    type SortKey = OfficeSort;

    const DEFAULT_SORT: OfficeSort = OfficeSort::Name;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Asc;

    fn matches(&self, needle: &str) -> bool {
        matches_search(
            needle,
            [
                self.name.clone(),
                self.address.clone(),
                self.capacity.to_string(),
                self.status_label().to_string(),
                self.equipment.join(", "),
            ],
        )
    }

    fn compare(&self, other: &Self, key: OfficeSort) -> Ordering {
        match key {
            OfficeSort::Name => compare_text(&self.name, &other.name),
            OfficeSort::Address => compare_text(&self.address, &other.address),
            OfficeSort::Capacity => self.capacity.cmp(&other.capacity),
            // Active offices first
            OfficeSort::Status => other.is_active.cmp(&self.is_active),
        }
    }
}

#[derive(Clone)]
pub struct OfficeService {
    ctx: ServiceContext,
    offices: Collection<Office>,
}

impl OfficeService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            offices: Collection::new(ctx.store.clone()),
            ctx,
        }
    }

    pub async fn all(&self) -> ServiceResult<Vec<Stored<Office>>> {
        Ok(self.offices.all().await?)
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<Office>>> {
        Ok(list_records(self.all().await?, query, self.ctx.page_size))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Stored<Office>> {
        Ok(self.offices.require(id).await?)
    }

    pub async fn create(&self, form: &OfficeForm, actor: &str) -> ServiceResult<Stored<Office>> {
        let mut record = form.validate(actor)?;
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);

        let id = self.offices.create(&record).await?;
        tracing::info!(id = %id, actor = %actor, "Office created");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::OfficeCreated,
                "Nuevo consultorio registrado",
                &format!(
                    "El consultorio \"{}\" ha sido registrado exitosamente.",
                    record.name
                ),
                Some(&id),
            )
            .await;

        Ok(Stored { id, record })
    }

    /// Overwrite an office; its weekly schedule is kept
    pub async fn update(
        &self,
        id: &str,
        form: &OfficeForm,
        actor: &str,
    ) -> ServiceResult<Stored<Office>> {
        let existing = self.get(id).await?;
        let mut record = form.validate(actor)?;
        record.schedule = existing.record.schedule;
        record.created_at = existing.record.created_at;
        record.updated_at = Some(Utc::now());

        self.offices.set(id, &record).await?;
        tracing::info!(id = %id, actor = %actor, "Office updated");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::OfficeUpdated,
                "Consultorio actualizado",
                &format!(
                    "El consultorio \"{}\" ha sido actualizado exitosamente.",
                    record.name
                ),
                Some(id),
            )
            .await;

        Ok(Stored {
            id: id.to_string(),
            record,
        })
    }

    pub async fn delete(&self, id: &str, actor: &str) -> ServiceResult<()> {
        let existing = self.get(id).await?;
        if !self.offices.delete(id).await? {
            return Err(ServiceError::not_found(Office::COLLECTION, id));
        }
        tracing::info!(id = %id, actor = %actor, "Office deleted");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::OfficeDeleted,
                "Consultorio eliminado",
                &format!(
                    "El consultorio \"{}\" ha sido eliminado del sistema.",
                    existing.name
                ),
                Some(id),
            )
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn form(value: serde_json::Value) -> OfficeForm {
        serde_json::from_value(value).unwrap()
    }

    fn service() -> OfficeService {
        OfficeService::new(ServiceContext::new(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn test_validate() {
        let errors = form(json!({"name": " ", "capacity": 0})).validate("u1").unwrap_err();
        assert_eq!(errors.get("name"), Some("El campo Nombre es obligatorio"));
        assert_eq!(errors.get("address"), Some("El campo Dirección es obligatorio"));
        assert_eq!(
            errors.get("capacity"),
            Some("La capacidad debe ser un número mayor a 0")
        );

        let errors = form(json!({"name": "A", "address": "B"})).validate("u1").unwrap_err();
        assert_eq!(errors.get("capacity"), Some("El campo Capacidad es obligatorio"));
    }

    #[test]
    fn test_equipment_and_default_schedule() {
        let office = form(json!({
            "name": "Sala 1",
            "address": "Av. Reforma 10",
            "capacity": 3,
            "equipment": "Diván, Escritorio, ,Sillas"
        }))
        .validate("u1")
        .unwrap();

        assert_eq!(office.equipment, vec!["Diván", "Escritorio", "Sillas"]);
        assert!(office.schedule.monday.is_open);
        assert_eq!(office.schedule.friday.close_time, "18:00");
        assert!(!office.schedule.sunday.is_open);
    }

    #[tokio::test]
    async fn test_search_by_status_word_and_sort() {
        let service = service();
        service
            .create(
                &form(json!({"name": "B", "address": "x", "capacity": 2, "isActive": false})),
                "u1",
            )
            .await
            .unwrap();
        service
            .create(&form(json!({"name": "a", "address": "y", "capacity": 9})), "u1")
            .await
            .unwrap();

        let page = service
            .list(&ListQuery {
                search: Some("inactivo".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].name, "B");

        let page = service.list(&ListQuery::default()).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a", "B"]);
    }

    #[tokio::test]
    async fn test_update_keeps_schedule() {
        let service = service();
        let created = service
            .create(&form(json!({"name": "A", "address": "x", "capacity": 2})), "u1")
            .await
            .unwrap();

        let mut stored = service.get(&created.id).await.unwrap();
        stored.record.schedule.saturday.is_open = true;
        service.offices.set(&created.id, &stored.record).await.unwrap();

        service
            .update(
                &created.id,
                &form(json!({"name": "A2", "address": "x", "capacity": 4})),
                "u1",
            )
            .await
            .unwrap();
        let updated = service.get(&created.id).await.unwrap();
        assert_eq!(updated.name, "A2");
        assert!(updated.schedule.saturday.is_open);
    }
}
