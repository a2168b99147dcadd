//! Config-driven CRUD over one JSON-declared entity
//!
//! An [`EntityEngine`] needs nothing but an [`EntityConfig`]: it derives the
//! blank form, table columns, required-field validation, search, sort,
//! pagination and CSV export from the declared schema.
//!
//! Validation here is limited to required fields plus the per-widget
//! coercion of [`FieldKind::coerce`](crate::project::FieldKind::coerce).
//! The clinic services apply their own, stricter rules.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use super::listing::{
    compare_values, matches_search, paginate, search_text, ListQuery, Page, SortDirection,
    DEFAULT_PAGE_SIZE,
};
use super::validation::ValidationErrors;
use crate::project::{is_blank, EntityConfig, EntityField};
use crate::store::{Document, DocumentStore, Fields};

/// Generic CRUD for a dynamic entity
#[derive(Clone)]
pub struct EntityEngine {
    store: Arc<dyn DocumentStore>,
    entity: EntityConfig,
    page_size: usize,
}

impl EntityEngine {
    pub fn new(store: Arc<dyn DocumentStore>, entity: EntityConfig) -> Self {
        Self {
            store,
            entity,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn entity(&self) -> &EntityConfig {
        &self.entity
    }

    pub fn collection(&self) -> &str {
        &self.entity.name
    }

    pub fn blank_record(&self) -> Fields {
        self.entity.blank_record()
    }

    pub fn table_columns(&self) -> &[EntityField] {
        self.entity.table_columns()
    }

    /// Every record of the entity's collection
    pub async fn load(&self) -> ServiceResult<Vec<Document>> {
        Ok(self.store.get_all(&self.entity.name).await?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Document> {
        self.store
            .get(&self.entity.name, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(&self.entity.name, id))
    }

    /// Required-field check, keyed by field name
    pub fn validate(&self, record: &Fields) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for field in self.entity.required_fields() {
            let missing = record.get(&field.name).map_or(true, is_blank);
            errors.check(
                missing,
                &field.name,
                format!("El campo {} es obligatorio", field.label),
            );
        }
        errors
    }

    /// Keep declared fields, coerce them per widget and check required ones
    pub fn prepare(&self, record: &Fields) -> Result<Fields, ValidationErrors> {
        let mut errors = self.validate(record);
        let mut prepared = Fields::new();

        for field in &self.entity.schema {
            let value = match record.get(&field.name) {
                Some(value) => value,
                None => continue,
            };
            match field.kind.coerce(&field.label, value) {
                Ok(coerced) => {
                    prepared.insert(field.name.clone(), coerced);
                }
                Err(message) => errors.add(&field.name, message),
            }
        }

        errors.into_result().map(|()| prepared)
    }

    /// Create a record, or overwrite the record with the given id
    ///
    /// The stored document holds the declared fields plus `createdBy`
    /// (the acting user), `createdAt` and `updatedAt`.
    pub async fn save(
        &self,
        id: Option<&str>,
        record: Fields,
        actor: &str,
    ) -> ServiceResult<Document> {
        let mut fields = self.prepare(&record)?;
        let now = Value::String(Utc::now().to_rfc3339());
        fields.insert("createdBy".to_string(), Value::String(actor.to_string()));
        fields.insert("updatedAt".to_string(), now.clone());

        let collection = self.entity.name.as_str();
        let id = match id {
            Some(id) => {
                let existing = self.get(id).await?;
                let created_at = existing.get("createdAt").cloned().unwrap_or(now);
                fields.insert("createdAt".to_string(), created_at);
                self.store.set(collection, id, fields.clone()).await?;
                tracing::info!(entity = %collection, id = %id, actor = %actor, "Record updated");
                id.to_string()
            }
            None => {
                fields.insert("createdAt".to_string(), now);
                let id = self.store.create(collection, fields.clone()).await?;
                tracing::info!(entity = %collection, id = %id, actor = %actor, "Record created");
                id
            }
        };

        Ok(Document::new(id, fields))
    }

    /// Delete a record; no referential check is made
    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        if !self.store.delete(&self.entity.name, id).await? {
            return Err(ServiceError::not_found(&self.entity.name, id));
        }
        tracing::info!(entity = %self.entity.name, id = %id, "Record deleted");
        Ok(())
    }

    /// Case-insensitive substring match over every declared field
    pub fn matches(&self, record: &Document, needle: &str) -> bool {
        matches_search(
            needle,
            self.entity
                .schema
                .iter()
                .filter_map(|f| record.get(&f.name).and_then(search_text)),
        )
    }

    /// Search, sort and paginate
    ///
    /// An unknown sort key leaves the collection order untouched.
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Document>> {
        let mut records = self.load().await?;

        if let Some(needle) = query.search_term() {
            records.retain(|r| self.matches(r, &needle));
        }

        if let Some(key) = query.sort.as_deref() {
            if self.entity.field(key).is_some() {
                let direction = query.direction_or(SortDirection::Asc);
                records.sort_by(|a, b| direction.apply(compare_values(a.get(key), b.get(key))));
            }
        }

        Ok(paginate(records, query.page(), self.page_size))
    }

    /// Every record as CSV: `id` followed by the declared fields
    pub async fn export_csv(&self) -> ServiceResult<String> {
        let records = self.load().await?;
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["id"];
        header.extend(self.entity.schema.iter().map(|f| f.name.as_str()));
        writer.write_record(&header)?;

        for record in &records {
            let mut row = vec![record.id.clone()];
            row.extend(
                self.entity
                    .schema
                    .iter()
                    .map(|f| record.get(&f.name).and_then(search_text).unwrap_or_default()),
            );
            writer.write_record(&row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ServiceError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ServiceError::Export(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::FieldKind;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn suppliers() -> EntityConfig {
        EntityConfig::new(
            "suppliers",
            "Proveedores",
            vec![
                EntityField::new("name", "Nombre", FieldKind::Text).required(),
                EntityField::new("email", "Email", FieldKind::Email),
                EntityField::new(
                    "category",
                    "Categoría",
                    FieldKind::Select {
                        options: vec!["Insumos".to_string(), "Servicios".to_string()],
                    },
                )
                .required(),
                EntityField::new("rating", "Valoración", FieldKind::Rating),
            ],
        )
    }

    fn engine() -> EntityEngine {
        EntityEngine::new(Arc::new(MemoryStore::new()), suppliers())
    }

    fn record(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_validate_keys_errors_by_field() {
        let engine = engine();
        let errors = engine.validate(&record(json!({"name": "", "email": "a@b.c"})));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("name"), Some("El campo Nombre es obligatorio"));
        assert_eq!(
            errors.get("category"),
            Some("El campo Categoría es obligatorio")
        );
    }

    #[test]
    fn test_validate_ignores_formats() {
        let engine = engine();
        let errors = engine.validate(&record(
            json!({"name": "Acme", "category": "Insumos", "email": "not-an-email"}),
        ));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_prepare_coerces_and_drops_unknown() {
        let engine = engine();
        let prepared = engine
            .prepare(&record(json!({
                "name": "Acme",
                "category": "Insumos",
                "rating": "4",
                "extra": "ignored"
            })))
            .unwrap();

        assert_eq!(prepared.get("rating"), Some(&json!(4)));
        assert!(prepared.get("extra").is_none());

        let errors = engine
            .prepare(&record(json!({"name": "Acme", "category": "Otro"})))
            .unwrap_err();
        assert!(errors.contains("category"));
    }

    #[tokio::test]
    async fn test_save_create_then_overwrite() {
        let engine = engine();
        let created = engine
            .save(
                None,
                record(json!({"name": "Acme", "category": "Insumos", "email": "x@y.z"})),
                "u1",
            )
            .await
            .unwrap();
        assert_eq!(created.get_str("createdBy"), Some("u1"));

        let updated = engine
            .save(
                Some(&created.id),
                record(json!({"name": "Acme SA", "category": "Servicios"})),
                "u2",
            )
            .await
            .unwrap();

        let stored = engine.get(&created.id).await.unwrap();
        assert_eq!(stored.get_str("name"), Some("Acme SA"));
        assert!(stored.get("email").is_none());
        assert_eq!(stored.get_str("createdBy"), Some("u2"));
        assert_eq!(stored.get("createdAt"), created.get("createdAt"));
        assert_eq!(updated.id, created.id);
    }

    #[tokio::test]
    async fn test_save_unknown_id_is_not_found() {
        let engine = engine();
        let err = engine
            .save(
                Some("missing"),
                record(json!({"name": "Acme", "category": "Insumos"})),
                "u1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_save_rejects_missing_required() {
        let engine = engine();
        let err = engine
            .save(None, record(json!({"name": "Acme"})), "u1")
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert!(errors.contains("category")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(engine.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_search_sort_paginate() {
        let engine = engine();
        for n in 1..=12 {
            let name = if n % 2 == 0 {
                format!("Farmacia {n:02}")
            } else {
                format!("Taller {n:02}")
            };
            engine
                .save(
                    None,
                    record(json!({"name": name, "category": "Insumos", "rating": n})),
                    "u1",
                )
                .await
                .unwrap();
        }

        let page = engine
            .list(&ListQuery {
                page: Some(3),
                ..Default::default()
            })
            .await
            .unwrap();
        let ratings: Vec<i64> = page
            .items
            .iter()
            .map(|d| d.get("rating").and_then(Value::as_i64).unwrap())
            .collect();
        assert_eq!(ratings, vec![11, 12]);

        let page = engine
            .list(&ListQuery {
                search: Some("FARMACIA".to_string()),
                sort: Some("rating".to_string()),
                direction: Some(SortDirection::Desc),
                page: None,
            })
            .await
            .unwrap();
        assert_eq!(page.total_items, 6);
        assert_eq!(page.items[0].get_str("name"), Some("Farmacia 12"));
    }

    #[tokio::test]
    async fn test_remove_and_export() {
        let engine = engine();
        let doc = engine
            .save(
                None,
                record(json!({"name": "Acme, Inc", "category": "Insumos"})),
                "u1",
            )
            .await
            .unwrap();

        let csv = engine.export_csv().await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("id,name,email,category,rating"));
        assert_eq!(
            lines.next(),
            Some(format!("{},\"Acme, Inc\",,Insumos,", doc.id).as_str())
        );

        engine.remove(&doc.id).await.unwrap();
        assert!(matches!(
            engine.remove(&doc.id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
