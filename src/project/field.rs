//! Entity field descriptors
//!
//! Each [`FieldKind`] variant carries the input rules its form widget
//! enforces: numeric widgets only produce numbers, a select only produces
//! one of its options, a date picker only produces `YYYY-MM-DD`. Nothing
//! beyond that (no email format, no numeric ranges) is checked here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A declared field of a JSON-configured entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityField {
    /// Document key
    pub name: String,
    /// Human label shown in forms and tables
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl EntityField {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Widget type of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Email,
    Phone,
    Date,
    Select {
        #[serde(default)]
        options: Vec<String>,
    },
    Boolean,
    Currency,
    Rating,
    Url,
    Textarea,
    File,
    Color,
}

impl FieldKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Date => "date",
            FieldKind::Select { .. } => "select",
            FieldKind::Boolean => "boolean",
            FieldKind::Currency => "currency",
            FieldKind::Rating => "rating",
            FieldKind::Url => "url",
            FieldKind::Textarea => "textarea",
            FieldKind::File => "file",
            FieldKind::Color => "color",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldKind::Number | FieldKind::Currency | FieldKind::Rating
        )
    }

    /// Normalize a submitted value the way the field's widget would
    ///
    /// Blank values pass through untouched; required-ness is checked
    /// separately. Returns the error message for the field on rejection.
    pub fn coerce(&self, label: &str, value: &Value) -> Result<Value, String> {
        if is_blank(value) {
            return Ok(value.clone());
        }

        match self {
            FieldKind::Number | FieldKind::Currency | FieldKind::Rating => coerce_number(value)
                .ok_or_else(|| format!("El campo {} debe ser numérico", label)),
            FieldKind::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(format!("El campo {} debe ser verdadero o falso", label)),
            },
            FieldKind::Select { options } => match value {
                Value::String(s) if options.is_empty() || options.iter().any(|o| o == s) => {
                    Ok(value.clone())
                }
                _ => Err(format!("Opción inválida para {}", label)),
            },
            FieldKind::Date => match value {
                Value::String(s) if NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").is_ok() => {
                    Ok(Value::String(s.trim().to_string()))
                }
                _ => Err(format!("El campo {} debe ser una fecha (AAAA-MM-DD)", label)),
            },
            FieldKind::Text
            | FieldKind::Email
            | FieldKind::Phone
            | FieldKind::Url
            | FieldKind::Textarea
            | FieldKind::File
            | FieldKind::Color => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(format!("Valor inválido para {}", label)),
            },
        }
    }
}

/// Missing, `null`, blank string or empty array
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}
