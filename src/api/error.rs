//! API Error Types
//!
//! Every failure becomes a JSON body `{error: {code, message, fields?},
//! request_id}`. The `message` is a fixed Spanish string meant for end
//! users; the underlying cause is only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::crud::{ServiceError, ValidationErrors};

const GENERIC_MESSAGE: &str = "Error interno del servidor";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Field-level validation failed
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Malformed request; the message is shown to the user as-is
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No acting user on a route that needs one
    #[error("Missing x-user-id header")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything else; `message` is shown, `detail` only logged
    #[error("{message}: {detail}")]
    Internal { message: &'static str, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Map a service failure, using `message` for unexpected errors
    ///
    /// ```rust,ignore
    /// state.invoices.create(&form, &actor).await.map_err(ApiError::service("Error al guardar factura"))?;
    /// ```
    pub fn service(message: &'static str) -> impl Fn(ServiceError) -> ApiError {
        move |err| match err {
            ServiceError::Validation(fields) => ApiError::Validation(fields),
            ServiceError::NotFound { collection, id } => {
                ApiError::NotFound(format!("{} {}", collection, id))
            }
            ServiceError::Reference(reason) => ApiError::BadRequest(reason),
            other => ApiError::Internal {
                message,
                detail: other.to_string(),
            },
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }

    /// Text shown to the end user
    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(_) => "Revisa los campos marcados".to_string(),
            ApiError::BadRequest(reason) => reason.clone(),
            ApiError::Unauthorized => "Usuario no autenticado".to_string(),
            ApiError::NotFound(_) => "Registro no encontrado".to_string(),
            ApiError::Internal { message, .. } => message.to_string(),
            ApiError::Io(_) => GENERIC_MESSAGE.to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::service(GENERIC_MESSAGE)(err)
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Field name → message, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let message = self.public_message();
        let fields = match self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                fields,
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_service_errors_map_to_statuses() {
        let map = ApiError::service("Error al guardar factura");

        let mut fields = ValidationErrors::new();
        fields.add("amount", "El monto debe ser mayor o igual a 0");
        let err = map(ServiceError::Validation(fields));
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"));

        let err = map(ServiceError::not_found("invoices", "i1"));
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Registro no encontrado");

        let err = map(ServiceError::Reference("Paciente no encontrado".into()));
        assert_eq!(err.public_message(), "Paciente no encontrado");

        let err = map(ServiceError::Store(StoreError::Unavailable("disk full".into())));
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Error al guardar factura");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_validation_body_carries_fields() {
        let mut fields = ValidationErrors::new();
        fields.add("name", "El campo Nombre es obligatorio");
        let response = ApiError::Validation(fields).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
