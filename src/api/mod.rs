//! ClinicDesk REST API
//!
//! HTTP API layer for ClinicDesk, built with Axum. Mutating routes need
//! the acting user's uid in the `x-user-id` header.
//!
//! # Endpoints
//!
//! ## Project
//! - `GET /api/v1/config` - Branding, menu and entity declarations
//!
//! ## Dynamic entities
//! - `GET|POST /api/v1/entities/:entity`
//! - `GET /api/v1/entities/:entity/blank`
//! - `GET /api/v1/entities/:entity/export`
//! - `GET|PUT|DELETE /api/v1/entities/:entity/:id`
//!
//! ## Clinic records
//! - `GET|POST /api/v1/{patients,offices,consultations,appointments,sessions,invoices}`
//! - `GET|PUT|DELETE /api/v1/{...}/:id`
//! - `GET /api/v1/consultations/calendar?day=YYYY-MM-DD`
//! - `GET /api/v1/consultations/summary`
//! - `GET /api/v1/invoices/summary`, `GET /api/v1/invoices/next-number`
//! - `GET|POST /api/v1/invoices/:id/payments`
//!
//! ## Users and notifications
//! - `GET|POST /api/v1/users`, `GET|PUT|DELETE /api/v1/users/:uid`
//! - `GET /api/v1/notifications`, `GET /api/v1/notifications/unread-count`
//! - `POST /api/v1/notifications/:id/read`, `POST /api/v1/notifications/read-all`
//!
//! ## Reports
//! - `GET /api/v1/reports`, `GET /api/v1/insights`, `GET /api/v1/dashboard`
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/v1/ws` - Real-time notifications
//!
//! # Example
//!
//! ```rust,ignore
//! use clinicdesk::api::{serve, AppState};
//! use clinicdesk::config::Config;
//! use clinicdesk::project::ProjectConfig;
//! use clinicdesk::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let state = AppState::configured(Arc::new(MemoryStore::new()), ProjectConfig::embedded()?, &config);
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use actor::{Actor, ACTOR_HEADER};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::billing::InvoiceService;
use crate::clinic::{
    AppointmentService, ConsultationService, OfficeService, PatientService, SessionService,
};
use crate::config::{ApiConfig, Config};
use crate::websocket::websocket_handler;
use routes::records::{self, RecordRoutes};

type ApiRouter = Router<Arc<AppState>>;

/// `base` and `base/:id` CRUD routes for one clinic record type
fn with_records<S: RecordRoutes>(router: ApiRouter, base: &str) -> ApiRouter {
    router
        .route(base, get(records::list::<S>).post(records::create::<S>))
        .route(
            &format!("{}/:id", base),
            get(records::get::<S>)
                .put(records::update::<S>)
                .delete(records::delete::<S>),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState, config: &ApiConfig) -> Router {
    let mut api_routes = Router::new()
        .route("/config", get(routes::config::get_config))
        // Dynamic entities
        .route(
            "/entities/:entity",
            get(routes::entities::list).post(routes::entities::create),
        )
        .route("/entities/:entity/blank", get(routes::entities::blank))
        .route("/entities/:entity/export", get(routes::entities::export))
        .route(
            "/entities/:entity/:id",
            get(routes::entities::get)
                .put(routes::entities::update)
                .delete(routes::entities::delete),
        )
        // Record extras
        .route("/consultations/calendar", get(routes::consultations::calendar))
        .route("/consultations/summary", get(routes::consultations::summary))
        .route("/invoices/summary", get(routes::invoices::summary))
        .route("/invoices/next-number", get(routes::invoices::next_number))
        .route(
            "/invoices/:id/payments",
            get(routes::invoices::list_payments).post(routes::invoices::register_payment),
        );

    api_routes = with_records::<PatientService>(api_routes, "/patients");
    api_routes = with_records::<OfficeService>(api_routes, "/offices");
    api_routes = with_records::<ConsultationService>(api_routes, "/consultations");
    api_routes = with_records::<AppointmentService>(api_routes, "/appointments");
    api_routes = with_records::<SessionService>(api_routes, "/sessions");
    api_routes = with_records::<InvoiceService>(api_routes, "/invoices");

    let api_routes = api_routes
        // Users
        .route("/users", get(routes::users::list).post(routes::users::create))
        .route(
            "/users/:uid",
            get(routes::users::get)
                .put(routes::users::update)
                .delete(routes::users::delete),
        )
        // Notifications
        .route("/notifications", get(routes::notifications::list))
        .route(
            "/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            post(routes::notifications::mark_read),
        )
        // Reports
        .route("/reports", get(routes::reports::report))
        .route("/insights", get(routes::reports::insights))
        .route("/dashboard", get(routes::reports::dashboard))
        // WebSocket route
        .route("/ws", get(websocket_handler));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &Config) -> Result<(), ApiError> {
    let router = build_router(state, &config.api);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("ClinicDesk API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("ClinicDesk API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectConfig;
    use crate::store::MemoryStore;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            ProjectConfig::embedded().unwrap(),
        );
        build_router(state, &ApiConfig::default())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(ACTOR_HEADER, "u1");
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = create_test_app();
        for uri in ["/health/live", "/health/ready", "/health"] {
            let response = send(&app, "GET", uri, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_config_lists_entities() {
        let app = create_test_app();
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/v1/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["projectName"], "ClinicDesk");
        assert_eq!(body["entities"][0]["name"], "suppliers");
        assert_eq!(body["menuItems"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_config_menu_for_unknown_user_hides_gated_items() {
        let app = create_test_app();
        let body = json_body(send(&app, "GET", "/api/v1/config", None).await).await;
        let paths: Vec<&str> = body["menuItems"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["/dashboard"]);
    }

    #[tokio::test]
    async fn test_mutation_requires_actor() {
        let app = create_test_app();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/offices")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name": "Consultorio 1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_office_crud_and_notification() {
        let app = create_test_app();

        let response = send(
            &app,
            "POST",
            "/api/v1/offices",
            Some(json!({"name": "Consultorio 1", "address": "Calle 1", "capacity": 2})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let page = json_body(send(&app, "GET", "/api/v1/offices?search=consul", None).await).await;
        assert_eq!(page["total_items"], 1);

        let count = json_body(send(&app, "GET", "/api/v1/notifications/unread-count", None).await).await;
        assert_eq!(count["count"], 1);

        let response = send(&app, "DELETE", &format!("/api/v1/offices/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "GET", &format!("/api/v1/offices/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let app = create_test_app();
        let response = send(&app, "POST", "/api/v1/offices", Some(json!({"capacity": 0}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["fields"]["name"], "El campo Nombre es obligatorio");
        assert_eq!(
            body["error"]["fields"]["capacity"],
            "La capacidad debe ser un número mayor a 0"
        );
    }

    #[tokio::test]
    async fn test_entity_routes() {
        let app = create_test_app();

        let blank = json_body(send(&app, "GET", "/api/v1/entities/suppliers/blank", None).await).await;
        assert!(blank.get("name").is_some());

        let response = send(
            &app,
            "POST",
            "/api/v1/entities/suppliers",
            Some(json!({"name": "Farmacia Sol", "category": "Insumos"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app, "POST", "/api/v1/entities/suppliers", Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, "GET", "/api/v1/entities/suppliers/export", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));

        let response = send(&app, "GET", "/api/v1/entities/unknown", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invoice_payment_flow() {
        let app = create_test_app();

        let response = send(
            &app,
            "POST",
            "/api/v1/invoices",
            Some(json!({
                "patientName": "Ana Pérez",
                "description": "Consulta inicial",
                "amount": 100.0,
                "issueDate": "2024-03-01",
                "dueDate": "2024-03-31"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let invoice = json_body(response).await;
        assert_eq!(invoice["invoiceNumber"], "FAC-1");
        let id = invoice["id"].as_str().unwrap().to_string();

        let next = json_body(send(&app, "GET", "/api/v1/invoices/next-number", None).await).await;
        assert_eq!(next["invoiceNumber"], "FAC-2");

        let uri = format!("/api/v1/invoices/{}/payments", id);
        let response = send(&app, "POST", &uri, Some(json!({"method": "card"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let paid = json_body(send(&app, "GET", &format!("/api/v1/invoices/{}", id), None).await).await;
        assert_eq!(paid["status"], "paid");

        let response = send(&app, "POST", &uri, Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let payments = json_body(send(&app, "GET", &uri, None).await).await;
        assert_eq!(payments.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_consultation_removes_its_invoice() {
        let app = create_test_app();

        let response = send(
            &app,
            "POST",
            "/api/v1/consultations",
            Some(json!({"patientName": "Ana Pérez", "date": "2024-03-05", "time": "10:00", "duration": 60})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let consultation_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            "POST",
            "/api/v1/invoices",
            Some(json!({
                "consultationId": consultation_id,
                "patientName": "Ana Pérez",
                "description": "Consulta inicial",
                "amount": 100.0,
                "issueDate": "2024-03-05",
                "dueDate": "2024-04-05"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let invoice_id = json_body(response).await["id"].as_str().unwrap().to_string();

        let consultation_uri = format!("/api/v1/consultations/{}", consultation_id);
        let linked = json_body(send(&app, "GET", &consultation_uri, None).await).await;
        assert_eq!(linked["invoiceId"], invoice_id.as_str());

        let response = send(&app, "DELETE", &consultation_uri, None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "GET", &format!("/api/v1/invoices/{}", invoice_id), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_calendar_rejects_bad_day() {
        let app = create_test_app();
        let response = send(&app, "GET", "/api/v1/consultations/calendar?day=05/03/2024", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, "GET", "/api/v1/consultations/calendar?day=2024-03-05", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_report_endpoints() {
        let app = create_test_app();
        for uri in ["/api/v1/reports", "/api/v1/insights", "/api/v1/dashboard"] {
            let response = send(&app, "GET", uri, None).await;
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
        let report = json_body(send(&app, "GET", "/api/v1/reports", None).await).await;
        assert_eq!(report["collectionRate"], 0.0);
    }
}
