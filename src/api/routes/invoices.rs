//! Invoice extras
//!
//! - GET /api/v1/invoices/summary - Pending and paid totals
//! - GET /api/v1/invoices/next-number - Number the next invoice will get
//! - GET /api/v1/invoices/:id/payments - Payments of an invoice
//! - POST /api/v1/invoices/:id/payments - Register a payment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::actor::Actor;
use crate::api::dto::NextNumberResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::billing::{InvoiceSummary, Payment, PaymentForm, PaymentReceipt};
use crate::store::Stored;

const LOAD_ERROR: &str = "Error al cargar facturas";
const PAYMENT_ERROR: &str = "Error al registrar el pago";

pub async fn summary(State(state): State<Arc<AppState>>) -> ApiResult<Json<InvoiceSummary>> {
    let summary = state
        .invoices
        .summary()
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(summary))
}

pub async fn next_number(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<NextNumberResponse>> {
    let invoice_number = state
        .invoices
        .next_number()
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(NextNumberResponse { invoice_number }))
}

pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Stored<Payment>>>> {
    state
        .invoices
        .get(&id)
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    let payments = state
        .invoices
        .payments_for(&id)
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(payments))
}

/// POST /api/v1/invoices/:id/payments
///
/// Records the payment, marks the invoice paid and settles the linked
/// consultation as one saga.
pub async fn register_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
    Json(form): Json<PaymentForm>,
) -> ApiResult<(StatusCode, Json<PaymentReceipt>)> {
    let receipt = state
        .invoices
        .register_payment(&id, &form, actor.uid())
        .await
        .map_err(ApiError::service(PAYMENT_ERROR))?;

    tracing::info!(
        invoice = %receipt.invoice_number,
        payment = %receipt.payment.id,
        "Payment registered"
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}
