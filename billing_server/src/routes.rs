//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into a separate module.
//! Keep this module neat and tidy 🙏
//!
//! Handlers hold no state of their own: the [`InvoiceFlowApi`] and [`ServerConfig`] arrive via `web::Data`, and all
//! long-running work is awaited so worker threads are never blocked.
use actix_web::{get, post, web, HttpResponse, Responder};
use billing_engine::{db_types::PaymentId, InvoiceFlowApi, SqliteDatabase};
use log::*;

use crate::{
    config::ServerConfig,
    data_objects::{BatchRequest, BatchResponse, InvoiceRequest, InvoiceResponse},
    errors::ServerError,
};

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Generate (or return) the invoice for one payment.
#[post("/api/invoices/generate")]
pub async fn generate_invoice(
    req: web::Json<InvoiceRequest>,
    api: web::Data<InvoiceFlowApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let request = req.into_inner();
    if request.options.regenerate && !config.allow_regenerate {
        return Err(ServerError::RegenerateDisabled);
    }
    let payment_id = PaymentId::from(request.payment_id);
    debug!("💻️ Invoice generation requested for payment [{payment_id}]");
    let result = api.generate_invoice(&payment_id, &request.options).await?;
    Ok(HttpResponse::Ok().json(InvoiceResponse::from(result)))
}

/// Run the single-payment flow over every unprocessed settled payment in a window.
#[post("/api/invoices/batch")]
pub async fn batch_generate(
    req: web::Json<BatchRequest>,
    api: web::Data<InvoiceFlowApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let request = req.into_inner();
    let limit = request.limit.unwrap_or(config.default_batch_limit);
    debug!("💻️ Batch invoicing requested (limit {limit})");
    let summary = api.process_unprocessed_payments(request.since, request.until, limit).await?;
    Ok(HttpResponse::Ok().json(BatchResponse { success: true, summary }))
}
