use billing_engine::traits::{BatchSummary, GenerateOptions, InvoiceResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceRequest {
    pub payment_id: String,
    #[serde(default)]
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub success: bool,
    /// The human-facing invoice number; the customer number by convention.
    pub invoice_number: String,
    pub customer_invoice_number: String,
    pub supplier_invoice_number: String,
    pub transaction_ids: Vec<i64>,
}

impl From<InvoiceResult> for InvoiceResponse {
    fn from(result: InvoiceResult) -> Self {
        Self {
            success: true,
            invoice_number: result.customer_invoice_number.clone(),
            customer_invoice_number: result.customer_invoice_number,
            supplier_invoice_number: result.supplier_invoice_number,
            transaction_ids: result.transaction_ids,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: BatchSummary,
}
