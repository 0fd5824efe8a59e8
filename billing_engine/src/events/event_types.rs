use crate::db_types::Invoice;

/// Published after an invoice has been fully committed (ledger rows written, source records linked).
///
/// Document rendering, artifact storage and customer notification live outside the engine; subscribers receive the
/// request flags along with the invoice and act on them out of band.
#[derive(Debug, Clone)]
pub struct InvoiceCreatedEvent {
    pub invoice: Invoice,
    pub upload_artifact: bool,
    pub send_notification: bool,
}

impl InvoiceCreatedEvent {
    pub fn new(invoice: Invoice, upload_artifact: bool, send_notification: bool) -> Self {
        Self { invoice, upload_artifact, send_notification }
    }
}

/// Published when an operator voids an invoice as part of an authorised regeneration.
#[derive(Debug, Clone)]
pub struct InvoiceVoidedEvent {
    pub invoice: Invoice,
    pub reason: String,
}

impl InvoiceVoidedEvent {
    pub fn new(invoice: Invoice, reason: String) -> Self {
        Self { invoice, reason }
    }
}
