use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        Attendee,
        EventTicket,
        Invoice,
        LedgerTransaction,
        NewInvoice,
        NewLedgerTransaction,
        Payment,
        PaymentId,
        Registration,
        RegistrationId,
        Ticket,
    },
    traits::ClaimOutcome,
};

/// The storage contract the billing engine runs against.
///
/// Two operations must be genuinely atomic in the backend: [`claim_payment`](Self::claim_payment) (a single
/// conditional update of the payment's own row) and [`allocate_sequence`](Self::allocate_sequence) (a single
/// increment-and-read per sequence name). Everything else is plain reads and idempotent writes; no multi-record
/// transaction is assumed anywhere.
#[allow(async_fn_in_trait)]
pub trait BillingDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //------------------------------------ payments & registrations ------------------------------------------------

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, BillingGatewayError>;

    async fn fetch_registration(&self, id: &RegistrationId) -> Result<Option<Registration>, BillingGatewayError>;

    /// Coarse candidate pre-filter for the matcher: indexed equality lookups of the payment's identifiers across the
    /// registration provider-reference columns, the confirmation number, and the metadata cross-reference. The fine
    /// ranking happens in [`crate::matching::match_payment`], in memory.
    async fn fetch_candidate_registrations(&self, payment: &Payment) -> Result<Vec<Registration>, BillingGatewayError>;

    /// Settled payments with no live invoice linkage, oldest first, for batch processing.
    async fn fetch_unprocessed_payments(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Payment>, BillingGatewayError>;

    //------------------------------------ idempotency guard -------------------------------------------------------

    /// Atomically test-and-set the payment's `invoice_created` flag. This is the sole serialization point for a
    /// payment and must be a single conditional update against the payment's own row.
    async fn claim_payment(&self, id: &PaymentId) -> Result<ClaimOutcome, BillingGatewayError>;

    /// Release a claim taken by [`claim_payment`](Self::claim_payment) when the pipeline failed before anything
    /// durable was written. Conditional on no invoice linkage existing, so a completed run is never un-flagged.
    async fn release_claim(&self, id: &PaymentId) -> Result<(), BillingGatewayError>;

    //------------------------------------ counter service ---------------------------------------------------------

    /// Increment-and-read the named sequence in one atomic operation. Every call returns a value that has never been
    /// returned before for that name; values only increase. Fails closed: an error means no value was observed and
    /// none was consumed durably on behalf of this caller.
    async fn allocate_sequence(&self, name: &str) -> Result<i64, BillingGatewayError>;

    //------------------------------------ ownership reads ---------------------------------------------------------

    async fn fetch_attendees(&self, registration_id: &RegistrationId) -> Result<Vec<Attendee>, BillingGatewayError>;

    async fn fetch_tickets(&self, registration_id: &RegistrationId) -> Result<Vec<Ticket>, BillingGatewayError>;

    /// Catalog rows for the given catalog ids. Prices here are authoritative.
    async fn fetch_event_tickets(&self, ids: &[String]) -> Result<Vec<EventTicket>, BillingGatewayError>;

    //------------------------------------ invoice persistence -----------------------------------------------------

    /// Insert the invoice. At most one non-void invoice may exist per payment; when a concurrent run won that race,
    /// the existing row is returned with `false` and the caller's allocated numbers become gaps.
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<(Invoice, bool), BillingGatewayError>;

    /// The live (non-void) invoice for the payment, if any.
    async fn fetch_invoice_for_payment(&self, id: &PaymentId) -> Result<Option<Invoice>, BillingGatewayError>;

    async fn fetch_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, BillingGatewayError>;

    /// Write the ledger rows for an invoice. Idempotent: if rows already exist for the invoice they are returned
    /// unchanged, so a resumed run cannot double-book.
    async fn insert_ledger_transactions(
        &self,
        invoice_id: i64,
        rows: &[NewLedgerTransaction],
    ) -> Result<Vec<i64>, BillingGatewayError>;

    async fn fetch_transaction_ids(&self, invoice_id: i64) -> Result<Vec<i64>, BillingGatewayError>;

    async fn fetch_ledger_transactions(
        &self,
        invoice_id: i64,
    ) -> Result<Vec<LedgerTransaction>, BillingGatewayError>;

    /// Transition an invoice to `Voided`, recording the operator's authorisation. Errors if already voided.
    async fn void_invoice(&self, invoice_id: i64, reason: &str) -> Result<Invoice, BillingGatewayError>;

    /// Write the invoice linkage onto the payment and registration rows. Runs last in the pipeline and is safe to
    /// repeat.
    async fn update_source_records(&self, invoice: &Invoice) -> Result<(), BillingGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), BillingGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BillingGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Cannot insert payment, since it already exists with id {0}")]
    PaymentAlreadyExists(PaymentId),
    #[error("Cannot insert registration, since it already exists with id {0}")]
    RegistrationAlreadyExists(RegistrationId),
    #[error("The requested registration {0} does not exist")]
    RegistrationNotFound(RegistrationId),
    #[error("The requested invoice (internal id {0}) does not exist")]
    InvoiceNotFound(i64),
    #[error("Invoice {0} is already voided")]
    InvoiceAlreadyVoided(i64),
    #[error("Sequence allocation for '{0}' failed: {1}")]
    AllocationFailure(String, String),
}

impl From<sqlx::Error> for BillingGatewayError {
    fn from(e: sqlx::Error) -> Self {
        BillingGatewayError::DatabaseError(e.to_string())
    }
}
