use std::fmt::Display;

use serde::{Deserialize, Serialize};

//--------------------------------------     CommitStep      ---------------------------------------------------------
/// The commit pipeline's durable checkpoints, in order. Failure reports carry the last step that completed so a
/// resumption pass knows where to pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CommitStep {
    Unprocessed,
    NumbersAllocated,
    InvoicePersisted,
    TransactionsPersisted,
    SourceRecordsUpdated,
}

impl Display for CommitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitStep::Unprocessed => write!(f, "unprocessed"),
            CommitStep::NumbersAllocated => write!(f, "numbers-allocated"),
            CommitStep::InvoicePersisted => write!(f, "invoice-persisted"),
            CommitStep::TransactionsPersisted => write!(f, "transactions-persisted"),
            CommitStep::SourceRecordsUpdated => write!(f, "source-records-updated"),
        }
    }
}

//--------------------------------------    ClaimOutcome     ---------------------------------------------------------
/// Result of the conditional test-and-set on a payment's `invoice_created` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The flag flipped from unset to set in this call. The caller owns the commit pipeline.
    Claimed,
    /// The flag was already set by an earlier (possibly interrupted) run.
    AlreadyClaimed,
}

//--------------------------------------   GenerateOptions   ---------------------------------------------------------
/// Caller-supplied options for a single invoice generation request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateOptions {
    /// Void the existing invoice and issue a new one. Requires `void_authorization`.
    #[serde(default)]
    pub regenerate: bool,
    /// Ask downstream hooks to render and store the document artifact.
    #[serde(default)]
    pub upload_artifact: bool,
    /// Ask downstream hooks to notify the customer.
    #[serde(default)]
    pub send_notification: bool,
    /// Operator authorisation recorded as the void reason when regenerating.
    #[serde(default)]
    pub void_authorization: Option<String>,
}

//--------------------------------------    InvoiceResult    ---------------------------------------------------------
/// The outcome of a successful generation call, whether it minted a new invoice or returned the existing one.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResult {
    pub invoice_id: i64,
    pub customer_invoice_number: String,
    pub supplier_invoice_number: String,
    pub transaction_ids: Vec<i64>,
    /// False when the idempotency guard short-circuited to an invoice minted by an earlier call.
    pub newly_created: bool,
}

//--------------------------------------     BatchSummary    ---------------------------------------------------------
/// Aggregate tallies for a batch run over unprocessed payments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: u64,
    pub already_invoiced: u64,
    pub ambiguous: u64,
    pub failed: u64,
}

impl BatchSummary {
    pub fn total(&self) -> u64 {
        self.succeeded + self.already_invoiced + self.ambiguous + self.failed
    }
}
