use thiserror::Error;

use crate::{
    db_types::{PaymentId, PaymentStatus},
    matching::AmbiguousCandidate,
    traits::{BillingGatewayError, CommitStep},
};

#[derive(Debug, Clone, Error)]
pub enum InvoiceFlowError {
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Payment {0} has status {1} and cannot be invoiced")]
    PaymentNotBillable(PaymentId, PaymentStatus),
    #[error("No matching registration was found for payment {0}. Manual linkage is required.")]
    NoMatchFound(PaymentId),
    #[error(
        "Payment {payment_id} matched more than one registration with equal confidence: [{}]. Manual resolution is \
         required.",
        candidate_list(.candidates)
    )]
    AmbiguousMatch { payment_id: PaymentId, candidates: Vec<AmbiguousCandidate> },
    #[error("Regenerating the invoice for payment {0} requires explicit void authorization")]
    RegenerateNotAuthorized(PaymentId),
    #[error("Sequence allocation failed and the commit was aborted before any invoice was written. {0}")]
    AllocationFailure(String),
    #[error("Persistence failed. Last completed step: {step}. {detail}")]
    PersistenceFailure { step: CommitStep, detail: String },
    #[error("Backend error: {0}")]
    BackendError(String),
}

fn candidate_list(candidates: &[AmbiguousCandidate]) -> String {
    candidates
        .iter()
        .map(|c| format!("{} (confidence {})", c.registration_id, c.confidence))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<BillingGatewayError> for InvoiceFlowError {
    fn from(e: BillingGatewayError) -> Self {
        match e {
            BillingGatewayError::PaymentNotFound(id) => InvoiceFlowError::PaymentNotFound(id),
            BillingGatewayError::AllocationFailure(name, detail) => {
                InvoiceFlowError::AllocationFailure(format!("Sequence '{name}': {detail}"))
            },
            other => InvoiceFlowError::BackendError(other.to_string()),
        }
    }
}
