use crate::traits::{BillingDatabase, BillingGatewayError};

/// Sequence feeding the customer-facing invoice numbers.
pub const CUSTOMER_INVOICE_SEQUENCE: &str = "customer_invoice";
/// Sequence feeding the supplier-side invoice numbers.
pub const SUPPLIER_INVOICE_SEQUENCE: &str = "supplier_invoice";

/// Thin API over the backend's atomic counter.
///
/// Every call to [`next`](Self::next) consumes a value: callers that crash between allocation and use leave a gap in
/// the sequence, which is acceptable. Reuse is not.
#[derive(Debug, Clone)]
pub struct SequenceApi<B> {
    db: B,
}

impl<B> SequenceApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> SequenceApi<B>
where B: BillingDatabase
{
    pub async fn next(&self, sequence_name: &str) -> Result<i64, BillingGatewayError> {
        self.db.allocate_sequence(sequence_name).await
    }
}
