use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    billing_api::{
        assembler,
        errors::InvoiceFlowError,
        invoice_objects::FeeConfig,
        ownership_api::OwnershipApi,
        sequence_api::{CUSTOMER_INVOICE_SEQUENCE, SUPPLIER_INVOICE_SEQUENCE},
    },
    db_types::{Invoice, NewInvoice, NewLedgerTransaction, Payment, PaymentId, PaymentStatus},
    events::{EventProducers, InvoiceCreatedEvent, InvoiceVoidedEvent},
    helpers::NumberingScheme,
    matching::{match_payment, MatchOutcome},
    traits::{BatchSummary, BillingDatabase, ClaimOutcome, CommitStep, GenerateOptions, InvoiceResult},
};

/// `InvoiceFlowApi` is the commit coordinator: it takes a settled payment through matching, ownership resolution,
/// pricing, number allocation and persistence as one logically atomic, idempotent unit.
///
/// The payment's `invoice_created` flag is the sole idempotency boundary. After the flag is claimed, every step is
/// either re-runnable or arbitrated by a durable constraint, so an interrupted run is finished by simply invoking the
/// coordinator again with the same payment id. Invoice numbers are allocated before the invoice is written: a crash
/// in between wastes a number (an acceptable sequence gap) and can never file two invoices under one number.
pub struct InvoiceFlowApi<B> {
    db: B,
    producers: EventProducers,
    fees: FeeConfig,
    numbering: NumberingScheme,
}

impl<B> Debug for InvoiceFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceFlowApi")
    }
}

impl<B> InvoiceFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, fees: FeeConfig::default(), numbering: NumberingScheme::default() }
    }

    pub fn with_fee_config(mut self, fees: FeeConfig) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_numbering(mut self, numbering: NumberingScheme) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> InvoiceFlowApi<B>
where B: BillingDatabase
{
    /// Generate the invoice for a payment, exactly once.
    ///
    /// Re-invocation with the same payment id is always safe: a completed payment returns its existing invoice, and
    /// an interrupted one resumes from whatever durable state the previous attempt left behind.
    pub async fn generate_invoice(
        &self,
        payment_id: &PaymentId,
        options: &GenerateOptions,
    ) -> Result<InvoiceResult, InvoiceFlowError> {
        let payment = self
            .db
            .fetch_payment(payment_id)
            .await?
            .ok_or_else(|| InvoiceFlowError::PaymentNotFound(payment_id.clone()))?;
        if payment.status != PaymentStatus::Settled {
            return Err(InvoiceFlowError::PaymentNotBillable(payment_id.clone(), payment.status));
        }

        if options.regenerate {
            self.void_prior_invoice(&payment, options).await?;
        }

        match self.db.claim_payment(payment_id).await? {
            ClaimOutcome::Claimed => {
                debug!("🧾️ Payment [{payment_id}] claimed for invoicing");
                self.build_and_commit(payment, options).await
            },
            ClaimOutcome::AlreadyClaimed => self.short_circuit_or_resume(payment, options).await,
        }
    }

    /// Batch entry point: run the single-payment flow over every settled, un-invoiced payment in the window.
    pub async fn process_unprocessed_payments(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<BatchSummary, InvoiceFlowError> {
        let payments = self.db.fetch_unprocessed_payments(since, until, limit).await?;
        info!("🧾️ Batch invoicing {} payment(s)", payments.len());
        let options = GenerateOptions::default();
        let mut summary = BatchSummary::default();
        for payment in payments {
            match self.generate_invoice(&payment.id, &options).await {
                Ok(result) if result.newly_created => summary.succeeded += 1,
                Ok(_) => summary.already_invoiced += 1,
                Err(e @ InvoiceFlowError::AmbiguousMatch { .. }) => {
                    warn!("🧾️ {e}");
                    summary.ambiguous += 1;
                },
                Err(e) => {
                    warn!("🧾️ Invoicing payment [{}] failed: {e}", payment.id);
                    summary.failed += 1;
                },
            }
        }
        info!(
            "🧾️ Batch complete: {} new, {} already invoiced, {} ambiguous, {} failed",
            summary.succeeded, summary.already_invoiced, summary.ambiguous, summary.failed
        );
        Ok(summary)
    }

    /// The guard was already set. Either the payment is fully invoiced (return the existing reference), or a
    /// previous run was interrupted and this invocation finishes it from the last durable step.
    async fn short_circuit_or_resume(
        &self,
        payment: Payment,
        options: &GenerateOptions,
    ) -> Result<InvoiceResult, InvoiceFlowError> {
        // Refetch: the linkage may have landed after our first read.
        let payment = self
            .db
            .fetch_payment(&payment.id)
            .await?
            .ok_or_else(|| InvoiceFlowError::PaymentNotFound(payment.id.clone()))?;
        match self.db.fetch_invoice_for_payment(&payment.id).await? {
            Some(invoice) if payment.invoice_id == Some(invoice.id) => {
                debug!(
                    "🧾️ Payment [{}] is already invoiced as {}. Returning the existing invoice.",
                    payment.id, invoice.customer_invoice_number
                );
                let transaction_ids = self.db.fetch_transaction_ids(invoice.id).await?;
                Ok(invoice_result(invoice, transaction_ids, false))
            },
            Some(invoice) => {
                info!(
                    "🧾️ Payment [{}] has invoice {} but incomplete linkage. Resuming from {}.",
                    payment.id,
                    invoice.customer_invoice_number,
                    CommitStep::InvoicePersisted
                );
                self.finish_commit(invoice, options, false).await
            },
            None => {
                info!(
                    "🧾️ Payment [{}] was claimed but nothing durable was written. Re-running the pipeline.",
                    payment.id
                );
                self.build_and_commit(payment, options).await
            },
        }
    }

    /// The full pipeline, entered with the claim held: match, resolve, price, allocate, persist.
    async fn build_and_commit(
        &self,
        payment: Payment,
        options: &GenerateOptions,
    ) -> Result<InvoiceResult, InvoiceFlowError> {
        // Identity matching over coarsely pre-filtered candidates.
        let candidates = match self.db.fetch_candidate_registrations(&payment).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.abort_claim(&payment.id).await;
                return Err(e.into());
            },
        };
        let matched = match match_payment(&payment, &candidates) {
            MatchOutcome::Match(matched) => {
                debug!(
                    "🧾️ Payment [{}] matched registration [{}] via {} (confidence {}, {} = {})",
                    payment.id,
                    matched.registration_id,
                    matched.method,
                    matched.confidence,
                    matched.payment_field,
                    matched.registration_field
                );
                matched
            },
            MatchOutcome::Ambiguous(candidates) => {
                self.abort_claim(&payment.id).await;
                return Err(InvoiceFlowError::AmbiguousMatch { payment_id: payment.id, candidates });
            },
            MatchOutcome::NoMatch => {
                self.abort_claim(&payment.id).await;
                return Err(InvoiceFlowError::NoMatchFound(payment.id));
            },
        };

        // Ownership and pricing are recomputed fresh here, at commit time. Never from an earlier preview.
        let ownership = OwnershipApi::new(self.db.clone());
        let graph = match ownership.resolve(&matched.registration_id).await {
            Ok(graph) => graph,
            Err(e) => {
                self.abort_claim(&payment.id).await;
                return Err(e.into());
            },
        };
        let preview = assembler::assemble(&graph, &payment, &self.fees);

        // Numbers are allocated before the invoice document exists; a failure here aborts with nothing written.
        let customer_seq = match self.db.allocate_sequence(CUSTOMER_INVOICE_SEQUENCE).await {
            Ok(value) => value,
            Err(e) => {
                self.abort_claim(&payment.id).await;
                return Err(e.into());
            },
        };
        let supplier_seq = match self.db.allocate_sequence(SUPPLIER_INVOICE_SEQUENCE).await {
            Ok(value) => value,
            Err(e) => {
                self.abort_claim(&payment.id).await;
                return Err(e.into());
            },
        };
        let new_invoice = NewInvoice {
            customer_invoice_number: self.numbering.customer_number(customer_seq),
            supplier_invoice_number: self.numbering.supplier_number(supplier_seq),
            payment_id: payment.id.clone(),
            registration_id: matched.registration_id.clone(),
            line_items: preview.line_items,
            resolution_gaps: preview.resolution_gaps,
            subtotal: preview.subtotal,
            processing_fee: preview.processing_fee,
            tax_included: preview.tax_included,
            total: preview.total,
        };

        // The partial unique index on payment_id arbitrates concurrent runs; losing the race just wastes numbers.
        let (invoice, inserted) =
            self.db.insert_invoice(new_invoice).await.map_err(|e| InvoiceFlowError::PersistenceFailure {
                step: CommitStep::NumbersAllocated,
                detail: e.to_string(),
            })?;
        self.finish_commit(invoice, options, inserted).await
    }

    /// The commit tail, shared between fresh runs and resumed ones: ledger rows, source-record linkage, hooks.
    /// Every step in here is idempotent.
    async fn finish_commit(
        &self,
        invoice: Invoice,
        options: &GenerateOptions,
        newly_created: bool,
    ) -> Result<InvoiceResult, InvoiceFlowError> {
        let rows = ledger_rows(&invoice);
        let transaction_ids =
            self.db.insert_ledger_transactions(invoice.id, &rows).await.map_err(|e| {
                InvoiceFlowError::PersistenceFailure { step: CommitStep::InvoicePersisted, detail: e.to_string() }
            })?;

        self.db.update_source_records(&invoice).await.map_err(|e| InvoiceFlowError::PersistenceFailure {
            step: CommitStep::TransactionsPersisted,
            detail: e.to_string(),
        })?;

        self.call_invoice_created_hook(&invoice, options).await;
        info!(
            "🧾️ Invoice {} / {} committed for payment [{}] ({} ledger rows, total {})",
            invoice.customer_invoice_number,
            invoice.supplier_invoice_number,
            invoice.payment_id,
            transaction_ids.len(),
            invoice.total
        );
        Ok(invoice_result(invoice, transaction_ids, newly_created))
    }

    /// Voids the live invoice ahead of an authorised regeneration.
    async fn void_prior_invoice(
        &self,
        payment: &Payment,
        options: &GenerateOptions,
    ) -> Result<(), InvoiceFlowError> {
        let Some(prior) = self.db.fetch_invoice_for_payment(&payment.id).await? else {
            return Ok(());
        };
        let Some(reason) = options.void_authorization.as_deref() else {
            return Err(InvoiceFlowError::RegenerateNotAuthorized(payment.id.clone()));
        };
        let voided = self.db.void_invoice(prior.id, reason).await?;
        warn!(
            "🧾️ Invoice {} for payment [{}] voided for regeneration. Authorization: {reason}",
            voided.customer_invoice_number, payment.id
        );
        self.call_invoice_voided_hook(voided, reason).await;
        Ok(())
    }

    /// Best-effort release of the claim after a failure that wrote nothing durable. If the release itself fails the
    /// claim stays set, and the next invocation resumes instead; no state is lost either way.
    async fn abort_claim(&self, payment_id: &PaymentId) {
        if let Err(e) = self.db.release_claim(payment_id).await {
            warn!("🧾️ Could not release the claim on payment [{payment_id}]: {e}. A retry will resume instead.");
        }
    }

    async fn call_invoice_created_hook(&self, invoice: &Invoice, options: &GenerateOptions) {
        for producer in &self.producers.invoice_created_producer {
            debug!("🧾️ Notifying invoice-created subscribers");
            let event =
                InvoiceCreatedEvent::new(invoice.clone(), options.upload_artifact, options.send_notification);
            producer.publish_event(event).await;
        }
    }

    async fn call_invoice_voided_hook(&self, invoice: Invoice, reason: &str) {
        for producer in &self.producers.invoice_voided_producer {
            debug!("🧾️ Notifying invoice-voided subscribers");
            let event = InvoiceVoidedEvent::new(invoice.clone(), reason.to_string());
            producer.publish_event(event).await;
        }
    }
}

fn invoice_result(invoice: Invoice, transaction_ids: Vec<i64>, newly_created: bool) -> InvoiceResult {
    InvoiceResult {
        invoice_id: invoice.id,
        customer_invoice_number: invoice.customer_invoice_number,
        supplier_invoice_number: invoice.supplier_invoice_number,
        transaction_ids,
        newly_created,
    }
}

/// Flattens the invoice document into ledger rows, one per sub-item, tagged with the owning line item.
fn ledger_rows(invoice: &Invoice) -> Vec<NewLedgerTransaction> {
    invoice
        .line_items
        .0
        .iter()
        .flat_map(|owner| {
            owner.sub_items.iter().map(|item| NewLedgerTransaction {
                invoice_number: invoice.customer_invoice_number.clone(),
                owner: owner.description.clone(),
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                amount: item.amount,
            })
        })
        .collect()
}
