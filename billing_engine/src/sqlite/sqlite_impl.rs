//! `SqliteDatabase` is the concrete SQLite backend for the billing engine.
//!
//! It implements [`BillingDatabase`] on top of the low-level query modules in [`super::db`]. The two operations the
//! engine requires to be atomic (the payment claim and the counter allocation) are single statements here, so the
//! guarantee holds for any number of pool connections.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::debug;
use rbg_common::Cents;
use sqlx::SqlitePool;

use super::db::{counters, db_url, invoices, new_pool, payments, registrations, tickets, transactions};
use crate::{
    db_types::{
        Attendee,
        EventTicket,
        Invoice,
        LedgerTransaction,
        NewAttendee,
        NewInvoice,
        NewLedgerTransaction,
        NewPayment,
        NewRegistration,
        NewTicket,
        Payment,
        PaymentId,
        Registration,
        RegistrationId,
        Ticket,
    },
    traits::{BillingDatabase, BillingGatewayError, ClaimOutcome},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the URL from the environment (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    //------------------------------------ ingestion boundary ------------------------------------------------------
    // The sync jobs that pull provider data sit outside the engine; these methods are the surface they (and the test
    // fixtures) write through.

    pub async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::insert_payment(payment, &mut conn).await?;
        debug!("🗃️ Payment [{}] ingested from {}", payment.id, payment.provider);
        Ok(payment)
    }

    pub async fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> Result<Registration, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let registration = registrations::insert_registration(registration, &mut conn).await?;
        debug!("🗃️ Registration [{}] ingested ({})", registration.id, registration.confirmation_number);
        Ok(registration)
    }

    pub async fn insert_attendee(&self, attendee: NewAttendee) -> Result<Attendee, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tickets::insert_attendee(attendee, &mut conn).await?)
    }

    pub async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tickets::insert_ticket(ticket, &mut conn).await?)
    }

    pub async fn upsert_event_ticket(
        &self,
        id: &str,
        name: &str,
        price: Cents,
    ) -> Result<EventTicket, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tickets::upsert_event_ticket(id, name, price, &mut conn).await?)
    }
}

impl BillingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(id, &mut conn).await?)
    }

    async fn fetch_registration(&self, id: &RegistrationId) -> Result<Option<Registration>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(registrations::fetch_registration(id, &mut conn).await?)
    }

    async fn fetch_candidate_registrations(
        &self,
        payment: &Payment,
    ) -> Result<Vec<Registration>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(registrations::candidate_registrations(payment, &mut conn).await?)
    }

    async fn fetch_unprocessed_payments(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Payment>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_unprocessed(since, until, limit, &mut conn).await?)
    }

    async fn claim_payment(&self, id: &PaymentId) -> Result<ClaimOutcome, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::claim_payment(id, &mut conn).await?)
    }

    async fn release_claim(&self, id: &PaymentId) -> Result<(), BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::release_claim(id, &mut conn).await?)
    }

    async fn allocate_sequence(&self, name: &str) -> Result<i64, BillingGatewayError> {
        // Fail closed: any error here aborts the commit before an invoice is written.
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| BillingGatewayError::AllocationFailure(name.to_string(), e.to_string()))?;
        counters::allocate(name, &mut conn)
            .await
            .map_err(|e| BillingGatewayError::AllocationFailure(name.to_string(), e.to_string()))
    }

    async fn fetch_attendees(&self, registration_id: &RegistrationId) -> Result<Vec<Attendee>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tickets::fetch_attendees(registration_id, &mut conn).await?)
    }

    async fn fetch_tickets(&self, registration_id: &RegistrationId) -> Result<Vec<Ticket>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tickets::fetch_tickets(registration_id, &mut conn).await?)
    }

    async fn fetch_event_tickets(&self, ids: &[String]) -> Result<Vec<EventTicket>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(tickets::fetch_event_tickets(ids, &mut conn).await?)
    }

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<(Invoice, bool), BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        invoices::insert_invoice(invoice, &mut conn).await
    }

    async fn fetch_invoice_for_payment(&self, id: &PaymentId) -> Result<Option<Invoice>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_live_invoice_for_payment(id, &mut conn).await?)
    }

    async fn fetch_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoice(invoice_id, &mut conn).await?)
    }

    async fn insert_ledger_transactions(
        &self,
        invoice_id: i64,
        rows: &[NewLedgerTransaction],
    ) -> Result<Vec<i64>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::insert_for_invoice(invoice_id, rows, &mut conn).await?)
    }

    async fn fetch_transaction_ids(&self, invoice_id: i64) -> Result<Vec<i64>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::ids_for_invoice(invoice_id, &mut conn).await?)
    }

    async fn fetch_ledger_transactions(
        &self,
        invoice_id: i64,
    ) -> Result<Vec<LedgerTransaction>, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_for_invoice(invoice_id, &mut conn).await?)
    }

    async fn void_invoice(&self, invoice_id: i64, reason: &str) -> Result<Invoice, BillingGatewayError> {
        let mut conn = self.pool.acquire().await?;
        invoices::void_invoice(invoice_id, reason, &mut conn).await
    }

    async fn update_source_records(&self, invoice: &Invoice) -> Result<(), BillingGatewayError> {
        // Both updates are individually idempotent; the transaction just saves a round trip.
        let mut tx = self.pool.begin().await?;
        payments::set_invoice_linkage(invoice, &mut tx).await?;
        registrations::set_invoice_linkage(invoice, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Source records for payment [{}] / registration [{}] linked to invoice {}",
            invoice.payment_id, invoice.registration_id, invoice.customer_invoice_number
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BillingGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}
