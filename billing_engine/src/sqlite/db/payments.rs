use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Invoice, NewPayment, Payment, PaymentId, PaymentStatus},
    traits::{BillingGatewayError, ClaimOutcome},
};

/// Inserts a payment delivered by an ingestion job.
pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, BillingGatewayError> {
    let id = payment.id.clone();
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (
                id,
                provider,
                amount,
                currency,
                status,
                transaction_id,
                intent_id,
                linked_registration_id,
                customer_email,
                settled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(payment.id)
    .bind(payment.provider.to_string())
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.status.to_string())
    .bind(payment.transaction_id)
    .bind(payment.intent_id)
    .bind(payment.linked_registration_id)
    .bind(payment.customer_email)
    .bind(payment.settled_at)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => BillingGatewayError::PaymentAlreadyExists(id),
        _ => BillingGatewayError::from(e),
    })?;
    Ok(payment)
}

pub async fn fetch_payment(id: &PaymentId, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(payment)
}

/// The idempotency guard. A single conditional update flips `invoice_created` from unset to set; whoever observes a
/// row change owns the commit pipeline for this payment.
pub async fn claim_payment(id: &PaymentId, conn: &mut SqliteConnection) -> Result<ClaimOutcome, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payments SET invoice_created = 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND invoice_created = 0",
    )
    .bind(id.as_str())
    .execute(conn)
    .await?;
    let outcome = if result.rows_affected() == 1 { ClaimOutcome::Claimed } else { ClaimOutcome::AlreadyClaimed };
    trace!("🗃️ Claim on payment [{id}]: {outcome:?}");
    Ok(outcome)
}

/// Reverses a claim after a failure that left nothing durable behind. Conditional on the payment still having no
/// invoice linkage, so a completed pipeline is never unflagged.
pub async fn release_claim(id: &PaymentId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payments SET invoice_created = 0, updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND invoice_id IS NULL",
    )
    .bind(id.as_str())
    .execute(conn)
    .await?;
    debug!("🗃️ Released claim on payment [{id}] ({} row(s))", result.rows_affected());
    Ok(())
}

/// Settled payments that have not been invoiced yet, oldest first.
pub async fn fetch_unprocessed(
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        "SELECT * FROM payments WHERE status = 'Settled' AND invoice_id IS NULL AND invoice_created = 0",
    );
    if let Some(since) = since {
        builder.push(" AND settled_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = until {
        builder.push(" AND settled_at <= ");
        builder.push_bind(until);
    }
    builder.push(" ORDER BY settled_at ASC LIMIT ");
    builder.push_bind(limit);
    trace!("🗃️ Executing query: {}", builder.sql());
    let payments = builder.build_query_as::<Payment>().fetch_all(conn).await?;
    Ok(payments)
}

/// Writes the invoice linkage onto the payment row. Runs as the final pipeline step and is safe to repeat.
pub async fn set_invoice_linkage(invoice: &Invoice, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE payments SET
                invoice_created = 1,
                invoice_id = $2,
                customer_invoice_number = $3,
                supplier_invoice_number = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
        "#,
    )
    .bind(invoice.payment_id.as_str())
    .bind(invoice.id)
    .bind(&invoice.customer_invoice_number)
    .bind(&invoice.supplier_invoice_number)
    .execute(conn)
    .await?;
    Ok(())
}

/// Marks a payment settled. Ingestion-boundary helper.
pub async fn mark_settled(id: &PaymentId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payments SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(id.as_str())
        .bind(PaymentStatus::Settled.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
