use log::{debug, warn};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{Invoice, NewInvoice, PaymentId},
    traits::BillingGatewayError,
};

/// Inserts the invoice, with the partial unique index on `payment_id` as the arbiter between concurrent runs.
///
/// If another run already persisted a live invoice for the same payment, that row is returned with `false` and the
/// caller's freshly allocated numbers are abandoned as gaps.
pub async fn insert_invoice(
    invoice: NewInvoice,
    conn: &mut SqliteConnection,
) -> Result<(Invoice, bool), BillingGatewayError> {
    let payment_id = invoice.payment_id.clone();
    let inserted = sqlx::query_as::<_, Invoice>(
        r#"
            INSERT INTO invoices (
                customer_invoice_number,
                supplier_invoice_number,
                payment_id,
                registration_id,
                line_items,
                resolution_gaps,
                subtotal,
                processing_fee,
                tax_included,
                total
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(&invoice.customer_invoice_number)
    .bind(&invoice.supplier_invoice_number)
    .bind(invoice.payment_id)
    .bind(invoice.registration_id)
    .bind(Json(invoice.line_items))
    .bind(Json(invoice.resolution_gaps))
    .bind(invoice.subtotal)
    .bind(invoice.processing_fee)
    .bind(invoice.tax_included)
    .bind(invoice.total)
    .fetch_one(&mut *conn)
    .await;
    match inserted {
        Ok(invoice) => {
            debug!("🗃️ Invoice {} persisted with id {}", invoice.customer_invoice_number, invoice.id);
            Ok((invoice, true))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            match fetch_live_invoice_for_payment(&payment_id, conn).await? {
                Some(existing) => {
                    warn!(
                        "🗃️ Lost the invoice insert race for payment [{payment_id}]. Using existing invoice {}; \
                         numbers {} / {} become sequence gaps",
                        existing.customer_invoice_number,
                        invoice.customer_invoice_number,
                        invoice.supplier_invoice_number
                    );
                    Ok((existing, false))
                },
                None => Err(BillingGatewayError::DatabaseError(format!(
                    "Unique constraint violation inserting invoice for payment {payment_id}, but no live invoice \
                     exists: {e}"
                ))),
            }
        },
        Err(e) => Err(e.into()),
    }
}

/// The live (non-void) invoice for the payment, if one exists.
pub async fn fetch_live_invoice_for_payment(
    payment_id: &PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    let invoice = sqlx::query_as("SELECT * FROM invoices WHERE payment_id = $1 AND status = 'Created'")
        .bind(payment_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(invoice)
}

pub async fn fetch_invoice(invoice_id: i64, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    let invoice =
        sqlx::query_as("SELECT * FROM invoices WHERE id = $1").bind(invoice_id).fetch_optional(conn).await?;
    Ok(invoice)
}

/// Transitions an invoice to `Voided`. The update is conditional on the current status so a double void is reported
/// rather than silently repeated.
pub async fn void_invoice(
    invoice_id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Invoice, BillingGatewayError> {
    let result: Option<Invoice> = sqlx::query_as(
        "UPDATE invoices SET status = 'Voided', void_reason = $2 WHERE id = $1 AND status = 'Created' RETURNING *",
    )
    .bind(invoice_id)
    .bind(reason)
    .fetch_optional(&mut *conn)
    .await?;
    match result {
        Some(invoice) => Ok(invoice),
        None => match fetch_invoice(invoice_id, conn).await? {
            Some(_) => Err(BillingGatewayError::InvoiceAlreadyVoided(invoice_id)),
            None => Err(BillingGatewayError::InvoiceNotFound(invoice_id)),
        },
    }
}
