use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{LedgerTransaction, NewLedgerTransaction};

/// Writes the ledger rows for an invoice, one per invoice sub-item.
///
/// The rows derive deterministically from the immutable invoice document, so every run produces the same row `i` at
/// position `i`. Each insert is a single statement guarded by the current row count for the invoice: a resumed or
/// concurrent run can only ever materialise the canonical set of rows, never a duplicate.
pub async fn insert_for_invoice(
    invoice_id: i64,
    rows: &[NewLedgerTransaction],
    conn: &mut SqliteConnection,
) -> Result<Vec<i64>, sqlx::Error> {
    for (i, row) in rows.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO transactions (invoice_id, invoice_number, owner, description, quantity, unit_price, amount)
                SELECT $1, $2, $3, $4, $5, $6, $7
                WHERE (SELECT COUNT(*) FROM transactions WHERE invoice_id = $1) = $8;
            "#,
        )
        .bind(invoice_id)
        .bind(&row.invoice_number)
        .bind(&row.owner)
        .bind(&row.description)
        .bind(row.quantity)
        .bind(row.unit_price)
        .bind(row.amount)
        .bind(i as i64)
        .execute(&mut *conn)
        .await?;
    }
    let ids = ids_for_invoice(invoice_id, conn).await?;
    debug!("🗃️ Invoice {invoice_id} has {} ledger rows", ids.len());
    Ok(ids)
}

pub async fn fetch_for_invoice(
    invoice_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerTransaction>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM transactions WHERE invoice_id = $1 ORDER BY id ASC")
        .bind(invoice_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn ids_for_invoice(invoice_id: i64, conn: &mut SqliteConnection) -> Result<Vec<i64>, sqlx::Error> {
    let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM transactions WHERE invoice_id = $1 ORDER BY id ASC")
        .bind(invoice_id)
        .fetch_all(conn)
        .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}
