use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Invoice, NewRegistration, Payment, Registration, RegistrationId},
    traits::BillingGatewayError,
};

pub async fn insert_registration(
    registration: NewRegistration,
    conn: &mut SqliteConnection,
) -> Result<Registration, BillingGatewayError> {
    let id = registration.id.clone();
    let registration = sqlx::query_as(
        r#"
            INSERT INTO registrations (
                id,
                confirmation_number,
                reg_type,
                contact_name,
                contact_email,
                stripe_payment_intent_id,
                square_payment_id,
                alt_stripe_payment_intent_id,
                alt_square_payment_id,
                total_amount
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(registration.id)
    .bind(registration.confirmation_number)
    .bind(registration.reg_type.to_string())
    .bind(registration.contact_name)
    .bind(registration.contact_email)
    .bind(registration.stripe_payment_intent_id)
    .bind(registration.square_payment_id)
    .bind(registration.alt_stripe_payment_intent_id)
    .bind(registration.alt_square_payment_id)
    .bind(registration.total_amount)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            BillingGatewayError::RegistrationAlreadyExists(id)
        },
        _ => BillingGatewayError::from(e),
    })?;
    Ok(registration)
}

pub async fn fetch_registration(
    id: &RegistrationId,
    conn: &mut SqliteConnection,
) -> Result<Option<Registration>, sqlx::Error> {
    let registration =
        sqlx::query_as("SELECT * FROM registrations WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(registration)
}

/// Coarse candidate lookup for the matcher: every registration whose provider reference columns or confirmation
/// number carry one of the payment's identifiers, plus the metadata cross-reference target if there is one. Each
/// comparison is an indexed equality; the fine ranking happens in memory.
pub async fn candidate_registrations(
    payment: &Payment,
    conn: &mut SqliteConnection,
) -> Result<Vec<Registration>, sqlx::Error> {
    let mut values = vec![payment.transaction_id.trim().to_string()];
    if let Some(intent) = payment.intent_id.as_deref() {
        values.push(intent.trim().to_string());
    }
    values.retain(|v| !v.is_empty());
    let linked = payment.linked_registration_id.as_ref();
    if values.is_empty() && linked.is_none() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::new("SELECT * FROM registrations WHERE ");
    let mut clause = builder.separated(" OR ");
    const REFERENCE_COLUMNS: [&str; 5] = [
        "stripe_payment_intent_id",
        "square_payment_id",
        "alt_stripe_payment_intent_id",
        "alt_square_payment_id",
        "confirmation_number",
    ];
    for column in REFERENCE_COLUMNS {
        for value in &values {
            clause.push(format!("{column} = "));
            clause.push_bind_unseparated(value.clone());
        }
    }
    if let Some(linked) = linked {
        clause.push("id = ");
        clause.push_bind_unseparated(linked.as_str().to_string());
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let registrations = builder.build_query_as::<Registration>().fetch_all(conn).await?;
    Ok(registrations)
}

/// Mirrors the payment-side linkage onto the registration row.
pub async fn set_invoice_linkage(invoice: &Invoice, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            UPDATE registrations SET
                invoice_created = 1,
                invoice_id = $2,
                customer_invoice_number = $3,
                supplier_invoice_number = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
        "#,
    )
    .bind(invoice.registration_id.as_str())
    .bind(invoice.id)
    .bind(&invoice.customer_invoice_number)
    .bind(&invoice.supplier_invoice_number)
    .execute(conn)
    .await?;
    Ok(())
}
