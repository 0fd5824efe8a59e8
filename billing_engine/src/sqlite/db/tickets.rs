use log::trace;
use rbg_common::Cents;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{Attendee, EventTicket, NewAttendee, NewTicket, RegistrationId, Ticket};

pub async fn insert_attendee(attendee: NewAttendee, conn: &mut SqliteConnection) -> Result<Attendee, sqlx::Error> {
    let attendee = sqlx::query_as(
        r#"
            INSERT INTO attendees (id, registration_id, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(attendee.id)
    .bind(attendee.registration_id)
    .bind(attendee.first_name)
    .bind(attendee.last_name)
    .fetch_one(conn)
    .await?;
    Ok(attendee)
}

pub async fn fetch_attendees(
    registration_id: &RegistrationId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Attendee>, sqlx::Error> {
    let attendees = sqlx::query_as("SELECT * FROM attendees WHERE registration_id = $1 ORDER BY id ASC")
        .bind(registration_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(attendees)
}

pub async fn insert_ticket(ticket: NewTicket, conn: &mut SqliteConnection) -> Result<Ticket, sqlx::Error> {
    let ticket = sqlx::query_as(
        r#"
            INSERT INTO tickets (registration_id, event_ticket_id, cached_price, quantity, owner_type, owner_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(ticket.registration_id)
    .bind(ticket.event_ticket_id)
    .bind(ticket.cached_price)
    .bind(ticket.quantity)
    .bind(ticket.owner_type.to_string())
    .bind(ticket.owner_id)
    .bind(ticket.status.to_string())
    .fetch_one(conn)
    .await?;
    Ok(ticket)
}

pub async fn fetch_tickets(
    registration_id: &RegistrationId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Ticket>, sqlx::Error> {
    let tickets = sqlx::query_as("SELECT * FROM tickets WHERE registration_id = $1 ORDER BY id ASC")
        .bind(registration_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(tickets)
}

/// Creates or reprices a catalog entry.
pub async fn upsert_event_ticket(
    id: &str,
    name: &str,
    price: Cents,
    conn: &mut SqliteConnection,
) -> Result<EventTicket, sqlx::Error> {
    let ticket = sqlx::query_as(
        r#"
            INSERT INTO event_tickets (id, name, price) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = excluded.name, price = excluded.price
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(price)
    .fetch_one(conn)
    .await?;
    Ok(ticket)
}

pub async fn fetch_event_tickets(ids: &[String], conn: &mut SqliteConnection) -> Result<Vec<EventTicket>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM event_tickets WHERE id IN (");
    let mut in_list = builder.separated(", ");
    for id in ids {
        in_list.push_bind(id.clone());
    }
    builder.push(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let tickets = builder.build_query_as::<EventTicket>().fetch_all(conn).await?;
    Ok(tickets)
}
