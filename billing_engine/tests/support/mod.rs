//! Shared scaffolding for the integration tests: a throwaway sqlite database per test, migrated and seeded through
//! the ingestion surface.
#![allow(dead_code)]

use billing_engine::{
    db_types::{NewAttendee, NewPayment, NewRegistration, NewTicket, PaymentId, Provider, RegistrationId,
        RegistrationType},
    SqliteDatabase,
};
use log::*;
use rbg_common::Cents;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 8).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub fn random_db_path() -> String {
    format!("sqlite://{}/rbg_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

/// A registration with two attendees each holding one catalog-priced ticket, and the matching settled payment.
/// The cached ticket prices are deliberately stale at half the catalog price.
pub async fn seed_two_attendee_case(
    db: &SqliteDatabase,
    payment_id: &str,
    registration_id: &str,
    intent_id: &str,
) -> (PaymentId, RegistrationId) {
    let reg_id = RegistrationId::from(registration_id);
    db.upsert_event_ticket("gala-dinner", "Grand Gala Dinner", Cents::from(10_000))
        .await
        .expect("Error seeding catalog");
    let registration = NewRegistration::new(
        reg_id.clone(),
        format!("CONF-{registration_id}"),
        RegistrationType::Individual,
    )
    .with_contact("Alice Example", "alice@example.com")
    .with_stripe_intent(intent_id)
    .with_total_amount(Cents::from(20_000));
    db.insert_registration(registration).await.expect("Error seeding registration");

    for (attendee_id, first, last) in
        [(format!("{registration_id}-att-1"), "Alice", "Example"), (format!("{registration_id}-att-2"), "Bob", "Example")]
    {
        db.insert_attendee(NewAttendee {
            id: attendee_id.clone(),
            registration_id: reg_id.clone(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        })
        .await
        .expect("Error seeding attendee");
        db.insert_ticket(
            NewTicket::new(reg_id.clone(), "gala-dinner")
                .owned_by_attendee(attendee_id)
                .with_cached_price(Cents::from(5_000)),
        )
        .await
        .expect("Error seeding ticket");
    }

    let pid = PaymentId::from(payment_id);
    let payment =
        NewPayment::new(pid.clone(), Provider::Stripe, Cents::from(20_470), intent_id.to_string())
            .with_customer_email("alice@example.com");
    db.insert_payment(payment).await.expect("Error seeding payment");
    (pid, reg_id)
}
