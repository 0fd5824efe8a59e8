//! Endpoint tests for the invoice routes, running against a throwaway migrated sqlite database.
use actix_web::{test, web, App};
use billing_engine::{
    db_types::{NewAttendee, NewPayment, NewRegistration, NewTicket, PaymentId, Provider, RegistrationId,
        RegistrationType},
    events::EventProducers,
    test_utils,
    InvoiceFlowApi,
    SqliteDatabase,
};
use billing_server::{config::ServerConfig, routes};
use rbg_common::Cents;

async fn seed_invoiceable_payment(db: &SqliteDatabase) {
    db.upsert_event_ticket("gala-dinner", "Grand Gala Dinner", Cents::from(10_000)).await.unwrap();
    let reg_id = RegistrationId::from("reg-1");
    db.insert_registration(
        NewRegistration::new(reg_id.clone(), "CONF-1001", RegistrationType::Individual)
            .with_contact("Alice Example", "alice@example.com")
            .with_stripe_intent("pi_HTTP1"),
    )
    .await
    .unwrap();
    db.insert_attendee(NewAttendee {
        id: "att-1".to_string(),
        registration_id: reg_id.clone(),
        first_name: "Alice".to_string(),
        last_name: "Example".to_string(),
    })
    .await
    .unwrap();
    db.insert_ticket(NewTicket::new(reg_id, "gala-dinner").owned_by_attendee("att-1")).await.unwrap();
    db.insert_payment(NewPayment::new(
        PaymentId::from("pay-1"),
        Provider::Stripe,
        Cents::from(10_250),
        "pi_HTTP1".to_string(),
    ))
    .await
    .unwrap();
}

macro_rules! test_app {
    ($db:expr, $config:expr) => {{
        let api = InvoiceFlowApi::new($db.clone(), EventProducers::default())
            .with_fee_config($config.fees.clone())
            .with_numbering($config.numbering.clone());
        test::init_service(
            App::new()
                .app_data(web::Data::new(api))
                .app_data(web::Data::new($config.clone()))
                .service(routes::health)
                .service(routes::generate_invoice)
                .service(routes::batch_generate),
        )
        .await
    }};
}

#[actix_web::test]
async fn generate_endpoint_mints_and_then_replays_the_invoice() {
    let url = test_utils::random_db_path();
    let db = test_utils::prepare_test_env(&url).await;
    seed_invoiceable_payment(&db).await;
    let config = ServerConfig::default();
    let app = test_app!(db, config);

    let req = test::TestRequest::post()
        .uri("/api/invoices/generate")
        .set_json(serde_json::json!({ "payment_id": "pay-1" }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["invoice_number"], "INV-000000001");
    assert_eq!(body["supplier_invoice_number"], "SUP-000000001");

    // A repeated request returns the same number instead of minting a second invoice.
    let req = test::TestRequest::post()
        .uri("/api/invoices/generate")
        .set_json(serde_json::json!({ "payment_id": "pay-1" }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["invoice_number"], "INV-000000001");
}

#[actix_web::test]
async fn unknown_payment_is_a_404_with_error_detail() {
    let url = test_utils::random_db_path();
    let db = test_utils::prepare_test_env(&url).await;
    let config = ServerConfig::default();
    let app = test_app!(db, config);

    let req = test::TestRequest::post()
        .uri("/api/invoices/generate")
        .set_json(serde_json::json!({ "payment_id": "no-such-payment" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "PaymentNotFound");
}

#[actix_web::test]
async fn regenerate_can_be_disabled_server_wide() {
    let url = test_utils::random_db_path();
    let db = test_utils::prepare_test_env(&url).await;
    seed_invoiceable_payment(&db).await;
    let config = ServerConfig { allow_regenerate: false, ..ServerConfig::default() };
    let app = test_app!(db, config);

    let req = test::TestRequest::post()
        .uri("/api/invoices/generate")
        .set_json(serde_json::json!({ "payment_id": "pay-1", "options": { "regenerate": true } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn batch_endpoint_reports_aggregate_counts() {
    let url = test_utils::random_db_path();
    let db = test_utils::prepare_test_env(&url).await;
    seed_invoiceable_payment(&db).await;
    let config = ServerConfig::default();
    let app = test_app!(db, config);

    let req = test::TestRequest::post().uri("/api/invoices/batch").set_json(serde_json::json!({})).to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 0);
}
