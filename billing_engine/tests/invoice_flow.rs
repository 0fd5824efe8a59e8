//! End-to-end tests for the invoice flow: exactly-once generation, idempotent re-invocation, resume after partial
//! failure, ambiguity handling, and authorised regeneration.
use billing_engine::{
    db_types::{NewPayment, NewRegistration, NewTicket, PaymentId, Provider, RegistrationId, RegistrationType},
    events::EventProducers,
    traits::{BillingDatabase, GenerateOptions},
    InvoiceFlowApi,
    InvoiceFlowError,
    SqliteDatabase,
};
use rbg_common::Cents;

mod support;

fn flow_api(db: &SqliteDatabase) -> InvoiceFlowApi<SqliteDatabase> {
    InvoiceFlowApi::new(db.clone(), EventProducers::default())
}

async fn invoice_count(db: &SqliteDatabase) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM invoices").fetch_one(db.pool()).await.expect("Error counting invoices");
    count
}

async fn transaction_count(db: &SqliteDatabase) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
        .fetch_one(db.pool())
        .await
        .expect("Error counting transactions");
    count
}

#[tokio::test]
async fn generates_exactly_once_with_catalog_prices() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    let (payment_id, registration_id) = support::seed_two_attendee_case(&db, "pay-1", "reg-1", "pi_TEST1").await;
    let api = flow_api(&db);

    let result = api.generate_invoice(&payment_id, &GenerateOptions::default()).await.expect("Error generating");
    assert!(result.newly_created);
    assert_eq!(result.customer_invoice_number, "INV-000000001");
    assert_eq!(result.supplier_invoice_number, "SUP-000000001");
    assert_eq!(result.transaction_ids.len(), 2);

    // Catalog prices ($100 each), not the stale $50 cached on the ticket rows; Stripe schedule 2.2% + $0.30.
    let invoice = db.fetch_invoice(result.invoice_id).await.unwrap().expect("Invoice missing");
    assert_eq!(invoice.subtotal, Cents::from(20_000));
    assert_eq!(invoice.processing_fee, Cents::from(470));
    assert_eq!(invoice.total, Cents::from(20_470));
    assert_eq!(invoice.tax_included, Cents::from(2_047));
    assert_eq!(invoice.line_items.0.len(), 2);

    // Source records carry the linkage.
    let payment = db.fetch_payment(&payment_id).await.unwrap().expect("Payment missing");
    assert!(payment.invoice_created);
    assert_eq!(payment.invoice_id, Some(invoice.id));
    assert_eq!(payment.customer_invoice_number.as_deref(), Some("INV-000000001"));
    let registration = db.fetch_registration(&registration_id).await.unwrap().expect("Registration missing");
    assert_eq!(registration.invoice_id, Some(invoice.id));

    // The ledger rows flatten the invoice sub-items and conserve the subtotal.
    let ledger = db.fetch_ledger_transactions(invoice.id).await.unwrap();
    assert_eq!(ledger.len(), 2);
    let ledger_total: Cents = ledger.iter().map(|t| t.amount).sum();
    assert_eq!(ledger_total, invoice.subtotal);
    assert!(ledger.iter().all(|t| t.invoice_id == invoice.id));

    // Re-invocation returns the same numbers and writes nothing new.
    let invoices_before = invoice_count(&db).await;
    let transactions_before = transaction_count(&db).await;
    let repeat = api.generate_invoice(&payment_id, &GenerateOptions::default()).await.expect("Error re-invoking");
    assert!(!repeat.newly_created);
    assert_eq!(repeat.customer_invoice_number, result.customer_invoice_number);
    assert_eq!(repeat.transaction_ids, result.transaction_ids);
    assert_eq!(invoice_count(&db).await, invoices_before);
    assert_eq!(transaction_count(&db).await, transactions_before);
}

#[tokio::test]
async fn concurrent_invocations_converge_on_one_invoice() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    let (payment_id, _) = support::seed_two_attendee_case(&db, "pay-1", "reg-1", "pi_RACE").await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let api = flow_api(&db);
        let id = payment_id.clone();
        handles.push(tokio::spawn(async move { api.generate_invoice(&id, &GenerateOptions::default()).await }));
    }
    let mut numbers = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap().expect("Concurrent generation failed");
        numbers.push(result.customer_invoice_number);
    }
    numbers.dedup();
    assert_eq!(numbers.len(), 1, "concurrent calls returned different invoice numbers: {numbers:?}");
    assert_eq!(invoice_count(&db).await, 1);
}

#[tokio::test]
async fn ambiguous_match_is_surfaced_with_candidates() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    support::seed_two_attendee_case(&db, "pay-1", "reg-a", "pi_TEST2").await;
    // A second registration carrying the same provider reference.
    db.insert_registration(
        NewRegistration::new(RegistrationId::from("reg-b"), "CONF-reg-b", RegistrationType::Individual)
            .with_stripe_intent("pi_TEST2"),
    )
    .await
    .unwrap();
    let api = flow_api(&db);
    let payment_id = PaymentId::from("pay-1");

    match api.generate_invoice(&payment_id, &GenerateOptions::default()).await {
        Err(InvoiceFlowError::AmbiguousMatch { payment_id: pid, candidates }) => {
            assert_eq!(pid, payment_id);
            assert_eq!(candidates.len(), 2);
            assert!(candidates.iter().all(|c| c.confidence == 100));
        },
        other => panic!("Expected AmbiguousMatch, got {other:?}"),
    }
    // Nothing durable happened: the claim was released and no invoice exists, so a retry starts clean.
    let payment = db.fetch_payment(&payment_id).await.unwrap().unwrap();
    assert!(!payment.invoice_created);
    assert_eq!(invoice_count(&db).await, 0);
}

#[tokio::test]
async fn unmatched_payment_is_reported_for_manual_linkage() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    let payment_id = PaymentId::from("pay-lost");
    db.insert_payment(NewPayment::new(
        payment_id.clone(),
        Provider::Square,
        Cents::from(5_000),
        "UNKNOWNTXN0001".to_string(),
    ))
    .await
    .unwrap();
    let api = flow_api(&db);

    match api.generate_invoice(&payment_id, &GenerateOptions::default()).await {
        Err(InvoiceFlowError::NoMatchFound(pid)) => assert_eq!(pid, payment_id),
        other => panic!("Expected NoMatchFound, got {other:?}"),
    }
    let payment = db.fetch_payment(&payment_id).await.unwrap().unwrap();
    assert!(!payment.invoice_created);
}

#[tokio::test]
async fn orphaned_ticket_bills_to_the_registration_with_an_audit_gap() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    let (payment_id, registration_id) = support::seed_two_attendee_case(&db, "pay-1", "reg-1", "pi_GAP").await;
    // A ticket pointing at an attendee who is not on the registration.
    db.insert_ticket(
        NewTicket::new(registration_id.clone(), "gala-dinner")
            .owned_by_attendee("no-such-attendee")
            .with_cached_price(Cents::from(5_000)),
    )
    .await
    .unwrap();
    let api = flow_api(&db);

    let result = api.generate_invoice(&payment_id, &GenerateOptions::default()).await.expect("Error generating");
    let invoice = db.fetch_invoice(result.invoice_id).await.unwrap().unwrap();
    // Three tickets at the $100 catalog price: two attendees plus the orphan attributed to the registration.
    assert_eq!(invoice.subtotal, Cents::from(30_000));
    assert_eq!(invoice.resolution_gaps.0.len(), 1);
    assert_eq!(invoice.resolution_gaps.0[0].owner_id.as_deref(), Some("no-such-attendee"));
    assert_eq!(invoice.line_items.0.len(), 3);
}

#[tokio::test]
async fn cancelled_tickets_are_not_billed() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    let (payment_id, registration_id) = support::seed_two_attendee_case(&db, "pay-1", "reg-1", "pi_CXL").await;
    db.insert_ticket(
        NewTicket::new(registration_id, "gala-dinner").with_cached_price(Cents::from(5_000)).cancelled(),
    )
    .await
    .unwrap();
    let api = flow_api(&db);

    let result = api.generate_invoice(&payment_id, &GenerateOptions::default()).await.expect("Error generating");
    let invoice = db.fetch_invoice(result.invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.subtotal, Cents::from(20_000));
}

#[tokio::test]
async fn regeneration_requires_authorization_and_voids_the_prior_invoice() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    let (payment_id, _) = support::seed_two_attendee_case(&db, "pay-1", "reg-1", "pi_REGEN").await;
    let api = flow_api(&db);

    let first = api.generate_invoice(&payment_id, &GenerateOptions::default()).await.expect("Error generating");

    // Regenerate without authorization is refused; the original invoice is untouched.
    let unauthorised = GenerateOptions { regenerate: true, ..GenerateOptions::default() };
    match api.generate_invoice(&payment_id, &unauthorised).await {
        Err(InvoiceFlowError::RegenerateNotAuthorized(pid)) => assert_eq!(pid, payment_id),
        other => panic!("Expected RegenerateNotAuthorized, got {other:?}"),
    }
    assert_eq!(invoice_count(&db).await, 1);

    // With authorization the prior invoice is voided and a fresh one is numbered.
    let authorised = GenerateOptions {
        regenerate: true,
        void_authorization: Some("ops ticket 4821".to_string()),
        ..GenerateOptions::default()
    };
    let second = api.generate_invoice(&payment_id, &authorised).await.expect("Error regenerating");
    assert!(second.newly_created);
    assert_ne!(second.customer_invoice_number, first.customer_invoice_number);

    let old = db.fetch_invoice(first.invoice_id).await.unwrap().unwrap();
    assert_eq!(old.void_reason.as_deref(), Some("ops ticket 4821"));
    let payment = db.fetch_payment(&payment_id).await.unwrap().unwrap();
    assert_eq!(payment.invoice_id, Some(second.invoice_id));
}

#[tokio::test]
async fn resumes_after_a_crash_between_claim_and_persistence() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    let (payment_id, _) = support::seed_two_attendee_case(&db, "pay-1", "reg-1", "pi_CRASH").await;

    // A previous run claimed the payment and died before writing anything.
    db.claim_payment(&payment_id).await.unwrap();

    let api = flow_api(&db);
    let result =
        api.generate_invoice(&payment_id, &GenerateOptions::default()).await.expect("Error resuming generation");
    assert_eq!(result.customer_invoice_number, "INV-000000001");
    assert_eq!(invoice_count(&db).await, 1);
    let payment = db.fetch_payment(&payment_id).await.unwrap().unwrap();
    assert_eq!(payment.invoice_id, Some(result.invoice_id));
}

#[tokio::test]
async fn batch_processes_each_unprocessed_payment_once() {
    let url = support::random_db_path();
    let db = support::prepare_test_env(&url).await;
    support::seed_two_attendee_case(&db, "pay-1", "reg-1", "pi_BATCH1").await;
    support::seed_two_attendee_case(&db, "pay-2", "reg-2", "pi_BATCH2").await;
    db.insert_payment(NewPayment::new(
        PaymentId::from("pay-stray"),
        Provider::Square,
        Cents::from(1_000),
        "NOMATCHTXN0001".to_string(),
    ))
    .await
    .unwrap();
    let api = flow_api(&db);

    let summary = api.process_unprocessed_payments(None, None, 50).await.expect("Batch failed");
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.already_invoiced, 0);
    assert_eq!(summary.ambiguous, 0);
    assert_eq!(summary.failed, 1);

    // Invoiced payments drop out of the unprocessed set; only the unmatched one is retried.
    let summary = api.process_unprocessed_payments(None, None, 50).await.expect("Batch failed");
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(invoice_count(&db).await, 2);
}
