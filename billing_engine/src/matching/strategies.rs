use super::MatchMethod;
use crate::db_types::{Payment, Registration};

/// A named, typed way of reading one identifier off a payment.
pub struct PaymentPath {
    pub name: &'static str,
    pub get: for<'a> fn(&'a Payment) -> Option<&'a str>,
}

/// A named, typed way of reading one identifier off a registration.
pub struct RegistrationPath {
    pub name: &'static str,
    pub get: for<'a> fn(&'a Registration) -> Option<&'a str>,
}

/// One rung of the matching ladder: the payment fields to extract, the registration fields to compare against, and
/// the confidence awarded on an exact match.
pub struct MatchStrategy {
    pub method: MatchMethod,
    pub confidence: u8,
    pub payment_paths: &'static [PaymentPath],
    pub registration_paths: &'static [RegistrationPath],
}

const PAYMENT_PROVIDER_IDS: &[PaymentPath] = &[
    PaymentPath { name: "transaction_id", get: |p| Some(p.transaction_id.as_str()) },
    PaymentPath { name: "intent_id", get: |p| p.intent_id.as_deref() },
];

const PAYMENT_CROSS_REFERENCE: &[PaymentPath] = &[PaymentPath {
    name: "linked_registration_id",
    get: |p| p.linked_registration_id.as_ref().map(|r| r.as_str()),
}];

const REGISTRATION_PROVIDER_REFS: &[RegistrationPath] = &[
    RegistrationPath { name: "stripe_payment_intent_id", get: |r| r.stripe_payment_intent_id.as_deref() },
    RegistrationPath { name: "square_payment_id", get: |r| r.square_payment_id.as_deref() },
    RegistrationPath { name: "alt_stripe_payment_intent_id", get: |r| r.alt_stripe_payment_intent_id.as_deref() },
    RegistrationPath { name: "alt_square_payment_id", get: |r| r.alt_square_payment_id.as_deref() },
];

const REGISTRATION_ID: &[RegistrationPath] =
    &[RegistrationPath { name: "id", get: |r| Some(r.id.as_str()) }];

const REGISTRATION_CONFIRMATION: &[RegistrationPath] =
    &[RegistrationPath { name: "confirmation_number", get: |r| Some(r.confirmation_number.as_str()) }];

/// The matching ladder, in priority order. The first strategy with at least one exact match decides.
pub const STRATEGIES: &[MatchStrategy] = &[
    MatchStrategy {
        method: MatchMethod::TransactionId,
        confidence: 100,
        payment_paths: PAYMENT_PROVIDER_IDS,
        registration_paths: REGISTRATION_PROVIDER_REFS,
    },
    MatchStrategy {
        method: MatchMethod::CrossReference,
        confidence: 100,
        payment_paths: PAYMENT_CROSS_REFERENCE,
        registration_paths: REGISTRATION_ID,
    },
    MatchStrategy {
        method: MatchMethod::ConfirmationNumber,
        confidence: 90,
        payment_paths: PAYMENT_PROVIDER_IDS,
        registration_paths: REGISTRATION_CONFIRMATION,
    },
];
