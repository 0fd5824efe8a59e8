//! Payment-to-registration identity matching.
//!
//! Historical imports stored the same provider identifiers under several field names, and the payments themselves
//! carry up to three different handles (transaction id, intent id, metadata registration reference). Rather than
//! walking record fields by name at runtime, each way of reading an identifier is a typed accessor, and the accessors
//! are grouped into strategies evaluated in a fixed priority order. The matcher is a pure function over the records
//! it is given; fetching the candidate set is the caller's job.

mod strategies;

use std::fmt::Display;

use serde::Serialize;

use crate::db_types::{Payment, Registration, RegistrationId};
pub use strategies::{MatchStrategy, PaymentPath, RegistrationPath, STRATEGIES};

//--------------------------------------     MatchMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchMethod {
    /// The payment's transaction or intent id equals a provider reference stored on the registration.
    TransactionId,
    /// The payment's metadata carried an explicit registration id.
    CrossReference,
    /// The payment's identifier equals the registration's confirmation number.
    ConfirmationNumber,
}

impl Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMethod::TransactionId => write!(f, "transaction-id"),
            MatchMethod::CrossReference => write!(f, "cross-reference"),
            MatchMethod::ConfirmationNumber => write!(f, "confirmation-number"),
        }
    }
}

//--------------------------------------    MatchOutcome     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct MatchedRegistration {
    pub registration_id: RegistrationId,
    pub confidence: u8,
    pub method: MatchMethod,
    /// Which payment field supplied the winning identifier. For operator display.
    pub payment_field: &'static str,
    /// Which registration field it matched against.
    pub registration_field: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmbiguousCandidate {
    pub registration_id: RegistrationId,
    pub confidence: u8,
}

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Match(MatchedRegistration),
    /// Two or more distinct registrations matched at the same confidence. Never resolved by picking one.
    Ambiguous(Vec<AmbiguousCandidate>),
    NoMatch,
}

//--------------------------------------    normalisation    ---------------------------------------------------------
/// Normalise an identifier before comparison: trim whitespace, and canonicalise decimal-like values so that a
/// numeric identifier that one system stored as `"100.00"` and another as `"100"` compare equal. Returns `None` for
/// empty values.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(canonical) = canonicalize_decimal(trimmed) {
        return Some(canonical);
    }
    Some(trimmed.to_string())
}

/// If the value is `digits.digits`, strip trailing fractional zeroes (and a then-empty fraction). Values without a
/// fractional part are left alone so that zero-padded identifiers keep their padding.
fn canonicalize_decimal(value: &str) -> Option<String> {
    let (int_part, frac_part) = value.split_once('.')?;
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac_part.is_empty() || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        Some(int_part.to_string())
    } else {
        Some(format!("{int_part}.{frac}"))
    }
}

//--------------------------------------    match_payment    ---------------------------------------------------------
/// Rank the candidate registrations against the payment.
///
/// Strategies run in priority order; the first one producing at least one exact match decides the outcome. A tie
/// between distinct registrations at the same strategy is returned as [`MatchOutcome::Ambiguous`] so a human can
/// resolve it.
pub fn match_payment(payment: &Payment, candidates: &[Registration]) -> MatchOutcome {
    for strategy in STRATEGIES {
        let payment_values: Vec<(&'static str, String)> = strategy
            .payment_paths
            .iter()
            .filter_map(|path| (path.get)(payment).and_then(normalize_identifier).map(|v| (path.name, v)))
            .collect();
        if payment_values.is_empty() {
            continue;
        }

        let mut matched: Vec<(&Registration, &'static str, &'static str)> = Vec::new();
        for registration in candidates {
            if matched.iter().any(|(m, _, _)| m.id == registration.id) {
                continue;
            }
            'paths: for path in strategy.registration_paths {
                let Some(value) = (path.get)(registration).and_then(normalize_identifier) else {
                    continue;
                };
                if let Some((payment_field, _)) = payment_values.iter().find(|(_, pv)| *pv == value) {
                    matched.push((registration, *payment_field, path.name));
                    break 'paths;
                }
            }
        }

        match matched.len() {
            0 => continue,
            1 => {
                let (registration, payment_field, registration_field) = matched[0];
                return MatchOutcome::Match(MatchedRegistration {
                    registration_id: registration.id.clone(),
                    confidence: strategy.confidence,
                    method: strategy.method,
                    payment_field,
                    registration_field,
                });
            },
            _ => {
                let candidates = matched
                    .iter()
                    .map(|(r, _, _)| AmbiguousCandidate {
                        registration_id: r.id.clone(),
                        confidence: strategy.confidence,
                    })
                    .collect();
                return MatchOutcome::Ambiguous(candidates);
            },
        }
    }
    MatchOutcome::NoMatch
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use rbg_common::Cents;

    use super::*;
    use crate::db_types::{PaymentId, PaymentStatus, Provider, RegistrationType};

    fn payment(transaction_id: &str) -> Payment {
        Payment {
            id: PaymentId("pay-1".to_string()),
            provider: Provider::Stripe,
            amount: Cents::from(10_000),
            currency: "AUD".to_string(),
            status: PaymentStatus::Settled,
            transaction_id: transaction_id.to_string(),
            intent_id: None,
            linked_registration_id: None,
            customer_email: None,
            settled_at: Utc::now(),
            invoice_created: false,
            invoice_id: None,
            customer_invoice_number: None,
            supplier_invoice_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn registration(id: &str, confirmation: &str) -> Registration {
        Registration {
            id: RegistrationId::from(id),
            confirmation_number: confirmation.to_string(),
            reg_type: RegistrationType::Individual,
            contact_name: "Test Contact".to_string(),
            contact_email: None,
            stripe_payment_intent_id: None,
            square_payment_id: None,
            alt_stripe_payment_intent_id: None,
            alt_square_payment_id: None,
            total_amount: Cents::from(10_000),
            invoice_created: false,
            invoice_id: None,
            customer_invoice_number: None,
            supplier_invoice_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn transaction_id_match_wins_at_full_confidence() {
        let pay = payment("pi_TEST1");
        let mut reg = registration("reg-1", "CONF-001");
        reg.stripe_payment_intent_id = Some("pi_TEST1".to_string());
        let other = registration("reg-2", "CONF-002");

        match match_payment(&pay, &[other, reg]) {
            MatchOutcome::Match(m) => {
                assert_eq!(m.registration_id, RegistrationId::from("reg-1"));
                assert_eq!(m.confidence, 100);
                assert_eq!(m.method, MatchMethod::TransactionId);
            },
            other => panic!("Expected a match, got {other:?}"),
        }
    }

    #[test]
    fn legacy_field_variants_are_consulted() {
        let pay = payment("pi_LEGACY");
        let mut reg = registration("reg-1", "CONF-001");
        reg.alt_stripe_payment_intent_id = Some("  pi_LEGACY ".to_string());

        assert!(matches!(match_payment(&pay, &[reg]), MatchOutcome::Match(m) if m.method == MatchMethod::TransactionId));
    }

    #[test]
    fn cross_reference_outranks_confirmation_number() {
        let mut pay = payment("txn-1");
        pay.linked_registration_id = Some(RegistrationId::from("reg-2"));
        let reg_by_confirmation = registration("reg-1", "txn-1");
        let reg_by_reference = registration("reg-2", "CONF-9");

        match match_payment(&pay, &[reg_by_confirmation, reg_by_reference]) {
            MatchOutcome::Match(m) => {
                assert_eq!(m.registration_id, RegistrationId::from("reg-2"));
                assert_eq!(m.method, MatchMethod::CrossReference);
                assert_eq!(m.confidence, 100);
            },
            other => panic!("Expected a cross-reference match, got {other:?}"),
        }
    }

    #[test]
    fn confirmation_number_matches_at_reduced_confidence() {
        let pay = payment("CONF-42");
        let reg = registration("reg-1", "CONF-42");

        match match_payment(&pay, &[reg]) {
            MatchOutcome::Match(m) => {
                assert_eq!(m.confidence, 90);
                assert_eq!(m.method, MatchMethod::ConfirmationNumber);
            },
            other => panic!("Expected a confirmation-number match, got {other:?}"),
        }
    }

    #[test]
    fn equal_rank_tie_is_ambiguous_not_a_guess() {
        let pay = payment("pi_TEST2");
        let mut reg_a = registration("reg-a", "CONF-A");
        reg_a.stripe_payment_intent_id = Some("pi_TEST2".to_string());
        let mut reg_b = registration("reg-b", "CONF-B");
        reg_b.alt_stripe_payment_intent_id = Some("pi_TEST2".to_string());

        match match_payment(&pay, &[reg_a, reg_b]) {
            MatchOutcome::Ambiguous(candidates) => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates.iter().all(|c| c.confidence == 100));
            },
            other => panic!("Expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn no_candidates_is_no_match() {
        let pay = payment("pi_NOTHING");
        assert!(matches!(match_payment(&pay, &[]), MatchOutcome::NoMatch));
        let reg = registration("reg-1", "CONF-1");
        assert!(matches!(match_payment(&pay, &[reg]), MatchOutcome::NoMatch));
    }

    #[test]
    fn decimal_wrapped_values_compare_as_numbers() {
        assert_eq!(normalize_identifier(" 100.00 "), Some("100".to_string()));
        assert_eq!(normalize_identifier("100.50"), Some("100.5".to_string()));
        assert_eq!(normalize_identifier("0042"), Some("0042".to_string()));
        assert_eq!(normalize_identifier("pi_abc"), Some("pi_abc".to_string()));
        assert_eq!(normalize_identifier("   "), None);

        let pay = payment("100.00");
        let reg = registration("reg-1", "100");
        assert!(matches!(match_payment(&pay, &[reg]), MatchOutcome::Match(_)));
    }
}
