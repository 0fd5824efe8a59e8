use rbg_common::Cents;
use regex::Regex;
use serde::Serialize;

use crate::db_types::{OwnerLineItem, Payment, Provider, RegistrationId, ResolutionGap};

//--------------------------------------    BillableOwner    ---------------------------------------------------------
/// Someone an invoice line item can be charged against: a named attendee, or the registration itself for lodge,
/// delegation and orphaned tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BillableOwner {
    Attendee { id: String, name: String },
    Registration { label: String },
}

impl BillableOwner {
    pub fn description(&self) -> &str {
        match self {
            BillableOwner::Attendee { name, .. } => name,
            BillableOwner::Registration { label } => label,
        }
    }
}

//--------------------------------------    ResolvedTicket   ---------------------------------------------------------
/// A ticket after ownership resolution, carrying the authoritative catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTicket {
    pub ticket_id: i64,
    pub event_ticket_id: String,
    pub description: String,
    pub unit_price: Cents,
    pub quantity: i64,
    /// False for cancelled tickets, which stay in the graph for audit but are excluded from billing.
    pub billable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerTickets {
    pub owner: BillableOwner,
    pub tickets: Vec<ResolvedTicket>,
}

//--------------------------------------   OwnershipGraph    ---------------------------------------------------------
/// The resolved mapping from billable owners to the tickets they must be charged for.
///
/// For a fixed database state the graph is deterministic: attendees appear in id order, the registration bucket (if
/// any) last, and tickets in ticket-id order within each owner.
#[derive(Debug, Clone, Serialize)]
pub struct OwnershipGraph {
    pub registration_id: RegistrationId,
    pub owners: Vec<OwnerTickets>,
    pub gaps: Vec<ResolutionGap>,
}

impl OwnershipGraph {
    /// The sum over all billable tickets, priced from the catalog.
    pub fn billable_total(&self) -> Cents {
        self.owners
            .iter()
            .flat_map(|o| o.tickets.iter())
            .filter(|t| t.billable)
            .map(|t| t.unit_price * t.quantity)
            .sum()
    }
}

//--------------------------------------     FeeSchedule     ---------------------------------------------------------
/// A provider's processing-fee terms: a percentage of the subtotal plus a fixed amount per payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub rate_basis_points: i64,
    pub fixed_fee: Cents,
}

impl FeeSchedule {
    pub fn new(rate_basis_points: i64, fixed_fee: Cents) -> Self {
        Self { rate_basis_points, fixed_fee }
    }

    pub fn fee_on(&self, subtotal: Cents) -> Cents {
        subtotal.apply_basis_points(self.rate_basis_points) + self.fixed_fee
    }
}

/// Associates a provider's identifier pattern with its fee schedule.
#[derive(Debug, Clone)]
pub struct ProviderFeeRule {
    pub provider: Provider,
    pub pattern: Regex,
    pub schedule: FeeSchedule,
}

//--------------------------------------      FeeConfig      ---------------------------------------------------------
/// Declared fee configuration. Schedules are data, not code: the assembler only ever reads them from here, so tests
/// and deployments can swap the terms without touching pricing logic.
#[derive(Debug, Clone)]
pub struct FeeConfig {
    pub rules: Vec<ProviderFeeRule>,
    /// Applied when no provider rule matches the payment.
    pub default_schedule: FeeSchedule,
    /// Tax rate embedded in the total. Displayed, never added on top.
    pub tax_rate_basis_points: i64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        let stripe = ProviderFeeRule {
            provider: Provider::Stripe,
            pattern: Regex::new(r"^(pi|py|ch)_").unwrap(),
            schedule: FeeSchedule::new(220, Cents::from(30)),
        };
        let square = ProviderFeeRule {
            provider: Provider::Square,
            pattern: Regex::new(r"^[A-Za-z0-9]{16,}$").unwrap(),
            schedule: FeeSchedule::new(290, Cents::from(30)),
        };
        Self {
            rules: vec![stripe, square],
            default_schedule: FeeSchedule::new(250, Cents::from(30)),
            tax_rate_basis_points: 1_000,
        }
    }
}

impl FeeConfig {
    /// Picks the fee schedule for a payment by matching its transaction id against the provider patterns, falling
    /// back to the stored provider tag, then to the default schedule.
    pub fn schedule_for(&self, payment: &Payment) -> &FeeSchedule {
        if let Some(rule) = self.rules.iter().find(|r| r.pattern.is_match(&payment.transaction_id)) {
            return &rule.schedule;
        }
        if let Some(rule) = self.rules.iter().find(|r| r.provider == payment.provider) {
            return &rule.schedule;
        }
        &self.default_schedule
    }
}

//--------------------------------------   InvoicePreview    ---------------------------------------------------------
/// A fully priced invoice document, before any number has been allocated or anything persisted.
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePreview {
    pub line_items: Vec<OwnerLineItem>,
    pub resolution_gaps: Vec<ResolutionGap>,
    pub subtotal: Cents,
    pub processing_fee: Cents,
    /// Tax already contained in `total`, shown for display. Not additive.
    pub tax_included: Cents,
    pub total: Cents,
}
