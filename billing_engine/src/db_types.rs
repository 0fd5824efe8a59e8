use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use rbg_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------      PaymentId      ---------------------------------------------------------
/// The payment record's identifier, as assigned by the ingestion job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct PaymentId(pub String);

impl FromStr for PaymentId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for PaymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PaymentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   RegistrationId    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct RegistrationId(pub String);

impl From<String> for RegistrationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RegistrationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RegistrationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      Provider       ---------------------------------------------------------
/// The upstream payment provider a payment was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Provider {
    Stripe,
    Square,
    Unknown,
}

impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Stripe => write!(f, "Stripe"),
            Provider::Square => write!(f, "Square"),
            Provider::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for Provider {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Stripe" => Ok(Self::Stripe),
            "Square" => Ok(Self::Square),
            "Unknown" => Ok(Self::Unknown),
            s => Err(ConversionError("provider", s.to_string())),
        }
    }
}

impl From<String> for Provider {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid provider: {value}. But this conversion cannot fail. Defaulting to Unknown");
            Provider::Unknown
        })
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Funds have cleared with the provider. Only settled payments are invoiced.
    Settled,
    /// The provider has reported the payment but it has not cleared yet.
    Pending,
    /// The payment was reversed at the provider.
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Settled => write!(f, "Settled"),
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Settled" => Ok(Self::Settled),
            "Pending" => Ok(Self::Pending),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError("payment status", s.to_string())),
        }
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
/// A provider-agnostic payment record.
///
/// Payments are created by the ingestion jobs and, once settled, are never deleted. The invoice linkage fields
/// (`invoice_created`, `invoice_id` and the two number columns) are written exclusively by the invoice flow.
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub provider: Provider,
    pub amount: Cents,
    pub currency: String,
    pub status: PaymentStatus,
    /// The provider's transaction identifier (e.g. a charge id).
    pub transaction_id: String,
    /// The provider's payment-intent identifier, when the provider has that concept.
    pub intent_id: Option<String>,
    /// A registration id carried in the provider metadata, when the checkout flow recorded one.
    pub linked_registration_id: Option<RegistrationId>,
    pub customer_email: Option<String>,
    pub settled_at: DateTime<Utc>,
    /// The idempotency guard. Test-and-set by the invoice flow before any other work happens.
    pub invoice_created: bool,
    pub invoice_id: Option<i64>,
    pub customer_invoice_number: Option<String>,
    pub supplier_invoice_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewPayment     ---------------------------------------------------------
/// A payment as delivered by an ingestion job.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: PaymentId,
    pub provider: Provider,
    pub amount: Cents,
    pub currency: String,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub intent_id: Option<String>,
    pub linked_registration_id: Option<RegistrationId>,
    pub customer_email: Option<String>,
    pub settled_at: DateTime<Utc>,
}

impl NewPayment {
    pub fn new(id: PaymentId, provider: Provider, amount: Cents, transaction_id: String) -> Self {
        Self {
            id,
            provider,
            amount,
            currency: "AUD".to_string(),
            status: PaymentStatus::Settled,
            transaction_id,
            intent_id: None,
            linked_registration_id: None,
            customer_email: None,
            settled_at: Utc::now(),
        }
    }

    pub fn with_intent_id(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    pub fn with_linked_registration(mut self, id: RegistrationId) -> Self {
        self.linked_registration_id = Some(id);
        self
    }

    pub fn with_customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }
}

//--------------------------------------  RegistrationType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RegistrationType {
    Individual,
    Lodge,
    Delegation,
}

impl Display for RegistrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationType::Individual => write!(f, "Individual"),
            RegistrationType::Lodge => write!(f, "Lodge"),
            RegistrationType::Delegation => write!(f, "Delegation"),
        }
    }
}

impl FromStr for RegistrationType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Individual" => Ok(Self::Individual),
            "Lodge" => Ok(Self::Lodge),
            "Delegation" => Ok(Self::Delegation),
            s => Err(ConversionError("registration type", s.to_string())),
        }
    }
}

//--------------------------------------    Registration     ---------------------------------------------------------
/// An event registration, as imported from the registration system.
///
/// The provider reference columns are deliberately redundant: historical imports stored the same identifier under
/// different field names, and the matcher consults all of them. `confirmation_number` is the human-facing handle and
/// is globally unique.
#[derive(Debug, Clone, FromRow)]
pub struct Registration {
    pub id: RegistrationId,
    pub confirmation_number: String,
    pub reg_type: RegistrationType,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub square_payment_id: Option<String>,
    /// Copy of the Stripe intent id under the older import field name.
    pub alt_stripe_payment_intent_id: Option<String>,
    /// Copy of the Square payment id under the older import field name.
    pub alt_square_payment_id: Option<String>,
    /// Amount recorded at registration time. Not authoritative for billing.
    pub total_amount: Cents,
    pub invoice_created: bool,
    pub invoice_id: Option<i64>,
    pub customer_invoice_number: Option<String>,
    pub supplier_invoice_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   NewRegistration   ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub id: RegistrationId,
    pub confirmation_number: String,
    pub reg_type: RegistrationType,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub square_payment_id: Option<String>,
    pub alt_stripe_payment_intent_id: Option<String>,
    pub alt_square_payment_id: Option<String>,
    pub total_amount: Cents,
}

impl NewRegistration {
    pub fn new(id: RegistrationId, confirmation_number: impl Into<String>, reg_type: RegistrationType) -> Self {
        Self {
            id,
            confirmation_number: confirmation_number.into(),
            reg_type,
            contact_name: String::new(),
            contact_email: None,
            stripe_payment_intent_id: None,
            square_payment_id: None,
            alt_stripe_payment_intent_id: None,
            alt_square_payment_id: None,
            total_amount: Cents::default(),
        }
    }

    pub fn with_contact(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.contact_name = name.into();
        self.contact_email = Some(email.into());
        self
    }

    pub fn with_stripe_intent(mut self, intent_id: impl Into<String>) -> Self {
        self.stripe_payment_intent_id = Some(intent_id.into());
        self
    }

    pub fn with_square_payment(mut self, payment_id: impl Into<String>) -> Self {
        self.square_payment_id = Some(payment_id.into());
        self
    }

    pub fn with_total_amount(mut self, amount: Cents) -> Self {
        self.total_amount = amount;
        self
    }
}

//--------------------------------------      Attendee       ---------------------------------------------------------
/// A person attached to exactly one registration.
#[derive(Debug, Clone, FromRow)]
pub struct Attendee {
    pub id: String,
    pub registration_id: RegistrationId,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl Attendee {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            "Unknown attendee".to_string()
        } else {
            name.to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAttendee {
    pub id: String,
    pub registration_id: RegistrationId,
    pub first_name: String,
    pub last_name: String,
}

//--------------------------------------    TicketOwnerType  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TicketOwnerType {
    Attendee,
    Lodge,
    Registration,
}

impl Display for TicketOwnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketOwnerType::Attendee => write!(f, "Attendee"),
            TicketOwnerType::Lodge => write!(f, "Lodge"),
            TicketOwnerType::Registration => write!(f, "Registration"),
        }
    }
}

//--------------------------------------     TicketStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TicketStatus {
    Active,
    Cancelled,
}

impl Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Active => write!(f, "Active"),
            TicketStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

//--------------------------------------       Ticket        ---------------------------------------------------------
/// A ticket held under a registration.
///
/// `cached_price` is whatever the import recorded and may be stale; billing always prices from the
/// [`EventTicket`] catalog row.
#[derive(Debug, Clone, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub registration_id: RegistrationId,
    pub event_ticket_id: String,
    pub cached_price: Cents,
    pub quantity: i64,
    pub owner_type: TicketOwnerType,
    pub owner_id: Option<String>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub registration_id: RegistrationId,
    pub event_ticket_id: String,
    pub cached_price: Cents,
    pub quantity: i64,
    pub owner_type: TicketOwnerType,
    pub owner_id: Option<String>,
    pub status: TicketStatus,
}

impl NewTicket {
    pub fn new(registration_id: RegistrationId, event_ticket_id: impl Into<String>) -> Self {
        Self {
            registration_id,
            event_ticket_id: event_ticket_id.into(),
            cached_price: Cents::default(),
            quantity: 1,
            owner_type: TicketOwnerType::Registration,
            owner_id: None,
            status: TicketStatus::Active,
        }
    }

    pub fn owned_by_attendee(mut self, attendee_id: impl Into<String>) -> Self {
        self.owner_type = TicketOwnerType::Attendee;
        self.owner_id = Some(attendee_id.into());
        self
    }

    pub fn with_cached_price(mut self, price: Cents) -> Self {
        self.cached_price = price;
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.status = TicketStatus::Cancelled;
        self
    }
}

//--------------------------------------     EventTicket     ---------------------------------------------------------
/// A ticket-catalog entry. The price here is the authoritative unit price at invoice-build time.
#[derive(Debug, Clone, FromRow)]
pub struct EventTicket {
    pub id: String,
    pub name: String,
    pub price: Cents,
}

//--------------------------------------    InvoiceStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Created,
    Voided,
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Created => write!(f, "Created"),
            InvoiceStatus::Voided => write!(f, "Voided"),
        }
    }
}

//--------------------------------------    Line item types  ---------------------------------------------------------
/// One priced row under an owner: a distinct (catalog item, unit price) pair with quantity aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLineItem {
    pub event_ticket_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub amount: Cents,
}

/// One top-level line item per billable owner (an attendee, or the registration itself for bulk tickets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerLineItem {
    pub description: String,
    pub sub_items: Vec<TicketLineItem>,
    pub total: Cents,
}

/// Audit record for a ticket whose owner reference could not be resolved. The ticket is billed against the
/// registration instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionGap {
    pub ticket_id: i64,
    pub owner_type: TicketOwnerType,
    pub owner_id: Option<String>,
    pub detail: String,
}

//--------------------------------------       Invoice       ---------------------------------------------------------
/// A numbered, immutable invoice. The only permitted mutation after creation is the transition to `Voided`.
#[derive(Debug, Clone, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub customer_invoice_number: String,
    pub supplier_invoice_number: String,
    pub payment_id: PaymentId,
    pub registration_id: RegistrationId,
    pub line_items: Json<Vec<OwnerLineItem>>,
    pub resolution_gaps: Json<Vec<ResolutionGap>>,
    pub subtotal: Cents,
    pub processing_fee: Cents,
    pub tax_included: Cents,
    pub total: Cents,
    pub status: InvoiceStatus,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_invoice_number: String,
    pub supplier_invoice_number: String,
    pub payment_id: PaymentId,
    pub registration_id: RegistrationId,
    pub line_items: Vec<OwnerLineItem>,
    pub resolution_gaps: Vec<ResolutionGap>,
    pub subtotal: Cents,
    pub processing_fee: Cents,
    pub tax_included: Cents,
    pub total: Cents,
}

//--------------------------------------  LedgerTransaction  ---------------------------------------------------------
/// A ledger row flattened from one invoice sub-item. Immutable once written.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerTransaction {
    pub id: i64,
    pub invoice_id: i64,
    pub invoice_number: String,
    pub owner: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerTransaction {
    pub invoice_number: String,
    pub owner: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub amount: Cents,
}
