//! Registration Billing Engine
//!
//! The billing engine associates settled payments from multiple payment providers with event registrations, and
//! mints a permanently numbered, immutable invoice exactly once per payment. It survives retries, concurrent
//! invocation and partial-failure recovery. This library is storage-trait driven; SQLite is the bundled backend.
//!
//! The library splits into:
//! 1. Database management (a SQLite backend behind the [`traits::BillingDatabase`] contract). You should never need
//!    to touch the tables directly; the data types in [`db_types`] are the public surface.
//! 2. The billing API ([`mod@billing_api`]): identity matching, ownership resolution, invoice assembly, the sequence
//!    counter, and the commit coordinator that ties them together.
//!
//! Engine events (invoice created, invoice voided) are published through a small hook system in [`events`] so that
//! document rendering and delivery can live outside the engine.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod billing_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod matching;
pub mod traits;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use billing_api::{
    errors::InvoiceFlowError,
    invoice_objects,
    InvoiceFlowApi,
    OwnershipApi,
    SequenceApi,
    CUSTOMER_INVOICE_SEQUENCE,
    SUPPLIER_INVOICE_SEQUENCE,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{BillingDatabase, BillingGatewayError};
