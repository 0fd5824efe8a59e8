mod billing_database;
mod data_objects;

pub use billing_database::{BillingDatabase, BillingGatewayError};
pub use data_objects::{BatchSummary, ClaimOutcome, CommitStep, GenerateOptions, InvoiceResult};
