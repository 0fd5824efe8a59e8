pub mod assembler;
pub mod errors;
pub mod invoice_objects;

mod invoice_flow_api;
mod ownership_api;
mod sequence_api;

pub use invoice_flow_api::InvoiceFlowApi;
pub use ownership_api::OwnershipApi;
pub use sequence_api::{SequenceApi, CUSTOMER_INVOICE_SEQUENCE, SUPPLIER_INVOICE_SEQUENCE};
