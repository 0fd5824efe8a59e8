mod invoice_number;

pub use invoice_number::{InvoiceNumberError, NumberingScheme, INVOICE_NUMBER_WIDTH};
