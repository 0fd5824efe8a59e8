use thiserror::Error;

/// Width of the zero-padded sequence portion of an invoice number.
pub const INVOICE_NUMBER_WIDTH: usize = 9;

#[derive(Debug, Clone, Error)]
pub enum InvoiceNumberError {
    #[error("Invoice number '{0}' does not carry the expected prefix '{1}'")]
    WrongPrefix(String, String),
    #[error("Invoice number '{0}' does not end in a sequence value")]
    NotNumeric(String),
}

/// Prefixes used to mint the customer and supplier invoice numbers from their sequence values.
///
/// A number is `<prefix><value>` with the value zero-padded to [`INVOICE_NUMBER_WIDTH`] digits. Formatting and
/// parsing round-trip, so a stored invoice number can always be taken back to the integer the counter issued.
#[derive(Debug, Clone)]
pub struct NumberingScheme {
    pub customer_prefix: String,
    pub supplier_prefix: String,
}

impl Default for NumberingScheme {
    fn default() -> Self {
        Self { customer_prefix: "INV-".to_string(), supplier_prefix: "SUP-".to_string() }
    }
}

impl NumberingScheme {
    pub fn new(customer_prefix: impl Into<String>, supplier_prefix: impl Into<String>) -> Self {
        Self { customer_prefix: customer_prefix.into(), supplier_prefix: supplier_prefix.into() }
    }

    pub fn customer_number(&self, sequence_value: i64) -> String {
        format_invoice_number(&self.customer_prefix, sequence_value)
    }

    pub fn supplier_number(&self, sequence_value: i64) -> String {
        format_invoice_number(&self.supplier_prefix, sequence_value)
    }

    pub fn parse_customer_number(&self, number: &str) -> Result<i64, InvoiceNumberError> {
        parse_invoice_number(&self.customer_prefix, number)
    }

    pub fn parse_supplier_number(&self, number: &str) -> Result<i64, InvoiceNumberError> {
        parse_invoice_number(&self.supplier_prefix, number)
    }
}

pub fn format_invoice_number(prefix: &str, sequence_value: i64) -> String {
    format!("{prefix}{sequence_value:0width$}", width = INVOICE_NUMBER_WIDTH)
}

pub fn parse_invoice_number(prefix: &str, number: &str) -> Result<i64, InvoiceNumberError> {
    let digits = number
        .strip_prefix(prefix)
        .ok_or_else(|| InvoiceNumberError::WrongPrefix(number.to_string(), prefix.to_string()))?;
    digits.parse::<i64>().map_err(|_| InvoiceNumberError::NotNumeric(number.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_pads_to_width() {
        let scheme = NumberingScheme::default();
        assert_eq!(scheme.customer_number(42), "INV-000000042");
        assert_eq!(scheme.supplier_number(42), "SUP-000000042");
        assert_eq!(scheme.customer_number(1_234_567_890), "INV-1234567890");
    }

    #[test]
    fn round_trip_recovers_sequence_value() {
        let scheme = NumberingScheme::new("ACME-", "ACME-S-");
        for v in [0, 1, 7, 99_999, 123_456_789, i64::MAX] {
            assert_eq!(scheme.parse_customer_number(&scheme.customer_number(v)).unwrap(), v);
            assert_eq!(scheme.parse_supplier_number(&scheme.supplier_number(v)).unwrap(), v);
        }
    }

    #[test]
    fn parse_rejects_foreign_numbers() {
        let scheme = NumberingScheme::default();
        assert!(matches!(
            scheme.parse_customer_number("SUP-000000042"),
            Err(InvoiceNumberError::WrongPrefix(_, _))
        ));
        assert!(matches!(scheme.parse_customer_number("INV-abc"), Err(InvoiceNumberError::NotNumeric(_))));
    }
}
