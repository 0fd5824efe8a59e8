use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use billing_engine::InvoiceFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invoice regeneration is disabled on this server")]
    RegenerateDisabled,
    #[error("{0}")]
    InvoiceFlow(#[from] InvoiceFlowError),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ServerError {
    /// Stable machine-readable kind for response bodies.
    fn kind(&self) -> &'static str {
        match self {
            Self::InitializeError(_) => "InitializeError",
            Self::BackendError(_) => "BackendError",
            Self::InvalidRequestBody(_) => "InvalidRequestBody",
            Self::IOError(_) => "IOError",
            Self::RegenerateDisabled => "RegenerateDisabled",
            Self::Unspecified(_) => "UnspecifiedError",
            Self::InvoiceFlow(e) => match e {
                InvoiceFlowError::PaymentNotFound(_) => "PaymentNotFound",
                InvoiceFlowError::PaymentNotBillable(_, _) => "PaymentNotBillable",
                InvoiceFlowError::NoMatchFound(_) => "NoMatchFound",
                InvoiceFlowError::AmbiguousMatch { .. } => "AmbiguousMatch",
                InvoiceFlowError::RegenerateNotAuthorized(_) => "RegenerateNotAuthorized",
                InvoiceFlowError::AllocationFailure(_) => "AllocationFailure",
                InvoiceFlowError::PersistenceFailure { .. } => "PersistenceFailure",
                InvoiceFlowError::BackendError(_) => "BackendError",
            },
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::RegenerateDisabled => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvoiceFlow(e) => match e {
                InvoiceFlowError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
                InvoiceFlowError::PaymentNotBillable(_, _) => StatusCode::CONFLICT,
                InvoiceFlowError::NoMatchFound(_) => StatusCode::CONFLICT,
                InvoiceFlowError::AmbiguousMatch { .. } => StatusCode::CONFLICT,
                InvoiceFlowError::RegenerateNotAuthorized(_) => StatusCode::CONFLICT,
                InvoiceFlowError::AllocationFailure(_) => StatusCode::BAD_GATEWAY,
                InvoiceFlowError::PersistenceFailure { .. } => StatusCode::BAD_GATEWAY,
                InvoiceFlowError::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(
            serde_json::json!({ "success": false, "error": self.kind(), "detail": self.to_string() }).to_string(),
        )
    }
}
