use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use gateway_tools::GatewayError;
use thiserror::Error;
use wallet_payment_engine::{
    traits::{AccountApiError, ExchangeRateError},
    WalletLedgerError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("The payment could not be accepted. {0}")]
    PaymentRejected(String),
    #[error("The request conflicts with the recorded payment state. {0}")]
    Conflict(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::PaymentRejected(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<WalletLedgerError> for ServerError {
    fn from(e: WalletLedgerError) -> Self {
        match &e {
            WalletLedgerError::AccountNotFound(_) |
            WalletLedgerError::SubscriptionNotFound(_) => Self::NoRecordFound(e.to_string()),
            // Business rejections. Recorded on the payment record where applicable; never retryable.
            WalletLedgerError::AmountMismatch { .. } |
            WalletLedgerError::CurrencyMismatch { .. } |
            WalletLedgerError::TransactionNotSuccessful { .. } |
            WalletLedgerError::AlreadyFailed { .. } |
            WalletLedgerError::InsufficientFunds { .. } => Self::PaymentRejected(e.to_string()),
            WalletLedgerError::PaymentAlreadyExists(_) | WalletLedgerError::PaymentAlreadyTerminal(_, _) => {
                Self::Conflict(e.to_string())
            },
            WalletLedgerError::DatabaseError(_) |
            WalletLedgerError::DatabaseBusy(_) |
            WalletLedgerError::AccountError(_) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match &e {
            GatewayError::TransactionNotFound(_) => Self::NoRecordFound(e.to_string()),
            GatewayError::Unavailable(_) => Self::GatewayUnavailable(e.to_string()),
            _ => Self::BackendError(e.to_string()),
        }
    }
}

impl From<ExchangeRateError> for ServerError {
    fn from(e: ExchangeRateError) -> Self {
        match &e {
            ExchangeRateError::RateDoesNotExist(_) => Self::NoRecordFound(e.to_string()),
            ExchangeRateError::SourceUnavailable(_) => Self::GatewayUnavailable(e.to_string()),
        }
    }
}
