use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The gateway does not know about transaction {0} (yet)")]
    TransactionNotFound(String),
    #[error("The gateway rejected our credentials: {0}")]
    AuthenticationFailed(String),
    #[error("The gateway rejected the request as malformed: {0}")]
    MalformedRequest(String),
    #[error("The gateway is unavailable: {0}")]
    Unavailable(String),
    #[error("Could not deserialize gateway response: {0}")]
    JsonError(String),
    #[error("Unexpected gateway response: {0}")]
    UnexpectedResponse(String),
}

impl GatewayError {
    /// "Not found" is the only transient verification failure: the gateway reports transactions over webhooks before
    /// they become queryable, so a short retry is warranted. Auth and malformed-request failures never are.
    pub fn is_transient_lookup_failure(&self) -> bool {
        matches!(self, GatewayError::TransactionNotFound(_))
    }

    /// Errors that a caller may retry later (as opposed to never): availability problems on top of the transient ones.
    pub fn is_retryable(&self) -> bool {
        self.is_transient_lookup_failure() || matches!(self, GatewayError::Unavailable(_))
    }
}
