use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not authenticate with the payment provider: {0}")]
    AuthenticationError(String),
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
    #[error("{0}")]
    InvalidSignature(String),
}
