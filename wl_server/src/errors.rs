use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError, ResponseError},
    http::{header::ContentType, StatusCode},
    web,
    HttpRequest,
    HttpResponse,
};
use log::*;
use thiserror::Error;
use wl_engine::traits::{GatewayError, StoreError};

use crate::data_objects::JsonResponse;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Could not read query string: {0}")]
    InvalidQueryString(String),
    #[error("Invalid webhook signature. {0}")]
    InvalidSignature(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    NoRecordFound(String),
    #[error("{0}")]
    InsufficientPermissions(String),
    #[error("Payment provider error. {0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQueryString(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::GatewayError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Storage details stay in the logs
            Self::BackendError(_) | Self::IOError(_) | Self::Unspecified(_) => "Server error".to_string(),
            Self::AuthenticationError(AuthError::InsufficientPermissions(_)) => "Insufficient permissions".to_string(),
            Self::AuthenticationError(_) => "Not authorized".to_string(),
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::to_string(&JsonResponse::failure(message)).unwrap_or_default())
    }
}

/// Requests whose body, path or query cannot be deserialized get the same JSON error body as every other failure.
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .app_data(web::QueryConfig::default().error_handler(query_error));
}

fn json_error(e: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!("💻️ Malformed request body for {}. {e}", req.path());
    ServerError::InvalidRequestBody(e.to_string()).into()
}

fn path_error(e: PathError, req: &HttpRequest) -> actix_web::Error {
    debug!("💻️ Malformed request path {}. {e}", req.path());
    ServerError::InvalidRequestPath(e.to_string()).into()
}

fn query_error(e: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!("💻️ Malformed query string for {}. {e}", req.path());
    ServerError::InvalidQueryString(e.to_string()).into()
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DatabaseError(msg) => {
                error!("🗃️ Storage failure: {msg}");
                Self::BackendError(msg)
            },
            StoreError::ProductNotFound(_) | StoreError::OrderNotFound(_) | StoreError::RefundNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            StoreError::NotOrderOwner(_) => Self::InsufficientPermissions(e.to_string()),
            StoreError::GatewayError(GatewayError::InvalidSignature(msg)) => Self::InvalidSignature(msg),
            StoreError::GatewayError(g) => Self::GatewayError(g.to_string()),
            e if e.is_validation_error() => Self::ValidationError(e.to_string()),
            e => Self::Unspecified(e.to_string()),
        }
    }
}
