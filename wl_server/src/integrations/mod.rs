//! Adapters between the engine's payment gateway traits and the provider HTTP clients in `gateway_tools`.
mod paypal;
mod stripe;

use gateway_tools::GatewayApiError;
pub use paypal::PaypalGateway;
pub use stripe::StripeGateway;
use wl_engine::traits::GatewayError;

pub(crate) fn gateway_error(e: GatewayApiError) -> GatewayError {
    match e {
        GatewayApiError::InvalidSignature(msg) => GatewayError::InvalidSignature(msg),
        GatewayApiError::JsonError(msg) | GatewayApiError::RestResponseError(msg) => {
            GatewayError::InvalidResponse(msg)
        },
        GatewayApiError::QueryError { message, .. } => GatewayError::ProviderError(message),
        other => GatewayError::ProviderError(other.to_string()),
    }
}
