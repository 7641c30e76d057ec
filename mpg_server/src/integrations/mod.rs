//! Gateway adapters for the mobile money providers, wrapping the API clients from `mobile_money_tools`.
mod airtel_money;
mod mtn_momo;

pub use airtel_money::AirtelMoneyGateway;
use mobile_money_tools::MobileMoneyApiError;
use mpg_engine::GatewayError;
pub use mtn_momo::MtnMomoGateway;

/// Timeouts stay distinguishable, since the engine treats an unknown outcome differently from a failure.
pub(crate) fn gateway_error(e: MobileMoneyApiError) -> GatewayError {
    match e {
        MobileMoneyApiError::Timeout(s) => GatewayError::Timeout(s),
        e => GatewayError::Provider(e.to_string()),
    }
}
