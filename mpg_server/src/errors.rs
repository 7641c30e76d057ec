use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use mpg_engine::{PaymentFlowError, TransactionStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error. {0}")]
    CouldNotDeserializePayload(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Invalid payment request. {0}")]
    ValidationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Conflicting update. {0}")]
    Conflict(String),
    #[error("The request cannot be carried out in the current state. {0}")]
    InvalidState(String),
    #[error("The payment provider failed. {0}")]
    GatewayError(String),
    #[error("Payment provider unavailable. {0}")]
    GatewayUnavailable(String),
    #[error("Webhook signature rejected. {0}")]
    InvalidSignature(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidSignature(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::Validation(s) => Self::ValidationError(s),
            PaymentFlowError::NotFound(s) => Self::NoRecordFound(s),
            PaymentFlowError::Conflict(s) => Self::Conflict(s),
            PaymentFlowError::InvalidState(s) => Self::InvalidState(s),
            PaymentFlowError::Gateway(s) => Self::GatewayError(s),
            PaymentFlowError::NoGateway(p) => Self::GatewayUnavailable(format!("No gateway is configured for {p}")),
            PaymentFlowError::Store(TransactionStoreError::TransactionNotFound(id)) => Self::NoRecordFound(id),
            PaymentFlowError::Store(e) => Self::BackendError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use mpg_engine::db_types::Provider;

    use super::*;

    #[test]
    fn flow_errors_map_to_status_codes() {
        let code = |e: PaymentFlowError| ServerError::from(e).status_code();
        assert_eq!(code(PaymentFlowError::Validation("amount".into())), StatusCode::BAD_REQUEST);
        assert_eq!(code(PaymentFlowError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(code(PaymentFlowError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(code(PaymentFlowError::InvalidState("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code(PaymentFlowError::Gateway("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(code(PaymentFlowError::NoGateway(Provider::Card)), StatusCode::SERVICE_UNAVAILABLE);
        let db = TransactionStoreError::DatabaseError("disk full".into());
        assert_eq!(code(PaymentFlowError::Store(db)), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
