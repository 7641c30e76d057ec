use thiserror::Error;

#[derive(Debug, Error)]
pub enum MobileMoneyApiError {
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
    #[error("Could not obtain an access token. {0}")]
    AuthenticationError(String),
    #[error("The provider did not respond in time. {0}")]
    Timeout(String),
    #[error("The provider rejected the request. {0}")]
    Rejected(String),
}

impl MobileMoneyApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for MobileMoneyApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else if e.is_builder() {
            Self::RestRequestError(e.to_string())
        } else {
            Self::RestResponseError(e.to_string())
        }
    }
}
