use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced to the caller as an XML error document.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The caller did not supply a usable fund identifier.
    #[error("{0}")]
    InvalidArgument(String),
    /// One of the provider fetches failed; the message names the endpoint when known.
    #[error("{0}")]
    Upstream(String),
    #[error("timeout after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("{0}")]
    Unhandled(String),
}

impl HandlerError {
    pub fn missing_fund() -> Self {
        HandlerError::InvalidArgument("Missing fund".to_string())
    }

    /// True when the request itself was at fault rather than the service.
    pub fn is_caller_error(&self) -> bool {
        self.status().is_client_error()
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::InvalidArgument(_) => StatusCode::PRECONDITION_FAILED,
            HandlerError::Upstream(_) | HandlerError::Timeout(_) | HandlerError::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Upstream(format!("{err:#}"))
    }
}
