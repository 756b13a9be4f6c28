use shared::{auth::StaleSession, error::ApiError};
use thiserror::Error;
use wizard::SubmissionError;

pub(crate) const UNREACHABLE_MESSAGE: &str =
    "Intake API unreachable; check the URL or network and retry.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error(transparent)]
    StaleSession(#[from] StaleSession),
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{}", .0.message)]
    Rejected(ApiError),
    #[error("API error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid upload part: {0}")]
    InvalidPart(String),
}

impl ClientError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if err.is_connect() || err.is_timeout() {
            Self::Network(UNREACHABLE_MESSAGE.to_string())
        } else {
            Self::Network(format!("Request to the intake API failed: {err}"))
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::StaleSession(_) | Self::Unauthorized(_))
    }
}

impl From<ClientError> for SubmissionError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(message) => SubmissionError::network(message),
            ClientError::Unauthorized(message) => SubmissionError::unauthorized(message),
            ClientError::StaleSession(stale) => SubmissionError::unauthorized(stale.to_string()),
            ClientError::Rejected(api) => SubmissionError::rejected(api.message, api.errors),
            ClientError::Server { message, .. } => SubmissionError::server(message),
            other @ (ClientError::InvalidUrl(_)
            | ClientError::Build(_)
            | ClientError::Decode(_)
            | ClientError::InvalidPart(_)) => SubmissionError::server(other.to_string()),
        }
    }
}
