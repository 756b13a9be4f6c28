use std::collections::BTreeMap;

use shared::auth::StaleSession;
use thiserror::Error;

use crate::{controller::Phase, validator::ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionErrorKind {
    /// The request never got a response (connect, DNS, timeout).
    Network,
    /// The server refused the credential (401/419).
    Unauthorized,
    /// The server rejected the payload (422) with field-level detail.
    Rejected,
    /// Any other non-success response.
    Server,
}

/// Failure reported by a collaborator. The wizard surfaces `message` as a
/// banner and keeps every value for a retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    pub message: String,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl SubmissionError {
    pub fn new(kind: SubmissionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Network, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Unauthorized, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(SubmissionErrorKind::Server, message)
    }

    pub fn rejected(
        message: impl Into<String>,
        field_errors: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            kind: SubmissionErrorKind::Rejected,
            message: message.into(),
            field_errors,
        }
    }

    pub fn is_stale_session(&self) -> bool {
        self.kind == SubmissionErrorKind::Unauthorized
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WizardError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("submission failed: {0}")]
    Submission(SubmissionError),
    #[error(transparent)]
    StaleSession(#[from] StaleSession),
    #[error("cannot {action} while the wizard is {from}")]
    InvalidTransition { from: Phase, action: &'static str },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field '{field}' expects a {expected} value")]
    WrongKind {
        field: String,
        expected: &'static str,
    },
    #[error("submission result arrived after the attempt was abandoned")]
    Abandoned,
}

impl WizardError {
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Whether the user has to log in again before retrying.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::StaleSession(_))
    }
}
