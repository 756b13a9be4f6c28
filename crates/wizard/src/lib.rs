//! Multi-step intake wizard: step schemas, validation, file staging and the
//! submission lifecycle. Network access lives behind the traits in
//! [`adapter`].

pub mod adapter;
pub mod controller;
pub mod error;
pub mod intake;
pub mod prefill;
pub mod schema;
pub mod staging;
pub mod validator;

pub use adapter::{DraftSource, SubmissionAdapter, SubmissionRequest};
pub use controller::{Phase, SubmissionTicket, WizardController};
pub use error::{SubmissionError, SubmissionErrorKind, WizardError};
pub use intake::{intake_steps, TOTAL_STEPS};
pub use prefill::{coerce_json, InitialState};
pub use schema::{Condition, FieldKind, FieldSpec, Requirement, Rule, StepDefinition};
pub use staging::{FilePreview, FileStaging, ReleaseHook};
pub use validator::{validate_all, validate_step, ValidationErrors};
