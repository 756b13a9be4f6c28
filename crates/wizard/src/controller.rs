//! Wizard state machine: step navigation, value ownership and the submission
//! lifecycle.

use std::fmt;

use chrono::Utc;
use shared::{
    auth::{AuthContext, StaleSession},
    domain::{FieldMap, FieldValue, FileHandle, FileSlot, WatchId},
    protocol::{DraftSnapshot, SubmissionReceipt, SubmissionTarget},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    adapter::{SubmissionAdapter, SubmissionRequest},
    error::{SubmissionError, WizardError},
    intake::intake_steps,
    prefill::InitialState,
    schema::{find_field, FieldKind, FieldSpec, StepDefinition},
    staging::{FilePreview, FileStaging, ReleaseHook},
    validator::{first_failing_step, validate_all, validate_step, ValidationErrors},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Step(usize),
    Submitting,
    Submitted,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(step) => write!(f, "on step {step}"),
            Self::Submitting => f.write_str("submitting"),
            Self::Submitted => f.write_str("submitted"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// One submission attempt. Its result is only applied if no newer attempt
/// started and the attempt was not abandoned in the meantime.
#[derive(Debug)]
pub struct SubmissionTicket {
    generation: u64,
    request: SubmissionRequest,
}

impl SubmissionTicket {
    pub fn request(&self) -> &SubmissionRequest {
        &self.request
    }
}

pub struct WizardController {
    steps: Vec<StepDefinition>,
    phase: Phase,
    current_step: usize,
    values: FieldMap,
    errors: ValidationErrors,
    staging: FileStaging,
    record_id: Option<WatchId>,
    draft_id: Uuid,
    generation: u64,
    last_failure: Option<SubmissionError>,
    receipt: Option<SubmissionReceipt>,
}

impl WizardController {
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self::with_initial_state(steps, InitialState::empty())
    }

    pub fn with_initial_state(steps: Vec<StepDefinition>, initial: InitialState) -> Self {
        let (record_id, values) = initial.into_parts();
        Self {
            steps,
            phase: Phase::Step(0),
            current_step: 0,
            values,
            errors: ValidationErrors::default(),
            staging: FileStaging::new(),
            record_id,
            draft_id: Uuid::new_v4(),
            generation: 0,
            last_failure: None,
            receipt: None,
        }
    }

    /// Continues a session from a locally saved draft.
    pub fn resume(steps: Vec<StepDefinition>, snapshot: DraftSnapshot) -> Self {
        let last = steps.len().saturating_sub(1);
        let current_step = snapshot.current_step.min(last);
        Self {
            steps,
            phase: Phase::Step(current_step),
            current_step,
            values: snapshot.values,
            errors: ValidationErrors::default(),
            staging: FileStaging::with_removed(snapshot.removed_files),
            record_id: snapshot.record_id,
            draft_id: snapshot.draft_id,
            generation: 0,
            last_failure: None,
            receipt: None,
        }
    }

    pub fn intake() -> Self {
        Self::new(intake_steps())
    }

    pub fn intake_with(initial: InitialState) -> Self {
        Self::with_initial_state(intake_steps(), initial)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step == self.last_step()
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn current_definition(&self) -> Option<&StepDefinition> {
        self.steps.get(self.current_step)
    }

    pub fn values(&self) -> &FieldMap {
        &self.values
    }

    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn staging(&self) -> &FileStaging {
        &self.staging
    }

    /// Registers the callback run for each released preview, including the
    /// ones still live when the wizard is dropped.
    pub fn on_preview_release(&mut self, hook: impl Fn(&FilePreview) + Send + Sync + 'static) {
        self.staging.set_release_hook(ReleaseHook::new(hook));
    }

    pub fn record_id(&self) -> Option<WatchId> {
        self.record_id
    }

    pub fn draft_id(&self) -> Uuid {
        self.draft_id
    }

    pub fn last_failure(&self) -> Option<&SubmissionError> {
        self.last_failure.as_ref()
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn has_staged_files(&self) -> bool {
        self.values.values().any(FieldValue::has_staged_files)
    }

    pub fn set_value(&mut self, field: &str, value: FieldValue) -> Result<(), WizardError> {
        let spec = self.spec(field)?;
        if spec.kind.is_file() || !spec.kind.accepts(&value) {
            return Err(WizardError::WrongKind {
                field: field.to_string(),
                expected: spec.kind.name(),
            });
        }
        self.begin_edit("edit a field")?;
        self.values.insert(field.to_string(), value);
        self.errors.remove(field);
        Ok(())
    }

    pub fn clear_value(&mut self, field: &str) -> Result<(), WizardError> {
        let is_file = self.spec(field)?.kind.is_file();
        self.begin_edit("clear a field")?;
        if is_file {
            self.staging.clear(&mut self.values, field);
        } else {
            self.values.remove(field);
        }
        self.errors.remove(field);
        Ok(())
    }

    pub fn attach_file(&mut self, field: &str, handle: FileHandle) -> Result<FilePreview, WizardError> {
        self.expect_kind(field, |kind| matches!(kind, FieldKind::File))?;
        self.begin_edit("attach a file")?;
        self.errors.remove(field);
        Ok(self.staging.attach(&mut self.values, field, handle))
    }

    pub fn append_file(&mut self, field: &str, handle: FileHandle) -> Result<FilePreview, WizardError> {
        self.expect_kind(field, |kind| matches!(kind, FieldKind::FileList))?;
        self.begin_edit("attach a file")?;
        self.errors.remove(field);
        Ok(self.staging.append(&mut self.values, field, handle))
    }

    pub fn remove_file_at(&mut self, field: &str, index: usize) -> Result<Option<FileSlot>, WizardError> {
        self.expect_kind(field, |kind| matches!(kind, FieldKind::FileList))?;
        self.begin_edit("remove a file")?;
        self.errors.remove(field);
        Ok(self.staging.remove_at(&mut self.values, field, index))
    }

    pub fn validate_current(&self) -> ValidationErrors {
        self.steps
            .get(self.current_step)
            .map(|step| validate_step(step, &self.values))
            .unwrap_or_default()
    }

    /// Validates the current step and moves forward on success. Values are
    /// never reset by navigation.
    pub fn go_next(&mut self) -> Result<usize, WizardError> {
        let Phase::Step(step) = self.phase else {
            return Err(self.invalid("advance"));
        };
        if step >= self.last_step() {
            return Err(self.invalid("advance past the last step"));
        }

        let errors = validate_step(&self.steps[step], &self.values);
        if !errors.is_empty() {
            debug!(step, failed = errors.len(), "step validation failed");
            self.errors = errors.clone();
            return Err(WizardError::Validation(errors));
        }

        self.errors.clear();
        self.current_step = step + 1;
        self.phase = Phase::Step(self.current_step);
        info!(from = step, to = self.current_step, "advanced wizard step");
        Ok(self.current_step)
    }

    /// Moves one step back without revalidating. Stays put on the first step.
    pub fn go_back(&mut self) -> Result<usize, WizardError> {
        if !matches!(self.phase, Phase::Step(_) | Phase::Failed) {
            return Err(self.invalid("go back"));
        }
        self.current_step = self.current_step.saturating_sub(1);
        self.phase = Phase::Step(self.current_step);
        self.errors.clear();
        Ok(self.current_step)
    }

    /// Jumps back to an earlier step, e.g. from the review page.
    pub fn go_to(&mut self, step: usize) -> Result<usize, WizardError> {
        if !matches!(self.phase, Phase::Step(_) | Phase::Failed) {
            return Err(self.invalid("jump to a step"));
        }
        if step > self.current_step {
            return Err(self.invalid("jump forward past unvalidated steps"));
        }
        self.current_step = step;
        self.phase = Phase::Step(step);
        self.errors.clear();
        Ok(step)
    }

    /// Validates every step and, on success, enters `Submitting` and returns
    /// the request to send. An invalid wizard moves to the first failing step
    /// and reports only that step's errors. Fails without changing phase when
    /// the session is stale.
    pub fn begin_submission(&mut self, auth: &AuthContext) -> Result<SubmissionTicket, WizardError> {
        match self.phase {
            Phase::Step(step) if step == self.last_step() => {}
            Phase::Failed => {}
            _ => return Err(self.invalid("submit")),
        }

        let errors = validate_all(&self.steps, &self.values);
        if !errors.is_empty() {
            let target = first_failing_step(&self.steps, &errors).unwrap_or(self.current_step);
            let step_errors = self
                .steps
                .get(target)
                .map_or_else(|| errors.clone(), |step| errors.for_step(step));
            debug!(
                step = target,
                failed = errors.len(),
                shown = step_errors.len(),
                "final validation failed"
            );
            self.current_step = target;
            self.phase = Phase::Step(target);
            self.errors = step_errors.clone();
            return Err(WizardError::Validation(step_errors));
        }

        auth.bearer(Utc::now())?;

        self.errors.clear();
        self.last_failure = None;
        self.generation += 1;
        self.phase = Phase::Submitting;

        let request = SubmissionRequest {
            target: SubmissionTarget::from_record(self.record_id),
            values: self.values.clone(),
            removed_files: self
                .staging
                .removed_files()
                .iter()
                .map(|removed| removed.path.clone())
                .collect(),
        };
        info!(
            generation = self.generation,
            destination = ?request.target,
            removed = request.removed_files.len(),
            "submitting intake"
        );
        Ok(SubmissionTicket {
            generation: self.generation,
            request,
        })
    }

    /// Applies the adapter's result for `ticket`.
    pub fn complete_submission(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<SubmissionReceipt, SubmissionError>,
    ) -> Result<SubmissionReceipt, WizardError> {
        if ticket.generation != self.generation || self.phase != Phase::Submitting {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarded stale submission result"
            );
            return Err(WizardError::Abandoned);
        }

        match result {
            Ok(receipt) => {
                self.staging.release_all();
                let consumed = self.staging.take_removed();
                self.values = self
                    .values
                    .iter()
                    .filter_map(|(name, value)| {
                        value.without_staged_files().map(|value| (name.clone(), value))
                    })
                    .collect();
                self.phase = Phase::Submitted;
                self.receipt = Some(receipt.clone());
                info!(
                    record_id = %receipt.id,
                    removed = consumed.len(),
                    "intake submitted"
                );
                Ok(receipt)
            }
            Err(error) => {
                warn!(kind = ?error.kind, %error, "intake submission failed");
                self.phase = Phase::Failed;
                self.current_step = self.last_step();
                for (field, messages) in &error.field_errors {
                    if let Some(message) = messages.first() {
                        self.errors.insert(field.clone(), message.clone());
                    }
                }
                self.last_failure = Some(error.clone());
                if error.is_stale_session() {
                    Err(WizardError::StaleSession(StaleSession::Revoked))
                } else {
                    Err(WizardError::Submission(error))
                }
            }
        }
    }

    /// Gives up on an in-flight submission; its result will be discarded.
    pub fn abandon_submission(&mut self) {
        if self.phase == Phase::Submitting {
            self.generation += 1;
            self.phase = Phase::Step(self.current_step);
            info!(generation = self.generation, "abandoned in-flight submission");
        }
    }

    /// Runs one full submission attempt. A credential the server refuses is
    /// revoked on `auth`, so it is not sent again until the caller logs in.
    pub async fn submit_final<A>(
        &mut self,
        adapter: &A,
        auth: &mut AuthContext,
    ) -> Result<SubmissionReceipt, WizardError>
    where
        A: SubmissionAdapter + ?Sized,
    {
        let ticket = self.begin_submission(auth)?;
        let result = adapter.submit(auth, ticket.request()).await;
        let outcome = self.complete_submission(ticket, result);
        if matches!(outcome, Err(WizardError::StaleSession(StaleSession::Revoked))) {
            warn!("server refused the session; credential revoked");
            auth.revoke();
        }
        outcome
    }

    pub async fn retry<A>(
        &mut self,
        adapter: &A,
        auth: &mut AuthContext,
    ) -> Result<SubmissionReceipt, WizardError>
    where
        A: SubmissionAdapter + ?Sized,
    {
        if self.phase != Phase::Failed {
            return Err(self.invalid("retry"));
        }
        self.submit_final(adapter, auth).await
    }

    /// Persistable copy of the session. In-memory uploads are left out.
    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            draft_id: self.draft_id,
            record_id: self.record_id,
            current_step: self.current_step,
            values: self
                .values
                .iter()
                .filter_map(|(name, value)| {
                    value.without_staged_files().map(|value| (name.clone(), value))
                })
                .collect(),
            removed_files: self.staging.removed_files().iter().cloned().collect(),
            updated_at: Utc::now(),
        }
    }

    fn last_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    fn spec(&self, field: &str) -> Result<&FieldSpec, WizardError> {
        find_field(&self.steps, field)
            .map(|(_, spec)| spec)
            .ok_or_else(|| WizardError::UnknownField(field.to_string()))
    }

    fn expect_kind(&self, field: &str, check: impl Fn(&FieldKind) -> bool) -> Result<(), WizardError> {
        let spec = self.spec(field)?;
        if check(&spec.kind) {
            Ok(())
        } else {
            Err(WizardError::WrongKind {
                field: field.to_string(),
                expected: spec.kind.name(),
            })
        }
    }

    fn begin_edit(&mut self, action: &'static str) -> Result<(), WizardError> {
        match self.phase {
            Phase::Step(_) => Ok(()),
            Phase::Failed => {
                self.phase = Phase::Step(self.current_step);
                Ok(())
            }
            Phase::Submitting | Phase::Submitted => Err(self.invalid(action)),
        }
    }

    fn invalid(&self, action: &'static str) -> WizardError {
        WizardError::InvalidTransition {
            from: self.phase,
            action,
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
