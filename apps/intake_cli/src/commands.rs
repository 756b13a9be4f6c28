use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use client_core::{ClientError, IntakeClient};
use shared::{auth::AuthContext, domain::WatchId};
use storage::Storage;
use tracing::{info, warn};
use uuid::Uuid;
use wizard::{
    intake_steps, validate_step, InitialState, ValidationErrors, WizardController, WizardError,
    TOTAL_STEPS,
};

use crate::{
    answers::load_answers,
    config::{normalize_database_url, Settings},
};

#[derive(Debug)]
pub struct StepReport {
    pub index: usize,
    pub title: &'static str,
    pub errors: ValidationErrors,
}

/// Validation result of every step against the wizard's current values.
pub fn step_reports(wizard: &WizardController) -> Vec<StepReport> {
    wizard
        .steps()
        .iter()
        .map(|step| StepReport {
            index: step.index,
            title: step.title,
            errors: validate_step(step, wizard.values()),
        })
        .collect()
}

/// Walks forward to the review step, stopping at the first invalid step.
pub fn advance_to_review(wizard: &mut WizardController) -> Result<(), WizardError> {
    while !wizard.is_last_step() {
        wizard.go_next()?;
    }
    Ok(())
}

pub async fn login(settings: &Settings, email: &str, password: &str) -> Result<()> {
    let client = client(settings)?;
    let mut auth = AuthContext::new();
    client
        .login(&mut auth, email, password)
        .await
        .context("login failed")?;

    let token = auth
        .bearer(Utc::now())
        .context("login did not yield a usable session")?;
    println!("export INTAKE_ACCESS_TOKEN={token}");
    if let Some(expires_at) = auth.expires_at() {
        println!("# expires at {expires_at}");
    }
    Ok(())
}

/// Dry run: prints the errors of every step. Returns whether all steps pass.
pub fn validate(answers_path: &Path) -> Result<bool> {
    let mut wizard = WizardController::intake();
    load_answers(answers_path, wizard.steps())?.apply(&mut wizard)?;

    let mut all_valid = true;
    for report in step_reports(&wizard) {
        if report.errors.is_empty() {
            println!("step {} ({}): ok", report.index + 1, report.title);
        } else {
            all_valid = false;
            println!("step {} ({}):", report.index + 1, report.title);
            print_errors(&report.errors);
        }
    }
    Ok(all_valid)
}

pub async fn submit(
    settings: &Settings,
    answers_path: &Path,
    record: Option<WatchId>,
    draft: Option<Uuid>,
) -> Result<()> {
    let storage = open_storage(settings).await?;
    let client = client(settings)?;
    let mut auth = settings
        .access_token
        .as_deref()
        .map(AuthContext::with_token)
        .unwrap_or_default();

    let mut wizard = match (draft, record) {
        (Some(draft_id), _) => {
            let snapshot = storage
                .load_draft(draft_id)
                .await?
                .with_context(|| format!("no saved draft {draft_id}"))?;
            info!(%draft_id, step = snapshot.current_step, "resuming draft");
            WizardController::resume(intake_steps(), snapshot)
        }
        (None, Some(record_id)) => {
            let record = client
                .fetch_record(&auth, record_id)
                .await
                .map_err(|err| record_fetch_failure(record_id, err))?;
            WizardController::intake_with(InitialState::from_record(&intake_steps(), record_id, &record))
        }
        (None, None) => WizardController::intake(),
    };

    let sheet = load_answers(answers_path, wizard.steps())?;
    info!(fields = sheet.len(), "applying answers");
    sheet.apply(&mut wizard)?;

    if let Err(err) = advance_to_review(&mut wizard) {
        return save_after_failure(&storage, &wizard, err).await;
    }

    match wizard.submit_final(&client, &mut auth).await {
        Ok(receipt) => {
            if storage.discard_draft(wizard.draft_id()).await? {
                info!(draft_id = %wizard.draft_id(), "removed submitted draft");
            }
            println!(
                "submitted watch {} (reference {}, status {})",
                receipt.id,
                receipt.reference.as_deref().unwrap_or("-"),
                receipt.status.as_deref().unwrap_or("-"),
            );
            Ok(())
        }
        Err(err) => save_after_failure(&storage, &wizard, err).await,
    }
}

pub async fn list_drafts(settings: &Settings) -> Result<()> {
    let storage = open_storage(settings).await?;
    let drafts = storage.list_drafts().await?;
    if drafts.is_empty() {
        println!("no saved drafts");
    }
    for draft in drafts {
        println!(
            "{}  step {}/{}  record {}  updated {}",
            draft.draft_id,
            draft.current_step + 1,
            TOTAL_STEPS,
            draft
                .record_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            draft.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

pub async fn discard_draft(settings: &Settings, draft_id: Uuid) -> Result<()> {
    let storage = open_storage(settings).await?;
    if !storage.discard_draft(draft_id).await? {
        bail!("no saved draft {draft_id}");
    }
    println!("discarded draft {draft_id}");
    Ok(())
}

async fn save_after_failure(storage: &Storage, wizard: &WizardController, err: WizardError) -> Result<()> {
    let snapshot = wizard.snapshot();
    storage.save_draft(&snapshot).await?;
    warn!(draft_id = %snapshot.draft_id, error = %err, "intake not submitted");

    match &err {
        WizardError::Validation(errors) => {
            let title = wizard.current_definition().map_or("", |step| step.title);
            println!("step {} ({title}) is incomplete:", wizard.current_step() + 1);
            print_errors(errors);
        }
        WizardError::Submission(failure) => {
            println!("{}", failure.message);
            print_errors(wizard.errors());
        }
        other => println!("{other}"),
    }
    if err.requires_reauth() {
        println!("log in again with `intake login` and retry.");
    }
    println!("draft saved as {}; resume with --draft {}", snapshot.draft_id, snapshot.draft_id);
    bail!("intake not submitted")
}

fn record_fetch_failure(record_id: WatchId, err: ClientError) -> anyhow::Error {
    if err.requires_reauth() {
        anyhow!("cannot load watch record {record_id}: {err}. Log in again with `intake login`.")
    } else {
        anyhow::Error::new(err).context(format!("failed to load watch record {record_id}"))
    }
}

fn print_errors(errors: &ValidationErrors) {
    for (field, message) in errors.iter() {
        println!("  {field}: {message}");
    }
}

fn client(settings: &Settings) -> Result<IntakeClient> {
    IntakeClient::new(&settings.api_base_url, settings.request_timeout())
        .with_context(|| format!("invalid api_base_url '{}'", settings.api_base_url))
}

async fn open_storage(settings: &Settings) -> Result<Storage> {
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open draft store at '{database_url}'"))?;
    storage.health_check().await?;
    Ok(storage)
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
