use super::*;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use shared::domain::TriState;

use crate::error::SubmissionErrorKind;

struct ScriptedAdapter {
    responses: Mutex<VecDeque<Result<SubmissionReceipt, SubmissionError>>>,
    seen: Mutex<Vec<SubmissionRequest>>,
}

impl ScriptedAdapter {
    fn new(responses: Vec<Result<SubmissionReceipt, SubmissionError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<SubmissionRequest> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait]
impl SubmissionAdapter for ScriptedAdapter {
    async fn submit(
        &self,
        _auth: &AuthContext,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.seen.lock().expect("seen lock").push(request.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(SubmissionError::server("no scripted response")))
    }
}

fn receipt() -> SubmissionReceipt {
    SubmissionReceipt {
        id: WatchId(101),
        reference: Some("WA-000101".to_string()),
        status: Some("received".to_string()),
    }
}

fn auth() -> AuthContext {
    AuthContext::with_token("test-token")
}

fn jpeg(name: &str) -> FileHandle {
    FileHandle::new(name, Some("image/jpeg".to_string()), vec![0xFF, 0xD8, 0xFF, 0xE0])
}

fn set(wizard: &mut WizardController, field: &str, value: FieldValue) {
    wizard.set_value(field, value).expect("set value");
}

fn fill_step(wizard: &mut WizardController, step: usize) {
    match step {
        0 => {
            set(wizard, "user_type", FieldValue::choice("personal"));
            set(wizard, "first_name", FieldValue::text("Ada"));
            set(wizard, "last_name", FieldValue::text("Lovelace"));
            set(wizard, "email", FieldValue::text("ada@example.com"));
            set(wizard, "phone", FieldValue::text("+44 20 7946 0958"));
        }
        1 => {
            set(wizard, "brand", FieldValue::text("Rolex"));
            set(wizard, "model", FieldValue::text("Submariner Date"));
            set(wizard, "reference_number", FieldValue::text("126610LN"));
            set(wizard, "serial_number", FieldValue::text("7Z1234AB"));
        }
        2 => {
            set(wizard, "purchase_source", FieldValue::choice("authorized_dealer"));
            set(wizard, "has_box", FieldValue::Tri(TriState::Yes));
            set(wizard, "has_papers", FieldValue::Tri(TriState::No));
        }
        3 => {
            set(wizard, "case_condition", FieldValue::choice("excellent"));
            set(wizard, "dial_condition", FieldValue::choice("very_good"));
            set(wizard, "is_running", FieldValue::Tri(TriState::Yes));
            set(wizard, "has_been_polished", FieldValue::Tri(TriState::No));
        }
        4 => {
            set(wizard, "has_been_serviced", FieldValue::Tri(TriState::No));
            set(wizard, "has_replaced_parts", FieldValue::Tri(TriState::No));
        }
        5 => {
            for field in ["photo_dial", "photo_caseback", "photo_clasp"] {
                wizard
                    .attach_file(field, jpeg(&format!("{field}.jpg")))
                    .expect("attach photo");
            }
        }
        6 => {
            wizard
                .attach_file(
                    "purchase_invoice",
                    FileHandle::new("invoice.pdf", Some("application/pdf".into()), vec![1, 2]),
                )
                .expect("attach invoice");
        }
        7 => {
            set(wizard, "service_level", FieldValue::choice("standard"));
            set(wizard, "return_method", FieldValue::choice("pickup"));
            set(wizard, "declaration_accepted", FieldValue::Flag(true));
        }
        _ => unreachable!("intake has eight steps"),
    }
}

fn wizard_at(step: usize) -> WizardController {
    let mut wizard = WizardController::intake();
    for current in 0..step {
        fill_step(&mut wizard, current);
        wizard.go_next().expect("advance");
    }
    wizard
}

fn completed_wizard() -> WizardController {
    let mut wizard = wizard_at(7);
    fill_step(&mut wizard, 7);
    wizard
}

#[test]
fn go_next_with_missing_required_fields_does_not_advance() {
    for step in 0..7 {
        let mut wizard = wizard_at(step);
        let required = wizard.steps()[step].required_fields();
        if required.is_empty() {
            continue;
        }

        let err = wizard.go_next().expect_err("step should be invalid");

        assert_eq!(wizard.current_step(), step);
        let errors = err.validation_errors().expect("validation error");
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            required.iter().copied().collect::<Vec<_>>(),
            "step {step}"
        );
        assert_eq!(wizard.errors(), errors);
    }
}

#[test]
fn go_next_with_valid_values_advances_by_exactly_one() {
    let mut wizard = WizardController::intake();
    for step in 0..7 {
        fill_step(&mut wizard, step);
        let before = wizard.values().clone();

        assert_eq!(wizard.go_next().expect("advance"), step + 1);
        assert_eq!(wizard.phase(), Phase::Step(step + 1));
        assert_eq!(wizard.values(), &before);
        assert!(wizard.errors().is_empty());
    }
}

#[test]
fn revalidation_after_back_and_forward_is_identical() {
    let mut wizard = wizard_at(1);
    set(&mut wizard, "brand", FieldValue::text("Omega"));
    set(&mut wizard, "reference_number", FieldValue::text("#"));

    let first = wizard.go_next().expect_err("invalid step");
    wizard.go_back().expect("back");
    wizard.go_next().expect("owner step is still valid");
    let second = wizard.go_next().expect_err("invalid step");

    assert_eq!(first, second);
    assert_eq!(wizard.current_step(), 1);
}

#[test]
fn go_back_never_revalidates_and_stops_at_the_first_step() {
    let mut wizard = wizard_at(2);
    set(&mut wizard, "purchase_date", FieldValue::text("garbage"));
    wizard.go_next().expect_err("invalid step");

    assert_eq!(wizard.go_back().expect("back"), 1);
    assert!(wizard.errors().is_empty());
    assert_eq!(wizard.go_back().expect("back"), 0);
    assert_eq!(wizard.go_back().expect("back"), 0);
    assert_eq!(
        wizard.value("purchase_date"),
        Some(&FieldValue::text("garbage"))
    );
}

#[test]
fn go_to_only_jumps_backwards() {
    let mut wizard = wizard_at(3);
    assert!(matches!(
        wizard.go_to(5),
        Err(WizardError::InvalidTransition { .. })
    ));
    assert_eq!(wizard.go_to(1).expect("jump"), 1);
    assert_eq!(wizard.phase(), Phase::Step(1));
}

#[test]
fn go_next_on_the_last_step_is_rejected() {
    let mut wizard = completed_wizard();
    assert!(matches!(
        wizard.go_next(),
        Err(WizardError::InvalidTransition { from: Phase::Step(7), .. })
    ));
}

#[test]
fn field_mutations_are_checked_against_the_schema() {
    let mut wizard = WizardController::intake();
    assert_eq!(
        wizard.set_value("nickname", FieldValue::text("Sub")),
        Err(WizardError::UnknownField("nickname".to_string()))
    );
    assert!(matches!(
        wizard.set_value("has_box", FieldValue::Flag(true)),
        Err(WizardError::WrongKind { expected: "tri-state", .. })
    ));
    assert!(matches!(
        wizard.set_value("photo_dial", FieldValue::stored_file("x.jpg")),
        Err(WizardError::WrongKind { expected: "file", .. })
    ));
    assert!(matches!(
        wizard.append_file("photo_dial", jpeg("dial.jpg")),
        Err(WizardError::WrongKind { .. })
    ));
}

#[test]
fn editing_a_field_clears_only_its_error() {
    let mut wizard = WizardController::intake();
    wizard.go_next().expect_err("empty owner step");
    assert!(wizard.errors().contains("first_name"));

    set(&mut wizard, "first_name", FieldValue::text("Ada"));
    assert!(!wizard.errors().contains("first_name"));
    assert!(wizard.errors().contains("last_name"));
}

#[tokio::test]
async fn successful_submission_reaches_the_terminal_state() {
    let mut wizard = completed_wizard();
    let adapter = ScriptedAdapter::new(vec![Ok(receipt())]);
    assert!(wizard.staging().live_previews() > 0);

    let accepted = wizard
        .submit_final(&adapter, &mut auth())
        .await
        .expect("submission");

    assert_eq!(accepted, receipt());
    assert_eq!(wizard.phase(), Phase::Submitted);
    assert_eq!(wizard.receipt(), Some(&receipt()));
    assert_eq!(wizard.staging().live_previews(), 0);
    assert!(!wizard.has_staged_files());
    assert_eq!(wizard.value("brand"), Some(&FieldValue::text("Rolex")));

    let seen = adapter.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].target, SubmissionTarget::Create);
    assert!(seen[0].values.get("photo_dial").is_some_and(FieldValue::has_staged_files));

    assert!(matches!(
        wizard.set_value("brand", FieldValue::text("Tudor")),
        Err(WizardError::InvalidTransition { from: Phase::Submitted, .. })
    ));
    assert!(matches!(
        wizard.go_back(),
        Err(WizardError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn network_failure_keeps_values_and_retry_succeeds() {
    let mut wizard = completed_wizard();
    let adapter = ScriptedAdapter::new(vec![
        Err(SubmissionError::network("Intake API unreachable; check your connection and retry.")),
        Ok(receipt()),
    ]);
    let before = wizard.values().clone();

    let err = wizard
        .submit_final(&adapter, &mut auth())
        .await
        .expect_err("network failure");

    assert!(matches!(
        err,
        WizardError::Submission(SubmissionError { kind: SubmissionErrorKind::Network, .. })
    ));
    assert_eq!(wizard.phase(), Phase::Failed);
    assert_eq!(wizard.current_step(), 7);
    assert_eq!(wizard.values(), &before);
    assert!(wizard
        .last_failure()
        .is_some_and(|failure| failure.message.contains("unreachable")));

    let accepted = wizard.retry(&adapter, &mut auth()).await.expect("retry");
    assert_eq!(accepted.id, WatchId(101));
    assert_eq!(wizard.phase(), Phase::Submitted);
    assert!(wizard.last_failure().is_none());

    let seen = adapter.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

#[tokio::test]
async fn retry_is_only_allowed_after_a_failure() {
    let mut wizard = completed_wizard();
    let adapter = ScriptedAdapter::new(vec![Ok(receipt())]);
    assert!(matches!(
        wizard.retry(&adapter, &mut auth()).await,
        Err(WizardError::InvalidTransition { action: "retry", .. })
    ));
    assert!(adapter.seen().is_empty());
}

#[tokio::test]
async fn missing_session_is_reported_before_any_request() {
    let mut wizard = completed_wizard();
    let adapter = ScriptedAdapter::new(vec![Ok(receipt())]);

    let err = wizard
        .submit_final(&adapter, &mut AuthContext::new())
        .await
        .expect_err("no session");

    assert_eq!(err, WizardError::StaleSession(StaleSession::Missing));
    assert!(err.requires_reauth());
    assert_eq!(wizard.phase(), Phase::Step(7));
    assert!(adapter.seen().is_empty());
}

#[tokio::test]
async fn unauthorized_response_is_a_stale_session() {
    let mut wizard = completed_wizard();
    let adapter = ScriptedAdapter::new(vec![Err(SubmissionError::unauthorized("Unauthenticated."))]);

    let err = wizard
        .submit_final(&adapter, &mut auth())
        .await
        .expect_err("unauthorized");

    assert!(err.requires_reauth());
    assert_eq!(wizard.phase(), Phase::Failed);
}

#[tokio::test]
async fn refused_credential_is_not_sent_again_until_login() {
    let mut wizard = completed_wizard();
    let adapter = ScriptedAdapter::new(vec![
        Err(SubmissionError::unauthorized("Unauthenticated.")),
        Ok(receipt()),
    ]);
    let mut session = auth();

    let err = wizard
        .submit_final(&adapter, &mut session)
        .await
        .expect_err("unauthorized");
    assert_eq!(err, WizardError::StaleSession(StaleSession::Revoked));
    assert!(!session.is_authenticated(chrono::Utc::now()));

    let err = wizard
        .retry(&adapter, &mut session)
        .await
        .expect_err("revoked session");
    assert_eq!(err, WizardError::StaleSession(StaleSession::Revoked));
    assert_eq!(adapter.seen().len(), 1);
    assert_eq!(wizard.phase(), Phase::Failed);

    session.login("fresh-token", None);
    let accepted = wizard.retry(&adapter, &mut session).await.expect("retry");
    assert_eq!(accepted, receipt());
    assert_eq!(adapter.seen().len(), 2);
}

#[tokio::test]
async fn server_field_errors_are_shown_inline() {
    let mut wizard = completed_wizard();
    let mut field_errors = std::collections::BTreeMap::new();
    field_errors.insert(
        "serial_number".to_string(),
        vec!["The serial number has already been registered.".to_string()],
    );
    let adapter = ScriptedAdapter::new(vec![Err(SubmissionError::rejected(
        "The given data was invalid.",
        field_errors,
    ))]);

    wizard
        .submit_final(&adapter, &mut auth())
        .await
        .expect_err("rejected");

    assert_eq!(
        wizard.errors().get("serial_number"),
        Some("The serial number has already been registered.")
    );

    set(&mut wizard, "serial_number", FieldValue::text("7Z1234AC"));
    assert_eq!(wizard.phase(), Phase::Step(7));
    assert!(wizard.errors().is_empty());
}

#[test]
fn final_validation_jumps_to_the_first_failing_step() {
    let mut wizard = completed_wizard();
    wizard.clear_value("brand").expect("clear");
    wizard.clear_value("photo_dial").expect("clear");

    let err = wizard.begin_submission(&auth()).expect_err("invalid");

    assert_eq!(wizard.current_step(), 1);
    assert_eq!(wizard.phase(), Phase::Step(1));
    assert_eq!(wizard.errors().fields().collect::<Vec<_>>(), vec!["brand"]);
    assert_eq!(err.validation_errors(), Some(wizard.errors()));

    set(&mut wizard, "brand", FieldValue::text("Rolex"));
    for _ in 1..5 {
        wizard.go_next().expect("steps before the photos are valid");
    }
    let err = wizard.go_next().expect_err("photos step is missing the dial");
    assert_eq!(
        err.validation_errors().map(|e| e.fields().collect::<Vec<_>>()),
        Some(vec!["photo_dial"])
    );
}

#[test]
fn abandoned_submission_result_is_discarded() {
    let mut wizard = completed_wizard();
    let ticket = wizard.begin_submission(&auth()).expect("ticket");
    assert_eq!(wizard.phase(), Phase::Submitting);
    assert!(matches!(
        wizard.set_value("brand", FieldValue::text("Tudor")),
        Err(WizardError::InvalidTransition { from: Phase::Submitting, .. })
    ));

    wizard.abandon_submission();
    let outcome = wizard.complete_submission(ticket, Ok(receipt()));

    assert_eq!(outcome, Err(WizardError::Abandoned));
    assert_eq!(wizard.phase(), Phase::Step(7));
    assert!(wizard.receipt().is_none());
    assert!(wizard.has_staged_files());
}

#[test]
fn superseded_ticket_is_discarded() {
    let mut wizard = completed_wizard();
    let stale = wizard.begin_submission(&auth()).expect("ticket");
    wizard.abandon_submission();
    let fresh = wizard.begin_submission(&auth()).expect("ticket");

    assert_eq!(
        wizard.complete_submission(stale, Err(SubmissionError::network("late"))),
        Err(WizardError::Abandoned)
    );
    assert_eq!(wizard.phase(), Phase::Submitting);
    assert!(wizard.complete_submission(fresh, Ok(receipt())).is_ok());
}

#[tokio::test]
async fn edit_flow_updates_the_record_and_sends_replaced_paths() {
    let steps = intake_steps();
    let mut record = shared::protocol::RecordFields::new();
    record.insert("photo_dial".into(), serde_json::json!("records/42/dial.jpg"));
    record.insert("brand".into(), serde_json::json!("Rolex"));
    let initial = InitialState::from_record(&steps, WatchId(42), &record);

    let mut wizard = WizardController::with_initial_state(steps, initial);
    assert_eq!(wizard.value("brand"), Some(&FieldValue::text("Rolex")));
    for step in 0..7 {
        fill_step(&mut wizard, step);
        wizard.go_next().expect("advance");
    }
    fill_step(&mut wizard, 7);

    assert!(wizard
        .staging()
        .is_pending_removal("photo_dial", "records/42/dial.jpg"));
    assert!(matches!(
        wizard.value("photo_dial"),
        Some(FieldValue::File(FileSlot::Staged(_)))
    ));

    let adapter = ScriptedAdapter::new(vec![Ok(receipt())]);
    wizard.submit_final(&adapter, &mut auth()).await.expect("submit");

    let seen = adapter.seen();
    assert_eq!(seen[0].target, SubmissionTarget::Update(WatchId(42)));
    assert_eq!(seen[0].removed_files, vec!["records/42/dial.jpg".to_string()]);
    assert!(wizard.staging().removed_files().is_empty());
}

#[test]
fn snapshot_drops_uploads_and_resume_restores_position() {
    let mut wizard = wizard_at(6);
    wizard
        .append_file("other_documents", jpeg("scan.jpg"))
        .expect("append");

    let snapshot = wizard.snapshot();
    assert_eq!(snapshot.current_step, 6);
    assert!(!snapshot.values.contains_key("photo_dial"));
    assert_eq!(
        snapshot.values.get("other_documents"),
        Some(&FieldValue::FileList(Vec::new()))
    );
    assert_eq!(
        snapshot.values.get("brand"),
        Some(&FieldValue::text("Rolex"))
    );

    let resumed = WizardController::resume(intake_steps(), snapshot.clone());
    assert_eq!(resumed.draft_id(), wizard.draft_id());
    assert_eq!(resumed.phase(), Phase::Step(6));
    assert_eq!(resumed.values(), &snapshot.values);
    assert!(!resumed.has_staged_files());
}

#[test]
fn validate_current_is_a_dry_run() {
    let mut wizard = wizard_at(1);
    set(&mut wizard, "brand", FieldValue::text("Omega"));

    let errors = wizard.validate_current();

    assert!(errors.get("model").is_some());
    assert!(errors.get("brand").is_none());
    assert!(wizard.errors().is_empty());
    assert_eq!(wizard.current_step(), 1);
    assert_eq!(wizard.current_definition().map(|step| step.index), Some(1));
}

#[test]
fn removing_an_additional_photo_releases_its_preview() {
    let mut wizard = wizard_at(5);
    wizard.append_file("additional_photos", jpeg("strap.jpg")).expect("append");
    wizard.append_file("additional_photos", jpeg("bezel.jpg")).expect("append");
    assert_eq!(wizard.staging().live_previews(), 2);

    let removed = wizard.remove_file_at("additional_photos", 0).expect("remove");

    assert!(matches!(
        removed,
        Some(FileSlot::Staged(handle)) if handle.file_name == "strap.jpg"
    ));
    assert_eq!(wizard.staging().live_previews(), 1);
    assert!(matches!(
        wizard.value("additional_photos"),
        Some(FieldValue::FileList(slots)) if slots.len() == 1
    ));
    assert_eq!(wizard.remove_file_at("additional_photos", 5).expect("remove"), None);
    assert!(matches!(
        wizard.remove_file_at("photo_dial", 0),
        Err(WizardError::WrongKind { .. })
    ));
}

#[test]
fn dropping_the_wizard_releases_every_live_preview() {
    let released = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&released);
    let mut wizard = wizard_at(5);
    wizard.on_preview_release(move |preview| {
        sink.lock().expect("released lock").push(preview.object_url.clone());
    });

    let mut opened = Vec::new();
    for field in ["photo_dial", "photo_caseback", "photo_clasp"] {
        let preview = wizard.attach_file(field, jpeg(&format!("{field}.jpg"))).expect("attach");
        opened.push(preview.object_url);
    }
    for name in ["strap.jpg", "bezel.jpg"] {
        let preview = wizard.append_file("additional_photos", jpeg(name)).expect("append");
        opened.push(preview.object_url);
    }
    assert_eq!(wizard.staging().live_previews(), 5);
    assert!(released.lock().expect("released lock").is_empty());

    drop(wizard);

    let mut released = released.lock().expect("released lock").clone();
    released.sort();
    opened.sort();
    assert_eq!(released, opened);
}
