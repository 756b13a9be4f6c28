use super::*;

use shared::domain::{FieldValue, TriState};

fn set(wizard: &mut WizardController, field: &str, value: FieldValue) {
    wizard.set_value(field, value).expect("set value");
}

#[test]
fn empty_wizard_reports_every_step_with_required_fields() {
    let wizard = WizardController::intake();
    let reports = step_reports(&wizard);

    assert_eq!(reports.len(), TOTAL_STEPS);
    let failing = reports
        .iter()
        .filter(|report| !report.errors.is_empty())
        .map(|report| report.index)
        .collect::<Vec<_>>();
    assert_eq!(failing, vec![0, 1, 2, 3, 4, 5, 7]);
    assert!(reports[0].errors.contains("email"));
}

#[test]
fn advance_stops_at_the_first_incomplete_step() {
    let mut wizard = WizardController::intake();
    set(&mut wizard, "user_type", FieldValue::choice("personal"));
    set(&mut wizard, "first_name", FieldValue::text("Ada"));
    set(&mut wizard, "last_name", FieldValue::text("Lovelace"));
    set(&mut wizard, "email", FieldValue::text("ada@example.com"));
    set(&mut wizard, "phone", FieldValue::text("+44 20 7946 0958"));
    set(&mut wizard, "has_box", FieldValue::Tri(TriState::Yes));

    let err = advance_to_review(&mut wizard).expect_err("watch step is empty");

    assert_eq!(wizard.current_step(), 1);
    assert!(err
        .validation_errors()
        .is_some_and(|errors| errors.contains("brand")));
}

#[test]
fn validate_reports_failures_from_an_answers_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("answers.toml");
    std::fs::write(&path, "user_type = \"company\"\nfirst_name = \"Ada\"\n").expect("write answers");

    assert!(!validate(&path).expect("validate"));
}

#[test]
fn refused_record_fetch_asks_for_a_new_login() {
    let err = record_fetch_failure(WatchId(42), ClientError::Unauthorized("Unauthenticated.".into()));
    let message = err.to_string();
    assert!(message.contains("watch record 42"));
    assert!(message.contains("intake login"));

    let err = record_fetch_failure(
        WatchId(42),
        ClientError::StaleSession(shared::auth::StaleSession::Missing),
    );
    assert!(err.to_string().contains("intake login"));
}

#[test]
fn other_record_fetch_failures_keep_their_cause() {
    let err = record_fetch_failure(
        WatchId(42),
        ClientError::Server {
            status: 404,
            message: "Watch not found.".into(),
        },
    );
    assert_eq!(err.to_string(), "failed to load watch record 42");
    assert!(!format!("{err:#}").contains("intake login"));
    assert!(format!("{err:#}").contains("Watch not found."));
}
