use super::*;

use chrono::Duration;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    exp: i64,
}

fn signed_token(exp: DateTime<Utc>) -> String {
    encode(
        &Header::default(),
        &TestClaims {
            sub: "agent@example.com".to_string(),
            exp: exp.timestamp(),
        },
        &EncodingKey::from_secret(b"server-side-secret"),
    )
    .expect("encode token")
}

#[test]
fn empty_context_reports_missing_session() {
    let ctx = AuthContext::new();
    assert_eq!(ctx.bearer(Utc::now()), Err(StaleSession::Missing));
}

#[test]
fn login_then_logout_clears_the_credential() {
    let mut ctx = AuthContext::new();
    ctx.login("opaque-token", None);
    assert_eq!(ctx.bearer(Utc::now()), Ok("opaque-token"));

    ctx.logout();
    assert!(!ctx.is_authenticated(Utc::now()));
}

#[test]
fn explicit_expiry_is_enforced() {
    let now = Utc::now();
    let mut ctx = AuthContext::new();
    ctx.login("opaque-token", Some(now - Duration::minutes(1)));
    assert!(matches!(ctx.bearer(now), Err(StaleSession::Expired(_))));
}

#[test]
fn jwt_exp_claim_is_used_when_no_expiry_is_given() {
    let now = Utc::now();
    let expired = AuthContext::with_token(signed_token(now - Duration::hours(1)));
    assert!(matches!(expired.bearer(now), Err(StaleSession::Expired(_))));

    let live = AuthContext::with_token(signed_token(now + Duration::hours(1)));
    assert!(live.bearer(now).is_ok());
    assert!(live.expires_at().is_some());
}

#[test]
fn revoked_session_is_stale_until_next_login() {
    let mut ctx = AuthContext::with_token("opaque-token");
    ctx.revoke();
    assert_eq!(ctx.bearer(Utc::now()), Err(StaleSession::Revoked));

    ctx.login("fresh-token", None);
    assert_eq!(ctx.bearer(Utc::now()), Ok("fresh-token"));
}
