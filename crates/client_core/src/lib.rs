//! HTTP client for the intake REST API. Implements the wizard's collaborator
//! traits so the wizard itself never touches the network.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    auth::AuthContext,
    domain::WatchId,
    error::{ApiError, ErrorCode},
    protocol::{DataEnvelope, LoginRequest, LoginResponse, RecordFields, SubmissionReceipt},
};
use tracing::{debug, info, warn};
use url::Url;
use wizard::{DraftSource, SubmissionAdapter, SubmissionError, SubmissionRequest};

pub mod error;
pub mod form;

pub use error::ClientError;
pub use form::{encode_parts, FormPart};

/// "Page expired", returned instead of 401 when the session token is stale.
const SESSION_EXPIRED: u16 = 419;

#[derive(Debug, Clone)]
pub struct IntakeClient {
    http: Client,
    base_url: Url,
}

impl IntakeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchanges credentials for an access token and stores it in `auth`.
    pub async fn login(
        &self,
        auth: &mut AuthContext,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, ClientError> {
        let request = self.http.post(self.endpoint("auth/login")?).json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        let body: LoginResponse = read_json(send(request).await?).await?;
        auth.login(body.access_token.clone(), body.expires_at);
        info!(expires_at = ?auth.expires_at(), "logged in to intake API");
        Ok(body)
    }

    pub async fn fetch_record(
        &self,
        auth: &AuthContext,
        record_id: WatchId,
    ) -> Result<RecordFields, ClientError> {
        let token = auth.bearer(Utc::now())?;
        let request = self
            .http
            .get(self.endpoint(&format!("watches/{record_id}"))?)
            .bearer_auth(token);
        let envelope: DataEnvelope<RecordFields> = read_json(send(request).await?).await?;
        debug!(%record_id, fields = envelope.data.len(), "fetched watch record");
        Ok(envelope.data)
    }

    pub async fn submit_request(
        &self,
        auth: &AuthContext,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, ClientError> {
        let token = auth.bearer(Utc::now())?;
        let parts = form::encode_parts(request);
        let part_count = parts.len();
        let body = form::into_multipart(parts).map_err(|err| ClientError::InvalidPart(err.to_string()))?;
        let http_request = self
            .http
            .post(self.endpoint(&request.target.path())?)
            .bearer_auth(token)
            .multipart(body);

        debug!(destination = ?request.target, parts = part_count, "posting intake submission");
        let envelope: DataEnvelope<SubmissionReceipt> = read_json(send(http_request).await?).await?;
        info!(record_id = %envelope.data.id, "intake API accepted submission");
        Ok(envelope.data)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl SubmissionAdapter for IntakeClient {
    async fn submit(
        &self,
        auth: &AuthContext,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.submit_request(auth, request).await.map_err(SubmissionError::from)
    }
}

#[async_trait]
impl DraftSource for IntakeClient {
    async fn fetch_record(
        &self,
        auth: &AuthContext,
        record_id: WatchId,
    ) -> Result<RecordFields, SubmissionError> {
        IntakeClient::fetch_record(self, auth, record_id)
            .await
            .map_err(SubmissionError::from)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    request.send().await.map_err(|err| {
        warn!(error = %err, "intake API request failed");
        ClientError::from_transport(err)
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(ClientError::from_transport);
    }

    let text = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<ApiError>(&text).ok();
    warn!(status = status.as_u16(), "intake API returned an error");

    match status {
        StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized(
            api_error.map_or_else(|| "Unauthenticated.".to_string(), |err| err.message),
        )),
        status if status.as_u16() == SESSION_EXPIRED => Err(ClientError::Unauthorized(
            api_error.map_or_else(|| "Session expired.".to_string(), |err| err.message),
        )),
        StatusCode::UNPROCESSABLE_ENTITY => Err(ClientError::Rejected(api_error.unwrap_or_else(|| {
            ApiError::new(ErrorCode::Validation, "The given data was invalid.")
        }))),
        status => Err(ClientError::Server {
            status: status.as_u16(),
            message: api_error.map(|err| err.message).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string()
            }),
        }),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
