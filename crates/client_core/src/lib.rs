//! Client side of the submission portal: the wizard, asset previews, route
//! guards, and an HTTP client for the server API.

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{SubmissionId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateUserRequest, LoginRequest, LoginResponse, SubmissionRecord, UpdateUserRequest,
        UserSummary,
    },
};
use tracing::{info, warn};

pub mod error;
pub mod preview;
pub mod routes;
pub mod wizard;

pub use error::ClientError;
pub use preview::{pick_logo, pick_screenshots, AssetFile, ScreenshotSelection};
pub use routes::{guard, Route};
pub use wizard::{
    DraftPatch, StepDefinition, StepKey, StepStatus, SubmissionDraft, WizardController,
    WizardMode, STEPS,
};

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    /// Unknown for a resumed token.
    pub expires_at: Option<DateTime<Utc>>,
    pub user: UserSummary,
}

/// A stored image and the file name it is saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub file_name: String,
}

/// `{app}-logo.png` and `{app}-screenshot-{n}.png`, numbered from 1.
pub fn download_targets(record: &SubmissionRecord) -> Vec<DownloadTarget> {
    let app: String = record
        .app_name_en
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    let mut targets = Vec::with_capacity(record.screenshot_urls.len() + 1);
    if !record.logo_url.is_empty() {
        targets.push(DownloadTarget {
            url: record.logo_url.clone(),
            file_name: format!("{app}-logo.png"),
        });
    }
    targets.extend(
        record
            .screenshot_urls
            .iter()
            .enumerate()
            .map(|(index, url)| DownloadTarget {
                url: url.clone(),
                file_name: format!("{app}-screenshot-{}.png", index + 1),
            }),
    );
    targets
}

/// HTTP client for the submission server. Holds the bearer token after [`SubmissionClient::login`].
pub struct SubmissionClient {
    http: Client,
    server_url: String,
    session: Option<Session>,
}

impl SubmissionClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            session: None,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_user(&self) -> Option<&UserSummary> {
        self.session.as_ref().map(|session| &session.user)
    }

    /// Adopts a token obtained earlier and confirms it with the server.
    pub async fn resume(&mut self, token: &str) -> Result<UserSummary, ClientError> {
        let user: UserSummary = decode(
            self.http
                .get(format!("{}/auth/me", self.server_url))
                .bearer_auth(token)
                .send()
                .await?,
        )
        .await?;
        self.session = Some(Session {
            token: token.to_string(),
            expires_at: None,
            user: user.clone(),
        });
        Ok(user)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserSummary, ClientError> {
        let res = self
            .http
            .post(format!("{}/auth/login", self.server_url))
            .json(&LoginRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let body: LoginResponse = decode(res).await?;
        info!(user_id = body.user.id.0, role = %body.user.role, "signed in");
        let user = body.user.clone();
        self.session = Some(Session {
            token: body.token,
            expires_at: Some(body.expires_at),
            user: body.user,
        });
        Ok(user)
    }

    pub fn logout(&mut self) {
        self.session = None;
    }

    pub async fn list_submissions(&self) -> Result<Vec<SubmissionRecord>, ClientError> {
        self.send_json(Method::GET, "/submissions", None::<&()>).await
    }

    /// `Ok(None)` when the submission does not exist.
    pub async fn get_submission(
        &self,
        id: SubmissionId,
    ) -> Result<Option<SubmissionRecord>, ClientError> {
        match self
            .send_json(Method::GET, &format!("/submissions/{id}"), None::<&()>)
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(ClientError::Api(err)) if err.code == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create_submission(
        &self,
        draft: &SubmissionDraft,
    ) -> Result<SubmissionRecord, ClientError> {
        let record: SubmissionRecord = self
            .send_json(Method::POST, "/submissions", Some(&draft.to_payload()))
            .await?;
        info!(submission_id = record.id.0, "submission created");
        Ok(record)
    }

    pub async fn update_submission(
        &self,
        id: SubmissionId,
        draft: &SubmissionDraft,
    ) -> Result<SubmissionRecord, ClientError> {
        self.send_json(
            Method::PUT,
            &format!("/submissions/{id}"),
            Some(&draft.to_payload()),
        )
        .await
    }

    pub async fn delete_submission(&self, id: SubmissionId) -> Result<(), ClientError> {
        let res = self
            .authorized(Method::DELETE, &format!("/submissions/{id}"))?
            .send()
            .await?;
        expect_success(res).await
    }

    /// Asset URLs are public, so this works without a session.
    pub async fn download_asset(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        let res = self.http.get(url).send().await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.bytes().await?.to_vec())
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ClientError> {
        self.send_json(Method::GET, "/users", None::<&()>).await
    }

    pub async fn create_user(&self, req: &CreateUserRequest) -> Result<UserSummary, ClientError> {
        self.send_json(Method::POST, "/users", Some(req)).await
    }

    pub async fn update_user(
        &self,
        id: UserId,
        req: &UpdateUserRequest,
    ) -> Result<UserSummary, ClientError> {
        self.send_json(Method::PUT, &format!("/users/{id}"), Some(req))
            .await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), ClientError> {
        let res = self
            .authorized(Method::DELETE, &format!("/users/{id}"))?
            .send()
            .await?;
        expect_success(res).await
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let session = self.session.as_ref().ok_or(ClientError::NotLoggedIn)?;
        Ok(self
            .http
            .request(method, format!("{}{path}", self.server_url))
            .bearer_auth(&session.token))
    }

    async fn send_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.authorized(method, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        decode(request.send().await?).await
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    if !res.status().is_success() {
        return Err(api_error(res).await);
    }
    let bytes = res.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

async fn expect_success(res: Response) -> Result<(), ClientError> {
    if res.status().is_success() {
        Ok(())
    } else {
        Err(api_error(res).await)
    }
}

async fn api_error(res: Response) -> ClientError {
    let status = res.status();
    let body = match res.bytes().await {
        Ok(body) => body,
        Err(err) => return ClientError::Transport(err),
    };
    let err = serde_json::from_slice::<ApiError>(&body).unwrap_or_else(|_| {
        ApiError::new(
            code_for_status(status),
            String::from_utf8_lossy(&body).trim().to_string(),
        )
    });
    warn!(%status, code = ?err.code, message = %err.message, "request rejected");
    ClientError::Api(err)
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        s if s.is_client_error() => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
