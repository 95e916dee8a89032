//! Bearer-authenticated JSON client for the task REST endpoints.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use taskwatch_core::{Session, TaskSeed, TaskStatus, UserProfile};
use taskwatch_logging::{tw_debug, tw_warn};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid api url: {0}")]
    InvalidUrl(String),
    #[error("not logged in")]
    NotAuthenticated,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("http status {status}: {detail}")]
    HttpStatus { status: u16, detail: String },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoTaskRequest {
    pub character_id: String,
    pub script: String,
    pub duration: u32,
    pub style: String,
    pub quality: String,
}

impl VideoTaskRequest {
    pub fn new(character_id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            character_id: character_id.into(),
            script: script.into(),
            duration: 30,
            style: "realistic".to_string(),
            quality: "standard".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoTask {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    /// Seconds.
    #[serde(default)]
    pub estimated_time: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl VideoTask {
    /// Last known values for seeding a progress view.
    pub fn seed(&self) -> TaskSeed {
        TaskSeed {
            progress: Some(self.progress),
            status: self.status.parse::<TaskStatus>().ok(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ApiError> {
        let mut base =
            Url::parse(&settings.base_url).map_err(|err| ApiError::InvalidUrl(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.base_url.clone()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self { client, base })
    }

    /// Exchanges credentials for a token and moves `session` to logged-in.
    pub async fn login(
        &self,
        session: &mut Session,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, ApiError> {
        let url = self.endpoint(&["api", "v1", "auth", "login"])?;
        let request = self
            .client
            .post(url)
            .json(&LoginRequest { email, password });
        let token: TokenResponse = self.execute(request).await?;
        session.login(token.access_token.clone(), token.user.clone());
        Ok(token)
    }

    pub async fn current_user(&self, session: &Session) -> Result<UserProfile, ApiError> {
        let url = self.endpoint(&["api", "v1", "auth", "me"])?;
        let request = self.authorized(self.client.get(url), session)?;
        self.execute(request).await
    }

    pub async fn create_video_task(
        &self,
        session: &Session,
        task: &VideoTaskRequest,
    ) -> Result<VideoTask, ApiError> {
        let url = self.endpoint(&["api", "v1", "videos", "generate"])?;
        let request = self.authorized(self.client.post(url).json(task), session)?;
        self.execute(request).await
    }

    pub async fn get_video_task(
        &self,
        session: &Session,
        task_id: &str,
    ) -> Result<VideoTask, ApiError> {
        let url = self.endpoint(&["api", "v1", "videos", "tasks", task_id])?;
        let request = self.authorized(self.client.get(url), session)?;
        self.execute(request).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(
        &self,
        request: RequestBuilder,
        session: &Session,
    ) -> Result<RequestBuilder, ApiError> {
        let bearer = session.bearer().ok_or(ApiError::NotAuthenticated)?;
        Ok(request.header(AUTHORIZATION, bearer))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        tw_debug!("{} {}", status, response.url());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body).unwrap_or_else(|| status.to_string());
            tw_warn!("API request failed with {}: {}", status, detail);
            return Err(if status == StatusCode::UNAUTHORIZED {
                ApiError::Unauthorized(detail)
            } else {
                ApiError::HttpStatus {
                    status: status.as_u16(),
                    detail,
                }
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Pulls `detail` (or `message`) out of a JSON error body.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(ToOwned::to_owned)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(err.to_string())
}
