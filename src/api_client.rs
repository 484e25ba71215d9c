use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

use crate::error::ApiError;
use crate::models::user::{ApiErrorBody, UpdateDisplayName, UserIdentity};
use crate::retry::RetryPolicy;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const VALIDATE_RETRY: RetryPolicy =
    RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(30));
pub const PROFILE_RETRY: RetryPolicy =
    RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30));

/// Result of a display name update the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayNameUpdate {
    Updated,
    /// 400 from the server, e.g. a name that fails validation.
    Rejected(String),
}

/// REST calls made once at startup, before the gateway connects.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    validate_retry: RetryPolicy,
    profile_retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            validate_retry: VALIDATE_RETRY,
            profile_retry: PROFILE_RETRY,
        }
    }

    pub fn with_retry_policies(mut self, validate: RetryPolicy, profile: RetryPolicy) -> Self {
        self.validate_retry = validate;
        self.profile_retry = profile;
        self
    }

    fn apply_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", &self.token)
            .header("User-Agent", USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
    }

    /// Confirm the token is valid and fetch the account it belongs to.
    pub async fn validate_token(&self) -> Result<UserIdentity, ApiError> {
        self.validate_retry
            .run(
                "token validation",
                move || self.fetch_identity(),
                ApiError::is_retryable,
            )
            .await
    }

    async fn fetch_identity(&self) -> Result<UserIdentity, ApiError> {
        let url = format!("{}/users/@me", self.base_url);
        let resp = self.apply_auth(self.client.get(&url)).send().await?;
        let resp = check_status(resp).await?;
        resp.json::<UserIdentity>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Set the account's global display name. A validation rejection is
    /// reported as [`DisplayNameUpdate::Rejected`], not as an error.
    pub async fn update_display_name(&self, name: &str) -> Result<DisplayNameUpdate, ApiError> {
        self.profile_retry
            .run(
                "display name update",
                move || self.patch_display_name(name),
                ApiError::is_retryable,
            )
            .await
    }

    async fn patch_display_name(&self, name: &str) -> Result<DisplayNameUpdate, ApiError> {
        let url = format!("{}/users/@me", self.base_url);
        let builder = self
            .client
            .patch(&url)
            .header("Origin", "https://discord.com")
            .header("Referer", "https://discord.com/channels/@me")
            .header("X-Discord-Locale", "en-GB")
            .json(&UpdateDisplayName { global_name: name });
        let resp = self.apply_auth(builder).send().await?;

        if resp.status() == StatusCode::BAD_REQUEST {
            let message = resp
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Ok(DisplayNameUpdate::Rejected(message));
        }

        check_status(resp).await?;
        Ok(DisplayNameUpdate::Updated)
    }
}

async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Unauthorized {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}
