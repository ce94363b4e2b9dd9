//! Client for the game's save-code HTTP API.
//!
//! One outbound call: `POST {base_url}/api/save_code` with a static auth
//! cookie and a form-encoded body carrying the JSON-serialized arguments.
//! The server answers with a JSON array; the first element's `message` is
//! what the user cares about.

pub mod types;

use crate::error::{Result, UploaderError};
use reqwest::header;
use types::{ApiMessage, SaveCodeArguments};

const SAVE_CODE_METHOD: &str = "save_code";

/// Save-code API client with a fixed auth cookie.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_cookie: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, secret: &str) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            auth_cookie: format!("auth={}", secret),
        }
    }

    /// Issue one save-code request. No retries; callers decide what a
    /// failure means.
    pub async fn save_code(&self, args: &SaveCodeArguments) -> Result<ApiMessage> {
        let arguments = serde_json::to_string(args)?;
        let form = [
            ("method", SAVE_CODE_METHOD),
            ("arguments", arguments.as_str()),
        ];

        let response = self
            .http
            .post(format!("{}/api/save_code", self.base_url))
            .header(header::COOKIE, self.auth_cookie.as_str())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploaderError::Api(format!(
                "save_code returned HTTP {}",
                status
            )));
        }

        let body = response.text().await?;
        parse_save_response(&body)
    }
}

/// Pull the first message out of the response array. A malformed body is an
/// ordinary error, not a crash.
fn parse_save_response(body: &str) -> Result<ApiMessage> {
    let messages: Vec<ApiMessage> = serde_json::from_str(body)?;
    messages
        .into_iter()
        .next()
        .ok_or_else(|| UploaderError::Api("empty response array".to_string()))
}
