use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::default_client::create_client;
use crate::error::OpsdeckErr;
use crate::error::Result;

/// Argument bag of one command invocation, serialized as JSON toward the
/// backend.
pub type CommandArgs = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// Thin client over the backend REST/streaming contract. The session cookie
/// lives in the shared `reqwest` cookie store, so every call is made with
/// credentials included.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(config: &Config) -> Self {
        Self::with_client(create_client(), config.base_url.clone())
    }

    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn auth_status(&self) -> Result<AuthStatusResponse> {
        let url = self.base_url.join("auth-status")?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn login(&self, api_key: &str) -> Result<()> {
        let url = self.base_url.join("login")?;
        self.http
            .post(url)
            .header("x-api-key", api_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Fire-and-forget execution path; live output goes through
    /// [`crate::stream::StreamController`] instead.
    pub async fn run_command(&self, command_id: &str, args: &CommandArgs) -> Result<()> {
        if command_id.trim().is_empty() {
            return Err(OpsdeckErr::EmptyCommandId);
        }
        let url = self.base_url.join(&format!("api/run/{command_id}"))?;
        self.http
            .post(url)
            .json(&serde_json::json!({ "args": args }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Available command identifiers, for discovery.
    pub async fn list_commands(&self) -> Result<Vec<String>> {
        let url = self.base_url.join("api")?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Realtime-run endpoint URL. Non-empty arguments ride along as a single
    /// `args` query parameter holding the URL-encoded JSON bag (the backend
    /// decodes the parameter once more before parsing, so the JSON is
    /// pre-encoded before the query serializer runs).
    pub fn run_realtime_url(&self, command_id: &str, args: &CommandArgs) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("api/run-realtime/{command_id}"))?;
        if !args.is_empty() {
            let payload = serde_json::to_string(args)?;
            url.query_pairs_mut()
                .append_pair("args", &urlencoding::encode(&payload));
        }
        Ok(url)
    }
}
