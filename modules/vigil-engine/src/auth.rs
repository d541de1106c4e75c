//! Google OAuth refresh-token flow. One POST per call, no caching and no
//! implicit retries; the worker retries at its normal poll interval.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::traits::TokenProvider;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

pub struct OAuthTokenProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl OAuthTokenProvider {
    pub fn new(
        http: reqwest::Client,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    ) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            refresh_token,
        }
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let response = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let detail = body["error_description"]
                .as_str()
                .or_else(|| body["error"].as_str())
                .unwrap_or("no detail");
            return Err(anyhow!("token refresh failed ({status}): {detail}"));
        }

        body["access_token"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("token response missing access_token"))
    }
}
