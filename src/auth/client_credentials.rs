use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::debug;

use super::traits::{TokenSet, TokenSource};
use crate::config::UpstreamConfig;
use crate::error::SyncError;

/// OAuth2 client-credentials grant against a single token endpoint.
///
/// Sends `grant_type=client_credentials[&scope=...]` with the client id and
/// secret as HTTP Basic credentials.
pub struct ClientCredentials {
    id: String,
    token_url: String,
    client_id: String,
    client_secret: secrecy::SecretString,
    scope: Option<String>,
    http: reqwest::Client,
}

// Raw token endpoint response. Every field is optional so a missing
// access token is reported as a credentials error rather than a parse error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

impl ClientCredentials {
    pub fn new(id: impl Into<String>, upstream: &UpstreamConfig, http: reqwest::Client) -> Self {
        Self {
            id: id.into(),
            token_url: upstream.token_url.clone(),
            client_id: upstream.client_id.clone(),
            client_secret: upstream.client_secret.clone(),
            scope: upstream.scope.clone(),
            http,
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<TokenSet, SyncError> {
        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scope) = &self.scope {
            form.push(("scope", scope.as_str()));
        }

        let resp = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&form)
            .send()
            .await
            .map_err(|e| SyncError::Credentials(format!("{} token request failed: {e}", self.id)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Credentials(format!(
                "{} token endpoint returned {status}: {body}",
                self.id
            )));
        }

        let token_resp: TokenResponse = resp.json().await.map_err(|e| {
            SyncError::Credentials(format!("Failed to parse {} token response: {e}", self.id))
        })?;

        let access_token = token_resp
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SyncError::Credentials(format!("{} token response has no access_token", self.id))
            })?;

        debug!(upstream = %self.id, expires_in = ?token_resp.expires_in, "Token endpoint responded");

        Ok(TokenSet {
            access_token,
            token_type: token_resp.token_type.unwrap_or_else(|| "Bearer".into()),
            expires_in: token_resp.expires_in,
        })
    }
}
