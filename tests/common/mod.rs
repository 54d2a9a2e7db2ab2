//! Common test utilities for prn-sync integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prn_sync::auth::{ClientCredentials, TokenCache};
use prn_sync::config::UpstreamConfig;
use prn_sync::http::ApiClient;
use prn_sync::jobs::Upstreams;
use prn_sync::store::MemoryCursorStore;
use prn_sync::sync::{JobRunner, SyncCursor};

pub const CLIENT_ID: &str = "client-id";
pub const CLIENT_SECRET: &str = "client-secret";
/// `Basic base64("client-id:client-secret")`
pub const BASIC_AUTH: &str = "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=";

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Test data factory for NPWD PRNs.
pub fn create_npwd_prn(evidence_no: &str, status_code: &str) -> Value {
    json!({
        "EvidenceNo": evidence_no,
        "EvidenceStatusCode": status_code,
        "StatusDate": "2024-05-01T10:00:00Z",
        "IssuedToEntityId": "producer-1",
        "EvidenceTonnes": 12.5,
        "EvidenceMaterial": "Plastic"
    })
}

/// Test data factory for RREPW PRNs.
pub fn create_rrepw_prn(prn_number: &str, status: &str) -> Value {
    json!({
        "prnNumber": prn_number,
        "status": status,
        "statusUpdatedAt": "2024-05-01T10:00:00Z",
        "organisationId": "org-1",
        "tonnage": 4.0,
        "material": "glass"
    })
}

/// Wraps items in an OData response format.
pub fn create_odata_response(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// One mock server standing in for every upstream and its token endpoint.
pub struct MockUpstreams {
    pub server: MockServer,
}

impl MockUpstreams {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    pub fn token_path(upstream: &str) -> String {
        format!("/{upstream}/oauth/token")
    }

    /// Sets up the client-credentials endpoint for `upstream`.
    pub async fn mock_token_endpoint(&self, upstream: &str, access_token: &str) {
        Mock::given(method("POST"))
            .and(path(Self::token_path(upstream)))
            .and(header("authorization", BASIC_AUTH))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_token_response(access_token, 3600)),
            )
            .mount(&self.server)
            .await;
    }

    /// Token endpoints for all three upstreams.
    pub async fn mock_all_token_endpoints(&self) {
        for upstream in ["npwd", "rrepw", "organisations"] {
            self.mock_token_endpoint(upstream, &format!("{upstream}-token")).await;
        }
    }

    pub fn upstream_config(&self, upstream: &str) -> UpstreamConfig {
        UpstreamConfig::new(
            self.url(),
            format!("{}{}", self.url(), Self::token_path(upstream)),
            CLIENT_ID,
            CLIENT_SECRET,
        )
    }

    pub fn client(&self, upstream: &str) -> Arc<ApiClient> {
        let http = reqwest::Client::new();
        let source = ClientCredentials::new(upstream, &self.upstream_config(upstream), http.clone());
        let tokens = Arc::new(TokenCache::new(Arc::new(source)));
        Arc::new(ApiClient::new(upstream, self.url(), http).with_tokens(tokens))
    }

    pub fn upstreams(&self) -> Upstreams {
        Upstreams {
            npwd: self.client("npwd"),
            rrepw: self.client("rrepw"),
            organisations: self.client("organisations"),
        }
    }
}

/// A runner over an in-memory cursor store with the given default start.
pub fn memory_runner(default_start: DateTime<Utc>) -> JobRunner {
    JobRunner::new(SyncCursor::new(
        Arc::new(MemoryCursorStore::new()),
        default_start,
    ))
}
