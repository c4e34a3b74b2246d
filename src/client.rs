//! XRPC client for AT Protocol personal data servers.
//!
//! Bridges the core [`RepositoryClient`] contract to a real PDS:
//! - [`AtprotoClient::login`] opens a session with `com.atproto.server.createSession`
//!   and binds the client to the authenticated [`Actor`].
//! - Records are written with `com.atproto.repo.createRecord` into the
//!   actor's own repository.
//!
//! One client is opened per service (content PDS and feed PDS). Session
//! refresh is not handled; a run is expected to finish well within the
//! access token's lifetime.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use spinglass_publish_core::contract::{Actor, Record, RecordRef, RepositoryClient, RepositoryError};

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    access_jwt: String,
    handle: String,
    did: String,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'a str,
    record: &'a Record,
}

/// Error body returned by XRPC endpoints.
#[derive(Debug, Default, Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

impl XrpcError {
    fn describe(&self) -> String {
        match (self.error.is_empty(), self.message.is_empty()) {
            (false, false) => format!("{}: {}", self.error, self.message),
            (false, true) => self.error.clone(),
            (true, false) => self.message.clone(),
            (true, true) => "no error details".to_string(),
        }
    }
}

/// An authenticated session against one PDS.
pub struct AtprotoClient {
    http: Client,
    service_url: String,
    access_jwt: String,
    actor: Actor,
}

impl AtprotoClient {
    /// Authenticate `identifier` (handle or DID) against `service_url`.
    pub async fn login(service_url: &str, identifier: &str, password: &str) -> Result<Self, RepositoryError> {
        let service_url = service_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;

        tracing::info!(service = %service_url, identifier = %identifier, "Creating session");
        let response = http
            .post(xrpc_url(&service_url, CREATE_SESSION))
            .json(&CreateSessionRequest { identifier, password })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(service = %service_url, error = ?e, "Session request failed");
                RepositoryError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = error_details(response).await;
            tracing::error!(service = %service_url, status = %status, details = %details, "Authentication rejected");
            return Err(RepositoryError::Auth(format!("{status}: {details}")));
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        tracing::info!(service = %service_url, handle = %session.handle, did = %session.did, "Authenticated");

        Ok(Self {
            http,
            service_url,
            access_jwt: session.access_jwt,
            actor: Actor {
                handle: session.handle,
                did: session.did,
            },
        })
    }

    pub fn actor(&self) -> Actor {
        self.actor.clone()
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }
}

#[async_trait]
impl RepositoryClient for AtprotoClient {
    async fn create_record(&self, collection: &str, record: Record) -> Result<RecordRef, RepositoryError> {
        tracing::debug!(
            service = %self.service_url,
            collection = %collection,
            record_type = %record.record_type(),
            "Creating record"
        );
        let body = CreateRecordRequest {
            repo: &self.actor.did,
            collection,
            record: &record,
        };
        let response = self
            .http
            .post(xrpc_url(&self.service_url, CREATE_RECORD))
            .bearer_auth(&self.access_jwt)
            .json(&body)
            .send()
            .await
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_details(response).await;
            return Err(RepositoryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<RecordRef>()
            .await
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }
}

fn xrpc_url(service_url: &str, method: &str) -> String {
    format!("{service_url}/xrpc/{method}")
}

async fn error_details(response: Response) -> String {
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
    serde_json::from_str::<XrpcError>(&text)
        .map(|e| e.describe())
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xrpc_url_joins_method() {
        assert_eq!(
            xrpc_url("https://bsky.social", CREATE_RECORD),
            "https://bsky.social/xrpc/com.atproto.repo.createRecord"
        );
    }

    #[test]
    fn xrpc_error_description() {
        let e: XrpcError = serde_json::from_str(r#"{"error":"InvalidRequest","message":"bad"}"#).unwrap();
        assert_eq!(e.describe(), "InvalidRequest: bad");
        assert_eq!(XrpcError::default().describe(), "no error details");
    }
}
