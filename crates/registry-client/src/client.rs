//! Authenticated HTTP client
//!
//! Attaches the stored access token to each request and recovers from a
//! single 401 by refreshing the token once and replaying the request. The
//! credential store, refresh coordinator and session events are injected at
//! build time and shared by every clone of the client.

use std::sync::Arc;
use std::time::Duration;

use registry_auth::{CredentialStore, DEFAULT_API_BASE, TokenPair};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::refresh::{RefreshCoordinator, RefreshFailure, Ticket};
use crate::session::{LogoutReason, SessionEvent, SessionEvents};

/// Per-request timeout used unless the builder overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on a single refresh call. Expiry counts as a refresh failure.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Correlates a request with its replay in server logs.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// A successful (2xx) response with its body read to completion.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Client for the registry API. Cheap to clone; clones share credentials,
/// the refresh coordinator and the session channel.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) store: Arc<CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
    pub(crate) events: SessionEvents,
    refresh_timeout: Duration,
}

impl ApiClient {
    /// Client with default timeouts and a fresh coordinator.
    pub fn new(base_url: impl Into<String>, store: Arc<CredentialStore>) -> Result<Self> {
        Self::builder().base_url(base_url).credentials(store).build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Send `method path` with an optional JSON body.
    ///
    /// `path` is relative to the base URL. Returns the response for any 2xx,
    /// `Error::Status` for other non-401 statuses. A 401 is recovered once
    /// through a token refresh; see the crate docs for the full lifecycle.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path)?;
        let request_id = Uuid::new_v4();
        let sent_token = self.store.access_token().await;

        let response = self
            .send(&method, &url, body, sent_token.as_deref(), request_id)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return finish(response).await;
        }

        debug!(%request_id, %method, path, "unauthorized, recovering access token");
        let token = self.recover(sent_token.as_deref()).await?;

        let retried = self
            .send(&method, &url, body, Some(&token), request_id)
            .await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(%request_id, %method, path, "still unauthorized after refresh");
            return Err(Error::Unauthorized(read_body(retried).await));
        }
        finish(retried).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, path, None).await
    }

    /// GET and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path).await?.json()
    }

    fn url(&self, path: &str) -> Result<String> {
        // Query strings may carry URLs; only the path part must be relative
        let path_part = path.split(['?', '#']).next().unwrap_or(path);
        if path_part.contains("://") {
            return Err(Error::InvalidPath(format!(
                "expected a path relative to {}, got {path}",
                self.base_url
            )));
        }
        if path.starts_with('/') {
            Ok(format!("{}{path}", self.base_url))
        } else {
            Ok(format!("{}/{path}", self.base_url))
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        token: Option<&str>,
        request_id: Uuid,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("{method} {url}: {e}")))?;
        debug!(
            %request_id,
            %method,
            url,
            status = response.status().as_u16(),
            authenticated = token.is_some(),
            "response received"
        );
        Ok(response)
    }

    /// Obtain a token to replay a request that got a 401 while carrying `sent`.
    ///
    /// Queues behind an in-flight refresh, or leads a new one. A follower
    /// whose leader was cancelled before settling goes round again.
    async fn recover(&self, sent: Option<&str>) -> Result<String> {
        let guard = loop {
            match self.refresh.begin() {
                Ticket::Leader(guard) => break guard,
                Ticket::Follower(rx) => match rx.await {
                    Ok(Ok(token)) => return Ok(token),
                    Ok(Err(RefreshFailure::Failed(reason))) => {
                        return Err(Error::RefreshFailed(reason));
                    }
                    Ok(Err(RefreshFailure::Abandoned)) | Err(_) => {
                        debug!("token refresh abandoned by its leader, retrying");
                    }
                },
            }
        };

        // A refresh that settled after our request went out already replaced or cleared the token
        match (self.store.access_token().await, sent) {
            (Some(current), _) if sent != Some(current.as_str()) => {
                debug!("access token replaced since request was sent, skipping refresh");
                guard.settle(Ok(current.clone()));
                return Ok(current);
            }
            (None, Some(_)) => {
                let reason = String::from("session ended while the request was in flight");
                debug!("credentials cleared since request was sent, skipping refresh");
                guard.settle(Err(RefreshFailure::Failed(reason.clone())));
                return Err(Error::RefreshFailed(reason));
            }
            _ => {}
        }

        match self.refresh_tokens().await {
            Ok(access) => {
                let released = guard.settle(Ok(access.clone()));
                info!(released, "access token refreshed");
                self.events.emit(SessionEvent::Refreshed);
                Ok(access)
            }
            Err(e) => {
                let reason = e.to_string();
                // Clear before releasing so no request can start another refresh with stale tokens
                if let Err(clear_err) = self.store.clear().await {
                    warn!(error = %clear_err, "failed to clear credentials");
                }
                let released = guard.settle(Err(RefreshFailure::Failed(reason.clone())));
                warn!(error = %reason, released, "token refresh failed, session ended");
                self.events.emit(SessionEvent::LoggedOut {
                    reason: LogoutReason::RefreshFailed(reason.clone()),
                });
                Err(Error::RefreshFailed(reason))
            }
        }
    }

    /// Call the refresh endpoint and store what it returns.
    async fn refresh_tokens(&self) -> registry_auth::Result<String> {
        let refresh = self
            .store
            .refresh_token()
            .await
            .ok_or(registry_auth::Error::NoRefreshToken)?;

        let response = tokio::time::timeout(
            self.refresh_timeout,
            registry_auth::refresh_access(&self.http, &self.base_url, &refresh),
        )
        .await
        .map_err(|_| {
            registry_auth::Error::Timeout(format!(
                "token refresh exceeded {:?}",
                self.refresh_timeout
            ))
        })??;

        match response.refresh {
            Some(rotated) => {
                debug!("refresh token rotated");
                self.store
                    .set_tokens(TokenPair {
                        access: response.access.clone(),
                        refresh: rotated,
                    })
                    .await?;
            }
            None => self.store.set_access(response.access.clone()).await?,
        }
        Ok(response.access)
    }
}

async fn finish(response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("reading response body: {e}")))?;

    if status.is_success() {
        Ok(ApiResponse { status, body })
    } else {
        Err(Error::Status {
            status: status.as_u16(),
            body,
        })
    }
}

async fn read_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"))
}

/// Builder for `ApiClient`
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<CredentialStore>>,
    events: Option<SessionEvents>,
    timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// API root, e.g. `http://localhost:8000/api`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Where tokens are read from and written to. Defaults to an in-memory store.
    pub fn credentials(mut self, store: Arc<CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing session channel instead of creating one.
    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Configuration(format!(
                "base_url must start with http:// or https://, got: {base_url}"
            )));
        }

        let refresh_timeout = self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT);
        if refresh_timeout.is_zero() {
            return Err(Error::Configuration(
                "refresh timeout must be greater than 0".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| format!("registry-client/{}", env!("CARGO_PKG_VERSION"))),
            )
            .build()
            .map_err(|e| Error::Configuration(format!("building HTTP client: {e}")))?;

        debug!(%base_url, ?refresh_timeout, "api client built");
        Ok(ApiClient {
            http,
            base_url,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(CredentialStore::in_memory())),
            refresh: Arc::new(RefreshCoordinator::new()),
            events: self.events.unwrap_or_default(),
            refresh_timeout,
        })
    }
}
