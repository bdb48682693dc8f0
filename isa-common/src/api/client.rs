//! HTTP client for the inventory-reconciliation service

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EventStream, InventoryBackend};
use crate::config::TomlConfig;
use crate::events::ServerEvent;
use crate::models::{
    Bom, Category, CreateRecordRequest, InventorySummary, LoginRequest, NewSession, Overview,
    RecordId, ScanRecord, ScanSession, SessionFilter, SessionId, SessionSummary, TokenResponse,
};
use crate::sse;
use crate::{Error, Result};

const USER_AGENT: &str = concat!("isa/", env!("CARGO_PKG_VERSION"));

/// Error body returned by the backend (`{"detail": "..."}`)
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// `reqwest` implementation of [`InventoryBackend`]
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    /// Separate client without a request timeout for the long-lived stream
    stream_http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        let stream_http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http,
            stream_http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client from resolved configuration
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        Self::new(
            config.backend_url.clone(),
            config.auth_token.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token (after a fresh login)
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Exchange credentials for an access token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = Self::decode(response).await?;
        debug!(username = %username, "Login succeeded");
        Ok(token.access_token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.authorized(builder).send().await?;
        Self::check(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.authorized(builder).send().await?;
        Self::decode(response).await
    }

    /// Map non-success statuses onto the error taxonomy
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| match b.detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or(body);

        if status == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected credentials: {}", message);
            return Err(Error::Unauthorized(message));
        }
        Err(Error::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

#[async_trait]
impl InventoryBackend for BackendClient {
    async fn create_record(&self, request: CreateRecordRequest) -> Result<ScanRecord> {
        debug!(
            session_id = request.session_id,
            identifier = %request.identifier,
            quantity = request.quantity,
            "Creating scan record"
        );
        self.send_json(self.http.post(self.url("/scan/records")).json(&request))
            .await
    }

    async fn delete_record(&self, record_id: RecordId) -> Result<()> {
        self.send(self.http.delete(self.url(&format!("/scan/records/{}", record_id))))
            .await?;
        Ok(())
    }

    async fn update_record_quantity(&self, record_id: RecordId, quantity: f64) -> Result<ScanRecord> {
        let builder = self
            .http
            .put(self.url(&format!("/scan/records/{}", record_id)))
            .query(&[("quantity", quantity)]);
        self.send_json(builder).await
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<ScanSession>> {
        let builder = self
            .http
            .get(self.url("/scan/sessions"))
            .query(&[("active_only", filter.active_only)]);
        let sessions: Vec<ScanSession> = self.send_json(builder).await?;
        Ok(sessions.into_iter().filter(|s| filter.matches(s)).collect())
    }

    async fn create_session(&self, new_session: &NewSession) -> Result<ScanSession> {
        self.send_json(self.http.post(self.url("/scan/sessions")).json(new_session))
            .await
    }

    async fn end_session(&self, session_id: SessionId) -> Result<()> {
        self.send(self.http.post(self.url(&format!("/scan/sessions/{}/end", session_id))))
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        self.send(self.http.delete(self.url(&format!("/scan/sessions/{}", session_id))))
            .await?;
        Ok(())
    }

    async fn list_boms(&self, category: Option<Category>) -> Result<Vec<Bom>> {
        let mut builder = self.http.get(self.url("/boms/"));
        if let Some(category) = category {
            builder = builder.query(&[("category", category.as_str())]);
        }
        self.send_json(builder).await
    }

    async fn overview(&self) -> Result<Overview> {
        self.send_json(self.http.get(self.url("/scan/overview"))).await
    }

    async fn session_summary(&self, session_id: SessionId) -> Result<SessionSummary> {
        self.send_json(
            self.http
                .get(self.url(&format!("/scan/sessions/{}/summary", session_id))),
        )
        .await
    }

    async fn inventory_summary(&self, session_id: SessionId) -> Result<InventorySummary> {
        self.send_json(
            self.http
                .get(self.url(&format!("/scan/sessions/{}/inventory-summary", session_id))),
        )
        .await
    }

    async fn open_event_stream(&self) -> Result<EventStream> {
        // EventSource-style auth: the token travels as a query parameter
        let mut builder = self
            .stream_http
            .get(self.url("/events/stream"))
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(token) = &self.token {
            builder = builder.query(&[("token", token.as_str())]);
        }

        let response = builder.send().await?;
        let response = match Self::check(response).await {
            // The stream endpoint reports a bad token as 403
            Err(Error::Http { status: 403, message }) => return Err(Error::Unauthorized(message)),
            other => other?,
        };

        let events = sse::frames(response.bytes_stream()).map(|frame| {
            frame.and_then(|frame| ServerEvent::from_frame(&frame))
        });
        Ok(Box::pin(events))
    }
}
