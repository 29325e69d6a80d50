//! reqwest implementation of [`ConsoleBackend`].
//!
//! The session rides on a cookie the backend sets at login, so one client
//! (with its cookie jar) is shared by every call.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use condo_core::NotificationId;

use crate::backend::{
    BackendError, ConsoleBackend, Credentials, ListQuery, LoginResponse, PasswordReset, SessionCheck,
    TenantSummary,
};

pub struct HttpBackend {
    api_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnreadCount {
    count: u64,
}

impl HttpBackend {
    pub fn new(api_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn segment_url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.api_url).map_err(|e| BackendError::Network(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::Network(format!("{} cannot take a path", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let resp = request.send().await.map_err(|e| BackendError::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized);
        }
        Err(rejected(resp).await)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let resp = self.send(request).await?;
        resp.json().await.map_err(|e| BackendError::Decode(e.to_string()))
    }
}

async fn rejected(resp: Response) -> BackendError {
    let status = resp.status().as_u16();
    let message = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.trim().is_empty());
    BackendError::Rejected { status, message }
}

#[async_trait]
impl ConsoleBackend for HttpBackend {
    async fn session_check(&self) -> Result<SessionCheck, BackendError> {
        self.json(self.client.get(self.url("/auth/session"))).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BackendError> {
        // Bad credentials answer 401 here; that is a rejection, not an expired session.
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        resp.json().await.map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.send(self.client.post(self.url("/auth/logout"))).await?;
        Ok(())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantSummary>, BackendError> {
        let payload: Value = self.json(self.client.get(self.url("/condominiums"))).await?;
        // Either a bare array or the usual `{data: [...]}` envelope.
        let rows = match payload {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        serde_json::from_value(rows).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn unread_notification_count(&self) -> Result<u64, BackendError> {
        let body: UnreadCount = self
            .json(self.client.get(self.url("/notifications/unread-count")))
            .await?;
        Ok(body.count)
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), BackendError> {
        let url = self.segment_url(&["notifications", id.as_str(), "read"])?;
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn fetch_list(&self, resource: &str, query: &ListQuery) -> Result<Value, BackendError> {
        let path = format!("/{}", resource.trim_start_matches('/'));
        self.json(self.client.get(self.url(&path)).query(query)).await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url("/auth/forgot-password"))
            .json(&json!({ "email": email }));
        self.send(request).await?;
        Ok(())
    }

    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url("/auth/verify-reset-code"))
            .json(&json!({ "email": email, "code": code }));
        self.send(request).await?;
        Ok(())
    }

    async fn reset_password(&self, reset: &PasswordReset) -> Result<(), BackendError> {
        self.send(self.client.post(self.url("/auth/reset-password")).json(reset))
            .await?;
        Ok(())
    }
}
