//! HTTP client for the allocation endpoints of the lab request API.
//!
//! Every operation is a single authenticated JSON call. Nothing is retried:
//! the override and allocate endpoints are not idempotent on the server, so a
//! blind retry could allocate twice.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::ACCEPT;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::SessionProvider;
use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult, ErrorResponse};
use crate::models::{
    AdminEditRequest, AdminEditResult, AllocationResult, AllocationStatus, ApprovalAction,
    ApprovalRequest, ApprovalResult, DisableStatusBody, DisableUpdate, EditPermissions,
    LabRequest, OverrideRequest, OverrideResult, ReturnResult, UnifiedItems, UpdateResult,
};

/// Operations the allocation UI depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AllocationApi: Send + Sync {
    async fn get_request(&self, request_id: &str) -> ClientResult<LabRequest>;

    async fn get_allocation_status(&self, request_id: &str) -> ClientResult<AllocationStatus>;

    async fn set_admin_override(
        &self,
        request_id: &str,
        experiment_id: &str,
        body: OverrideRequest,
    ) -> ClientResult<OverrideResult>;

    async fn get_edit_permissions(&self, request_id: &str) -> ClientResult<EditPermissions>;

    async fn update_disabled_status(
        &self,
        request_id: &str,
        updates: Vec<DisableUpdate>,
    ) -> ClientResult<UpdateResult>;

    async fn allocate_remaining(
        &self,
        request_id: &str,
        items: UnifiedItems,
    ) -> ClientResult<AllocationResult>;

    async fn return_items(&self, request_id: &str, items: UnifiedItems)
        -> ClientResult<ReturnResult>;

    async fn admin_approve(
        &self,
        request_id: &str,
        body: ApprovalRequest,
    ) -> ClientResult<ApprovalResult>;

    async fn admin_edit(
        &self,
        request_id: &str,
        body: AdminEditRequest,
    ) -> ClientResult<AdminEditResult>;
}

/// Rejects an override body the server would refuse anyway.
pub fn validate_override(body: &OverrideRequest) -> ClientResult<()> {
    if body.enable
        && body
            .reason
            .as_deref()
            .map(|reason| reason.trim().is_empty())
            .unwrap_or(true)
    {
        return Err(ClientError::Validation(
            "A reason is required to enable an admin override".to_string(),
        ));
    }
    Ok(())
}

/// Rejects an approval body the server would refuse anyway.
pub fn validate_approval(body: &ApprovalRequest) -> ClientResult<()> {
    let has_reason = body
        .reason
        .as_deref()
        .map(|reason| !reason.trim().is_empty())
        .unwrap_or(false);
    if body.action == ApprovalAction::Reject && !has_reason {
        return Err(ClientError::Validation(
            "A reason is required to reject a request".to_string(),
        ));
    }
    Ok(())
}

fn trimmed(reason: Option<String>) -> Option<String> {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

#[derive(Clone)]
pub struct AllocationStatusClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<dyn SessionProvider>,
}

impl std::fmt::Debug for AllocationStatusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationStatusClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl AllocationStatusClient {
    pub fn new(config: &ClientConfig, session: Arc<dyn SessionProvider>) -> ClientResult<Self> {
        Self::from_parts(config.base_url()?, config.request_timeout(), session)
    }

    pub fn from_parts(
        base_url: Url,
        timeout: Duration,
        session: Arc<dyn SessionProvider>,
    ) -> ClientResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "{} cannot be used as an API base URL",
                base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("labflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<dyn SessionProvider> {
        &self.session
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B, T>(&self, method: Method, segments: &[&str], body: Option<&B>) -> ClientResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(%method, path = url.path(), error = %e, "request failed to complete");
            ClientError::from(e)
        })?;

        let status = response.status();
        if status == StatusCode::PARTIAL_CONTENT || !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(status, &text);
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                self.session.on_unauthorized();
            }
            warn!(%method, path = url.path(), %status, message = %message, "request rejected");
            return Err(ClientError::from_status(status, message, Some(&text)));
        }

        debug!(%method, path = url.path(), %status, "request succeeded");
        let bytes = response.bytes().await.map_err(ClientError::from)?;
        serde_json::from_slice(&bytes).map_err(ClientError::from)
    }
}

/// Prefers the server's `{message}`, then `{error}`, then the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        if !parsed.message.trim().is_empty() {
            return parsed.message;
        }
        if let Some(error) = parsed.error.filter(|e| !e.trim().is_empty()) {
            return error;
        }
    }
    let raw = body.trim();
    if !raw.is_empty() && !raw.starts_with('{') && !raw.starts_with('<') {
        return raw.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

#[async_trait]
impl AllocationApi for AllocationStatusClient {
    #[instrument(skip(self))]
    async fn get_request(&self, request_id: &str) -> ClientResult<LabRequest> {
        self.send::<(), _>(Method::GET, &["requests", request_id], None)
            .await
    }

    #[instrument(skip(self))]
    async fn get_allocation_status(&self, request_id: &str) -> ClientResult<AllocationStatus> {
        self.send::<(), _>(
            Method::GET,
            &["requests", request_id, "allocation-status"],
            None,
        )
        .await
    }

    #[instrument(skip(self, body), fields(enable = body.enable))]
    async fn set_admin_override(
        &self,
        request_id: &str,
        experiment_id: &str,
        body: OverrideRequest,
    ) -> ClientResult<OverrideResult> {
        validate_override(&body)?;
        let body = OverrideRequest {
            enable: body.enable,
            reason: trimmed(body.reason),
        };
        self.send(
            Method::POST,
            &[
                "requests",
                request_id,
                "experiments",
                experiment_id,
                "admin-override",
            ],
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_edit_permissions(&self, request_id: &str) -> ClientResult<EditPermissions> {
        self.send::<(), _>(
            Method::GET,
            &["requests", request_id, "edit-permissions"],
            None,
        )
        .await
    }

    #[instrument(skip(self, updates), fields(update_count = updates.len()))]
    async fn update_disabled_status(
        &self,
        request_id: &str,
        updates: Vec<DisableUpdate>,
    ) -> ClientResult<UpdateResult> {
        if updates.is_empty() {
            return Err(ClientError::Validation("no item updates supplied".into()));
        }
        let body = DisableStatusBody { updates: &updates };
        self.send(
            Method::PUT,
            &["requests", request_id, "items", "disable-status"],
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self, items), fields(line_count = items.len()))]
    async fn allocate_remaining(
        &self,
        request_id: &str,
        items: UnifiedItems,
    ) -> ClientResult<AllocationResult> {
        if items.is_empty() {
            return Err(ClientError::Validation("nothing left to allocate".into()));
        }
        self.send(
            Method::PUT,
            &["requests", request_id, "allocate-unified"],
            Some(&items),
        )
        .await
    }

    #[instrument(skip(self, items), fields(line_count = items.len()))]
    async fn return_items(
        &self,
        request_id: &str,
        items: UnifiedItems,
    ) -> ClientResult<ReturnResult> {
        if items.is_empty() {
            return Err(ClientError::Validation("no items selected for return".into()));
        }
        self.send(
            Method::PUT,
            &["requests", request_id, "return-unified"],
            Some(&items),
        )
        .await
    }

    #[instrument(skip(self, body), fields(action = ?body.action))]
    async fn admin_approve(
        &self,
        request_id: &str,
        body: ApprovalRequest,
    ) -> ClientResult<ApprovalResult> {
        validate_approval(&body)?;
        let body = ApprovalRequest {
            action: body.action,
            reason: trimmed(body.reason),
        };
        self.send(
            Method::PUT,
            &["requests", request_id, "admin-approve"],
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self, body), fields(edit_count = body.edits.len()))]
    async fn admin_edit(
        &self,
        request_id: &str,
        body: AdminEditRequest,
    ) -> ClientResult<AdminEditResult> {
        if body.edits.is_empty() {
            return Err(ClientError::Validation("no quantity edits supplied".into()));
        }
        if body.reason.trim().is_empty() {
            return Err(ClientError::Validation(
                "A reason is required for admin quantity edits".into(),
            ));
        }
        self.send(
            Method::PUT,
            &["requests", request_id, "admin-edit"],
            Some(&body),
        )
        .await
    }
}
