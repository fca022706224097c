//! HTTP API routes
//!
//! Thin axum handlers over the core session, pipeline, and classifier
//! components. Handlers translate core errors into JSON error responses.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use mailsense_core::classifier::ClassificationService;
use mailsense_core::conversations::group_by_correspondent;
use mailsense_core::mailbox::{encode_raw_message, MailboxProvider};
use mailsense_core::models::{MessageRecord, Profile, SendMailRequest};
use mailsense_core::pipeline::RetrievalPipeline;
use mailsense_core::session::SessionManager;
use mailsense_core::subscriptions::SubscriptionScanner;
use mailsense_core::{Config, Error};

/// Shared application state cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub mailbox: Arc<dyn MailboxProvider>,
    pub classifier: Arc<dyn ClassificationService>,
    pub pipeline: Arc<RetrievalPipeline>,
    pub scanner: Arc<SubscriptionScanner>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/google", get(auth_google))
        .route("/auth/google/callback", get(auth_google_callback))
        .route("/auth/logout", post(auth_logout))
        .route("/gmail/status", get(gmail_status))
        .route("/gmail/list", get(gmail_list))
        .route("/gmail/conversations", get(gmail_conversations))
        .route("/gmail/summary", get(gmail_summary))
        .route("/gmail/smart-reply", post(gmail_smart_reply))
        .route("/gmail/send", post(gmail_send))
        .route("/gmail/profile", get(gmail_profile))
        .route("/subscriptions/scan", get(subscriptions_scan))
        .with_state(state)
}

/// Wraps a core error so handlers can use `?` and still emit a JSON body
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.requires_reauth() => StatusCode::UNAUTHORIZED,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Provider { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::ClassificationUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self.0);
        } else {
            warn!("Request rejected with {}: {}", status, self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Checks for a usable credential before touching the mailbox API
async fn ensure_authenticated(state: &AppState) -> ApiResult<()> {
    state.session.ensure_session().await?;
    if !state.session.is_authenticated() {
        return Err(ApiError(Error::AuthenticationRequired));
    }
    Ok(())
}

/// Lists message ids and runs the retrieval pipeline over them
async fn fetch_records(state: &AppState, max_results: u32) -> ApiResult<Vec<MessageRecord>> {
    let ids = state.pipeline.list(max_results, None).await?;
    Ok(state.pipeline.run(&ids).await)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Starts the OAuth flow by redirecting the browser to the consent page
async fn auth_google(State(state): State<AppState>) -> Redirect {
    let (url, _nonce) = state.session.begin_authorization();
    Redirect::temporary(&url)
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Finishes the OAuth flow and bounces the browser back to the frontend
async fn auth_google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let frontend = &state.config.server.frontend_origin;
    if let Some(reason) = params.error {
        warn!("Authorization denied at consent page: {}", reason);
        return Redirect::temporary(&format!("{}?auth=error", frontend));
    }
    let Some(code) = params.code else {
        warn!("Authorization callback arrived without a code");
        return Redirect::temporary(&format!("{}?auth=error", frontend));
    };
    match state
        .session
        .complete_authorization(&code, params.state.as_deref())
        .await
    {
        Ok(_) => {
            info!("Authorization completed");
            Redirect::temporary(&format!("{}?auth=success", frontend))
        }
        Err(e) => {
            error!("Failed to complete authorization: {}", e);
            Redirect::temporary(&format!("{}?auth=error", frontend))
        }
    }
}

async fn auth_logout(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.session.invalidate().await?;
    info!("Credential cleared, session reset");
    Ok(Json(json!({ "success": true })))
}

async fn gmail_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "authenticated": state.session.is_authenticated(),
        "state": state.session.state().as_str(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    max_results: Option<u32>,
}

async fn gmail_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    ensure_authenticated(&state).await?;
    let max_results = params
        .max_results
        .unwrap_or(state.config.pipeline.list_max_results);
    let records = fetch_records(&state, max_results).await?;
    Ok(Json(json!({ "messages": records })))
}

async fn gmail_conversations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    ensure_authenticated(&state).await?;
    let max_results = params
        .max_results
        .unwrap_or(state.config.pipeline.conversation_max_results);
    let records = fetch_records(&state, max_results).await?;
    let conversations = group_by_correspondent(records);
    Ok(Json(json!({ "conversations": conversations })))
}

async fn gmail_summary(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    ensure_authenticated(&state).await?;
    let max_results = params
        .max_results
        .unwrap_or(state.config.pipeline.list_max_results);
    let records = fetch_records(&state, max_results).await?;
    if records.is_empty() {
        return Ok(Json(json!({ "summary": "No recent emails to summarize." })));
    }
    let summary = state.classifier.summarize(&records).await?;
    Ok(Json(json!({ "summary": summary })))
}

#[derive(Debug, Deserialize)]
struct SmartReplyRequest {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    snippet: String,
}

async fn gmail_smart_reply(
    State(state): State<AppState>,
    Json(request): Json<SmartReplyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if request.subject.trim().is_empty() && request.snippet.trim().is_empty() {
        return Err(ApiError(Error::Validation(
            "Missing email content".to_string(),
        )));
    }
    let replies = state
        .classifier
        .suggest_replies(&request.subject, &request.snippet)
        .await?;
    Ok(Json(json!({ "replies": replies })))
}

async fn gmail_send(
    State(state): State<AppState>,
    Json(request): Json<SendMailRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    request.validate()?;
    ensure_authenticated(&state).await?;
    let raw = encode_raw_message(&request.to, &request.subject, &request.body);
    let id = state.mailbox.send_message(&raw).await?;
    info!("Sent message {} to {}", id, request.to);
    Ok(Json(json!({ "id": id })))
}

async fn gmail_profile(State(state): State<AppState>) -> ApiResult<Json<Profile>> {
    ensure_authenticated(&state).await?;
    let profile = state.mailbox.get_profile().await?;
    Ok(Json(profile))
}

async fn subscriptions_scan(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    ensure_authenticated(&state).await?;
    let hits = state
        .scanner
        .scan(state.config.pipeline.subscription_max_results)
        .await?;
    Ok(Json(json!({ "subscriptions": hits })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_map_to_unauthorized() {
        let response = ApiError(Error::AuthenticationRequired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let refresh_failed = Error::TokenRefreshFailed {
            reason: "invalid_grant".to_string(),
        };
        assert_eq!(
            ApiError(refresh_failed).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn invalid_requests_map_to_bad_request() {
        let response =
            ApiError(Error::Validation("Recipient is required".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_failures_map_to_bad_gateway() {
        let provider = Error::Provider {
            status: 503,
            message: "backend unavailable".to_string(),
        };
        assert_eq!(
            ApiError(provider).into_response().status(),
            StatusCode::BAD_GATEWAY
        );

        let model = Error::ClassificationUnavailable("no api key".to_string());
        assert_eq!(
            ApiError(model).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn unexpected_failures_map_to_internal_error() {
        let response = ApiError(Error::Config("bad value".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
