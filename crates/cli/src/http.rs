//! HTTP surface over the session manager operations.
//!
//! Every response uses the [`ApiResult`] envelope. Routes:
//!
//! | method | path | operation |
//! |---|---|---|
//! | GET | `/sessions` | list sessions |
//! | GET | `/sessions/{tenant}` | session status |
//! | POST | `/sessions/{tenant}` | create session, returns the pairing code |
//! | DELETE | `/sessions/{tenant}` | destroy session |
//! | POST | `/sessions/{tenant}/reconnect` | reconnect from stored credentials |
//! | POST | `/sessions/{tenant}/logout` | log out |
//! | GET | `/sessions/{tenant}/chats` | list chats |
//! | GET | `/sessions/{tenant}/chats/{chat_id}` | one chat |
//! | POST | `/sessions/{tenant}/messages` | send a text message |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use walink::{CreateOutcome, SessionError, SessionManager};
use walink_protocol::TenantId;

use crate::output::ApiResult;

#[derive(Clone)]
struct AppState {
	manager: SessionManager,
}

pub fn router(manager: SessionManager) -> Router {
	Router::new()
		.route("/sessions", get(list_sessions))
		.route("/sessions/{tenant}", get(session_status).post(create_session).delete(destroy_session))
		.route("/sessions/{tenant}/reconnect", post(reconnect_session))
		.route("/sessions/{tenant}/logout", post(logout_session))
		.route("/sessions/{tenant}/chats", get(list_chats))
		.route("/sessions/{tenant}/chats/{chat_id}", get(get_chat))
		.route("/sessions/{tenant}/messages", post(send_message))
		.with_state(AppState { manager })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
	#[serde(default)]
	phone_number: String,
	#[serde(default)]
	display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
	chat_id: String,
	text: String,
}

struct ApiResponse(StatusCode, ApiResult<Value>);

impl ApiResponse {
	fn ok(data: impl Serialize) -> Self {
		match serde_json::to_value(data) {
			Ok(value) => Self(StatusCode::OK, ApiResult::success(value)),
			Err(err) => Self(StatusCode::INTERNAL_SERVER_ERROR, ApiResult::failure("JSON_ERROR", err.to_string())),
		}
	}
}

impl IntoResponse for ApiResponse {
	fn into_response(self) -> Response {
		(self.0, Json(self.1)).into_response()
	}
}

impl From<SessionError> for ApiResponse {
	fn from(err: SessionError) -> Self {
		let status = match &err {
			SessionError::NoCredentials { .. } | SessionError::NotConnected { .. } => StatusCode::CONFLICT,
			SessionError::PairingTimeout { .. } | SessionError::ReconnectTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
			SessionError::StaleCredentials | SessionError::AuthFailure { .. } => StatusCode::UNAUTHORIZED,
			SessionError::Transport(inner) if inner.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
			SessionError::Transport(_) | SessionError::TransportClosed | SessionError::Store(_) => StatusCode::BAD_GATEWAY,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status.is_server_error() {
			warn!(target = "walink.http", code = err.code(), error = %err, "request failed");
		}
		Self(status, ApiResult::failure(err.code(), err.to_string()))
	}
}

type Handler = Result<ApiResponse, ApiResponse>;

async fn list_sessions(State(state): State<AppState>) -> ApiResponse {
	ApiResponse::ok(state.manager.list_sessions())
}

async fn session_status(State(state): State<AppState>, Path(tenant): Path<String>) -> ApiResponse {
	ApiResponse::ok(state.manager.get_session_status(&TenantId::from(tenant)))
}

async fn create_session(State(state): State<AppState>, Path(tenant): Path<String>, Json(request): Json<CreateSessionRequest>) -> Handler {
	let tenant = TenantId::from(tenant);
	debug!(target = "walink.http", %tenant, "create session requested");
	let outcome = state
		.manager
		.create_session(&tenant, &request.phone_number, &request.display_name)
		.await?;
	let pairing_code = match outcome {
		CreateOutcome::PairingCode(code) => Some(code),
		CreateOutcome::AlreadyConnected => None,
	};
	Ok(ApiResponse::ok(json!({
		"pairingCode": pairing_code,
		"session": state.manager.get_session_status(&tenant),
	})))
}

async fn destroy_session(State(state): State<AppState>, Path(tenant): Path<String>) -> Handler {
	let tenant = TenantId::from(tenant);
	state.manager.destroy_session(&tenant).await?;
	Ok(ApiResponse::ok(json!({ "tenantId": tenant, "destroyed": true })))
}

async fn reconnect_session(State(state): State<AppState>, Path(tenant): Path<String>) -> Handler {
	let tenant = TenantId::from(tenant);
	state.manager.reconnect_session(&tenant).await?;
	Ok(ApiResponse::ok(state.manager.get_session_status(&tenant)))
}

async fn logout_session(State(state): State<AppState>, Path(tenant): Path<String>) -> Handler {
	let tenant = TenantId::from(tenant);
	state.manager.logout_session(&tenant).await?;
	Ok(ApiResponse::ok(state.manager.get_session_status(&tenant)))
}

async fn list_chats(State(state): State<AppState>, Path(tenant): Path<String>) -> Handler {
	let chats = state.manager.list_chats(&TenantId::from(tenant)).await?;
	Ok(ApiResponse::ok(chats))
}

async fn get_chat(State(state): State<AppState>, Path((tenant, chat_id)): Path<(String, String)>) -> Handler {
	match state.manager.get_chat(&TenantId::from(tenant), &chat_id).await? {
		Some(chat) => Ok(ApiResponse::ok(chat)),
		None => Err(ApiResponse(
			StatusCode::NOT_FOUND,
			ApiResult::failure("CHAT_NOT_FOUND", format!("chat {chat_id} not found")),
		)),
	}
}

async fn send_message(State(state): State<AppState>, Path(tenant): Path<String>, Json(request): Json<SendMessageRequest>) -> Handler {
	let message_id = state
		.manager
		.send_message(&TenantId::from(tenant), &request.chat_id, &request.text)
		.await?;
	Ok(ApiResponse::ok(json!({ "messageId": message_id })))
}
