//! JSON-lines frames exchanged with a transport driver process.
//!
//! The manager writes one [`DriverRequest`] per line to the driver's stdin and
//! reads [`DriverMessage`] lines from its stdout:
//!
//! ```json
//! {"id":3,"method":"sendMessage","params":{"chatId":"9647701234567@c.us","text":"hi"}}
//! {"id":3,"result":{"messageId":"true_9647701234567@c.us_3EB0"}}
//! {"event":"qr","data":{"payload":"2@abc..."}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::TransportEvent;

/// Driver method names.
pub mod methods {
	pub const INITIALIZE: &str = "initialize";
	pub const SEND_MESSAGE: &str = "sendMessage";
	pub const GET_CHATS: &str = "getChats";
	pub const GET_CHAT_BY_ID: &str = "getChatById";
	pub const GET_PROFILE_PIC_URL: &str = "getProfilePicUrl";
	pub const GET_IDENTITY: &str = "getIdentity";
	pub const LOGOUT: &str = "logout";
	pub const DESTROY: &str = "destroy";
}

/// Request sent to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRequest {
	/// Unique request ID for correlating responses
	pub id: u32,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Response line from the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverResponse {
	pub id: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<DriverErrorPayload>,
}

/// Error details reported by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverErrorPayload {
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// Any line the driver may print.
///
/// Uses serde's `untagged` to tell frames apart: lines with `id` are responses,
/// lines with `event` are transport events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DriverMessage {
	Response(DriverResponse),
	Event(TransportEvent),
}

/// `sendMessage` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
	pub chat_id: String,
	pub text: String,
}

/// `sendMessage` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResult {
	pub message_id: String,
}

/// `getIdentity` result. `wid` is absent until the client is logged in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResult {
	#[serde(default)]
	pub wid: Option<String>,
	#[serde(default)]
	pub pushname: Option<String>,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn response_and_event_lines_are_distinguished() {
		let response: DriverMessage = serde_json::from_value(json!({ "id": 7, "result": { "ok": true } })).unwrap();
		assert!(matches!(response, DriverMessage::Response(DriverResponse { id: 7, .. })));

		let event: DriverMessage = serde_json::from_value(json!({ "event": "qr", "data": { "payload": "2@xyz" } })).unwrap();
		match event {
			DriverMessage::Event(TransportEvent::Qr { payload }) => assert_eq!(payload, "2@xyz"),
			other => panic!("unexpected frame: {other:?}"),
		}
	}

	#[test]
	fn error_response_carries_payload() {
		let frame: DriverMessage = serde_json::from_value(json!({
			"id": 1,
			"error": { "message": "Session closed", "name": "ProtocolError" }
		}))
		.unwrap();
		let DriverMessage::Response(response) = frame else {
			panic!("expected response");
		};
		let error = response.error.unwrap();
		assert_eq!(error.message, "Session closed");
		assert_eq!(error.name.as_deref(), Some("ProtocolError"));
	}
}
