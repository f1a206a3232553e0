use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire string the messaging client uses for an explicit logout.
pub const LOGOUT_REASON: &str = "LOGOUT";

/// Why a transport reported a disconnect.
///
/// Only [`DisconnectReason::Logout`] is terminal; every other reason is treated
/// as a transient blip the transport recovers from on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DisconnectReason {
	Logout,
	Other(String),
}

impl DisconnectReason {
	pub fn is_logout(&self) -> bool {
		matches!(self, DisconnectReason::Logout)
	}
}

impl From<String> for DisconnectReason {
	fn from(value: String) -> Self {
		if value.eq_ignore_ascii_case(LOGOUT_REASON) {
			DisconnectReason::Logout
		} else {
			DisconnectReason::Other(value)
		}
	}
}

impl From<DisconnectReason> for String {
	fn from(value: DisconnectReason) -> Self {
		match value {
			DisconnectReason::Logout => LOGOUT_REASON.to_string(),
			DisconnectReason::Other(reason) => reason,
		}
	}
}

impl fmt::Display for DisconnectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DisconnectReason::Logout => f.write_str(LOGOUT_REASON),
			DisconnectReason::Other(reason) => f.write_str(reason),
		}
	}
}

/// A text message observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
	pub id: String,
	/// Sender chat id, e.g. `9647701234567@c.us`.
	pub from: String,
	#[serde(default)]
	pub to: String,
	#[serde(default)]
	pub body: String,
	#[serde(default)]
	pub from_me: bool,
	#[serde(default)]
	pub timestamp: u64,
	#[serde(rename = "type", default = "default_message_type")]
	pub message_type: String,
}

/// Message type the messaging web client assigns to plain text.
pub const TEXT_MESSAGE_TYPE: &str = "chat";

impl InboundMessage {
	pub fn is_text(&self) -> bool {
		self.message_type == TEXT_MESSAGE_TYPE
	}
}

fn default_message_type() -> String {
	TEXT_MESSAGE_TYPE.to_string()
}

/// Typed event stream emitted by one transport handle.
///
/// Encoded as `{"event": "<name>", "data": {...}}` on the driver wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TransportEvent {
	/// A pairing payload to render as a QR code.
	Qr { payload: String },
	/// Credentials were accepted; readiness follows.
	Authenticated,
	/// The client finished loading and can send messages.
	Ready,
	Disconnected { reason: DisconnectReason },
	AuthFailure { message: String },
	/// Message received from someone else.
	Message(InboundMessage),
	/// Message created on this account, including ones we sent.
	MessageCreate(InboundMessage),
	#[serde(rename_all = "camelCase")]
	MessageAck { message_id: String, ack: i32 },
}

impl TransportEvent {
	/// Short name used in logs.
	pub fn name(&self) -> &'static str {
		match self {
			TransportEvent::Qr { .. } => "qr",
			TransportEvent::Authenticated => "authenticated",
			TransportEvent::Ready => "ready",
			TransportEvent::Disconnected { .. } => "disconnected",
			TransportEvent::AuthFailure { .. } => "auth_failure",
			TransportEvent::Message(_) => "message",
			TransportEvent::MessageCreate(_) => "message_create",
			TransportEvent::MessageAck { .. } => "message_ack",
		}
	}
}

/// Chat listing entry returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub is_group: bool,
	#[serde(default)]
	pub unread_count: u32,
	#[serde(default)]
	pub timestamp: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile_picture_url: Option<String>,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn logout_reason_is_case_insensitive() {
		assert!(DisconnectReason::from("logout".to_string()).is_logout());
		assert!(!DisconnectReason::from("NAVIGATION".to_string()).is_logout());
	}

	#[test]
	fn events_use_adjacent_tagging() {
		let event: TransportEvent = serde_json::from_value(json!({
			"event": "disconnected",
			"data": { "reason": "LOGOUT" }
		}))
		.unwrap();
		assert_eq!(event, TransportEvent::Disconnected { reason: DisconnectReason::Logout });

		let ready: TransportEvent = serde_json::from_value(json!({ "event": "ready" })).unwrap();
		assert_eq!(ready, TransportEvent::Ready);
	}

	#[test]
	fn inbound_message_defaults_type_to_chat() {
		let event: TransportEvent = serde_json::from_value(json!({
			"event": "message",
			"data": { "id": "m1", "from": "9647701234567@c.us", "body": "تم" }
		}))
		.unwrap();
		let TransportEvent::Message(message) = event else {
			panic!("expected message event");
		};
		assert_eq!(message.message_type, "chat");
		assert!(!message.from_me);
	}

	#[test]
	fn message_ack_fields_are_camel_case() {
		let value = serde_json::to_value(TransportEvent::MessageAck {
			message_id: "m1".to_string(),
			ack: 2,
		})
		.unwrap();
		assert_eq!(value["data"]["messageId"], "m1");
	}
}
