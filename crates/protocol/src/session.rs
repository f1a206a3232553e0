use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque tenant identifier used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TenantId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for TenantId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

/// Connection status of a tenant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
	#[default]
	Disconnected,
	Connecting,
	Connected,
}

impl fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionStatus::Disconnected => write!(f, "disconnected"),
			SessionStatus::Connecting => write!(f, "connecting"),
			SessionStatus::Connected => write!(f, "connected"),
		}
	}
}

/// Full in-memory state for one tenant session.
///
/// `is_connected` implies `status == Connected` and a live transport handle in
/// the registry; `status` may be `Connecting` while a handle exists that has
/// not confirmed readiness yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
	pub tenant_id: TenantId,
	pub phone_number: String,
	pub display_name: String,
	pub status: SessionStatus,
	/// Rendered pairing image, present only while `Connecting`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pairing_code: Option<String>,
	pub is_ready: bool,
	pub is_connected: bool,
}

impl SessionState {
	/// Fresh disconnected state with the given descriptive metadata.
	pub fn new(tenant_id: TenantId, phone_number: impl Into<String>, display_name: impl Into<String>) -> Self {
		Self {
			tenant_id,
			phone_number: phone_number.into(),
			display_name: display_name.into(),
			status: SessionStatus::Disconnected,
			pairing_code: None,
			is_ready: false,
			is_connected: false,
		}
	}

	/// Default state reported for tenants the registry has never seen.
	pub fn unknown(tenant_id: TenantId) -> Self {
		Self::new(tenant_id, "", "")
	}

	pub fn to_persisted(&self) -> PersistedSession {
		PersistedSession {
			phone_number: self.phone_number.clone(),
			display_name: self.display_name.clone(),
			status: self.status,
			is_ready: self.is_ready,
			is_connected: self.is_connected,
		}
	}

	pub fn from_persisted(tenant_id: TenantId, persisted: PersistedSession) -> Self {
		Self {
			tenant_id,
			phone_number: persisted.phone_number,
			display_name: persisted.display_name,
			status: persisted.status,
			pairing_code: None,
			is_ready: persisted.is_ready,
			is_connected: persisted.is_connected,
		}
	}
}

/// Snapshot entry written to disk for one tenant. Never carries pairing codes
/// or credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
	#[serde(default)]
	pub phone_number: String,
	#[serde(default)]
	pub display_name: String,
	#[serde(default)]
	pub status: SessionStatus,
	#[serde(default)]
	pub is_ready: bool,
	#[serde(default)]
	pub is_connected: bool,
}

/// On-disk snapshot format: a flat object keyed by tenant id.
///
/// `BTreeMap` keeps keys sorted so an unmodified load/save round trip is
/// byte-identical.
pub type SessionSnapshot = BTreeMap<TenantId, PersistedSession>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_serializes_lowercase() {
		assert_eq!(serde_json::to_string(&SessionStatus::Connecting).unwrap(), "\"connecting\"");
		let parsed: SessionStatus = serde_json::from_str("\"connected\"").unwrap();
		assert_eq!(parsed, SessionStatus::Connected);
	}

	#[test]
	fn persisted_entry_drops_pairing_code() {
		let mut state = SessionState::new(TenantId::from("shop-1"), "9647700000000", "Shop One");
		state.status = SessionStatus::Connecting;
		state.pairing_code = Some("data:image/svg+xml;base64,AAAA".to_string());

		let json = serde_json::to_value(state.to_persisted()).unwrap();
		assert_eq!(json["status"], "connecting");
		assert_eq!(json["phoneNumber"], "9647700000000");
		assert!(json.get("pairingCode").is_none());
	}

	#[test]
	fn snapshot_keys_are_sorted() {
		let mut snapshot = SessionSnapshot::new();
		snapshot.insert(TenantId::from("b"), SessionState::unknown(TenantId::from("b")).to_persisted());
		snapshot.insert(TenantId::from("a"), SessionState::unknown(TenantId::from("a")).to_persisted());
		let json = serde_json::to_string(&snapshot).unwrap();
		assert!(json.find("\"a\"").unwrap() < json.find("\"b\"").unwrap());
	}

	#[test]
	fn persisted_entry_tolerates_missing_fields() {
		let entry: PersistedSession = serde_json::from_str(r#"{"phoneNumber":"123"}"#).unwrap();
		assert_eq!(entry.status, SessionStatus::Disconnected);
		assert!(!entry.is_connected);
	}
}
