use walink_protocol::TenantId;

use crate::store::StoreError;

/// Errors returned by session manager operations.
///
/// Transient disconnects are not errors, and snapshot write failures are
/// logged rather than returned.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
	#[error("no pairing code issued within {timeout_ms}ms")]
	PairingTimeout { timeout_ms: u64 },

	#[error("session not ready within {timeout_ms}ms")]
	ReconnectTimeout { timeout_ms: u64 },

	#[error("stored credentials are stale: a new pairing code was requested")]
	StaleCredentials,

	#[error("authentication failed: {reason}")]
	AuthFailure { reason: String },

	#[error("no stored credentials for tenant {tenant}")]
	NoCredentials { tenant: TenantId },

	#[error("tenant {tenant} is not connected")]
	NotConnected { tenant: TenantId },

	#[error("transport closed before the session settled")]
	TransportClosed,

	#[error("state directory is owned by running process {pid}")]
	StateDirLocked { pid: u32 },

	#[error("transport error: {0}")]
	Transport(walink_runtime::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("store error: {0}")]
	Store(#[from] StoreError),
}

impl From<walink_runtime::Error> for SessionError {
	fn from(err: walink_runtime::Error) -> Self {
		match err {
			walink_runtime::Error::StateDirLocked { pid, .. } => SessionError::StateDirLocked { pid },
			walink_runtime::Error::Io(err) => SessionError::Io(err),
			other => SessionError::Transport(other),
		}
	}
}

impl SessionError {
	/// Stable machine-readable code for API envelopes.
	pub fn code(&self) -> &'static str {
		match self {
			SessionError::PairingTimeout { .. } => "PAIRING_TIMEOUT",
			SessionError::ReconnectTimeout { .. } => "RECONNECT_TIMEOUT",
			SessionError::StaleCredentials => "STALE_CREDENTIALS",
			SessionError::AuthFailure { .. } => "AUTH_FAILURE",
			SessionError::NoCredentials { .. } => "NO_CREDENTIALS",
			SessionError::NotConnected { .. } => "NOT_CONNECTED",
			SessionError::TransportClosed => "TRANSPORT_CLOSED",
			SessionError::StateDirLocked { .. } => "STATE_DIR_LOCKED",
			SessionError::Transport(err) if err.is_timeout() => "TRANSPORT_TIMEOUT",
			SessionError::Transport(_) => "TRANSPORT_ERROR",
			SessionError::Io(_) => "IO_ERROR",
			SessionError::Json(_) => "JSON_ERROR",
			SessionError::Store(_) => "STORE_ERROR",
		}
	}

	/// Whether a reconnect failure proves the stored credentials are unusable.
	pub fn invalidates_credentials(&self) -> bool {
		matches!(
			self,
			SessionError::ReconnectTimeout { .. } | SessionError::StaleCredentials | SessionError::AuthFailure { .. }
		)
	}
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn runtime_lock_error_maps_to_state_dir_locked() {
		let err: SessionError = walink_runtime::Error::StateDirLocked {
			path: "/tmp/walinkd.pid".into(),
			pid: 42,
		}
		.into();
		assert!(matches!(err, SessionError::StateDirLocked { pid: 42 }));
		assert_eq!(err.code(), "STATE_DIR_LOCKED");
	}

	#[test]
	fn transport_timeouts_have_their_own_code() {
		let err: SessionError = walink_runtime::Error::Timeout {
			method: "getChats".into(),
			timeout_ms: 10,
		}
		.into();
		assert_eq!(err.code(), "TRANSPORT_TIMEOUT");
	}

	#[test]
	fn only_credential_failures_invalidate_credentials() {
		assert!(SessionError::StaleCredentials.invalidates_credentials());
		assert!(SessionError::ReconnectTimeout { timeout_ms: 1 }.invalidates_credentials());
		assert!(!SessionError::TransportClosed.invalidates_credentials());
		assert!(!SessionError::Transport(walink_runtime::Error::DriverExited).invalidates_credentials());
	}
}
