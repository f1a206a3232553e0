//! Session manager configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default snapshot file name inside the state directory.
pub const DEFAULT_SNAPSHOT_FILE: &str = "sessions.json";
/// Ownership file written into the state directory while a manager is open.
pub const PID_FILE_NAME: &str = "walinkd.pid";

/// Paths and timing knobs for [`SessionManager`](crate::SessionManager).
///
/// Every field has a default so partial JSON config files deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
	pub state_dir: PathBuf,
	pub snapshot_file: String,
	/// Defaults to `<stateDir>/credentials`.
	pub credentials_dir: Option<PathBuf>,
	pub pairing_timeout_ms: u64,
	pub reconnect_timeout_ms: u64,
	/// Wait after `ready` before confirming the account identity.
	pub ready_settle_ms: u64,
	/// Delay between consecutive reconnects during restoration.
	pub restore_stagger_ms: u64,
	pub teardown_timeout_ms: u64,
	pub chat_list_timeout_ms: u64,
	pub chat_item_timeout_ms: u64,
	pub profile_picture_timeout_ms: u64,
	pub lock_state_dir: bool,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			state_dir: PathBuf::from(".walink"),
			snapshot_file: DEFAULT_SNAPSHOT_FILE.to_string(),
			credentials_dir: None,
			pairing_timeout_ms: 30_000,
			reconnect_timeout_ms: 45_000,
			ready_settle_ms: 2_000,
			restore_stagger_ms: 3_000,
			teardown_timeout_ms: 5_000,
			chat_list_timeout_ms: 10_000,
			chat_item_timeout_ms: 2_500,
			profile_picture_timeout_ms: 1_500,
			lock_state_dir: true,
		}
	}
}

impl ManagerConfig {
	pub fn new(state_dir: impl Into<PathBuf>) -> Self {
		Self {
			state_dir: state_dir.into(),
			..Self::default()
		}
	}

	pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.credentials_dir = Some(dir.into());
		self
	}

	pub fn with_pairing_timeout(mut self, timeout: Duration) -> Self {
		self.pairing_timeout_ms = timeout.as_millis() as u64;
		self
	}

	pub fn with_reconnect_timeout(mut self, timeout: Duration) -> Self {
		self.reconnect_timeout_ms = timeout.as_millis() as u64;
		self
	}

	pub fn with_ready_settle(mut self, delay: Duration) -> Self {
		self.ready_settle_ms = delay.as_millis() as u64;
		self
	}

	pub fn with_restore_stagger(mut self, delay: Duration) -> Self {
		self.restore_stagger_ms = delay.as_millis() as u64;
		self
	}

	pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
		self.teardown_timeout_ms = timeout.as_millis() as u64;
		self
	}

	pub fn with_chat_timeouts(mut self, list: Duration, item: Duration, profile_picture: Duration) -> Self {
		self.chat_list_timeout_ms = list.as_millis() as u64;
		self.chat_item_timeout_ms = item.as_millis() as u64;
		self.profile_picture_timeout_ms = profile_picture.as_millis() as u64;
		self
	}

	pub fn with_state_dir_lock(mut self, enabled: bool) -> Self {
		self.lock_state_dir = enabled;
		self
	}

	pub fn snapshot_path(&self) -> PathBuf {
		self.state_dir.join(&self.snapshot_file)
	}

	pub fn credentials_root(&self) -> PathBuf {
		self.credentials_dir.clone().unwrap_or_else(|| self.state_dir.join("credentials"))
	}

	pub fn pid_path(&self) -> PathBuf {
		self.state_dir.join(PID_FILE_NAME)
	}

	pub(crate) fn pairing_timeout(&self) -> Duration {
		Duration::from_millis(self.pairing_timeout_ms)
	}

	pub(crate) fn reconnect_timeout(&self) -> Duration {
		Duration::from_millis(self.reconnect_timeout_ms)
	}

	pub(crate) fn ready_settle(&self) -> Duration {
		Duration::from_millis(self.ready_settle_ms)
	}

	pub(crate) fn restore_stagger(&self) -> Duration {
		Duration::from_millis(self.restore_stagger_ms)
	}

	pub(crate) fn teardown_timeout(&self) -> Duration {
		Duration::from_millis(self.teardown_timeout_ms)
	}

	pub(crate) fn chat_list_timeout(&self) -> Duration {
		Duration::from_millis(self.chat_list_timeout_ms)
	}

	pub(crate) fn chat_item_timeout(&self) -> Duration {
		Duration::from_millis(self.chat_item_timeout_ms)
	}

	pub(crate) fn profile_picture_timeout(&self) -> Duration {
		Duration::from_millis(self.profile_picture_timeout_ms)
	}
}
