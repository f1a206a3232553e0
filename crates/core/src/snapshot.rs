//! On-disk session snapshot used for crash recovery.
//!
//! The snapshot is a flat JSON object keyed by tenant id. Writes go to a
//! sibling `.tmp` file which is fsynced and renamed over the target, so a
//! crash mid-write leaves the previous snapshot intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walink_protocol::SessionSnapshot;

use crate::error::Result;

/// Reads and writes the session snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
	path: PathBuf,
}

impl SnapshotStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Loads the snapshot, treating a missing or corrupt file as empty.
	pub fn load(&self) -> SessionSnapshot {
		match self.try_load() {
			Ok(Some(snapshot)) => {
				debug!(target = "walink.snapshot", path = %self.path.display(), tenants = snapshot.len(), "snapshot loaded");
				snapshot
			}
			Ok(None) => SessionSnapshot::new(),
			Err(err) => {
				warn!(target = "walink.snapshot", path = %self.path.display(), error = %err, "ignoring unreadable snapshot");
				SessionSnapshot::new()
			}
		}
	}

	/// Loads the snapshot, surfacing read and parse errors.
	pub fn try_load(&self) -> Result<Option<SessionSnapshot>> {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(err.into()),
		};
		Ok(Some(serde_json::from_str(&content)?))
	}

	/// Atomically replaces the snapshot file.
	pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}

		let mut content = serde_json::to_string_pretty(snapshot)?;
		content.push('\n');

		let temp_path = self.temp_path();
		{
			let mut file = fs::File::create(&temp_path)?;
			file.write_all(content.as_bytes())?;
			file.sync_all()?;
		}
		fs::rename(&temp_path, &self.path)?;

		#[cfg(unix)]
		if let Some(parent) = self.path.parent() {
			if let Ok(dir) = fs::File::open(parent) {
				let _ = dir.sync_all();
			}
		}

		Ok(())
	}

	/// Like [`save`](Self::save), but failures are logged and swallowed.
	pub fn save_logged(&self, snapshot: &SessionSnapshot) {
		if let Err(err) = self.save(snapshot) {
			warn!(target = "walink.snapshot", path = %self.path.display(), error = %err, "snapshot write failed");
		}
	}

	fn temp_path(&self) -> PathBuf {
		let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
		name.push(".tmp");
		self.path.with_file_name(name)
	}
}
