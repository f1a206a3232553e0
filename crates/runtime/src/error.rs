use std::path::PathBuf;

/// Errors raised by transports and runtime helpers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("failed to launch driver `{program}`: {source}")]
	DriverLaunch {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("driver process exited")]
	DriverExited,

	#[error("driver response channel closed")]
	ChannelClosed,

	#[error("{method} timed out after {timeout_ms}ms")]
	Timeout { method: String, timeout_ms: u64 },

	#[error("{name}: {message}")]
	Remote { name: String, message: String },

	#[error("transport already destroyed")]
	Destroyed,

	#[error("state directory lock {} is held by running process {pid}", path.display())]
	StateDirLocked { path: PathBuf, pid: u32 },
}

impl Error {
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}
}

pub type Result<T> = std::result::Result<T, Error>;
