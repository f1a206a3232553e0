use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
	#[error("config error: {0}")]
	Config(String),

	#[error(transparent)]
	Session(#[from] walink::SessionError),

	#[error("store error: {0}")]
	Store(#[from] walink::StoreError),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Machine-readable code used in output envelopes.
	pub fn code(&self) -> &'static str {
		match self {
			CliError::Config(_) => "CONFIG_ERROR",
			CliError::Session(err) => err.code(),
			CliError::Store(_) => "STORE_ERROR",
			CliError::Io(_) => "IO_ERROR",
			CliError::Json(_) => "JSON_ERROR",
			CliError::Anyhow(_) => "INTERNAL_ERROR",
		}
	}
}

pub type Result<T> = std::result::Result<T, CliError>;
