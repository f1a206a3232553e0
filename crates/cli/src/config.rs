//! `walinkd` configuration file.
//!
//! Every section is optional; a missing file means all defaults. The state
//! directory resolves in order: `--state-dir`, `manager.stateDir` from the
//! file, then `<local data dir>/walink`.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use walink::{ManagerConfig, RouterConfig};
use walink_runtime::DriverConfig;

use crate::error::{CliError, Result};

pub const DEFAULT_PORT: u16 = 8787;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
	pub listen: SocketAddr,
	pub manager: ManagerConfig,
	pub router: RouterConfig,
	pub driver: DriverConfig,
	pub store: StoreConfig,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
			manager: ManagerConfig::new(default_state_dir()),
			router: RouterConfig::default(),
			driver: DriverConfig::default(),
			store: StoreConfig::default(),
		}
	}
}

/// Backend for orders and platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreConfig {
	/// In-process store; confirmations find no orders.
	#[default]
	Memory,
	/// REST backend of the owning application.
	#[serde(rename_all = "camelCase")]
	Http {
		base_url: String,
		#[serde(default)]
		api_key: Option<String>,
		#[serde(default = "default_store_timeout_ms")]
		timeout_ms: u64,
	},
}

fn default_store_timeout_ms() -> u64 {
	10_000
}

pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("walink").join("config.json"))
}

pub fn default_state_dir() -> PathBuf {
	dirs::data_local_dir()
		.map(|dir| dir.join("walink"))
		.unwrap_or_else(|| PathBuf::from(".walink"))
}

impl AppConfig {
	/// Loads `explicit`, or the default config file if it exists.
	///
	/// An explicit path that cannot be read is an error; a missing default
	/// file is not.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		match explicit {
			Some(path) => Self::from_file(path),
			None => match default_config_path() {
				Some(path) if path.is_file() => Self::from_file(&path),
				_ => Ok(Self::default()),
			},
		}
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|err| CliError::Config(format!("cannot read {}: {err}", path.display())))?;
		Self::from_json(&content).map_err(|err| CliError::Config(format!("{}: {err}", path.display())))
	}

	pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
		let raw: Value = serde_json::from_str(content)?;
		let explicit_state_dir = raw.pointer("/manager/stateDir").is_some();
		let mut config: AppConfig = serde_json::from_value(raw)?;
		if !explicit_state_dir {
			config.manager.state_dir = default_state_dir();
		}
		Ok(config)
	}

	pub fn with_state_dir(mut self, state_dir: Option<PathBuf>) -> Self {
		if let Some(dir) = state_dir {
			self.manager.state_dir = dir;
		}
		self
	}

	pub fn with_listen(mut self, listen: Option<SocketAddr>) -> Self {
		if let Some(addr) = listen {
			self.listen = addr;
		}
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_object_is_all_defaults() {
		let config = AppConfig::from_json("{}").unwrap();
		assert_eq!(config.listen.port(), DEFAULT_PORT);
		assert_eq!(config.manager.state_dir, default_state_dir());
		assert!(matches!(config.store, StoreConfig::Memory));
		assert!(!config.router.fallback_to_first_platform);
	}

	#[test]
	fn nested_sections_parse() {
		let config = AppConfig::from_json(
			r#"{
				"listen": "0.0.0.0:9000",
				"manager": {"stateDir": "/srv/walink", "reconnectTimeoutMs": 60000},
				"router": {"keywords": ["done"], "fallbackToFirstPlatform": true},
				"driver": {"program": "node", "args": ["driver.js"]},
				"store": {"kind": "http", "baseUrl": "https://api.example.test", "apiKey": "secret"}
			}"#,
		)
		.unwrap();

		assert_eq!(config.listen.port(), 9000);
		assert_eq!(config.manager.state_dir, PathBuf::from("/srv/walink"));
		assert_eq!(config.manager.reconnect_timeout_ms, 60_000);
		assert_eq!(config.manager.pairing_timeout_ms, 30_000);
		assert_eq!(config.router.keywords, vec!["done".to_string()]);
		assert!(config.router.fallback_to_first_platform);
		assert_eq!(config.driver.args, vec!["driver.js".to_string()]);
		match config.store {
			StoreConfig::Http { base_url, api_key, timeout_ms } => {
				assert_eq!(base_url, "https://api.example.test");
				assert_eq!(api_key.as_deref(), Some("secret"));
				assert_eq!(timeout_ms, 10_000);
			}
			other => panic!("unexpected store config: {other:?}"),
		}
	}

	#[test]
	fn flag_overrides_file_state_dir() {
		let config = AppConfig::from_json(r#"{"manager": {"stateDir": "/srv/walink"}}"#)
			.unwrap()
			.with_state_dir(Some(PathBuf::from("/tmp/override")));
		assert_eq!(config.manager.state_dir, PathBuf::from("/tmp/override"));
	}

	#[test]
	fn missing_explicit_file_is_an_error() {
		let err = AppConfig::load(Some(Path::new("/nonexistent/walink/config.json"))).unwrap_err();
		assert!(matches!(err, CliError::Config(_)));
	}
}
