//! Per-tenant credential directories.
//!
//! The transport keeps its authentication material in
//! `<root>/session-<tenant>/`. The manager never reads the contents; the
//! directory's existence is what marks a tenant as previously paired.

use std::fs;
use std::path::PathBuf;

use walink_protocol::TenantId;

/// Locates and removes tenant credential directories.
#[derive(Debug, Clone)]
pub struct CredentialStore {
	root: PathBuf,
}

impl CredentialStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Directory for `tenant`. Every byte outside `[A-Za-z0-9_-]` is
	/// percent-encoded, so distinct ids never share a directory and the
	/// result always stays under the root.
	pub fn dir_for(&self, tenant: &TenantId) -> PathBuf {
		let mut safe = String::with_capacity(tenant.as_str().len());
		for byte in tenant.as_str().bytes() {
			if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
				safe.push(char::from(byte));
			} else {
				safe.push_str(&format!("%{byte:02X}"));
			}
		}
		self.root.join(format!("session-{safe}"))
	}

	pub fn exists(&self, tenant: &TenantId) -> bool {
		self.dir_for(tenant).is_dir()
	}

	/// Creates the directory if needed and returns its path.
	pub fn ensure(&self, tenant: &TenantId) -> std::io::Result<PathBuf> {
		let dir = self.dir_for(tenant);
		fs::create_dir_all(&dir)?;
		Ok(dir)
	}

	/// Removes the directory. Returns `false` if it did not exist.
	pub fn remove(&self, tenant: &TenantId) -> std::io::Result<bool> {
		match fs::remove_dir_all(self.dir_for(tenant)) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ensure_exists_remove() {
		let temp = tempfile::TempDir::new().unwrap();
		let store = CredentialStore::new(temp.path());
		let tenant = TenantId::from("shop-7");

		assert!(!store.exists(&tenant));
		let dir = store.ensure(&tenant).unwrap();
		assert_eq!(dir, temp.path().join("session-shop-7"));
		fs::write(dir.join("Default"), b"x").unwrap();
		assert!(store.exists(&tenant));

		assert!(store.remove(&tenant).unwrap());
		assert!(!store.exists(&tenant));
		assert!(!store.remove(&tenant).unwrap());
	}

	#[test]
	fn tenant_ids_cannot_escape_the_root() {
		let store = CredentialStore::new("/creds");
		assert_eq!(store.dir_for(&TenantId::from("../etc")), PathBuf::from("/creds/session-%2E%2E%2Fetc"));
	}

	#[test]
	fn similar_tenant_ids_get_distinct_directories() {
		let temp = tempfile::TempDir::new().unwrap();
		let store = CredentialStore::new(temp.path());
		let underscore = TenantId::from("shop_1");
		let dotted = TenantId::from("shop.1");

		assert_ne!(store.dir_for(&underscore), store.dir_for(&dotted));
		assert_ne!(store.dir_for(&TenantId::from("a@b")), store.dir_for(&TenantId::from("a_b")));
		assert_ne!(store.dir_for(&TenantId::from("a%40b")), store.dir_for(&TenantId::from("a@b")));

		store.ensure(&underscore).unwrap();
		assert!(!store.exists(&dotted));
		assert!(!store.remove(&dotted).unwrap());
		assert!(store.exists(&underscore));
	}
}
