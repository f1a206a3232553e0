use serde::Serialize;
use walink::{CredentialStore, SnapshotStore};
use walink_protocol::{SessionState, TenantId};

use crate::config::AppConfig;
use crate::error::Result;
use crate::output::{ApiResult, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
	#[serde(flatten)]
	state: SessionState,
	has_credentials: bool,
}

/// Prints the snapshot as last written, without opening transports or
/// taking the state directory lock.
pub fn execute(config: &AppConfig, tenant: Option<&str>) -> Result<()> {
	let snapshot = SnapshotStore::new(config.manager.snapshot_path()).load();
	let credentials = CredentialStore::new(config.manager.credentials_root());

	let describe = |tenant: TenantId, state: SessionState| StoredSession {
		has_credentials: credentials.exists(&tenant),
		state,
	};

	match tenant {
		Some(id) => {
			let tenant = TenantId::from(id);
			let state = match snapshot.get(&tenant) {
				Some(persisted) => SessionState::from_persisted(tenant.clone(), persisted.clone()),
				None => SessionState::unknown(tenant.clone()),
			};
			print_result(&ApiResult::success(describe(tenant, state)));
		}
		None => {
			let sessions: Vec<_> = snapshot
				.into_iter()
				.map(|(tenant, persisted)| describe(tenant.clone(), SessionState::from_persisted(tenant, persisted)))
				.collect();
			print_result(&ApiResult::success(sessions));
		}
	}
	Ok(())
}
