use serde_json::json;
use walink::SessionManager;
use walink_protocol::TenantId;

use crate::config::AppConfig;
use crate::error::Result;
use crate::output::{ApiResult, print_result};

/// Removes a tenant while no server owns the state directory.
pub async fn execute(config: AppConfig, tenant: &str) -> Result<()> {
	let manager = SessionManager::builder(config.manager).open()?;
	let tenant = TenantId::from(tenant);

	let had_state = manager.list_sessions().iter().any(|state| state.tenant_id == tenant);
	let had_credentials = manager.credentials().exists(&tenant);
	manager.destroy_session(&tenant).await?;

	print_result(&ApiResult::success(json!({
		"tenantId": tenant,
		"removedState": had_state,
		"removedCredentials": had_credentials,
	})));
	Ok(())
}
