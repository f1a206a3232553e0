//! Startup restoration of previously paired sessions.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};
use walink_protocol::TenantId;

use crate::error::{Result, SessionError};
use crate::lifecycle::SessionManager;
use crate::registry::Transition;

/// Per-tenant outcome of a restoration run.
#[derive(Debug, Default)]
pub struct RestoreReport {
	pub connected: Vec<TenantId>,
	pub failed: Vec<(TenantId, SessionError)>,
	/// Tenants without stored credentials, marked disconnected immediately.
	pub skipped: Vec<TenantId>,
	/// Tenants whose reconnect was still running when aborted.
	pub aborted: Vec<TenantId>,
}

struct RestoreTask {
	tenant: TenantId,
	task: JoinHandle<Result<()>>,
}

/// In-flight restoration started by [`SessionManager::restore_active_sessions`].
///
/// Dropping the handle lets the reconnects run to completion on their own.
pub struct RestoreHandle {
	manager: SessionManager,
	tasks: Vec<RestoreTask>,
	skipped: Vec<TenantId>,
}

impl RestoreHandle {
	/// Tenants being reconnected, in start order.
	pub fn tenants(&self) -> impl Iterator<Item = &TenantId> {
		self.tasks.iter().map(|task| &task.tenant)
	}

	pub fn skipped(&self) -> &[TenantId] {
		&self.skipped
	}

	/// Waits for every reconnect to finish.
	pub async fn wait(self) -> RestoreReport {
		self.collect(None).await
	}

	/// Waits up to `limit`; reconnects still running are aborted and their
	/// pending handles torn down.
	pub async fn wait_for(self, limit: Duration) -> RestoreReport {
		self.collect(Some(Instant::now() + limit)).await
	}

	/// Aborts every reconnect that has not finished yet.
	pub async fn abort(self) -> RestoreReport {
		for task in &self.tasks {
			task.task.abort();
		}
		self.collect(Some(Instant::now())).await
	}

	async fn collect(self, deadline: Option<Instant>) -> RestoreReport {
		let mut report = RestoreReport {
			skipped: self.skipped,
			..RestoreReport::default()
		};

		for RestoreTask { tenant, mut task } in self.tasks {
			let joined = match deadline {
				Some(deadline) => tokio::time::timeout_at(deadline, &mut task).await.ok(),
				None => Some((&mut task).await),
			};

			match joined {
				Some(Ok(Ok(()))) => report.connected.push(tenant),
				Some(Ok(Err(err))) => report.failed.push((tenant, err)),
				Some(Err(join_err)) => {
					if join_err.is_panic() {
						error!(target = "walink.session", %tenant, "restore task panicked");
					}
					self.manager.abandon_pending(&tenant).await;
					report.aborted.push(tenant);
				}
				None => {
					task.abort();
					let _ = task.await;
					self.manager.abandon_pending(&tenant).await;
					report.aborted.push(tenant);
				}
			}
		}

		info!(
			target = "walink.session",
			connected = report.connected.len(),
			failed = report.failed.len(),
			skipped = report.skipped.len(),
			aborted = report.aborted.len(),
			"restoration finished"
		);
		report
	}
}

impl SessionManager {
	/// Reconnects every snapshot tenant that has stored credentials.
	///
	/// Reconnects run on their own tasks, started one stagger delay apart.
	/// Tenants without credentials are marked disconnected right away.
	pub fn restore_active_sessions(&self) -> RestoreHandle {
		let tenants = self.read(|registry| registry.tenants());
		let (credentialed, skipped): (Vec<_>, Vec<_>) = tenants.into_iter().partition(|tenant| self.credentials().exists(tenant));

		if !skipped.is_empty() {
			self.mutate(|registry| {
				for tenant in &skipped {
					registry.apply(tenant, Transition::Disconnected);
				}
			});
		}

		info!(
			target = "walink.session",
			restoring = credentialed.len(),
			skipped = skipped.len(),
			"restoring sessions from snapshot"
		);

		let stagger = self.config().restore_stagger();
		let tasks = credentialed
			.into_iter()
			.enumerate()
			.map(|(index, tenant)| {
				let manager = self.clone();
				let delay = stagger * index as u32;
				let task_tenant = tenant.clone();
				let task = tokio::spawn(async move {
					if !delay.is_zero() {
						tokio::time::sleep(delay).await;
					}
					manager.reconnect_session(&task_tenant).await
				});
				RestoreTask { tenant, task }
			})
			.collect();

		RestoreHandle {
			manager: self.clone(),
			tasks,
			skipped,
		}
	}
}
