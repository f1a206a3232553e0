mod common;

use std::time::Instant;

use common::{eventually, fast_config, ms, open};
use walink::{SessionError, SessionManager, SnapshotStore};
use walink_protocol::{PersistedSession, SessionSnapshot, SessionStatus, TenantId};
use walink_runtime::fake::{FakeBehavior, FakeTransportFactory};

fn seed(state_dir: &std::path::Path, tenants: &[&str]) {
	let mut snapshot = SessionSnapshot::new();
	for id in tenants {
		snapshot.insert(
			TenantId::from(*id),
			PersistedSession {
				phone_number: "9647700000000".to_string(),
				display_name: format!("Store {id}"),
				status: SessionStatus::Connected,
				is_ready: true,
				is_connected: true,
			},
		);
	}
	SnapshotStore::new(fast_config(state_dir).snapshot_path()).save(&snapshot).unwrap();
}

#[tokio::test]
async fn unanswered_reconnects_all_end_disconnected_in_bounded_time() {
	let temp = tempfile::TempDir::new().unwrap();
	let tenants = ["a", "b", "c", "d"];
	seed(temp.path(), &tenants);
	let (manager, factory) = open(temp.path(), FakeBehavior::Silent);
	for id in tenants {
		manager.credentials().ensure(&TenantId::from(id)).unwrap();
	}

	let started = Instant::now();
	let report = manager.restore_active_sessions().wait().await;

	assert!(started.elapsed() < ms(3_000));
	assert_eq!(report.failed.len(), 4);
	assert!(report.failed.iter().all(|(_, err)| matches!(err, SessionError::ReconnectTimeout { .. })));
	for id in tenants {
		let state = manager.get_session_status(&TenantId::from(id));
		assert_eq!(state.status, SessionStatus::Disconnected, "tenant {id}");
		assert!(!state.is_connected);
	}
	assert_eq!(manager.live_handle_count(), 0);
	assert!(eventually(|| factory.live_count() == 0).await);
}

#[tokio::test]
async fn tenants_without_credentials_are_skipped_and_marked_disconnected() {
	let temp = tempfile::TempDir::new().unwrap();
	seed(temp.path(), &["paired", "never-paired"]);
	let (manager, factory) = open(temp.path(), FakeBehavior::Restore);
	manager.credentials().ensure(&TenantId::from("paired")).unwrap();

	let restore = manager.restore_active_sessions();
	assert_eq!(restore.tenants().cloned().collect::<Vec<_>>(), vec![TenantId::from("paired")]);
	assert_eq!(restore.skipped(), &[TenantId::from("never-paired")]);
	assert_eq!(manager.get_session_status(&TenantId::from("never-paired")).status, SessionStatus::Disconnected);

	let report = restore.wait().await;

	assert_eq!(report.connected, vec![TenantId::from("paired")]);
	assert_eq!(report.skipped, vec![TenantId::from("never-paired")]);
	assert_eq!(factory.created_count(), 1);
	assert!(manager.get_session_status(&TenantId::from("paired")).is_connected);

	let persisted = SnapshotStore::new(manager.config().snapshot_path()).load();
	assert_eq!(persisted[&TenantId::from("never-paired")].status, SessionStatus::Disconnected);
	assert!(!persisted[&TenantId::from("never-paired")].is_connected);
}

#[tokio::test]
async fn wait_for_aborts_stragglers_and_keeps_credentials() {
	let temp = tempfile::TempDir::new().unwrap();
	seed(temp.path(), &["a", "b"]);
	let factory = FakeTransportFactory::new(FakeBehavior::Silent);
	let config = fast_config(temp.path()).with_reconnect_timeout(ms(10_000));
	let manager = SessionManager::builder(config).transport_factory(factory.clone()).open().unwrap();
	for id in ["a", "b"] {
		manager.credentials().ensure(&TenantId::from(id)).unwrap();
	}

	let started = Instant::now();
	let report = manager.restore_active_sessions().wait_for(ms(100)).await;

	assert!(started.elapsed() < ms(2_000));
	assert_eq!(report.aborted.len(), 2);
	assert!(report.connected.is_empty() && report.failed.is_empty());
	assert_eq!(manager.live_handle_count(), 0);
	assert!(eventually(|| factory.live_count() == 0).await);
	for id in ["a", "b"] {
		assert_eq!(manager.get_session_status(&TenantId::from(id)).status, SessionStatus::Disconnected);
		assert!(manager.credentials().exists(&TenantId::from(id)));
	}
}

#[tokio::test]
async fn abort_cancels_pending_reconnects() {
	let temp = tempfile::TempDir::new().unwrap();
	seed(temp.path(), &["a", "b", "c"]);
	let factory = FakeTransportFactory::new(FakeBehavior::Silent);
	let config = fast_config(temp.path())
		.with_reconnect_timeout(ms(10_000))
		.with_restore_stagger(ms(1_000));
	let manager = SessionManager::builder(config).transport_factory(factory.clone()).open().unwrap();
	for id in ["a", "b", "c"] {
		manager.credentials().ensure(&TenantId::from(id)).unwrap();
	}

	let restore = manager.restore_active_sessions();
	assert!(eventually(|| factory.created_count() == 1).await);
	let report = restore.abort().await;

	assert_eq!(report.aborted.len(), 3);
	assert_eq!(factory.created_count(), 1, "staggered reconnects never started");
	assert_eq!(manager.live_handle_count(), 0);
	assert!(eventually(|| factory.live_count() == 0).await);
}
