#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use walink::{ManagerConfig, SessionManager};
use walink_runtime::fake::{FakeBehavior, FakeTransportFactory};

pub fn ms(value: u64) -> Duration {
	Duration::from_millis(value)
}

/// Short timeouts so failure paths finish quickly.
pub fn fast_config(state_dir: &Path) -> ManagerConfig {
	ManagerConfig::new(state_dir)
		.with_pairing_timeout(ms(300))
		.with_reconnect_timeout(ms(300))
		.with_ready_settle(ms(5))
		.with_restore_stagger(ms(10))
		.with_teardown_timeout(ms(200))
		.with_chat_timeouts(ms(500), ms(100), ms(50))
		.with_state_dir_lock(false)
}

pub fn open(state_dir: &Path, behavior: FakeBehavior) -> (SessionManager, FakeTransportFactory) {
	let factory = FakeTransportFactory::new(behavior);
	let manager = SessionManager::builder(fast_config(state_dir))
		.transport_factory(factory.clone())
		.open()
		.unwrap();
	(manager, factory)
}

pub fn pair() -> FakeBehavior {
	FakeBehavior::Pair {
		payload: "2@Qx9rLwTESTPAYLOAD,abc,def==".to_string(),
	}
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
	for _ in 0..200 {
		if condition() {
			return true;
		}
		tokio::time::sleep(ms(10)).await;
	}
	condition()
}
