use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use walink::{MemoryStore, MessageRouter, OrderStore, PlatformDirectory, SessionManager};
use walink_runtime::DriverTransportFactory;

use crate::config::{AppConfig, StoreConfig};
use crate::error::Result;
use crate::http;
use crate::store_http::HttpStore;

pub async fn execute(config: AppConfig, restore: bool) -> Result<()> {
	let (orders, platforms) = build_store(&config.store)?;
	let router = MessageRouter::new(config.router.clone(), orders, platforms);

	let manager = SessionManager::builder(config.manager.clone())
		.transport_factory(DriverTransportFactory::new(config.driver.clone()))
		.router(router)
		.open()?;

	let listener = TcpListener::bind(config.listen).await?;
	info!(target = "walink.http", addr = %listener.local_addr()?, "listening");

	if restore {
		let handle = manager.restore_active_sessions();
		info!(
			target = "walink.session",
			restoring = handle.tenants().count(),
			skipped = handle.skipped().len(),
			"restoring stored sessions"
		);
		tokio::spawn(async move {
			let report = handle.wait().await;
			for (tenant, err) in &report.failed {
				warn!(target = "walink.session", %tenant, error = %err, "session not restored");
			}
		});
	}

	axum::serve(listener, http::router(manager.clone()))
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	manager.shutdown().await;
	info!(target = "walink.http", "stopped");
	Ok(())
}

fn build_store(config: &StoreConfig) -> Result<(Arc<dyn OrderStore>, Arc<dyn PlatformDirectory>)> {
	match config {
		StoreConfig::Memory => {
			warn!(target = "walink.router", "no order store configured; confirmations will find no orders");
			let store = Arc::new(MemoryStore::new());
			let orders: Arc<dyn OrderStore> = store.clone();
			let platforms: Arc<dyn PlatformDirectory> = store;
			Ok((orders, platforms))
		}
		StoreConfig::Http {
			base_url,
			api_key,
			timeout_ms,
		} => {
			let store = Arc::new(HttpStore::new(base_url, api_key.clone(), Duration::from_millis(*timeout_ms))?);
			let orders: Arc<dyn OrderStore> = store.clone();
			let platforms: Arc<dyn PlatformDirectory> = store;
			Ok((orders, platforms))
		}
	}
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		warn!(target = "walink.http", error = %err, "failed to listen for ctrl-c");
		std::future::pending::<()>().await;
	}
	info!(target = "walink.http", "shutdown requested");
}
