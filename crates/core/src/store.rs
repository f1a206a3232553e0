//! Collaborator contracts for order storage and platform lookup.

use async_trait::async_trait;
use parking_lot::Mutex;
use walink_protocol::{Order, OrderStatus, Platform};

/// Errors from an order or platform backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("store unavailable: {0}")]
	Unavailable(String),

	#[error("store rejected request ({status}): {message}")]
	Rejected { status: u16, message: String },

	#[error("malformed store response: {0}")]
	Decode(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Order storage owned by the surrounding application.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Pending orders placed by `phone` on `platform_id`. Empty when none match.
	async fn pending_orders_by_phone_and_platform(&self, phone: &str, platform_id: &str) -> StoreResult<Vec<Order>>;

	/// Sets the status of one order. Setting the current status again is a no-op.
	async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> StoreResult<()>;
}

/// Platform (storefront) lookup owned by the surrounding application.
#[async_trait]
pub trait PlatformDirectory: Send + Sync {
	async fn platform_by_id(&self, id: &str) -> StoreResult<Option<Platform>>;

	/// Every platform, in the backend's natural order.
	async fn all_platforms(&self) -> StoreResult<Vec<Platform>>;
}

/// In-process store implementing both collaborator traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
	orders: Mutex<Vec<Order>>,
	platforms: Mutex<Vec<Platform>>,
	updates: Mutex<Vec<(String, OrderStatus)>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_order(self, order: Order) -> Self {
		self.orders.lock().push(order);
		self
	}

	pub fn with_platform(self, platform: Platform) -> Self {
		self.platforms.lock().push(platform);
		self
	}

	pub fn orders(&self) -> Vec<Order> {
		self.orders.lock().clone()
	}

	pub fn order(&self, id: &str) -> Option<Order> {
		self.orders.lock().iter().find(|order| order.id == id).cloned()
	}

	/// Every `update_order_status` call received, in order.
	pub fn status_updates(&self) -> Vec<(String, OrderStatus)> {
		self.updates.lock().clone()
	}
}

#[async_trait]
impl OrderStore for MemoryStore {
	async fn pending_orders_by_phone_and_platform(&self, phone: &str, platform_id: &str) -> StoreResult<Vec<Order>> {
		Ok(self
			.orders
			.lock()
			.iter()
			.filter(|order| order.status == OrderStatus::Pending && order.customer_phone == phone && order.platform_id == platform_id)
			.cloned()
			.collect())
	}

	async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> StoreResult<()> {
		self.updates.lock().push((order_id.to_string(), status));
		if let Some(order) = self.orders.lock().iter_mut().find(|order| order.id == order_id) {
			order.status = status;
		}
		Ok(())
	}
}

#[async_trait]
impl PlatformDirectory for MemoryStore {
	async fn platform_by_id(&self, id: &str) -> StoreResult<Option<Platform>> {
		Ok(self.platforms.lock().iter().find(|platform| platform.id == id).cloned())
	}

	async fn all_platforms(&self) -> StoreResult<Vec<Platform>> {
		Ok(self.platforms.lock().clone())
	}
}
