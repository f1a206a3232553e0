//! Order and platform records consumed by the inbound confirmation router.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order lifecycle status as stored by the owning application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	Pending,
	Confirmed,
	Processing,
	Shipped,
	Delivered,
	Cancelled,
}

impl OrderStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Confirmed => "confirmed",
			OrderStatus::Processing => "processing",
			OrderStatus::Shipped => "shipped",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	pub id: String,
	pub customer_phone: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_name: Option<String>,
	pub platform_id: String,
	pub status: OrderStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub total: Option<f64>,
}

/// A tenant's storefront record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub owner_id: Option<String>,
	#[serde(default)]
	pub name: String,
	/// Registered contact number, used to match a session phone to a platform.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub contact_phone: Option<String>,
}
