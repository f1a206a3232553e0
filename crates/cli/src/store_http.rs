//! Order and platform lookups against the owning application's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use walink::{OrderStore, PlatformDirectory, StoreError, StoreResult};
use walink_protocol::{Order, OrderStatus, Platform};

/// REST-backed [`OrderStore`] and [`PlatformDirectory`].
///
/// - `GET /orders?status=pending&phone=..&platformId=..`
/// - `PATCH /orders/{id}` with `{"status": ..}`
/// - `GET /platforms/{id}` (404 means none)
/// - `GET /platforms`
#[derive(Debug, Clone)]
pub struct HttpStore {
	client: Client,
	base: Url,
	api_key: Option<String>,
}

impl HttpStore {
	pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> StoreResult<Self> {
		let base = Url::parse(base_url).map_err(|err| StoreError::Unavailable(format!("invalid base url {base_url}: {err}")))?;
		if base.cannot_be_a_base() {
			return Err(StoreError::Unavailable(format!("invalid base url {base_url}")));
		}
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|err| StoreError::Unavailable(err.to_string()))?;
		Ok(Self { client, base, api_key })
	}

	fn url(&self, segments: &[&str]) -> StoreResult<Url> {
		let mut url = self.base.clone();
		url.path_segments_mut()
			.map_err(|_| StoreError::Unavailable(format!("invalid base url {}", self.base)))?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	fn request(&self, method: Method, url: Url) -> RequestBuilder {
		let request = self.client.request(method, url);
		match &self.api_key {
			Some(key) => request.bearer_auth(key),
			None => request,
		}
	}

	async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
		request.send().await.map_err(|err| StoreError::Unavailable(err.to_string()))
	}

	async fn expect_success(response: Response) -> StoreResult<Response> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		let message = response.text().await.unwrap_or_default();
		Err(StoreError::Rejected {
			status: status.as_u16(),
			message,
		})
	}

	async fn decode<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
		response.json().await.map_err(|err| StoreError::Decode(err.to_string()))
	}
}

#[async_trait]
impl OrderStore for HttpStore {
	async fn pending_orders_by_phone_and_platform(&self, phone: &str, platform_id: &str) -> StoreResult<Vec<Order>> {
		let url = self.url(&["orders"])?;
		let request = self.request(Method::GET, url).query(&[
			("status", OrderStatus::Pending.as_str()),
			("phone", phone),
			("platformId", platform_id),
		]);
		let response = Self::expect_success(self.send(request).await?).await?;
		let orders: Vec<Order> = Self::decode(response).await?;
		debug!(target = "walink.router", phone, platform_id, found = orders.len(), "pending orders fetched");
		Ok(orders)
	}

	async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> StoreResult<()> {
		let url = self.url(&["orders", order_id])?;
		let request = self.request(Method::PATCH, url).json(&json!({ "status": status }));
		Self::expect_success(self.send(request).await?).await?;
		Ok(())
	}
}

#[async_trait]
impl PlatformDirectory for HttpStore {
	async fn platform_by_id(&self, id: &str) -> StoreResult<Option<Platform>> {
		let url = self.url(&["platforms", id])?;
		let response = self.send(self.request(Method::GET, url)).await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let response = Self::expect_success(response).await?;
		Ok(Some(Self::decode(response).await?))
	}

	async fn all_platforms(&self) -> StoreResult<Vec<Platform>> {
		let url = self.url(&["platforms"])?;
		let response = Self::expect_success(self.send(self.request(Method::GET, url)).await?).await?;
		Self::decode(response).await
	}
}
