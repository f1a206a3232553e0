//! Inbound message router: confirms pending orders when a customer replies
//! with a confirmation keyword.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walink_protocol::{InboundMessage, Order, OrderStatus, Platform, TenantId};
use walink_runtime::Transport;

use crate::error::Result;
use crate::store::{OrderStore, PlatformDirectory};

/// Keywords accepted as an order confirmation.
pub const DEFAULT_KEYWORDS: &[&str] = &["تم", "تأكيد", "أكيد", "نعم", "ok", "yes", "confirm"];

/// Reply sent for every confirmed order.
pub const DEFAULT_REPLY_TEMPLATE: &str = "تم تأكيد طلبك رقم {orderId} بنجاح. شكراً لك!";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
	/// Matched as substrings; ASCII keywords ignore case.
	pub keywords: Vec<String>,
	/// Supports `{orderId}` and `{customerName}` placeholders.
	pub reply_template: String,
	/// Use the first platform when neither id nor contact phone resolves one.
	pub fallback_to_first_platform: bool,
}

impl Default for RouterConfig {
	fn default() -> Self {
		Self {
			keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
			reply_template: DEFAULT_REPLY_TEMPLATE.to_string(),
			fallback_to_first_platform: false,
		}
	}
}

/// What the router did with one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
	/// Self-authored or no keyword present.
	NotMatched,
	/// Keyword matched but no platform could be resolved for the tenant.
	NoPlatform,
	Confirmed { platform_id: String, orders: Vec<String> },
}

pub struct MessageRouter {
	config: RouterConfig,
	orders: Arc<dyn OrderStore>,
	platforms: Arc<dyn PlatformDirectory>,
}

impl MessageRouter {
	pub fn new(config: RouterConfig, orders: Arc<dyn OrderStore>, platforms: Arc<dyn PlatformDirectory>) -> Self {
		Self { config, orders, platforms }
	}

	pub fn config(&self) -> &RouterConfig {
		&self.config
	}

	/// Whether `body` contains any confirmation keyword.
	///
	/// Plain substring matching: "تمام لكن لا" contains "تم" and matches.
	pub fn matches_keyword(&self, body: &str) -> bool {
		let lowered = body.to_lowercase();
		self.config.keywords.iter().filter(|k| !k.is_empty()).any(|keyword| {
			if keyword.is_ascii() {
				lowered.contains(&keyword.to_lowercase())
			} else {
				body.contains(keyword.as_str())
			}
		})
	}

	/// Routes one inbound message received on `tenant`'s session.
	///
	/// `tenant_phone` is the session's registered phone number, used to find
	/// the platform when none has the tenant's id.
	pub async fn route(&self, tenant: &TenantId, tenant_phone: &str, message: &InboundMessage, transport: &dyn Transport) -> Result<RouteOutcome> {
		if message.from_me || !message.is_text() || !self.matches_keyword(&message.body) {
			return Ok(RouteOutcome::NotMatched);
		}

		let phone = bare_phone(&message.from);
		let Some(platform) = self.resolve_platform(tenant, tenant_phone).await? else {
			warn!(target = "walink.router", %tenant, from = %message.from, "confirmation received but no platform resolved");
			return Ok(RouteOutcome::NoPlatform);
		};

		let pending = self.orders.pending_orders_by_phone_and_platform(phone, &platform.id).await?;
		debug!(target = "walink.router", %tenant, platform = %platform.id, phone, pending = pending.len(), "confirmation keyword matched");

		let mut confirmed = Vec::with_capacity(pending.len());
		for order in pending {
			self.orders.update_order_status(&order.id, OrderStatus::Confirmed).await?;
			info!(target = "walink.router", %tenant, order = %order.id, "order confirmed by customer reply");

			let reply = self.render_reply(&order);
			if let Err(err) = transport.send_message(&message.from, &reply).await {
				warn!(target = "walink.router", %tenant, order = %order.id, error = %err, "confirmation reply failed");
			}
			confirmed.push(order.id);
		}

		Ok(RouteOutcome::Confirmed {
			platform_id: platform.id,
			orders: confirmed,
		})
	}

	async fn resolve_platform(&self, tenant: &TenantId, tenant_phone: &str) -> Result<Option<Platform>> {
		if let Some(platform) = self.platforms.platform_by_id(tenant.as_str()).await? {
			return Ok(Some(platform));
		}

		let platforms = self.platforms.all_platforms().await?;
		let wanted = digits(tenant_phone);
		if !wanted.is_empty() {
			if let Some(platform) = platforms
				.iter()
				.find(|p| p.contact_phone.as_deref().is_some_and(|phone| digits(phone) == wanted))
			{
				return Ok(Some(platform.clone()));
			}
		}

		if !self.config.fallback_to_first_platform {
			return Ok(None);
		}
		let first = platforms.into_iter().next();
		if let Some(platform) = &first {
			warn!(target = "walink.router", %tenant, platform = %platform.id, "falling back to first platform; tenant mapping is ambiguous");
		}
		Ok(first)
	}

	fn render_reply(&self, order: &Order) -> String {
		self.config
			.reply_template
			.replace("{orderId}", &order.id)
			.replace("{customerName}", order.customer_name.as_deref().unwrap_or(""))
	}
}

/// Strips the transport suffix from a chat id: `9647701234567@c.us` → `9647701234567`.
pub fn bare_phone(chat_id: &str) -> &str {
	chat_id.split('@').next().unwrap_or(chat_id)
}

fn digits(value: &str) -> String {
	value.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use walink_runtime::TransportFactory;
	use walink_runtime::fake::{FakeBehavior, FakeTransportController, FakeTransportFactory};

	use super::*;
	use crate::store::MemoryStore;

	const CUSTOMER: &str = "9647701234567@c.us";

	fn pending(id: &str, platform: &str) -> Order {
		Order {
			id: id.to_string(),
			customer_phone: "9647701234567".to_string(),
			customer_name: Some("Zainab".to_string()),
			platform_id: platform.to_string(),
			status: OrderStatus::Pending,
			total: Some(25_000.0),
		}
	}

	fn platform(id: &str, contact: Option<&str>) -> Platform {
		Platform {
			id: id.to_string(),
			owner_id: None,
			name: format!("Store {id}"),
			contact_phone: contact.map(str::to_string),
		}
	}

	fn message(body: &str) -> InboundMessage {
		InboundMessage {
			id: "m1".to_string(),
			from: CUSTOMER.to_string(),
			to: "9647700000000@c.us".to_string(),
			body: body.to_string(),
			from_me: false,
			timestamp: 0,
			message_type: "chat".to_string(),
		}
	}

	fn router(store: &Arc<MemoryStore>, config: RouterConfig) -> MessageRouter {
		MessageRouter::new(config, store.clone(), store.clone())
	}

	fn transport() -> (Arc<dyn Transport>, FakeTransportController) {
		let factory = FakeTransportFactory::new(FakeBehavior::Silent);
		let parts = factory.create(&TenantId::from("shop"), Path::new("/tmp")).unwrap();
		(parts.transport, factory.last().unwrap())
	}

	#[test]
	fn keyword_matching() {
		let store = Arc::new(MemoryStore::new());
		let router = router(&store, RouterConfig::default());

		assert!(router.matches_keyword("تم"));
		assert!(router.matches_keyword("OK"));
		assert!(router.matches_keyword("Yes please"));
		assert!(router.matches_keyword("تمام لكن لا"));
		assert!(!router.matches_keyword("مرحبا"));
		assert!(!router.matches_keyword(""));
	}

	#[test]
	fn bare_phone_strips_suffix() {
		assert_eq!(bare_phone("9647701234567@c.us"), "9647701234567");
		assert_eq!(bare_phone("9647701234567"), "9647701234567");
	}

	#[tokio::test]
	async fn confirmation_updates_order_and_replies_once() {
		let store = Arc::new(MemoryStore::new().with_platform(platform("shop", None)).with_order(pending("o-17", "shop")));
		let router = router(&store, RouterConfig::default());
		let (transport, controller) = transport();

		let outcome = router.route(&TenantId::from("shop"), "", &message("تم"), transport.as_ref()).await.unwrap();

		assert_eq!(
			outcome,
			RouteOutcome::Confirmed {
				platform_id: "shop".into(),
				orders: vec!["o-17".into()]
			}
		);
		assert_eq!(store.status_updates(), vec![("o-17".to_string(), OrderStatus::Confirmed)]);
		let sent = controller.sent_messages();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].0, CUSTOMER);
		assert!(sent[0].1.contains("o-17"));
	}

	#[tokio::test]
	async fn platform_resolves_by_contact_phone_digits() {
		let store = Arc::new(
			MemoryStore::new()
				.with_platform(platform("other", Some("+964 770 999 9999")))
				.with_platform(platform("p-2", Some("+964 770 000 0000")))
				.with_order(pending("o-1", "p-2")),
		);
		let router = router(&store, RouterConfig::default());
		let (transport, _controller) = transport();

		let outcome = router.route(&TenantId::from("tenant-x"), "9647700000000", &message("OK"), transport.as_ref()).await.unwrap();

		assert!(matches!(outcome, RouteOutcome::Confirmed { ref platform_id, .. } if platform_id == "p-2"));
	}

	#[tokio::test]
	async fn first_platform_fallback_is_opt_in() {
		let store = Arc::new(MemoryStore::new().with_platform(platform("first", None)).with_order(pending("o-1", "first")));
		let (transport, controller) = transport();

		let strict = router(&store, RouterConfig::default());
		let outcome = strict.route(&TenantId::from("tenant-x"), "", &message("ok"), transport.as_ref()).await.unwrap();
		assert_eq!(outcome, RouteOutcome::NoPlatform);
		assert!(store.status_updates().is_empty());

		let lenient = router(
			&store,
			RouterConfig {
				fallback_to_first_platform: true,
				..RouterConfig::default()
			},
		);
		let outcome = lenient.route(&TenantId::from("tenant-x"), "", &message("ok"), transport.as_ref()).await.unwrap();
		assert!(matches!(outcome, RouteOutcome::Confirmed { .. }));
		assert_eq!(controller.sent_messages().len(), 1);
	}

	#[tokio::test]
	async fn unmatched_and_self_messages_are_ignored() {
		let store = Arc::new(MemoryStore::new().with_platform(platform("shop", None)).with_order(pending("o-1", "shop")));
		let router = router(&store, RouterConfig::default());
		let (transport, controller) = transport();

		let outcome = router.route(&TenantId::from("shop"), "", &message("متى يصل الطلب؟"), transport.as_ref()).await.unwrap();
		assert_eq!(outcome, RouteOutcome::NotMatched);

		let mut own = message("تم");
		own.from_me = true;
		let outcome = router.route(&TenantId::from("shop"), "", &own, transport.as_ref()).await.unwrap();
		assert_eq!(outcome, RouteOutcome::NotMatched);

		assert!(store.status_updates().is_empty());
		assert!(controller.sent_messages().is_empty());
	}

	#[tokio::test]
	async fn captioned_media_is_not_a_confirmation() {
		let store = Arc::new(MemoryStore::new().with_platform(platform("shop", None)).with_order(pending("o-1", "shop")));
		let router = router(&store, RouterConfig::default());
		let (transport, controller) = transport();

		for kind in ["image", "sticker", "ptt"] {
			let mut media = message("ok");
			media.message_type = kind.to_string();
			let outcome = router.route(&TenantId::from("shop"), "", &media, transport.as_ref()).await.unwrap();
			assert_eq!(outcome, RouteOutcome::NotMatched, "{kind}");
		}

		assert!(store.status_updates().is_empty());
		assert!(controller.sent_messages().is_empty());
	}

	#[tokio::test]
	async fn reply_template_placeholders_are_filled() {
		let store = Arc::new(MemoryStore::new().with_platform(platform("shop", None)).with_order(pending("o-9", "shop")));
		let router = router(
			&store,
			RouterConfig {
				reply_template: "{customerName}: order {orderId} confirmed".into(),
				..RouterConfig::default()
			},
		);
		let (transport, controller) = transport();

		router.route(&TenantId::from("shop"), "", &message("confirm"), transport.as_ref()).await.unwrap();

		assert_eq!(controller.sent_messages()[0].1, "Zainab: order o-9 confirmed");
	}
}
