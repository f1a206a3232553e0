//! In-memory transport for testing session orchestration without a driver process.
//!
//! # Example
//!
//! ```ignore
//! let factory = FakeTransportFactory::new(FakeBehavior::Pair { payload: "2@abc".into() });
//! let parts = factory.create(&tenant, dir)?;
//! parts.transport.initialize().await?; // emits `qr`
//!
//! let controller = factory.last().unwrap();
//! controller.emit(TransportEvent::Ready);
//! assert_eq!(controller.sent_messages().len(), 0);
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use walink_protocol::{ChatSummary, DisconnectReason, InboundMessage, TenantId, TransportEvent};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportFactory, TransportParts};

/// What a fake transport does when `initialize` is called.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
	/// Emits nothing; the caller's timeout decides.
	Silent,
	/// Emits a pairing code.
	Pair { payload: String },
	/// Emits `authenticated` then `ready`, as with valid stored credentials.
	Restore,
	/// Emits `auth_failure`.
	Reject { message: String },
	/// `initialize` itself returns an error.
	FailInitialize { message: String },
}

#[derive(Debug)]
struct FactoryState {
	behavior: FakeBehavior,
	identity: Option<String>,
	created: Vec<FakeTransportController>,
}

/// Factory producing [`FakeTransportController`]-observable transports.
#[derive(Debug, Clone)]
pub struct FakeTransportFactory {
	state: Arc<Mutex<FactoryState>>,
}

impl FakeTransportFactory {
	pub fn new(behavior: FakeBehavior) -> Self {
		Self {
			state: Arc::new(Mutex::new(FactoryState {
				behavior,
				identity: Some("9647700000000@c.us".to_string()),
				created: Vec::new(),
			})),
		}
	}

	/// Changes the behavior of transports created from now on.
	pub fn set_behavior(&self, behavior: FakeBehavior) {
		self.state.lock().behavior = behavior;
	}

	/// Identity reported by transports created from now on.
	pub fn set_identity(&self, identity: Option<String>) {
		self.state.lock().identity = identity;
	}

	/// Controllers for every transport created so far, oldest first.
	pub fn controllers(&self) -> Vec<FakeTransportController> {
		self.state.lock().created.clone()
	}

	pub fn last(&self) -> Option<FakeTransportController> {
		self.state.lock().created.last().cloned()
	}

	pub fn created_count(&self) -> usize {
		self.state.lock().created.len()
	}

	/// Number of created transports that have not been destroyed.
	pub fn live_count(&self) -> usize {
		self.state.lock().created.iter().filter(|c| !c.is_destroyed()).count()
	}
}

impl TransportFactory for FakeTransportFactory {
	fn create(&self, tenant: &TenantId, credential_dir: &Path) -> Result<TransportParts> {
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let mut state = self.state.lock();

		let inner = Arc::new(FakeInner {
			tenant: tenant.clone(),
			credential_dir: credential_dir.to_path_buf(),
			behavior: state.behavior.clone(),
			events_tx,
			identity: Mutex::new(state.identity.clone()),
			sent: Mutex::new(Vec::new()),
			chats: Mutex::new(Vec::new()),
			profile_delays: Mutex::new(HashMap::new()),
			chat_delay: Mutex::new(None),
			initialized: AtomicBool::new(false),
			logged_out: AtomicBool::new(false),
			destroyed: AtomicBool::new(false),
			destroy_calls: AtomicUsize::new(0),
		});

		state.created.push(FakeTransportController { inner: Arc::clone(&inner) });

		Ok(TransportParts {
			transport: Arc::new(FakeTransport { inner }),
			events: events_rx,
		})
	}
}

#[derive(Debug)]
struct FakeInner {
	tenant: TenantId,
	credential_dir: PathBuf,
	behavior: FakeBehavior,
	events_tx: mpsc::UnboundedSender<TransportEvent>,
	identity: Mutex<Option<String>>,
	sent: Mutex<Vec<(String, String)>>,
	chats: Mutex<Vec<ChatSummary>>,
	profile_delays: Mutex<HashMap<String, Duration>>,
	chat_delay: Mutex<Option<Duration>>,
	initialized: AtomicBool,
	logged_out: AtomicBool,
	destroyed: AtomicBool,
	destroy_calls: AtomicUsize,
}

impl FakeInner {
	fn emit(&self, event: TransportEvent) {
		let _ = self.events_tx.send(event);
	}
}

/// Test handle for injecting events into, and inspecting, one fake transport.
#[derive(Debug, Clone)]
pub struct FakeTransportController {
	inner: Arc<FakeInner>,
}

impl FakeTransportController {
	pub fn tenant(&self) -> &TenantId {
		&self.inner.tenant
	}

	pub fn credential_dir(&self) -> &Path {
		&self.inner.credential_dir
	}

	/// Injects a raw event as if the messaging client emitted it.
	pub fn emit(&self, event: TransportEvent) {
		self.inner.emit(event);
	}

	pub fn emit_qr(&self, payload: &str) {
		self.emit(TransportEvent::Qr { payload: payload.to_string() });
	}

	pub fn emit_ready(&self) {
		self.emit(TransportEvent::Ready);
	}

	pub fn emit_disconnected(&self, reason: &str) {
		self.emit(TransportEvent::Disconnected {
			reason: DisconnectReason::from(reason.to_string()),
		});
	}

	pub fn emit_auth_failure(&self, message: &str) {
		self.emit(TransportEvent::AuthFailure { message: message.to_string() });
	}

	/// Injects an inbound text message from `from`.
	pub fn emit_message(&self, id: &str, from: &str, body: &str) {
		self.emit(TransportEvent::Message(InboundMessage {
			id: id.to_string(),
			from: from.to_string(),
			to: String::new(),
			body: body.to_string(),
			from_me: false,
			timestamp: 0,
			message_type: "chat".to_string(),
		}));
	}

	/// `(chat_id, text)` pairs sent through this transport.
	pub fn sent_messages(&self) -> Vec<(String, String)> {
		self.inner.sent.lock().clone()
	}

	pub fn set_chats(&self, chats: Vec<ChatSummary>) {
		*self.inner.chats.lock() = chats;
	}

	/// Delays the profile picture lookup for `contact_id`.
	pub fn delay_profile_picture(&self, contact_id: &str, delay: Duration) {
		self.inner.profile_delays.lock().insert(contact_id.to_string(), delay);
	}

	/// Delays every `get_chat_by_id` call.
	pub fn delay_chat_lookup(&self, delay: Duration) {
		*self.inner.chat_delay.lock() = Some(delay);
	}

	pub fn set_identity(&self, identity: Option<String>) {
		*self.inner.identity.lock() = identity;
	}

	pub fn is_initialized(&self) -> bool {
		self.inner.initialized.load(Ordering::SeqCst)
	}

	pub fn is_logged_out(&self) -> bool {
		self.inner.logged_out.load(Ordering::SeqCst)
	}

	pub fn is_destroyed(&self) -> bool {
		self.inner.destroyed.load(Ordering::SeqCst)
	}

	pub fn destroy_calls(&self) -> usize {
		self.inner.destroy_calls.load(Ordering::SeqCst)
	}
}

struct FakeTransport {
	inner: Arc<FakeInner>,
}

impl FakeTransport {
	fn ensure_alive(&self) -> Result<()> {
		if self.inner.destroyed.load(Ordering::SeqCst) {
			return Err(Error::Destroyed);
		}
		Ok(())
	}
}

#[async_trait]
impl Transport for FakeTransport {
	async fn initialize(&self) -> Result<()> {
		self.ensure_alive()?;
		self.inner.initialized.store(true, Ordering::SeqCst);
		match &self.inner.behavior {
			FakeBehavior::Silent => {}
			FakeBehavior::Pair { payload } => self.inner.emit(TransportEvent::Qr { payload: payload.clone() }),
			FakeBehavior::Restore => {
				self.inner.emit(TransportEvent::Authenticated);
				self.inner.emit(TransportEvent::Ready);
			}
			FakeBehavior::Reject { message } => self.inner.emit(TransportEvent::AuthFailure { message: message.clone() }),
			FakeBehavior::FailInitialize { message } => {
				return Err(Error::Remote {
					name: "InitializeError".to_string(),
					message: message.clone(),
				});
			}
		}
		Ok(())
	}

	async fn send_message(&self, chat_id: &str, text: &str) -> Result<String> {
		self.ensure_alive()?;
		let mut sent = self.inner.sent.lock();
		sent.push((chat_id.to_string(), text.to_string()));
		Ok(format!("fake-msg-{}", sent.len()))
	}

	async fn get_chats(&self) -> Result<Vec<ChatSummary>> {
		self.ensure_alive()?;
		Ok(self.inner.chats.lock().clone())
	}

	async fn get_chat_by_id(&self, chat_id: &str) -> Result<Option<ChatSummary>> {
		self.ensure_alive()?;
		let delay = *self.inner.chat_delay.lock();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		Ok(self.inner.chats.lock().iter().find(|chat| chat.id == chat_id).cloned())
	}

	async fn profile_picture_url(&self, contact_id: &str) -> Result<Option<String>> {
		self.ensure_alive()?;
		let delay = self.inner.profile_delays.lock().get(contact_id).copied();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		Ok(Some(format!("https://pps.example.test/{contact_id}.jpg")))
	}

	async fn identity(&self) -> Result<Option<String>> {
		self.ensure_alive()?;
		Ok(self.inner.identity.lock().clone())
	}

	async fn logout(&self) -> Result<()> {
		self.ensure_alive()?;
		self.inner.logged_out.store(true, Ordering::SeqCst);
		self.inner.emit(TransportEvent::Disconnected {
			reason: DisconnectReason::Logout,
		});
		Ok(())
	}

	async fn destroy(&self) -> Result<()> {
		self.inner.destroy_calls.fetch_add(1, Ordering::SeqCst);
		self.inner.destroyed.store(true, Ordering::SeqCst);
		Ok(())
	}
}
