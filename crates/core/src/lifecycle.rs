//! Connection lifecycle controller.
//!
//! Drives each tenant through `disconnected → connecting → connected`. Every
//! live transport gets a generation number and one task consuming its event
//! stream; events from a superseded generation are dropped and the task
//! exits. All registry mutations go through [`SessionManager::mutate`], which
//! rewrites the snapshot while the registry lock is held.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};
use walink_protocol::{InboundMessage, SessionState, SessionStatus, TenantId, TransportEvent};
use walink_runtime::process::PidFile;
use walink_runtime::{DriverTransportFactory, Transport, TransportFactory, TransportParts};

use crate::config::ManagerConfig;
use crate::credentials::CredentialStore;
use crate::error::{Result, SessionError};
use crate::pairing::pairing_code_or_raw;
use crate::registry::{LiveHandle, SessionRegistry, Transition};
use crate::router::{MessageRouter, RouteOutcome};
use crate::snapshot::SnapshotStore;

/// Result of [`SessionManager::create_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
	/// Rendered pairing image to show the user.
	PairingCode(String),
	/// The stored credentials were still valid and the session came up
	/// without asking for a pairing code.
	AlreadyConnected,
}

#[derive(Debug)]
enum WaitOutcome {
	Pairing(String),
	Ready,
	Failed(SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
	Pairing,
	Reconnect,
}

/// First-settle-wins slot shared by the event task and the initialize task.
#[derive(Clone)]
struct Waiter(Arc<Mutex<Option<oneshot::Sender<WaitOutcome>>>>);

impl Waiter {
	fn new() -> (Self, oneshot::Receiver<WaitOutcome>) {
		let (tx, rx) = oneshot::channel();
		(Self(Arc::new(Mutex::new(Some(tx)))), rx)
	}

	fn settle(&self, outcome: WaitOutcome) {
		if let Some(tx) = self.0.lock().take() {
			let _ = tx.send(outcome);
		}
	}
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
	config: ManagerConfig,
	factory: Option<Arc<dyn TransportFactory>>,
	router: Option<Arc<MessageRouter>>,
}

impl SessionManagerBuilder {
	/// Transport factory to use; defaults to [`DriverTransportFactory`].
	pub fn transport_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
		self.factory = Some(Arc::new(factory));
		self
	}

	/// Router for inbound messages. Without one inbound messages are ignored.
	pub fn router(mut self, router: MessageRouter) -> Self {
		self.router = Some(Arc::new(router));
		self
	}

	/// Takes ownership of the state directory and loads the snapshot.
	///
	/// Fails with [`SessionError::StateDirLocked`] while another live process
	/// holds the directory.
	pub fn open(self) -> Result<SessionManager> {
		let config = self.config;
		fs::create_dir_all(&config.state_dir)?;

		let lock = if config.lock_state_dir {
			Some(PidFile::acquire(config.pid_path())?)
		} else {
			None
		};

		let snapshot = SnapshotStore::new(config.snapshot_path());
		let registry = SessionRegistry::from_snapshot(snapshot.load());
		let credentials = CredentialStore::new(config.credentials_root());

		info!(
			target = "walink.session",
			state_dir = %config.state_dir.display(),
			tenants = registry.tenants().len(),
			"session manager opened"
		);

		Ok(SessionManager {
			inner: Arc::new(Inner {
				registry: Mutex::new(registry),
				snapshot,
				credentials,
				factory: self.factory.unwrap_or_else(|| Arc::new(DriverTransportFactory::default())),
				router: self.router,
				config,
				_lock: lock,
			}),
		})
	}
}

struct Inner {
	config: ManagerConfig,
	registry: Mutex<SessionRegistry>,
	snapshot: SnapshotStore,
	credentials: CredentialStore,
	factory: Arc<dyn TransportFactory>,
	router: Option<Arc<MessageRouter>>,
	_lock: Option<PidFile>,
}

/// Owns the session registry and every live transport.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct SessionManager {
	inner: Arc<Inner>,
}

impl SessionManager {
	pub fn builder(config: ManagerConfig) -> SessionManagerBuilder {
		SessionManagerBuilder {
			config,
			factory: None,
			router: None,
		}
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.inner.config
	}

	pub fn credentials(&self) -> &CredentialStore {
		&self.inner.credentials
	}

	/// Current state of `tenant`. Unknown tenants report a default
	/// disconnected state.
	pub fn get_session_status(&self, tenant: &TenantId) -> SessionState {
		self.read(|registry| registry.status_view(tenant))
			.unwrap_or_else(|| SessionState::unknown(tenant.clone()))
	}

	/// Every known tenant, sorted by id.
	pub fn list_sessions(&self) -> Vec<SessionState> {
		self.read(|registry| registry.tenants().iter().filter_map(|tenant| registry.status_view(tenant)).collect())
	}

	pub fn live_handle_count(&self) -> usize {
		self.read(SessionRegistry::live_handles)
	}

	/// Starts pairing for `tenant`, replacing any existing handle.
	///
	/// Resolves with the first pairing code, or with
	/// [`CreateOutcome::AlreadyConnected`] if the transport becomes ready
	/// first. Later pairing codes only update the stored state.
	pub async fn create_session(&self, tenant: &TenantId, phone_number: &str, display_name: &str) -> Result<CreateOutcome> {
		info!(target = "walink.session", %tenant, "creating session");

		let previous = self.inner.registry.lock().take_handle(tenant);
		if let Some(previous) = previous {
			debug!(target = "walink.session", %tenant, generation = previous.generation, "replacing existing handle");
			self.teardown(tenant, previous).await;
		}

		let credential_dir = self.inner.credentials.ensure(tenant)?;
		let parts = match self.inner.factory.create(tenant, &credential_dir) {
			Ok(parts) => parts,
			Err(err) => {
				self.mutate(|registry| {
					registry.upsert_metadata(tenant, phone_number, display_name);
					registry.apply(tenant, Transition::Disconnected);
				});
				return Err(err.into());
			}
		};

		let (generation, displaced) = self.mutate(|registry| {
			registry.upsert_metadata(tenant, phone_number, display_name);
			registry.apply(tenant, Transition::Connecting);
			registry.install_handle(tenant, Arc::clone(&parts.transport))
		});
		if let Some(displaced) = displaced {
			self.teardown(tenant, displaced).await;
		}

		let rx = self.start(tenant, generation, parts, Mode::Pairing);
		let limit = self.inner.config.pairing_timeout();

		let err = match tokio::time::timeout(limit, rx).await {
			Ok(Ok(WaitOutcome::Pairing(code))) => return Ok(CreateOutcome::PairingCode(code)),
			Ok(Ok(WaitOutcome::Ready)) => return Ok(CreateOutcome::AlreadyConnected),
			Ok(Ok(WaitOutcome::Failed(err))) => err,
			Ok(Err(_)) => SessionError::TransportClosed,
			Err(_) => SessionError::PairingTimeout {
				timeout_ms: limit.as_millis() as u64,
			},
		};

		warn!(target = "walink.session", %tenant, error = %err, "pairing failed");
		self.abandon(tenant, generation, false).await;
		Err(err)
	}

	/// Reconnects `tenant` from its stored credentials.
	///
	/// Fails with [`SessionError::NoCredentials`] without creating a
	/// transport when the tenant was never paired. A timeout, auth failure or
	/// new pairing request deletes the stored credentials.
	pub async fn reconnect_session(&self, tenant: &TenantId) -> Result<()> {
		if !self.inner.credentials.exists(tenant) {
			self.mutate(|registry| registry.apply(tenant, Transition::Disconnected));
			return Err(SessionError::NoCredentials { tenant: tenant.clone() });
		}

		info!(target = "walink.session", %tenant, "reconnecting from stored credentials");

		let previous = self.inner.registry.lock().take_handle(tenant);
		if let Some(previous) = previous {
			self.teardown(tenant, previous).await;
		}

		let credential_dir = self.inner.credentials.dir_for(tenant);
		let parts = match self.inner.factory.create(tenant, &credential_dir) {
			Ok(parts) => parts,
			Err(err) => {
				self.mutate(|registry| registry.apply(tenant, Transition::Disconnected));
				return Err(err.into());
			}
		};

		let (generation, displaced) = self.mutate(|registry| {
			registry.ensure(tenant);
			registry.apply(tenant, Transition::Connecting);
			registry.install_handle(tenant, Arc::clone(&parts.transport))
		});
		if let Some(displaced) = displaced {
			self.teardown(tenant, displaced).await;
		}

		let rx = self.start(tenant, generation, parts, Mode::Reconnect);
		let limit = self.inner.config.reconnect_timeout();

		let err = match tokio::time::timeout(limit, rx).await {
			Ok(Ok(WaitOutcome::Ready)) => {
				info!(target = "walink.session", %tenant, "session restored");
				return Ok(());
			}
			Ok(Ok(WaitOutcome::Pairing(_))) => SessionError::StaleCredentials,
			Ok(Ok(WaitOutcome::Failed(err))) => err,
			Ok(Err(_)) => SessionError::TransportClosed,
			Err(_) => SessionError::ReconnectTimeout {
				timeout_ms: limit.as_millis() as u64,
			},
		};

		warn!(target = "walink.session", %tenant, error = %err, "reconnect failed");
		self.abandon(tenant, generation, err.invalidates_credentials()).await;
		Err(err)
	}

	/// Tears down the handle if any, forgets the tenant and deletes its
	/// credentials. Safe to call for unknown tenants.
	pub async fn destroy_session(&self, tenant: &TenantId) -> Result<()> {
		let handle = self.mutate(|registry| {
			registry.remove_state(tenant);
			registry.take_handle(tenant)
		});
		if let Some(handle) = handle {
			self.teardown(tenant, handle).await;
		}
		self.inner.credentials.remove(tenant)?;

		info!(target = "walink.session", %tenant, "session destroyed");
		Ok(())
	}

	/// Logs the account out and applies the logout transition.
	pub async fn logout_session(&self, tenant: &TenantId) -> Result<()> {
		let (generation, transport) = self
			.read(|registry| registry.handle(tenant).map(|handle| (handle.generation, Arc::clone(&handle.transport))))
			.ok_or_else(|| SessionError::NotConnected { tenant: tenant.clone() })?;

		match tokio::time::timeout(self.inner.config.teardown_timeout(), transport.logout()).await {
			Ok(Ok(())) => {}
			Ok(Err(err)) => warn!(target = "walink.session", %tenant, error = %err, "transport logout failed; tearing down anyway"),
			Err(_) => warn!(target = "walink.session", %tenant, "transport logout timed out; tearing down anyway"),
		}

		self.finish_logout(tenant, generation, true).await;
		self.forget_credentials(tenant);
		Ok(())
	}

	/// Sends a text message from a connected tenant, returning its id.
	pub async fn send_message(&self, tenant: &TenantId, chat_id: &str, text: &str) -> Result<String> {
		let transport = self.connected_transport(tenant)?;
		Ok(transport.send_message(chat_id, text).await?)
	}

	/// Tears down every live handle without touching stored state, so a
	/// later start restores the same tenants.
	pub async fn shutdown(&self) {
		let handles = self.inner.registry.lock().drain_handles();
		info!(target = "walink.session", handles = handles.len(), "shutting down sessions");
		for (tenant, handle) in handles {
			self.teardown(&tenant, handle).await;
		}
	}

	pub(crate) fn connected_transport(&self, tenant: &TenantId) -> Result<Arc<dyn Transport>> {
		self.read(|registry| match (registry.handle(tenant), registry.state(tenant)) {
			(Some(handle), Some(state)) if state.status == SessionStatus::Connected => Some(Arc::clone(&handle.transport)),
			_ => None,
		})
		.ok_or_else(|| SessionError::NotConnected { tenant: tenant.clone() })
	}

	pub(crate) fn read<R>(&self, f: impl FnOnce(&SessionRegistry) -> R) -> R {
		let registry = self.inner.registry.lock();
		f(&*registry)
	}

	/// Runs `f` under the registry lock and persists the result.
	pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut SessionRegistry) -> R) -> R {
		let mut registry = self.inner.registry.lock();
		let out = f(&mut *registry);
		self.inner.snapshot.save_logged(&registry.snapshot());
		out
	}

	/// Spawns the event task and the initialize call for a freshly
	/// installed handle.
	fn start(&self, tenant: &TenantId, generation: u64, parts: TransportParts, mode: Mode) -> oneshot::Receiver<WaitOutcome> {
		let (waiter, rx) = Waiter::new();
		let TransportParts { transport, events } = parts;

		let task = tokio::spawn(
			self.clone()
				.run_events(tenant.clone(), generation, mode, Arc::clone(&transport), events, waiter.clone()),
		);
		self.inner
			.registry
			.lock()
			.attach_events_task(tenant, generation, task.abort_handle());

		let tenant = tenant.clone();
		tokio::spawn(async move {
			if let Err(err) = transport.initialize().await {
				warn!(target = "walink.session", %tenant, error = %err, "transport initialize failed");
				waiter.settle(WaitOutcome::Failed(err.into()));
			}
		});

		rx
	}

	async fn run_events(
		self,
		tenant: TenantId,
		generation: u64,
		mode: Mode,
		transport: Arc<dyn Transport>,
		mut events: mpsc::UnboundedReceiver<TransportEvent>,
		waiter: Waiter,
	) {
		while let Some(event) = events.recv().await {
			if !self.read(|registry| registry.is_current(&tenant, generation)) {
				debug!(target = "walink.session", %tenant, generation, event = event.name(), "event from superseded handle dropped");
				break;
			}
			trace!(target = "walink.session", %tenant, generation, event = event.name(), "transport event");

			match event {
				TransportEvent::Qr { payload } => {
					if mode == Mode::Reconnect {
						warn!(target = "walink.session", %tenant, "stored credentials rejected: pairing code requested");
						waiter.settle(WaitOutcome::Failed(SessionError::StaleCredentials));
						continue;
					}
					let code = pairing_code_or_raw(&payload);
					let applied = self.mutate(|registry| {
						registry.is_current(&tenant, generation) && registry.apply(&tenant, Transition::PairingIssued(code.clone()))
					});
					if applied {
						info!(target = "walink.session", %tenant, "pairing code issued");
						waiter.settle(WaitOutcome::Pairing(code));
					}
				}
				TransportEvent::Authenticated => {
					debug!(target = "walink.session", %tenant, "credentials accepted");
					self.mutate(|registry| {
						let connected = registry.state(&tenant).is_some_and(|state| state.status == SessionStatus::Connected);
						if registry.is_current(&tenant, generation) && !connected {
							registry.apply(&tenant, Transition::Connecting);
						}
					});
				}
				TransportEvent::Ready => self.confirm_ready(&tenant, generation, &transport, &waiter),
				TransportEvent::Disconnected { reason } => {
					if reason.is_logout() {
						info!(target = "walink.session", %tenant, "logged out");
						self.finish_logout(&tenant, generation, false).await;
						self.forget_credentials(&tenant);
						break;
					}
					info!(target = "walink.session", %tenant, %reason, "transient disconnect; keeping handle");
				}
				TransportEvent::AuthFailure { message } => {
					warn!(target = "walink.session", %tenant, reason = %message, "authentication failed");
					waiter.settle(WaitOutcome::Failed(SessionError::AuthFailure { reason: message }));
					let handle = self.mutate(|registry| {
						let handle = registry.take_handle_if(&tenant, generation);
						if handle.is_some() {
							registry.apply(&tenant, Transition::Disconnected);
						}
						handle
					});
					if let Some(handle) = handle {
						self.shutdown_transport(&tenant, &handle.transport).await;
					}
					if mode == Mode::Reconnect {
						self.forget_credentials(&tenant);
					}
					break;
				}
				TransportEvent::Message(message) => self.dispatch_inbound(&tenant, &transport, message),
				TransportEvent::MessageCreate(message) => {
					trace!(target = "walink.session", %tenant, id = %message.id, "message created");
				}
				TransportEvent::MessageAck { message_id, ack } => {
					trace!(target = "walink.session", %tenant, %message_id, ack, "message ack");
				}
			}
		}

		debug!(target = "walink.session", %tenant, generation, "event task finished");
	}

	/// Settles, checks the account identity, then marks the tenant connected.
	/// Runs off the event task so later events are not held up.
	fn confirm_ready(&self, tenant: &TenantId, generation: u64, transport: &Arc<dyn Transport>, waiter: &Waiter) {
		let manager = self.clone();
		let tenant = tenant.clone();
		let transport = Arc::clone(transport);
		let waiter = waiter.clone();

		tokio::spawn(async move {
			tokio::time::sleep(manager.inner.config.ready_settle()).await;
			match transport.identity().await {
				Ok(Some(identity)) => debug!(target = "walink.session", %tenant, %identity, "account identity confirmed"),
				Ok(None) => {
					warn!(target = "walink.session", %tenant, "ready without an account identity; waiting");
					return;
				}
				Err(err) => {
					warn!(target = "walink.session", %tenant, error = %err, "identity check failed; waiting");
					return;
				}
			}
			let applied =
				manager.mutate(|registry| registry.is_current(&tenant, generation) && registry.apply(&tenant, Transition::Connected));
			if applied {
				info!(target = "walink.session", %tenant, "session connected");
				waiter.settle(WaitOutcome::Ready);
			}
		});
	}

	fn dispatch_inbound(&self, tenant: &TenantId, transport: &Arc<dyn Transport>, message: InboundMessage) {
		if message.from_me {
			return;
		}
		let Some(router) = self.inner.router.clone() else {
			return;
		};

		let phone = self
			.read(|registry| registry.state(tenant).map(|state| state.phone_number.clone()))
			.unwrap_or_default();
		let transport = Arc::clone(transport);
		let tenant = tenant.clone();

		tokio::spawn(async move {
			match router.route(&tenant, &phone, &message, transport.as_ref()).await {
				Ok(RouteOutcome::Confirmed { platform_id, orders }) => {
					debug!(target = "walink.router", %tenant, platform = %platform_id, confirmed = orders.len(), "inbound message routed");
				}
				Ok(_) => {}
				Err(err) => warn!(target = "walink.router", %tenant, error = %err, "inbound message routing failed"),
			}
		});
	}

	/// Removes the handle of `generation` and marks the tenant disconnected.
	///
	/// `stop_events` must be false when called from the handle's own event task.
	async fn finish_logout(&self, tenant: &TenantId, generation: u64, stop_events: bool) {
		let handle = self.mutate(|registry| {
			let handle = registry.take_handle_if(tenant, generation);
			if handle.is_some() {
				registry.apply(tenant, Transition::Disconnected);
			}
			handle
		});
		let Some(handle) = handle else {
			return;
		};
		if stop_events {
			handle.stop_events();
		}
		self.shutdown_transport(tenant, &handle.transport).await;
	}

	/// Gives up on a pending handle: marks the tenant disconnected and tears
	/// the handle down, unless a newer generation has replaced it.
	pub(crate) async fn abandon(&self, tenant: &TenantId, generation: u64, forget_credentials: bool) {
		let taken = self.mutate(|registry| match registry.handle(tenant).map(|handle| handle.generation) {
			Some(current) if current != generation => None,
			_ => {
				let handle = registry.take_handle(tenant);
				registry.apply(tenant, Transition::Disconnected);
				Some(handle)
			}
		});
		let Some(handle) = taken else {
			debug!(target = "walink.session", %tenant, generation, "handle already superseded");
			return;
		};
		if let Some(handle) = handle {
			self.teardown(tenant, handle).await;
		}
		if forget_credentials {
			self.forget_credentials(tenant);
		}
	}

	/// Tears down whatever handle `tenant` has and marks it disconnected.
	pub(crate) async fn abandon_pending(&self, tenant: &TenantId) {
		let handle = self.mutate(|registry| {
			let handle = registry.take_handle(tenant);
			registry.apply(tenant, Transition::Disconnected);
			handle
		});
		if let Some(handle) = handle {
			self.teardown(tenant, handle).await;
		}
	}

	async fn teardown(&self, tenant: &TenantId, handle: LiveHandle) {
		handle.stop_events();
		self.shutdown_transport(tenant, &handle.transport).await;
	}

	/// Best-effort, bounded destroy.
	async fn shutdown_transport(&self, tenant: &TenantId, transport: &Arc<dyn Transport>) {
		match tokio::time::timeout(self.inner.config.teardown_timeout(), transport.destroy()).await {
			Ok(Ok(())) => debug!(target = "walink.session", %tenant, "transport destroyed"),
			Ok(Err(err)) => debug!(target = "walink.session", %tenant, error = %err, "transport destroy failed"),
			Err(_) => debug!(target = "walink.session", %tenant, "transport destroy timed out"),
		}
	}

	pub(crate) fn forget_credentials(&self, tenant: &TenantId) {
		match self.inner.credentials.remove(tenant) {
			Ok(true) => info!(target = "walink.session", %tenant, "stored credentials removed"),
			Ok(false) => {}
			Err(err) => warn!(target = "walink.session", %tenant, error = %err, "failed to remove stored credentials"),
		}
	}
}
