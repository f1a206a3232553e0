//! In-memory session registry.
//!
//! Two maps keyed by tenant: the last known [`SessionState`] of every tenant
//! and the live transport handle of tenants that currently have one. The
//! registry is owned by the manager and never shared as a global.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::AbortHandle;
use walink_protocol::{SessionSnapshot, SessionState, SessionStatus, TenantId};
use walink_runtime::Transport;

/// A state change applied to one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
	/// A handle exists but has not confirmed readiness.
	Connecting,
	/// A new pairing image was issued.
	PairingIssued(String),
	/// The handle is ready and authenticated.
	Connected,
	/// Logout, auth failure, timeout or teardown.
	Disconnected,
}

/// Applies `transition` to `state`.
pub fn apply_transition(state: &mut SessionState, transition: Transition) {
	match transition {
		Transition::Connecting => {
			state.status = SessionStatus::Connecting;
			state.is_ready = false;
			state.is_connected = false;
		}
		Transition::PairingIssued(code) => {
			state.status = SessionStatus::Connecting;
			state.pairing_code = Some(code);
			state.is_ready = false;
			state.is_connected = false;
		}
		Transition::Connected => {
			state.status = SessionStatus::Connected;
			state.pairing_code = None;
			state.is_ready = true;
			state.is_connected = true;
		}
		Transition::Disconnected => {
			state.status = SessionStatus::Disconnected;
			state.pairing_code = None;
			state.is_ready = false;
			state.is_connected = false;
		}
	}
}

/// A live transport plus the task consuming its events.
pub struct LiveHandle {
	pub generation: u64,
	pub transport: Arc<dyn Transport>,
	events_task: Option<AbortHandle>,
}

impl LiveHandle {
	/// Stops the event task. Must not be called from that task itself.
	pub fn stop_events(&self) {
		if let Some(task) = &self.events_task {
			task.abort();
		}
	}
}

impl std::fmt::Debug for LiveHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LiveHandle").field("generation", &self.generation).finish_non_exhaustive()
	}
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
	states: HashMap<TenantId, SessionState>,
	handles: HashMap<TenantId, LiveHandle>,
	next_generation: u64,
}

impl SessionRegistry {
	/// Populates states from a snapshot. No handles exist after a restart.
	pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
		let states = snapshot
			.into_iter()
			.map(|(tenant, persisted)| (tenant.clone(), SessionState::from_persisted(tenant, persisted)))
			.collect();
		Self {
			states,
			handles: HashMap::new(),
			next_generation: 0,
		}
	}

	/// Serializable view of every state. Pairing codes are dropped.
	pub fn snapshot(&self) -> SessionSnapshot {
		self.states.iter().map(|(tenant, state)| (tenant.clone(), state.to_persisted())).collect()
	}

	/// Tenants with a state entry, sorted.
	pub fn tenants(&self) -> Vec<TenantId> {
		let mut tenants: Vec<_> = self.states.keys().cloned().collect();
		tenants.sort();
		tenants
	}

	pub fn state(&self, tenant: &TenantId) -> Option<&SessionState> {
		self.states.get(tenant)
	}

	/// State as reported to callers.
	///
	/// Readiness flags are only reported while a live handle backs them; a
	/// state loaded from a snapshot claims nothing until reconnected.
	pub fn status_view(&self, tenant: &TenantId) -> Option<SessionState> {
		let mut state = self.states.get(tenant)?.clone();
		if !self.handles.contains_key(tenant) {
			state.is_ready = false;
			state.is_connected = false;
		}
		Some(state)
	}

	/// Inserts or overwrites descriptive metadata, keeping status fields.
	pub fn upsert_metadata(&mut self, tenant: &TenantId, phone_number: &str, display_name: &str) {
		let state = self.ensure(tenant);
		state.phone_number = phone_number.to_string();
		state.display_name = display_name.to_string();
	}

	/// Returns the state for `tenant`, inserting a default one if missing.
	pub fn ensure(&mut self, tenant: &TenantId) -> &mut SessionState {
		self.states.entry(tenant.clone()).or_insert_with(|| SessionState::unknown(tenant.clone()))
	}

	/// Applies a transition to an existing state. Returns `false` for unknown tenants.
	pub fn apply(&mut self, tenant: &TenantId, transition: Transition) -> bool {
		match self.states.get_mut(tenant) {
			Some(state) => {
				apply_transition(state, transition);
				true
			}
			None => false,
		}
	}

	pub fn remove_state(&mut self, tenant: &TenantId) -> Option<SessionState> {
		self.states.remove(tenant)
	}

	/// Installs a new handle under a fresh generation, returning the
	/// generation and any handle it replaced.
	pub fn install_handle(&mut self, tenant: &TenantId, transport: Arc<dyn Transport>) -> (u64, Option<LiveHandle>) {
		self.next_generation += 1;
		let generation = self.next_generation;
		let previous = self.handles.insert(
			tenant.clone(),
			LiveHandle {
				generation,
				transport,
				events_task: None,
			},
		);
		(generation, previous)
	}

	/// Records the event task for the handle of `generation`.
	pub fn attach_events_task(&mut self, tenant: &TenantId, generation: u64, task: AbortHandle) {
		match self.handles.get_mut(tenant) {
			Some(handle) if handle.generation == generation => handle.events_task = Some(task),
			_ => task.abort(),
		}
	}

	pub fn handle(&self, tenant: &TenantId) -> Option<&LiveHandle> {
		self.handles.get(tenant)
	}

	pub fn is_current(&self, tenant: &TenantId, generation: u64) -> bool {
		self.handles.get(tenant).is_some_and(|handle| handle.generation == generation)
	}

	pub fn take_handle(&mut self, tenant: &TenantId) -> Option<LiveHandle> {
		self.handles.remove(tenant)
	}

	/// Removes the handle only if it still belongs to `generation`.
	pub fn take_handle_if(&mut self, tenant: &TenantId, generation: u64) -> Option<LiveHandle> {
		if self.is_current(tenant, generation) {
			self.handles.remove(tenant)
		} else {
			None
		}
	}

	/// Removes every handle, leaving states untouched.
	pub fn drain_handles(&mut self) -> Vec<(TenantId, LiveHandle)> {
		self.handles.drain().collect()
	}

	pub fn live_handles(&self) -> usize {
		self.handles.len()
	}
}
