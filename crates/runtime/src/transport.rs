//! Capability boundary to the messaging web client.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use walink_protocol::{ChatSummary, TenantId, TransportEvent};

use crate::error::Result;

/// One live connection to the messaging web client for a single tenant.
///
/// Given valid credentials a transport eventually emits `ready` or
/// `auth_failure` on its event channel; given expired credentials it emits
/// `auth_failure`, asks for a new pairing code, or stays silent. Callers bound
/// every wait themselves.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Starts the client. May not return until the client is ready.
	async fn initialize(&self) -> Result<()>;

	/// Sends `text` to `chat_id`, returning the message id.
	async fn send_message(&self, chat_id: &str, text: &str) -> Result<String>;

	async fn get_chats(&self) -> Result<Vec<ChatSummary>>;

	async fn get_chat_by_id(&self, chat_id: &str) -> Result<Option<ChatSummary>>;

	async fn profile_picture_url(&self, contact_id: &str) -> Result<Option<String>>;

	/// Account id of the logged-in user, `None` before login completes.
	async fn identity(&self) -> Result<Option<String>>;

	/// Logs the account out; the transport follows up with a logout disconnect event.
	async fn logout(&self) -> Result<()>;

	/// Releases the client. Calling it more than once is a no-op.
	async fn destroy(&self) -> Result<()>;
}

/// A freshly created transport and the receiving end of its event stream.
pub struct TransportParts {
	pub transport: Arc<dyn Transport>,
	pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Builds transports bound to a tenant's credential directory.
pub trait TransportFactory: Send + Sync {
	fn create(&self, tenant: &TenantId, credential_dir: &Path) -> Result<TransportParts>;
}
