//! Chat listing on connected sessions.

use std::sync::Arc;

use tracing::debug;
use walink_protocol::{ChatSummary, TenantId, methods};

use crate::error::{Result, SessionError};
use crate::lifecycle::SessionManager;

impl SessionManager {
	/// Lists the tenant's chats with profile pictures.
	///
	/// The listing itself is bounded by the chat list timeout. Each profile
	/// picture lookup is raced against a short per-item timeout and left
	/// empty when it loses.
	pub async fn list_chats(&self, tenant: &TenantId) -> Result<Vec<ChatSummary>> {
		let transport = self.connected_transport(tenant)?;
		let limit = self.config().chat_list_timeout();

		let chats = match tokio::time::timeout(limit, transport.get_chats()).await {
			Ok(chats) => chats?,
			Err(_) => {
				return Err(SessionError::Transport(walink_runtime::Error::Timeout {
					method: methods::GET_CHATS.to_string(),
					timeout_ms: limit.as_millis() as u64,
				}));
			}
		};

		let per_item = self.config().profile_picture_timeout();
		let lookups = chats.into_iter().map(|mut chat| {
			let transport = Arc::clone(&transport);
			async move {
				if chat.profile_picture_url.is_some() {
					return chat;
				}
				let lookup = tokio::time::timeout(per_item, transport.profile_picture_url(&chat.id)).await;
				match lookup {
					Ok(Ok(url)) => chat.profile_picture_url = url,
					Ok(Err(err)) => debug!(target = "walink.session", chat = %chat.id, error = %err, "profile picture lookup failed"),
					Err(_) => debug!(target = "walink.session", chat = %chat.id, "profile picture lookup timed out"),
				}
				chat
			}
		});

		Ok(futures::future::join_all(lookups).await)
	}

	/// Looks up one chat. A lookup slower than the per-chat timeout yields `None`.
	pub async fn get_chat(&self, tenant: &TenantId, chat_id: &str) -> Result<Option<ChatSummary>> {
		let transport = self.connected_transport(tenant)?;
		let lookup = tokio::time::timeout(self.config().chat_item_timeout(), transport.get_chat_by_id(chat_id)).await;
		match lookup {
			Ok(chat) => Ok(chat?),
			Err(_) => {
				debug!(target = "walink.session", %tenant, chat = chat_id, "chat lookup timed out");
				Ok(None)
			}
		}
	}
}
