//! Driver-process transport.
//!
//! Each tenant gets its own driver child process (typically a small Node
//! program wrapping the messaging web client in a headless browser). The two
//! sides exchange JSON lines over the child's stdio:
//!
//! 1. [`DriverTransport::call`] allocates a request id and a oneshot channel
//! 2. The request is written as one line to the driver's stdin
//! 3. The read loop parses each stdout line as a response or an event
//! 4. Responses are correlated by id and delivered on the oneshot channel
//! 5. Events are forwarded to the session's event stream
//!
//! When stdout closes every pending request fails with
//! [`Error::DriverExited`] and a transient disconnect is emitted.
//!
//! [`Transport::destroy`] runs on its own task: the driver gets a short grace
//! period to answer `destroy`, then it is killed and every pending request
//! fails with [`Error::Destroyed`]. Dropping the `destroy` future early does
//! not skip the kill.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use walink_protocol::{
	ChatSummary, DisconnectReason, DriverMessage, DriverRequest, DriverResponse, IdentityResult, SendMessageParams, SendMessageResult, TenantId,
	TransportEvent, methods,
};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportFactory, TransportParts};

/// Disconnect reason reported when the driver's stdout closes.
pub const DRIVER_EXIT_REASON: &str = "DRIVER_EXIT";

/// How long the driver may take to answer `destroy` before it is killed.
/// Shorter than the manager's default teardown bound.
pub const DESTROY_GRACE: Duration = Duration::from_secs(2);

type PendingMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// How to launch the driver program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverConfig {
	pub program: String,
	/// Extra arguments placed before `--tenant` and `--credential-dir`.
	pub args: Vec<String>,
	/// Bound for every request except `initialize`.
	pub request_timeout_ms: u64,
}

impl Default for DriverConfig {
	fn default() -> Self {
		Self {
			program: "walink-driver".to_string(),
			args: Vec::new(),
			request_timeout_ms: 30_000,
		}
	}
}

/// Spawns one [`DriverTransport`] per session.
#[derive(Debug, Clone, Default)]
pub struct DriverTransportFactory {
	config: DriverConfig,
}

impl DriverTransportFactory {
	pub fn new(config: DriverConfig) -> Self {
		Self { config }
	}
}

impl TransportFactory for DriverTransportFactory {
	fn create(&self, tenant: &TenantId, credential_dir: &Path) -> Result<TransportParts> {
		let mut cmd = Command::new(&self.config.program);
		cmd.args(&self.config.args)
			.arg("--tenant")
			.arg(tenant.as_str())
			.arg("--credential-dir")
			.arg(credential_dir)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let mut child = cmd.spawn().map_err(|source| Error::DriverLaunch {
			program: self.config.program.clone(),
			source,
		})?;

		let stdin = child.stdin.take().ok_or(Error::DriverExited)?;
		let stdout = child.stdout.take().ok_or(Error::DriverExited)?;
		let stderr = child.stderr.take();

		debug!(
			target = "walink.driver",
			%tenant,
			pid = ?child.id(),
			program = %self.config.program,
			"driver spawned"
		);

		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

		tokio::spawn(read_loop(tenant.clone(), stdout, Arc::clone(&pending), events_tx));
		if let Some(stderr) = stderr {
			tokio::spawn(forward_stderr(tenant.clone(), stderr));
		}

		let transport = DriverTransport {
			tenant: tenant.clone(),
			last_id: AtomicU32::new(0),
			pending,
			stdin: Arc::new(tokio::sync::Mutex::new(stdin)),
			child: Arc::new(tokio::sync::Mutex::new(child)),
			request_timeout: Duration::from_millis(self.config.request_timeout_ms),
			destroyed: AtomicBool::new(false),
		};

		Ok(TransportParts {
			transport: Arc::new(transport),
			events: events_rx,
		})
	}
}

/// Transport backed by a driver child process.
pub struct DriverTransport {
	tenant: TenantId,
	last_id: AtomicU32,
	pending: PendingMap,
	stdin: Arc<tokio::sync::Mutex<ChildStdin>>,
	child: Arc<tokio::sync::Mutex<Child>>,
	request_timeout: Duration,
	destroyed: AtomicBool,
}

impl DriverTransport {
	/// Sends one request and waits for its correlated response.
	///
	/// `timeout` of `None` waits until the driver answers or exits.
	pub async fn call(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let line = encode_request(id, method, params)?;

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		if let Err(err) = write_line(&self.stdin, &line).await {
			self.pending.lock().remove(&id);
			return Err(err.into());
		}

		let outcome = match timeout {
			Some(limit) => match tokio::time::timeout(limit, rx).await {
				Ok(outcome) => outcome,
				Err(_) => {
					self.pending.lock().remove(&id);
					return Err(Error::Timeout {
						method: method.to_string(),
						timeout_ms: limit.as_millis() as u64,
					});
				}
			},
			None => rx.await,
		};

		outcome.map_err(|_| Error::ChannelClosed).and_then(|result| result)
	}

	async fn request(&self, method: &str, params: Value) -> Result<Value> {
		if self.destroyed.load(Ordering::SeqCst) {
			return Err(Error::Destroyed);
		}
		self.call(method, params, Some(self.request_timeout)).await
	}
}

#[async_trait]
impl Transport for DriverTransport {
	async fn initialize(&self) -> Result<()> {
		if self.destroyed.load(Ordering::SeqCst) {
			return Err(Error::Destroyed);
		}
		self.call(methods::INITIALIZE, Value::Null, None).await.map(|_| ())
	}

	async fn send_message(&self, chat_id: &str, text: &str) -> Result<String> {
		let params = serde_json::to_value(SendMessageParams {
			chat_id: chat_id.to_string(),
			text: text.to_string(),
		})?;
		let result: SendMessageResult = serde_json::from_value(self.request(methods::SEND_MESSAGE, params).await?)?;
		Ok(result.message_id)
	}

	async fn get_chats(&self) -> Result<Vec<ChatSummary>> {
		let value = self.request(methods::GET_CHATS, Value::Null).await?;
		Ok(serde_json::from_value(value)?)
	}

	async fn get_chat_by_id(&self, chat_id: &str) -> Result<Option<ChatSummary>> {
		let value = self.request(methods::GET_CHAT_BY_ID, json!({ "chatId": chat_id })).await?;
		Ok(serde_json::from_value(value)?)
	}

	async fn profile_picture_url(&self, contact_id: &str) -> Result<Option<String>> {
		let value = self.request(methods::GET_PROFILE_PIC_URL, json!({ "contactId": contact_id })).await?;
		Ok(serde_json::from_value(value)?)
	}

	async fn identity(&self) -> Result<Option<String>> {
		let value = self.request(methods::GET_IDENTITY, Value::Null).await?;
		let identity: IdentityResult = serde_json::from_value(value)?;
		Ok(identity.wid)
	}

	async fn logout(&self) -> Result<()> {
		self.request(methods::LOGOUT, Value::Null).await.map(|_| ())
	}

	async fn destroy(&self) -> Result<()> {
		if self.destroyed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let shutdown = tokio::spawn(shutdown_driver(
			self.tenant.clone(),
			id,
			Arc::clone(&self.stdin),
			Arc::clone(&self.pending),
			Arc::clone(&self.child),
		));
		if let Err(err) = shutdown.await {
			warn!(target = "walink.driver", tenant = %self.tenant, error = %err, "driver shutdown task failed");
		}
		Ok(())
	}
}

fn encode_request(id: u32, method: &str, params: Value) -> Result<String> {
	let request = DriverRequest {
		id,
		method: method.to_string(),
		params,
	};
	let mut line = serde_json::to_string(&request)?;
	line.push('\n');
	Ok(line)
}

async fn write_line(stdin: &tokio::sync::Mutex<ChildStdin>, line: &str) -> std::io::Result<()> {
	let mut stdin = stdin.lock().await;
	stdin.write_all(line.as_bytes()).await?;
	stdin.flush().await
}

/// Asks the driver to exit, kills it after [`DESTROY_GRACE`], then fails
/// whatever requests are still waiting.
async fn shutdown_driver(
	tenant: TenantId,
	id: u32,
	stdin: Arc<tokio::sync::Mutex<ChildStdin>>,
	pending: PendingMap,
	child: Arc<tokio::sync::Mutex<Child>>,
) {
	let (tx, rx) = oneshot::channel();
	pending.lock().insert(id, tx);

	let graceful = async {
		let line = encode_request(id, methods::DESTROY, Value::Null)?;
		write_line(&stdin, &line).await?;
		let value = rx.await.map_err(|_| Error::ChannelClosed)??;
		Ok::<Value, Error>(value)
	};
	match tokio::time::timeout(DESTROY_GRACE, graceful).await {
		Ok(Ok(_)) => {}
		Ok(Err(err)) => debug!(target = "walink.driver", %tenant, error = %err, "driver destroy request failed; killing"),
		Err(_) => debug!(target = "walink.driver", %tenant, "driver ignored destroy; killing"),
	}
	pending.lock().remove(&id);

	if let Err(err) = child.lock().await.kill().await {
		debug!(target = "walink.driver", %tenant, error = %err, "driver already gone");
	}

	let drained: Vec<_> = pending.lock().drain().collect();
	for (_, tx) in drained {
		let _ = tx.send(Err(Error::Destroyed));
	}
}

async fn read_loop(tenant: TenantId, stdout: ChildStdout, pending: PendingMap, events: mpsc::UnboundedSender<TransportEvent>) {
	let mut lines = BufReader::new(stdout).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => {
				if line.trim().is_empty() {
					continue;
				}
				if let Err(err) = dispatch_line(&line, &pending, &events) {
					warn!(target = "walink.driver", %tenant, error = %err, line = %line, "unparseable driver line");
				}
			}
			Ok(None) => break,
			Err(err) => {
				warn!(target = "walink.driver", %tenant, error = %err, "driver stdout read failed");
				break;
			}
		}
	}

	debug!(target = "walink.driver", %tenant, "driver stdout closed");

	let drained: Vec<_> = pending.lock().drain().collect();
	for (_, tx) in drained {
		let _ = tx.send(Err(Error::DriverExited));
	}
	let _ = events.send(TransportEvent::Disconnected {
		reason: DisconnectReason::Other(DRIVER_EXIT_REASON.to_string()),
	});
}

/// Routes one stdout line to its pending request or to the event stream.
fn dispatch_line(line: &str, pending: &PendingMap, events: &mpsc::UnboundedSender<TransportEvent>) -> Result<()> {
	match serde_json::from_str::<DriverMessage>(line)? {
		DriverMessage::Response(DriverResponse { id, result, error }) => {
			let Some(tx) = pending.lock().remove(&id) else {
				debug!(target = "walink.driver", id, "response for unknown request id");
				return Ok(());
			};
			let outcome = match error {
				Some(payload) => Err(Error::Remote {
					name: payload.name.unwrap_or_else(|| "Error".to_string()),
					message: payload.message,
				}),
				None => Ok(result.unwrap_or(Value::Null)),
			};
			let _ = tx.send(outcome);
		}
		DriverMessage::Event(event) => {
			let _ = events.send(event);
		}
	}
	Ok(())
}

async fn forward_stderr(tenant: TenantId, stderr: ChildStderr) {
	let mut lines = BufReader::new(stderr).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		debug!(target = "walink.driver", %tenant, "{}", line);
	}
}
