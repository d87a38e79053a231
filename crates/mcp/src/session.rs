//! Provider session: spawn, handshake, request/response correlation, close.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Incoming, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsParams, ListToolsResult,
    METHOD_NOT_FOUND, RequestId, Tool,
};

/// Default bound on the initialize handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on a single request/response round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum frame size (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Upper bound on `tools/list` pages, so a provider that keeps handing out
/// cursors cannot stall discovery.
const MAX_LIST_PAGES: usize = 64;

/// Configuration for a provider process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            handshake_timeout: DEFAULT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Launch a provider script, picking the interpreter from its extension.
    pub fn for_script(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let interpreter = match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => "python",
            Some("js") => "node",
            _ => {
                return Err(Error::Config(format!(
                    "provider script must be a .py or .js file: {}",
                    path.display()
                )));
            }
        };
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("provider");

        Ok(Self::new(name, interpreter).arg(path.to_string_lossy()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// The provider's stdio pipes. Whoever holds the lock owns the channel for a
/// full round trip.
struct Channel {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    // Bytes of a frame whose read was interrupted; the next read resumes it.
    pending: Vec<u8>,
    // Set while a frame is being written, and for good once an oversized
    // frame was abandoned. Still set on entry means the stream can no longer
    // be split into frames.
    torn: bool,
}

impl Channel {
    async fn write_frame(&mut self, frame: &str) -> Result<()> {
        self.torn = true;
        self.stdin.write_all(frame.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        self.torn = false;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            let chunk = self.stdout.fill_buf().await?;
            if chunk.is_empty() {
                return Err(Error::ServerExited);
            }

            let (used, complete) = match chunk.iter().position(|&byte| byte == b'\n') {
                Some(end) => (end + 1, true),
                None => (chunk.len(), false),
            };
            self.pending.extend_from_slice(&chunk[..used]);
            self.stdout.consume(used);

            if self.pending.len() > MAX_OUTPUT_SIZE {
                // The rest of the frame is still in the pipe.
                let size = self.pending.len();
                self.pending = Vec::new();
                self.torn = true;
                return Err(Error::OutputTooLarge {
                    size,
                    max: MAX_OUTPUT_SIZE,
                });
            }
            if complete {
                return Ok(std::mem::take(&mut self.pending));
            }
        }
    }

    async fn answer(&mut self, id: RequestId, method: &str) -> Result<()> {
        let response = if method == "ping" {
            JsonRpcResponse::success(id, Value::Object(Map::new()))
        } else {
            debug!(method, "rejecting provider request");
            JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("unsupported method: {method}"))
        };
        let frame = serde_json::to_string(&response)?;
        self.write_frame(&frame).await
    }
}

/// Handle to a running, initialized provider.
pub struct Session {
    config: ServerConfig,
    process: Mutex<Child>,
    channel: Mutex<Channel>,
    next_id: AtomicI64,
    closed: AtomicBool,
    server_info: Option<InitializeResult>,
}

impl Session {
    /// Spawn the provider and complete the MCP handshake.
    ///
    /// The whole handshake is bounded by `config.handshake_timeout`. On any
    /// failure the child is killed when the half-built session drops.
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        let mut session = Self::spawn(config)?;

        let budget = session.config.handshake_timeout;
        let info = timeout(budget, session.handshake())
            .await
            .map_err(|_| Error::Timeout(budget, "initialize handshake".to_string()))??;

        info!(
            provider = %session.config.name,
            server = %info.server_info.name,
            protocol = %info.protocol_version,
            "provider connected"
        );
        session.server_info = Some(info);
        Ok(session)
    }

    fn spawn(config: ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        Ok(Self {
            config,
            process: Mutex::new(process),
            channel: Mutex::new(Channel {
                stdin,
                stdout: BufReader::new(stdout),
                pending: Vec::new(),
                torn: false,
            }),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            server_info: None,
        })
    }

    async fn handshake(&self) -> Result<InitializeResult> {
        let request = JsonRpcRequest::new(self.next_request_id(), "initialize")
            .with_params(InitializeParams::default())?;
        let response = self.exchange(&request).await?;
        let info = decode("initialize", response.into_result()?)?;

        self.notify("notifications/initialized").await?;
        Ok(info)
    }

    /// Get the provider name from its config.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// What the provider reported about itself during the handshake.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Fetch the tools the provider currently advertises, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_LIST_PAGES {
            let page: ListToolsResult = self
                .request("tools/list", Some(ListToolsParams { cursor }))
                .await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        Err(Error::InvalidResponse(format!(
            "tools/list did not finish within {MAX_LIST_PAGES} pages"
        )))
    }

    /// Call a tool by name.
    ///
    /// A tool-side failure (`isError: true`) is not an `Err`: the result is
    /// returned as-is so the caller can show it to the model.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;
        if result.is_error {
            warn!(provider = %self.config.name, tool = name, "tool reported an error");
        }
        Ok(result)
    }

    /// Release the provider. Idempotent and safe after any failure.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut process = self.process.lock().await;
        match process.try_wait() {
            Ok(Some(status)) => debug!(provider = %self.config.name, %status, "provider already exited"),
            _ => {
                if let Err(e) = process.kill().await {
                    debug!(provider = %self.config.name, error = %e, "failed to kill provider");
                }
            }
        }
        info!(provider = %self.config.name, "provider closed");
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let mut request = JsonRpcRequest::new(self.next_request_id(), method);
        if let Some(p) = params {
            request = request.with_params(p)?;
        }

        let budget = self.config.request_timeout;
        let response = timeout(budget, self.exchange(&request))
            .await
            .map_err(|_| Error::Timeout(budget, method.to_string()))??;

        decode(method, response.into_result()?)
    }

    /// Write one request and read frames until its response arrives.
    async fn exchange(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.ensure_open()?;
        let mut channel = self.channel.lock().await;
        if channel.torn {
            return Err(Error::ChannelTorn);
        }

        let frame = serde_json::to_string(request)?;
        channel.write_frame(&frame).await?;

        loop {
            let frame = channel.read_frame().await?;
            let Ok(value) = serde_json::from_slice::<Value>(&frame) else {
                debug!(provider = %self.config.name, "skipping non-JSON output line");
                continue;
            };
            if !Incoming::is_message(&value) {
                debug!(provider = %self.config.name, "skipping non-message JSON output");
                continue;
            }

            match Incoming::from_value(value)? {
                Incoming::Response(response) if response.id.as_ref() == Some(&request.id) => {
                    return Ok(response);
                }
                Incoming::Response(response) if response.id.is_none() => {
                    // The provider could not parse a frame; ours is the only one in flight.
                    return Err(match response.error {
                        Some(error) => Error::JsonRpc(error),
                        None => Error::InvalidResponse("response without id".to_string()),
                    });
                }
                Incoming::Response(response) => {
                    debug!(
                        provider = %self.config.name,
                        id = ?response.id,
                        "skipping stale response"
                    );
                }
                Incoming::Request { id, method } => channel.answer(id, &method).await?,
                Incoming::Notification { method } => {
                    debug!(provider = %self.config.name, method = %method, "provider notification");
                }
            }
        }
    }

    async fn notify(&self, method: &str) -> Result<()> {
        self.ensure_open()?;
        let mut channel = self.channel.lock().await;
        if channel.torn {
            return Err(Error::ChannelTorn);
        }

        let frame = serde_json::to_string(&JsonRpcNotification::new(method))?;
        channel.write_frame(&frame).await
    }
}

fn decode<R: DeserializeOwned>(method: &str, value: Value) -> Result<R> {
    serde_json::from_value(value).map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
}
