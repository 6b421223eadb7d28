//! Stream transport: a tool host spoken to over a byte pipe.
//!
//! Usually the pipe is a child process's stdin/stdout, but any pair of
//! async streams works (see [`StdioSession::connect`]).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::parse_tool_list;
use crate::error::{Error, Result};
use crate::framing::{self, Frame, FrameDecoder, Framing};
use crate::pending::{Delivery, PendingTable};
use crate::protocol::{
    CallToolParams, Capabilities, Inbound, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, RequestId,
    ToolDescriptor,
};
use crate::session::{SessionOptions, ToolSession};

const READ_CHUNK: usize = 8 * 1024;

/// How to launch a tool host process.
#[derive(Debug, Clone)]
pub struct StdioConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Added to (and overriding) the inherited environment.
    pub env: HashMap<String, String>,
    pub framing: Framing,
}

impl StdioConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            framing: Framing::default(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }
}

/// State shared between callers and the listener task.
struct Shared {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: PendingTable,
    framing: Framing,
}

impl Shared {
    async fn send(&self, message: &impl Serialize) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        let frame = framing::encode(self.framing, &body);

        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await.map_err(write_error)?;
        writer.flush().await.map_err(write_error)?;
        Ok(())
    }

    /// Route one inbound message. Never waits on the writer, so the
    /// listener keeps draining host output while a caller's write is stuck.
    fn dispatch(self: &Arc<Self>, value: Value) {
        match Inbound::classify(value) {
            Inbound::Response(response) => {
                let id = response.id.clone();
                match self.pending.resolve(&id, response.into_outcome()) {
                    Delivery::Delivered => {}
                    Delivery::Late => warn!(%id, "dropping late response to a timed-out request"),
                    Delivery::Unmatched => {
                        debug!(%id, "dropping response with no outstanding request");
                    }
                }
            }
            Inbound::Request { id, method, .. } => {
                let reply = if method == "ping" {
                    JsonRpcResponse::success(id, json!({}))
                } else {
                    debug!(%method, "rejecting host request");
                    let message = format!("method not found: {method}");
                    JsonRpcResponse::failure(id, METHOD_NOT_FOUND, message)
                };
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = shared.send(&reply).await {
                        debug!(error = %e, "failed to answer host request");
                    }
                });
            }
            Inbound::Notification { method, .. } => debug!(%method, "host notification"),
            Inbound::Other(value) => debug!(%value, "ignoring non JSON-RPC message"),
        }
    }
}

fn write_error(e: std::io::Error) -> Error {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::UnexpectedEof => {
            Error::ChannelClosed
        }
        _ => Error::Io(e),
    }
}

/// Drains host output until EOF, routing responses to their callers.
async fn listen<R>(mut reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new(shared.framing);
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("tool host closed its output");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to read from tool host");
                break;
            }
        };

        decoder.push(&buf[..n]);
        while let Some(frame) = decoder.next_frame() {
            match frame {
                Frame::Message(value) => shared.dispatch(value),
                Frame::Noise(line) => debug!(target: "mcp::host", "{line}"),
            }
        }
    }

    shared.pending.close();
}

/// Session with a tool host over a byte stream.
pub struct StdioSession {
    shared: Arc<Shared>,
    next_id: AtomicI64,
    listener: std::sync::Mutex<Option<JoinHandle<()>>>,
    child: std::sync::Mutex<Option<Child>>,
    server: InitializeResult,
    timeout: Duration,
    closed: AtomicBool,
}

impl StdioSession {
    /// Spawn the host process and perform the handshake.
    pub async fn spawn(config: StdioConfig, options: &SessionOptions) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::TransportStartup(format!("cannot spawn '{}': {e}", config.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::TransportStartup("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::TransportStartup("failed to capture stdout".to_string()))?;

        debug!(command = %config.command, pid = ?child.id(), "spawned tool host");
        Self::start(stdout, stdin, Some(child), config.framing, options).await
    }

    /// Run a session over existing streams and perform the handshake.
    pub async fn connect<R, W>(
        reader: R,
        writer: W,
        framing: Framing,
        options: &SessionOptions,
    ) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::start(reader, writer, None, framing, options).await
    }

    async fn start<R, W>(
        reader: R,
        writer: W,
        child: Option<Child>,
        framing: Framing,
        options: &SessionOptions,
    ) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending: PendingTable::new(),
            framing,
        });
        let listener = tokio::spawn(listen(reader, Arc::clone(&shared)));

        let mut session = Self {
            shared,
            next_id: AtomicI64::new(1),
            listener: std::sync::Mutex::new(Some(listener)),
            child: std::sync::Mutex::new(child),
            server: InitializeResult::default(),
            timeout: options.timeout,
            closed: AtomicBool::new(false),
        };

        match session.handshake(&options.client_name).await {
            Ok(server) => {
                session.server = server;
                Ok(session)
            }
            Err(e) => {
                session.close().await;
                Err(Error::TransportStartup(format!("handshake failed: {e}")))
            }
        }
    }

    async fn handshake(&self, client_name: &str) -> Result<InitializeResult> {
        let params = serde_json::to_value(InitializeParams::new(client_name))?;
        let result = self.request("initialize", Some(params), self.timeout).await?;
        let server: InitializeResult = serde_json::from_value(result)
            .map_err(|e| Error::Protocol(format!("bad initialize result: {e}")))?;

        self.shared
            .send(&JsonRpcNotification::new("notifications/initialized"))
            .await?;

        if let Some(info) = &server.server_info {
            debug!(server = %info.name, version = ?info.version, "tool host ready");
        }
        Ok(server)
    }

    /// Handshake result sent by the host.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.server.capabilities
    }

    /// Enumerate the host's tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let result = self
            .request("tools/list", Some(json!({})), self.timeout)
            .await?;
        parse_tool_list(&result)
    }

    /// Invoke one tool and wait up to `timeout` for its result.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request("tools/call", Some(params), timeout).await?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(Error::RemoteTool(result));
        }
        Ok(result)
    }

    /// Stop the host. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.pending.close();

        let listener = lock(&self.listener).take();
        if let Some(handle) = listener {
            handle.abort();
        }

        let child = lock(&self.child).take();
        if let Some(mut child) = child {
            // The host may already be gone.
            let _ = child.kill().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.shared.pending.is_closed()
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ChannelClosed);
        }

        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(params) = params {
            request = request.with_params(params);
        }

        // Register before sending so a fast reply cannot be missed.
        let slot = self.shared.pending.register(id.clone())?;
        if let Err(e) = self.shared.send(&request).await {
            self.shared.pending.forget(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, slot).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(Error::RemoteTool(error)),
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                self.shared.pending.abandon(&id);
                debug!(%id, method, ?timeout, "request timed out");
                Err(Error::Timeout {
                    method: method.to_string(),
                    timeout,
                })
            }
        }
    }
}

impl Drop for StdioSession {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }
}

impl ToolSession for StdioSession {
    fn capabilities(&self) -> &Capabilities {
        StdioSession::capabilities(self)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        StdioSession::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value> {
        StdioSession::call_tool(self, name, arguments, timeout).await
    }

    async fn close(&self) {
        StdioSession::close(self).await
    }
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    type Seen = Arc<Mutex<Vec<Value>>>;

    /// Bytes the stub writes back, or `None` to hang up.
    type Reply = Option<Vec<Vec<u8>>>;

    /// In-process host: decodes client frames and answers via `respond`.
    fn stub_host<F>(
        framing: Framing,
        mut respond: F,
    ) -> (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>, Seen)
    where
        F: FnMut(&Value) -> Reply + Send + 'static,
    {
        let (client, mut host) = tokio::io::duplex(64 * 1024);
        let seen: Seen = Arc::default();
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new(framing);
            let mut buf = vec![0u8; 4096];
            loop {
                let n = match host.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                decoder.push(&buf[..n]);
                while let Some(frame) = decoder.next_frame() {
                    let Frame::Message(msg) = frame else { continue };
                    log.lock().unwrap().push(msg.clone());
                    let Some(chunks) = respond(&msg) else { return };
                    for chunk in chunks {
                        if host.write_all(&chunk).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        let (reader, writer) = tokio::io::split(client);
        (reader, writer, seen)
    }

    fn frame(framing: Framing, value: Value) -> Vec<u8> {
        framing::encode(framing, &serde_json::to_vec(&value).unwrap())
    }

    /// Answers `initialize` with `{}` and hands everything else to `rest`.
    fn with_handshake<F>(
        framing: Framing,
        mut rest: F,
    ) -> impl FnMut(&Value) -> Reply + Send + 'static
    where
        F: FnMut(&Value) -> Reply + Send + 'static,
    {
        move |msg: &Value| {
            if msg["method"] == "initialize" {
                return Some(vec![frame(framing, json!({"id": msg["id"], "result": {}}))]);
            }
            if msg.get("id").is_none() {
                return Some(vec![]);
            }
            rest(msg)
        }
    }

    async fn connect(
        framing: Framing,
        respond: impl FnMut(&Value) -> Reply + Send + 'static,
    ) -> (StdioSession, Seen) {
        let (reader, writer, seen) = stub_host(framing, with_handshake(framing, respond));
        let session = StdioSession::connect(reader, writer, framing, &SessionOptions::default())
            .await
            .unwrap();
        (session, seen)
    }

    /// Next message the client wrote, or `None` once its side is gone.
    async fn next_message(reader: &mut DuplexStream, decoder: &mut FrameDecoder) -> Option<Value> {
        let mut buf = [0u8; 1024];
        loop {
            while let Some(frame) = decoder.next_frame() {
                if let Frame::Message(msg) = frame {
                    return Some(msg);
                }
            }
            let n = reader.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            decoder.push(&buf[..n]);
        }
    }

    /// Answer `initialize` and consume the `initialized` notification.
    async fn answer_handshake(
        reader: &mut DuplexStream,
        writer: &mut DuplexStream,
        decoder: &mut FrameDecoder,
        framing: Framing,
    ) {
        let init = next_message(reader, decoder).await.unwrap();
        assert_eq!(init["method"], "initialize");
        let reply = frame(framing, json!({"id": init["id"], "result": {}}));
        writer.write_all(&reply).await.unwrap();
        let initialized = next_message(reader, decoder).await.unwrap();
        assert_eq!(initialized["method"], "notifications/initialized");
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    const SHORT: Duration = Duration::from_millis(100);
    const LONG: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn create_branch_end_to_end() {
        let framing = Framing::ContentLength;
        let (session, seen) = connect(framing, move |msg| {
            assert_eq!(msg["id"], 2);
            Some(vec![frame(framing, json!({"id": 2, "result": {"ref": "refs/heads/b"}}))])
        })
        .await;

        let result = session
            .call_tool(
                "create_branch",
                args(json!({"owner": "o", "repo": "r", "branch": "b", "from_branch": "main"})),
                LONG,
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"ref": "refs/heads/b"}));

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0]["method"], "initialize");
        assert_eq!(seen[0]["id"], 1);
        assert_eq!(seen[1], json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert_eq!(seen[2]["method"], "tools/call");
        assert_eq!(seen[2]["params"]["name"], "create_branch");
        assert_eq!(seen[2]["params"]["arguments"]["from_branch"], "main");
    }

    #[tokio::test]
    async fn ids_increase_and_results_follow_their_ids() {
        let framing = Framing::ContentLength;
        let (session, seen) = connect(framing, move |msg| {
            Some(vec![frame(framing, json!({"id": msg["id"], "result": {"echo": msg["id"]}}))])
        })
        .await;

        for expected in 2..5 {
            let result = session.call_tool("noop", Map::new(), LONG).await.unwrap();
            assert_eq!(result, json!({"echo": expected}));
        }

        let ids: Vec<i64> = seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| m["id"].as_i64())
            .collect();
        assert_eq!(ids, [1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn error_field_becomes_remote_tool_error() {
        let framing = Framing::ContentLength;
        let payload = json!({"code": 422, "message": "Reference already exists"});
        let reply = payload.clone();
        let (session, _) = connect(framing, move |msg| {
            Some(vec![frame(framing, json!({"jsonrpc": "2.0", "id": msg["id"], "error": reply}))])
        })
        .await;

        let err = session.call_tool("create_branch", Map::new(), LONG).await.unwrap_err();
        assert_eq!(err.remote_payload(), Some(&payload));
    }

    #[tokio::test]
    async fn is_error_result_becomes_remote_tool_error() {
        let framing = Framing::ContentLength;
        let (session, _) = connect(framing, move |msg| {
            let result = json!({"content": [{"type": "text", "text": "boom"}], "isError": true});
            Some(vec![frame(framing, json!({"id": msg["id"], "result": result}))])
        })
        .await;

        let err = session.call_tool("x", Map::new(), LONG).await.unwrap_err();
        assert_eq!(err.remote_payload().unwrap()["isError"], true);
    }

    #[tokio::test]
    async fn timeout_leaves_session_usable() {
        let framing = Framing::ContentLength;
        let mut late = None;
        let (session, _) = connect(framing, move |msg| {
            if msg["params"]["name"] == "slow" {
                // Never answered in time; the reply rides along with the next one.
                late = Some(msg["id"].clone());
                return Some(vec![]);
            }
            let mut out = Vec::new();
            if let Some(id) = late.take() {
                out.push(frame(framing, json!({"id": id, "result": "too late"})));
            }
            out.push(frame(framing, json!({"id": msg["id"], "result": "fast"})));
            Some(out)
        })
        .await;

        let err = session.call_tool("slow", Map::new(), SHORT).await.unwrap_err();
        assert!(err.is_timeout());

        let result = session.call_tool("fast", Map::new(), LONG).await.unwrap();
        assert_eq!(result, json!("fast"));
    }

    #[tokio::test]
    async fn concurrent_calls_answered_out_of_order() {
        let framing = Framing::ContentLength;
        let mut held = None;
        let (session, _) = connect(framing, move |msg| match held.take() {
            None => {
                held = Some(msg["id"].clone());
                Some(vec![])
            }
            Some(first) => Some(vec![
                frame(framing, json!({"id": msg["id"], "result": {"for": msg["params"]["name"]}})),
                frame(framing, json!({"id": first, "result": {"for": "first"}})),
            ]),
        })
        .await;

        let (a, b) = tokio::join!(
            session.call_tool("first", Map::new(), LONG),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                session.call_tool("second", Map::new(), LONG).await
            }
        );
        assert_eq!(a.unwrap(), json!({"for": "first"}));
        assert_eq!(b.unwrap(), json!({"for": "second"}));
    }

    #[tokio::test]
    async fn log_output_between_frames_is_ignored() {
        let framing = Framing::ContentLength;
        let (session, _) = connect(framing, move |msg| {
            Some(vec![
                b"npm notice New major version available\n".to_vec(),
                frame(framing, json!({"id": 999, "result": "stray"})),
                b"Content-Length: nope\r\n".to_vec(),
                frame(framing, json!({"id": msg["id"], "result": "ok"})),
            ])
        })
        .await;

        let result = session.call_tool("x", Map::new(), LONG).await.unwrap();
        assert_eq!(result, json!("ok"));
    }

    #[tokio::test]
    async fn line_delimited_host() {
        let framing = Framing::LineDelimited;
        let (session, _) = connect(framing, move |msg| {
            Some(vec![
                b"Secure MCP Filesystem Server running on stdio\n".to_vec(),
                frame(
                    framing,
                    json!({"id": msg["id"], "result": {"tools": [{"name": "read_file"}]}}),
                ),
            ])
        })
        .await;

        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools, vec![ToolDescriptor::named("read_file")]);
    }

    #[tokio::test]
    async fn host_ping_is_answered() {
        let framing = Framing::ContentLength;
        let mut waiting = None;
        let (session, seen) = connect(framing, move |msg| {
            if msg["id"] == "host-1" {
                assert_eq!(msg["result"], json!({}));
                let id = waiting.take().unwrap();
                return Some(vec![frame(framing, json!({"id": id, "result": "pong seen"}))]);
            }
            waiting = Some(msg["id"].clone());
            Some(vec![frame(framing, json!({"jsonrpc": "2.0", "id": "host-1", "method": "ping"}))])
        })
        .await;

        let result = session.call_tool("x", Map::new(), LONG).await.unwrap();
        assert_eq!(result, json!("pong seen"));
        assert!(seen.lock().unwrap().iter().any(|m| m["id"] == "host-1"));
    }

    #[tokio::test]
    async fn empty_tool_list() {
        let framing = Framing::ContentLength;
        let (session, _) = connect(framing, move |msg| {
            Some(vec![frame(framing, json!({"id": msg["id"], "result": {"tools": []}}))])
        })
        .await;
        assert!(session.list_tools().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_tool_list_is_protocol_error() {
        let framing = Framing::ContentLength;
        let (session, _) = connect(framing, move |msg| {
            Some(vec![frame(framing, json!({"id": msg["id"], "result": {"tools": 3}}))])
        })
        .await;
        assert!(matches!(session.list_tools().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn host_exit_fails_call_instead_of_hanging() {
        let framing = Framing::ContentLength;
        let (session, _) = connect(framing, |_| None).await;

        let err = session.call_tool("x", Map::new(), LONG).await.unwrap_err();
        assert!(matches!(err, Error::ChannelClosed), "{err:?}");
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn handshake_error_is_startup_failure() {
        let framing = Framing::ContentLength;
        let (reader, writer, _) = stub_host(framing, move |msg| {
            let reply = json!({"id": msg["id"], "error": {"message": "unsupported"}});
            Some(vec![frame(framing, reply)])
        });
        let options = SessionOptions::default();
        let result = StdioSession::connect(reader, writer, framing, &options).await;
        assert!(matches!(result, Err(Error::TransportStartup(_))));
    }

    #[tokio::test]
    async fn close_twice_then_calls_fail() {
        let framing = Framing::ContentLength;
        let (session, _) = connect(framing, |_| Some(vec![])).await;

        session.close().await;
        session.close().await;
        assert!(matches!(
            session.call_tool("x", Map::new(), LONG).await,
            Err(Error::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn write_to_departed_host_is_channel_closed() {
        let framing = Framing::ContentLength;
        // Separate pipes per direction so the host can stop reading while
        // its output stays open.
        let (client_out, mut host_in) = tokio::io::duplex(4096);
        let (mut host_out, client_in) = tokio::io::duplex(4096);
        let host = tokio::spawn(async move {
            let mut decoder = FrameDecoder::new(framing);
            answer_handshake(&mut host_in, &mut host_out, &mut decoder, framing).await;
            (host_in, host_out)
        });

        let options = SessionOptions::default();
        let session = StdioSession::connect(client_in, client_out, framing, &options)
            .await
            .unwrap();
        let (host_in, _host_out) = host.await.unwrap();
        drop(host_in);

        let err = session.call_tool("x", Map::new(), LONG).await.unwrap_err();
        assert!(matches!(err, Error::ChannelClosed), "{err:?}");
        assert!(session.shared.pending.is_empty());
    }

    #[tokio::test]
    async fn host_request_answered_while_a_write_is_stuck() {
        let framing = Framing::ContentLength;
        let (client_out, mut host_in) = tokio::io::duplex(1024);
        let (mut host_out, client_in) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new(framing);
            answer_handshake(&mut host_in, &mut host_out, &mut decoder, framing).await;

            // Read the first call, then stop reading so the next write fills the pipe.
            let first = next_message(&mut host_in, &mut decoder).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            let ping = frame(framing, json!({"jsonrpc": "2.0", "id": "host-1", "method": "ping"}));
            let reply = frame(framing, json!({"id": first["id"], "result": "first done"}));
            host_out.write_all(&ping).await.unwrap();
            host_out.write_all(&reply).await.unwrap();
            std::future::pending::<()>().await;
        });

        let options = SessionOptions::default();
        let session = StdioSession::connect(client_in, client_out, framing, &options)
            .await
            .unwrap();

        let mut big = Map::new();
        big.insert("content".into(), json!("x".repeat(64 * 1024)));
        let (first, stuck) = tokio::join!(
            session.call_tool("first", Map::new(), LONG),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let call = session.call_tool("big", big, LONG);
                tokio::time::timeout(Duration::from_millis(500), call).await
            }
        );
        assert_eq!(first.unwrap(), json!("first done"));
        assert!(stuck.is_err());
    }

    #[tokio::test]
    async fn spawn_missing_command_is_startup_failure() {
        let config = StdioConfig::new("definitely-not-a-real-tool-host-binary");
        let result = StdioSession::spawn(config, &SessionOptions::default()).await;
        assert!(matches!(result, Err(Error::TransportStartup(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawned_shell_host() {
        let script = concat!(
            "read -r _; echo 'booting'; ",
            r#"echo '{"jsonrpc":"2.0","id":1,"result":{"serverInfo":{"name":"sh"}}}'; "#,
            "cat > /dev/null",
        );
        let config = StdioConfig::new("sh")
            .arg("-c")
            .arg(script)
            .framing(Framing::LineDelimited);

        let session = StdioSession::spawn(config, &SessionOptions::default())
            .await
            .unwrap();
        assert_eq!(session.server_info().server_info.as_ref().unwrap().name, "sh");

        session.close().await;
        session.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawned_host_env_is_inherited_with_overrides() {
        let script = concat!(
            "read -r _; ",
            r#"printf '{"jsonrpc":"2.0","id":1,"result":{"serverInfo":{"name":"%s"}}}\n' "#,
            r#""$HOME:${PATH:+inherited}"; "#,
            "cat > /dev/null",
        );
        let config = StdioConfig::new("sh")
            .arg("-c")
            .arg(script)
            .env("HOME", "seen")
            .framing(Framing::LineDelimited);

        let session = StdioSession::spawn(config, &SessionOptions::default())
            .await
            .unwrap();
        let info = session.server_info().server_info.as_ref().unwrap();
        assert_eq!(info.name, "seen:inherited");

        session.close().await;
    }
}
