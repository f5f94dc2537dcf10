//! JSON-lines connection to the game-session sidecar.
//!
//! Requests carry an `id` and are answered with `{"id", "ok", ...}`. Lines with an
//! `"event"` key are pushed by the sidecar on its own and become [`AgentEvent`]s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use timelapser_core::agent::{AgentApi, AgentEvent, ApiFuture, FrameRenderer, Viewport};
use timelapser_core::world::{Pose, Vec3, WorldSnapshot};

use crate::config::SessionConfig;

type Reply = anyhow::Result<Value>;
type PendingMap = Arc<Mutex<Pending>>;

/// Requests waiting for a reply. Once `closed` is set no new request is accepted.
#[derive(Default)]
struct Pending {
    waiters: HashMap<u64, oneshot::Sender<Reply>>,
    closed: Option<String>,
}

const EVENT_BUFFER: usize = 256;

pub struct RemoteAgent {
    username: String,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl RemoteAgent {
    /// Connects, logs the sidecar into the game server and returns the event stream
    /// for this session.
    pub async fn connect(
        addr: &str,
        session: &SessionConfig,
    ) -> anyhow::Result<(Arc<Self>, mpsc::Receiver<AgentEvent>)> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect bridge {addr}"))?;
        let (read, write) = stream.into_split();

        let pending = PendingMap::default();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let reader = tokio::spawn(read_loop(BufReader::new(read), pending.clone(), events_tx));

        let mut agent = Self {
            username: String::new(),
            writer: tokio::sync::Mutex::new(write),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        };
        let hello = agent
            .request(json!({ "op": "hello", "session": session }))
            .await
            .context("bridge hello")?;
        agent.username = hello
            .get("username")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing username in hello reply"))?
            .to_string();

        info!(addr, username = %agent.username, "bridge.connected");
        Ok((Arc::new(agent), events_rx))
    }

    async fn request(&self, mut req: Value) -> anyhow::Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        req["id"] = json!(id);

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if let Some(reason) = &pending.closed {
                anyhow::bail!("bridge unavailable: {reason}");
            }
            pending.waiters.insert(id, tx);
        }

        let line = format!("{req}\n");
        let written = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(err) => Err(err),
            }
        };
        if let Err(err) = written {
            lock(&self.pending).waiters.remove(&id);
            return Err(err).context("bridge write");
        }

        rx.await
            .map_err(|_| anyhow::anyhow!("bridge closed before replying to request {id}"))?
    }

    async fn request_ok(&self, req: Value) -> anyhow::Result<()> {
        self.request(req).await.map(|_| ())
    }
}

impl Drop for RemoteAgent {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl AgentApi for RemoteAgent {
    fn username(&self) -> &str {
        &self.username
    }

    fn chat<'a>(&'a self, text: String) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.request_ok(json!({ "op": "chat", "text": text })).await })
    }

    fn look<'a>(&'a self, yaw: f64, pitch: f64) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.request_ok(json!({ "op": "look", "yaw": yaw, "pitch": pitch }))
                .await
        })
    }

    fn look_at<'a>(&'a self, target: Vec3) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.request_ok(json!({ "op": "look_at", "position": target }))
                .await
        })
    }

    fn world_snapshot<'a>(&'a self) -> ApiFuture<'a, WorldSnapshot> {
        Box::pin(async move {
            let v = self.request(json!({ "op": "world" })).await?;
            let world = v
                .get("world")
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing world in response"))?;
            serde_json::from_value(world).context("decode world snapshot")
        })
    }
}

impl FrameRenderer for RemoteAgent {
    fn render<'a>(&'a self, pose: Pose, viewport: Viewport) -> ApiFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let v = self
                .request(json!({ "op": "render", "pose": pose, "viewport": viewport }))
                .await?;
            let hex = v
                .get("png_hex")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("missing png_hex in response"))?;
            decode_hex(hex).context("decode png_hex")
        })
    }
}

#[derive(Debug)]
enum Incoming {
    Reply { id: u64, reply: Reply },
    Event(AgentEvent),
}

fn parse_line(line: &str) -> anyhow::Result<Incoming> {
    let v: Value = serde_json::from_str(line).context("invalid bridge json")?;

    if v.get("event").is_some() {
        let event = serde_json::from_value(v).context("decode bridge event")?;
        return Ok(Incoming::Event(event));
    }

    let id = v
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow::anyhow!("bridge line has neither id nor event"))?;
    let reply = if v.get("ok").and_then(|v| v.as_bool()) == Some(true) {
        Ok(v)
    } else {
        let error = v
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown error")
            .to_string();
        Err(anyhow::anyhow!("bridge request {id} failed: {error}"))
    };
    Ok(Incoming::Reply { id, reply })
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    pending: PendingMap,
    events: mpsc::Sender<AgentEvent>,
) {
    let mut line = String::new();
    let reason = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break "bridge connection closed".to_string(),
            Ok(_) => {}
            Err(err) => break format!("bridge read failed: {err}"),
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_line(trimmed) {
            Ok(Incoming::Reply { id, reply }) => match lock(&pending).waiters.remove(&id) {
                Some(waiter) => {
                    let _ = waiter.send(reply);
                }
                None => warn!(id, "bridge.reply.unmatched"),
            },
            Ok(Incoming::Event(event)) => {
                debug!(?event, "bridge.event");
                if events.send(event).await.is_err() {
                    break "event receiver dropped".to_string();
                }
            }
            Err(err) => warn!(error = %format!("{err:#}"), line = trimmed, "bridge.line.invalid"),
        }
    };

    let waiters: Vec<_> = {
        let mut pending = lock(&pending);
        pending.closed = Some(reason.clone());
        pending.waiters.drain().collect()
    };
    for (_, waiter) in waiters {
        let _ = waiter.send(Err(anyhow::anyhow!("{reason}")));
    }
    info!(%reason, "bridge.closed");
    let _ = events.send(AgentEvent::Ended { reason }).await;
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn decode_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let clean = input.trim();
    if !clean.len().is_multiple_of(2) {
        anyhow::bail!("hex length must be even");
    }

    let mut out = Vec::with_capacity(clean.len() / 2);
    for pair in clean.as_bytes().chunks_exact(2) {
        out.push((hex_nibble(pair[0])? << 4) | hex_nibble(pair[1])?);
    }
    Ok(out)
}

fn hex_nibble(ch: u8) -> anyhow::Result<u8> {
    match ch {
        b'0'..=b'9' => Ok(ch - b'0'),
        b'a'..=b'f' => Ok(ch - b'a' + 10),
        b'A'..=b'F' => Ok(ch - b'A' + 10),
        _ => anyhow::bail!("invalid hex character {}", ch as char),
    }
}
