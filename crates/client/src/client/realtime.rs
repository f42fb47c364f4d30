//! Realtime change feed over a Phoenix channel WebSocket.
//!
//! A single background task owns the socket. It joins one topic per
//! subscribed table, sends heartbeats, and fans notifications out to a
//! broadcast channel per table. When the socket drops it reconnects with
//! exponential backoff and joins every known topic again; subscribers keep
//! their receivers across reconnects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cinesync_core::store::{self, ChangeEvent, ChangeFeed, StoreError};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use super::protocol::{self, PhoenixMessage};
use crate::error::{ClientError, Result};

/// Tuning for the realtime connection.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub heartbeat: Duration,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
    /// Buffer of each per-table broadcast channel.
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(30),
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
            jitter_ms: 500,
            channel_capacity: 100,
        }
    }
}

/// Shortest heartbeat period a connection will use.
pub const MIN_HEARTBEAT: Duration = Duration::from_secs(1);

impl RealtimeConfig {
    /// Raises zero or out-of-range values to the smallest usable ones.
    fn normalized(mut self) -> Self {
        if self.heartbeat < MIN_HEARTBEAT {
            tracing::warn!(
                heartbeat_ms = self.heartbeat.as_millis() as u64,
                "Heartbeat too short, using {}s",
                MIN_HEARTBEAT.as_secs()
            );
            self.heartbeat = MIN_HEARTBEAT;
        }
        self.channel_capacity = self.channel_capacity.max(1);
        self.initial_backoff_ms = self.initial_backoff_ms.max(1);
        self.max_backoff_ms = self.max_backoff_ms.max(self.initial_backoff_ms);
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            self.multiplier = 1.0;
        }
        self
    }
}

#[derive(Debug)]
enum Command {
    Join(String),
    Shutdown,
}

enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

#[derive(Debug)]
struct Shared {
    endpoint: Url,
    schema: String,
    config: RealtimeConfig,
    channels: RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>,
}

/// Handle to the realtime connection. Cloning shares the connection.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl RealtimeClient {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    pub fn connect(
        base_url: &Url,
        api_key: &str,
        schema: impl Into<String>,
        config: RealtimeConfig,
    ) -> Result<Self> {
        let endpoint = protocol::realtime_endpoint(base_url, api_key)?;
        let shared = Arc::new(Shared {
            endpoint,
            schema: schema.into(),
            config: config.normalized(),
            channels: RwLock::new(HashMap::new()),
        });
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(shared.clone(), receiver));
        Ok(Self { shared, commands })
    }

    /// Subscribe to changes of `table`, joining its topic on first use.
    pub async fn subscribe_table(&self, table: &str) -> Result<broadcast::Receiver<ChangeEvent>> {
        let (sender, created) = self.shared.get_or_create_channel(table).await;
        if created {
            self.commands
                .send(Command::Join(table.to_string()))
                .map_err(|_| ClientError::Connection("realtime task has stopped".to_string()))?;
        }
        Ok(sender.subscribe())
    }

    /// Stream of changes for `table`. Lagged notifications are skipped.
    pub async fn watch(
        &self,
        table: &str,
    ) -> Result<impl futures_core::Stream<Item = ChangeEvent>> {
        let mut receiver = self.subscribe_table(table).await?;
        let table = table.to_string();
        Ok(async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(table = %table, skipped, "Change stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Close the socket and stop reconnecting.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    async fn subscribe(&self, table: &str) -> store::Result<broadcast::Receiver<ChangeEvent>> {
        self.subscribe_table(table)
            .await
            .map_err(|e| StoreError::Subscription(e.to_string()))
    }
}

impl Shared {
    /// Gets or creates the channel for `table`; the flag is true when created.
    async fn get_or_create_channel(&self, table: &str) -> (broadcast::Sender<ChangeEvent>, bool) {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(table) {
                return (sender.clone(), false);
            }
        }

        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(table) {
            return (sender.clone(), false);
        }

        let (sender, _) = broadcast::channel(self.config.channel_capacity);
        channels.insert(table.to_string(), sender.clone());
        (sender, true)
    }

    async fn tables(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }

    /// Route one text frame to the subscribers of its table.
    async fn dispatch(&self, text: &str) {
        let message: PhoenixMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable realtime frame");
                return;
            }
        };

        if let Some(reason) = protocol::reply_error(&message) {
            tracing::warn!(topic = %message.topic, %reason, "Realtime join rejected");
            return;
        }
        if message.event == protocol::EVENT_ERROR || message.event == protocol::EVENT_CLOSE {
            tracing::warn!(topic = %message.topic, event = %message.event, "Realtime channel closed");
            return;
        }

        let Some(change) = protocol::parse_change(&message) else {
            return;
        };
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(&change.table) {
            tracing::debug!(table = %change.table, kind = change.kind.as_str(), "Change received");
            // No receivers just means nobody is listening right now.
            let _ = sender.send(change);
        }
    }

    async fn session<S>(
        &self,
        stream: S,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> SessionEnd
    where
        S: futures_util::Stream<Item = std::result::Result<Message, tungstenite::Error>>
            + Sink<Message, Error = tungstenite::Error>
            + Unpin,
    {
        let (mut sink, mut source) = stream.split();
        let mut joined = HashSet::new();
        let mut next_ref = 0u64;

        for table in self.tables().await {
            next_ref += 1;
            let join = protocol::join_message(&self.schema, &table, next_ref);
            if let Err(e) = send(&mut sink, &join).await {
                return SessionEnd::Disconnected(e.to_string());
            }
            tracing::debug!(table = %table, "Joined realtime topic");
            joined.insert(table);
        }

        let mut heartbeat = tokio::time::interval(self.config.heartbeat);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text).await,
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Disconnected("connection closed".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                },
                _ = heartbeat.tick() => {
                    next_ref += 1;
                    if let Err(e) = send(&mut sink, &protocol::heartbeat_message(next_ref)).await {
                        return SessionEnd::Disconnected(e.to_string());
                    }
                }
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => {
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    }
                    Some(Command::Join(table)) => {
                        if joined.insert(table.clone()) {
                            next_ref += 1;
                            let join = protocol::join_message(&self.schema, &table, next_ref);
                            if let Err(e) = send(&mut sink, &join).await {
                                return SessionEnd::Disconnected(e.to_string());
                            }
                            tracing::debug!(table = %table, "Joined realtime topic");
                        }
                    }
                },
            }
        }
    }
}

async fn send<S>(sink: &mut S, message: &PhoenixMessage) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

/// Connection loop: connect, serve, back off, repeat until shutdown.
async fn run(shared: Arc<Shared>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let config = shared.config.clone();
    let mut backoff = config.initial_backoff_ms;

    loop {
        match tokio_tungstenite::connect_async(shared.endpoint.as_str()).await {
            Ok((stream, _)) => {
                tracing::info!(host = ?shared.endpoint.host_str(), "Realtime connected");
                backoff = config.initial_backoff_ms;
                match shared.session(stream, &mut commands).await {
                    SessionEnd::Shutdown => {
                        tracing::info!("Realtime connection shut down");
                        return;
                    }
                    SessionEnd::Disconnected(reason) => {
                        tracing::warn!(%reason, "Realtime disconnected");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, backoff_ms = backoff, "Realtime connection failed");
            }
        }

        let delay = jittered_backoff(backoff, config.jitter_ms);
        let sleep = tokio::time::sleep(Duration::from_millis(delay));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => return,
                    // Joined with every other topic once reconnected.
                    Some(Command::Join(_)) => {}
                },
            }
        }

        backoff = next_backoff(backoff, config.multiplier, config.max_backoff_ms);
    }
}

fn next_backoff(current_ms: u64, multiplier: f64, max_ms: u64) -> u64 {
    let next = (current_ms as f64 * multiplier) as u64;
    next.min(max_ms)
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    base_ms.saturating_add(nanos % jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinesync_core::store::ChangeKind;
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{accept_async, WebSocketStream};

    const WAIT: Duration = Duration::from_secs(3);

    type Server = WebSocketStream<TcpStream>;

    async fn listen() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        (listener, base)
    }

    async fn accept(listener: &TcpListener) -> Server {
        let (socket, _) = tokio::time::timeout(WAIT, listener.accept())
            .await
            .expect("client connects in time")
            .unwrap();
        accept_async(socket).await.unwrap()
    }

    async fn next_frame(server: &mut Server) -> PhoenixMessage {
        loop {
            let frame = tokio::time::timeout(WAIT, server.next())
                .await
                .expect("frame in time")
                .expect("socket still open")
                .unwrap();
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Reads frames until `count` distinct topics were joined.
    async fn joined_topics(server: &mut Server, count: usize) -> HashSet<String> {
        let mut topics = HashSet::new();
        while topics.len() < count {
            let frame = next_frame(server).await;
            if frame.event == protocol::EVENT_JOIN {
                topics.insert(frame.topic);
            }
        }
        topics
    }

    async fn push_insert(server: &mut Server, table: &str, id: i64) {
        let frame = json!({
            "topic": protocol::topic_for("public", table),
            "event": "postgres_changes",
            "ref": null,
            "payload": {"data": {
                "table": table,
                "type": "INSERT",
                "record": {"sala_id": id},
                "old_record": {},
                "commit_timestamp": "2024-05-01T10:00:00Z"
            }}
        });
        server.send(Message::Text(frame.to_string())).await.unwrap();
    }

    async fn recv_change(receiver: &mut broadcast::Receiver<ChangeEvent>) -> ChangeEvent {
        tokio::time::timeout(WAIT, receiver.recv())
            .await
            .expect("change in time")
            .unwrap()
    }

    fn fast_reconnect() -> RealtimeConfig {
        RealtimeConfig {
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
            jitter_ms: 0,
            ..RealtimeConfig::default()
        }
    }

    fn shared() -> Shared {
        Shared {
            endpoint: Url::parse("ws://127.0.0.1:9/realtime/v1/websocket").unwrap(),
            schema: "public".to_string(),
            config: RealtimeConfig::default(),
            channels: RwLock::new(HashMap::new()),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(next_backoff(1_000, 2.0, 30_000), 2_000);
        assert_eq!(next_backoff(20_000, 2.0, 30_000), 30_000);
    }

    #[test]
    fn test_jitter_bounds() {
        assert_eq!(jittered_backoff(1_000, 0), 1_000);
        let delay = jittered_backoff(1_000, 500);
        assert!((1_000..1_500).contains(&delay));
    }

    #[tokio::test]
    async fn test_channel_reuse() {
        let shared = shared();
        let (_, created) = shared.get_or_create_channel("sala").await;
        assert!(created);
        let (_, created) = shared.get_or_create_channel("sala").await;
        assert!(!created);
        assert_eq!(shared.tables().await, vec!["sala".to_string()]);
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_table() {
        let shared = shared();
        let (sala, _) = shared.get_or_create_channel("sala").await;
        let (funcion, _) = shared.get_or_create_channel("funcion").await;
        let mut sala_rx = sala.subscribe();
        let mut funcion_rx = funcion.subscribe();

        let frame = json!({
            "topic": "realtime:public:sala",
            "event": "postgres_changes",
            "ref": null,
            "payload": {"data": {
                "table": "sala",
                "type": "INSERT",
                "record": {"sala_id": 9},
                "old_record": {}
            }}
        });
        shared.dispatch(&frame.to_string()).await;

        let change = sala_rx.try_recv().unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert!(funcion_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_ignores_garbage() {
        let shared = shared();
        let (sender, _) = shared.get_or_create_channel("sala").await;
        let mut receiver = sender.subscribe();
        shared.dispatch("not json").await;
        shared.dispatch(r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"1"}"#).await;
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_normalized_raises_zero_values() {
        let config = RealtimeConfig {
            heartbeat: Duration::ZERO,
            channel_capacity: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            multiplier: f64::NAN,
            jitter_ms: 0,
        }
        .normalized();

        assert_eq!(config.heartbeat, MIN_HEARTBEAT);
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.initial_backoff_ms, 1);
        assert_eq!(config.max_backoff_ms, 1);
        assert_eq!(config.multiplier, 1.0);
    }

    #[tokio::test]
    async fn test_zero_channel_capacity_still_subscribes() {
        let (listener, base) = listen().await;
        let client = RealtimeClient::connect(
            &base,
            "anon",
            "public",
            RealtimeConfig {
                channel_capacity: 0,
                ..fast_reconnect()
            },
        )
        .unwrap();

        let mut receiver = client.subscribe_table("sala").await.unwrap();
        let mut server = accept(&listener).await;
        joined_topics(&mut server, 1).await;
        push_insert(&mut server, "sala", 4).await;

        assert_eq!(recv_change(&mut receiver).await.kind, ChangeKind::Insert);
        client.shutdown();
    }

    #[tokio::test]
    async fn test_zero_heartbeat_keeps_connection_alive() {
        let (listener, base) = listen().await;
        let client = RealtimeClient::connect(
            &base,
            "anon",
            "public",
            RealtimeConfig {
                heartbeat: Duration::ZERO,
                ..fast_reconnect()
            },
        )
        .unwrap();

        let mut receiver = client.subscribe_table("sala").await.unwrap();
        let mut server = accept(&listener).await;
        joined_topics(&mut server, 1).await;

        let heartbeat = loop {
            let frame = next_frame(&mut server).await;
            if frame.event == protocol::EVENT_HEARTBEAT {
                break frame;
            }
        };
        assert_eq!(heartbeat.topic, protocol::PHOENIX_TOPIC);

        push_insert(&mut server, "sala", 5).await;
        assert_eq!(recv_change(&mut receiver).await.new, Some(json!({"sala_id": 5})));
        client.shutdown();
    }

    #[tokio::test]
    async fn test_reconnect_rejoins_every_topic() {
        let (listener, base) = listen().await;
        let client = RealtimeClient::connect(&base, "anon", "public", fast_reconnect()).unwrap();
        let mut sala = client.subscribe_table("sala").await.unwrap();
        let _funcion = client.subscribe_table("funcion").await.unwrap();
        let expected: HashSet<String> = ["realtime:public:sala", "realtime:public:funcion"]
            .into_iter()
            .map(String::from)
            .collect();

        let mut first = accept(&listener).await;
        assert_eq!(joined_topics(&mut first, 2).await, expected);
        push_insert(&mut first, "sala", 1).await;
        let change = recv_change(&mut sala).await;
        assert_eq!(change.table, "sala");
        assert_eq!(change.new, Some(json!({"sala_id": 1})));
        assert!(change.commit_timestamp.is_some());

        drop(first);

        let mut second = accept(&listener).await;
        assert_eq!(joined_topics(&mut second, 2).await, expected);
        push_insert(&mut second, "sala", 2).await;
        assert_eq!(recv_change(&mut sala).await.new, Some(json!({"sala_id": 2})));

        client.shutdown();
    }
}
