//! STOMP session on top of an `iridium_stomp` connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use iridium_stomp::{Connection, Frame};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broker::{
    AckMode, BrokerError, BrokerResult, BrokerSession, Connector, IncomingMessage,
    PublishOptions, Subscription, SubscriptionId,
};
use crate::config::BrokerConfig;

/// Buffered deliveries per subscription before new ones are dropped.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// No heart-beats either way; sessions last seconds.
const HEART_BEAT: &str = "0,0";

/// Opens [`StompSession`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct StompConnector;

impl StompConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for StompConnector {
    type Session = StompSession;

    async fn connect(&self, config: &BrokerConfig) -> BrokerResult<StompSession> {
        StompSession::connect(config).await
    }
}

/// First value of header `name`.
fn header<'a>(frame: &'a Frame, name: &str) -> Option<&'a str> {
    frame
        .headers
        .iter()
        .find(|(key, _)| key.as_str() == name)
        .map(|(_, value)| value.as_str())
}

/// Human-readable text of an ERROR frame: the `message` header, else the body.
fn error_text(frame: &Frame) -> String {
    if let Some(message) = header(frame, "message") {
        return message.to_string();
    }
    let body = String::from_utf8_lossy(&frame.body);
    let body = body.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if body.is_empty() {
        "broker reported an error".to_string()
    } else {
        body.to_string()
    }
}

/// Lock, recovering from a poisoned mutex; every critical section is a
/// single map operation.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Subscription table shared with the reader task.
#[derive(Default)]
struct Routes {
    subscriptions: Mutex<HashMap<String, mpsc::Sender<IncomingMessage>>>,
    closed: AtomicBool,
}

impl Routes {
    /// Add a subscription. Refused once the connection is gone.
    fn register(&self, id: String, tx: mpsc::Sender<IncomingMessage>) -> bool {
        let mut subs = lock(&self.subscriptions);
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        subs.insert(id, tx);
        true
    }

    fn remove(&self, id: &str) -> bool {
        lock(&self.subscriptions).remove(id).is_some()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn dispatch(&self, frame: Frame) {
        match frame.command.as_str() {
            "MESSAGE" => self.deliver(frame),
            "ERROR" => {
                let text = error_text(&frame);
                warn!(error = %text, "broker sent ERROR frame");
                let subs: Vec<_> = lock(&self.subscriptions).values().cloned().collect();
                for tx in subs {
                    let _ = tx.try_send(IncomingMessage::error(text.clone()));
                }
            }
            other => debug!(command = other, "ignoring frame"),
        }
    }

    fn deliver(&self, frame: Frame) {
        let Some(sub_id) = header(&frame, "subscription").map(str::to_string) else {
            warn!("MESSAGE frame without subscription header dropped");
            return;
        };
        let Some(tx) = lock(&self.subscriptions).get(&sub_id).cloned() else {
            debug!(subscription = %sub_id, "MESSAGE for closed subscription dropped");
            return;
        };

        let content_type = header(&frame, "content-type").map(str::to_string);
        let msg = IncomingMessage::new(content_type, frame.body);
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscription = %sub_id, "subscription buffer full, message dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.remove(&sub_id);
            }
        }
    }

    /// Mark the connection gone and drop every sender so all
    /// subscriptions observe closure.
    fn close_all(&self) {
        let mut subs = lock(&self.subscriptions);
        self.closed.store(true, Ordering::Release);
        subs.clear();
    }
}

async fn read_loop(conn: Arc<Connection>, routes: Arc<Routes>) {
    while let Some(frame) = conn.next_frame().await {
        routes.dispatch(frame);
    }
    debug!("STOMP connection closed by peer");
    routes.close_all();
}

/// A connected STOMP session.
///
/// A background task reads frames and routes MESSAGE frames to
/// subscriptions by their `subscription` header. Losing the connection
/// closes every subscription and fails later calls with
/// [`BrokerError::Closed`].
pub struct StompSession {
    address: String,
    conn: Mutex<Option<Arc<Connection>>>,
    routes: Arc<Routes>,
    reader: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl StompSession {
    /// Connect and complete the STOMP handshake within
    /// `config.connect_timeout`.
    pub async fn connect(config: &BrokerConfig) -> BrokerResult<Self> {
        let address = config.address();
        let (login, passcode) = match config.credentials {
            Some(ref creds) => (creds.login.as_str(), creds.passcode.as_str()),
            None => ("", ""),
        };

        let conn = tokio::time::timeout(
            config.connect_timeout,
            Connection::connect(&address, login, passcode, HEART_BEAT),
        )
        .await
        .map_err(|_| BrokerError::Connect(format!("timed out after {:?}", config.connect_timeout)))?
        .map_err(|e| BrokerError::Connect(e.to_string()))?;

        debug!(address = %address, "STOMP session established");

        let conn = Arc::new(conn);
        let routes = Arc::new(Routes::default());
        let reader = tokio::spawn(read_loop(Arc::clone(&conn), Arc::clone(&routes)));

        Ok(Self {
            address,
            conn: Mutex::new(Some(conn)),
            routes,
            reader: Mutex::new(Some(reader)),
            next_id: AtomicU64::new(0),
        })
    }

    /// Broker address this session is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// True after [`disconnect`](BrokerSession::disconnect) or once the
    /// broker dropped the connection.
    pub fn is_closed(&self) -> bool {
        self.routes.is_closed()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn connection(&self) -> BrokerResult<Arc<Connection>> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        lock(&self.conn).clone().ok_or(BrokerError::Closed)
    }

    async fn send<F>(&self, frame: Frame, fail: F) -> BrokerResult<()>
    where
        F: FnOnce(String) -> BrokerError + Send,
    {
        let conn = self.connection()?;
        conn.send_frame(frame)
            .await
            .map_err(|e| fail(format!("{}: {}", self.address, e)))
    }

    fn abort_reader(&self) -> Option<JoinHandle<()>> {
        let handle = lock(&self.reader).take()?;
        handle.abort();
        Some(handle)
    }
}

#[async_trait]
impl BrokerSession for StompSession {
    async fn publish(
        &self,
        destination: &str,
        content_type: &str,
        body: &[u8],
        options: PublishOptions,
    ) -> BrokerResult<()> {
        let mut frame = Frame::new("SEND")
            .header("destination", destination)
            .header("content-type", content_type);
        if options.durable {
            frame = frame.header("persistent", "true");
        }
        let frame = frame.set_body(body.to_vec());

        self.send(frame, |e| {
            BrokerError::Publish(format!("{} via {}", destination, e))
        })
        .await
    }

    async fn subscribe(&self, destination: &str, ack: AckMode) -> BrokerResult<Subscription> {
        let id = self.next_id("sub");
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        // Register before SUBSCRIBE goes out so no early delivery is lost
        if !self.routes.register(id.clone(), tx) {
            return Err(BrokerError::Closed);
        }

        let frame = Frame::new("SUBSCRIBE")
            .header("id", id.as_str())
            .header("destination", destination)
            .header("ack", ack.as_str());

        if let Err(e) = self
            .send(frame, |e| {
                BrokerError::Subscribe(format!("{} via {}", destination, e))
            })
            .await
        {
            self.routes.remove(&id);
            return Err(e);
        }

        debug!(subscription = %id, destination, "subscribed");
        Ok(Subscription::new(SubscriptionId(id), destination, rx))
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> BrokerResult<()> {
        if !self.routes.remove(&id.0) || self.is_closed() {
            return Ok(());
        }

        let frame = Frame::new("UNSUBSCRIBE").header("id", id.0.as_str());
        self.send(frame, |e| BrokerError::Unsubscribe(format!("{} via {}", id, e)))
            .await
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        let conn = lock(&self.conn).take();
        let Some(conn) = conn else {
            return Ok(());
        };

        self.routes.close_all();
        let reader = self.abort_reader();
        if let Some(handle) = reader {
            let _ = handle.await;
        }

        // The reader has released its handle; a concurrent send may not have
        match Arc::try_unwrap(conn) {
            Ok(conn) => {
                let _ = conn.close().await;
                debug!(address = %self.address, "STOMP session closed");
                Ok(())
            }
            Err(_) => Err(BrokerError::Disconnect(format!(
                "{}: connection still in use, dropped without DISCONNECT",
                self.address
            ))),
        }
    }
}

impl Drop for StompSession {
    fn drop(&mut self) {
        self.abort_reader();
        self.routes.close_all();
    }
}
