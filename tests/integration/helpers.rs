//! In-process fake STOMP broker.
//!
//! Speaks just enough STOMP over a loopback socket to exercise the real
//! client: CONNECT, SEND, SUBSCRIBE, UNSUBSCRIBE, DISCONNECT. Each client
//! connection gets its own queue state.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use stomp_probe::config::{BrokerConfig, Credentials, ProbeConfig};

/// How the fake broker treats its clients.
#[derive(Clone, Default)]
pub struct Behavior {
    /// Deliver sent messages to subscribers of the same destination.
    pub echo: bool,
    /// Unrelated messages delivered ahead of each echoed one.
    pub noise_before_echo: usize,
    /// Reject CONNECT unless these credentials are presented.
    pub require_login: Option<Credentials>,
    /// Never answer CONNECT.
    pub silent_handshake: bool,
    /// Drop the connection right after answering CONNECTED.
    pub close_after_connected: bool,
    /// Answer SUBSCRIBE with an ERROR frame carrying this message.
    pub error_on_subscribe: Option<String>,
    /// Drop the connection right after a SUBSCRIBE.
    pub close_after_subscribe: bool,
    /// Write these bytes after a SUBSCRIBE, then drop the connection.
    pub raw_after_subscribe: Option<Vec<u8>>,
}

/// A frame as the fake broker received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ReceivedFrame {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn parse(raw: &[u8]) -> Option<Self> {
        let start = raw.iter().position(|b| *b != b'\n' && *b != b'\r')?;
        let raw = &raw[start..];
        let split = raw.windows(2).position(|w| w == b"\n\n")?;
        let head = std::str::from_utf8(&raw[..split]).ok()?;
        let body = raw[split + 2..].to_vec();

        let mut lines = head.lines().map(|l| l.trim_end_matches('\r'));
        let command = lines.next()?.to_string();
        let headers = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Some(Self {
            command,
            headers,
            body,
        })
    }
}

#[allow(dead_code)]
pub struct FakeBroker {
    pub addr: SocketAddr,
    frames: Arc<Mutex<Vec<ReceivedFrame>>>,
}

#[allow(dead_code)]
impl FakeBroker {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake broker");
        let addr = listener.local_addr().expect("local addr");
        let frames = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&frames);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, behavior.clone(), Arc::clone(&recorded)));
            }
        });

        Self { addr, frames }
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::new(self.addr.ip().to_string(), self.addr.port())
            .with_connect_timeout(Duration::from_secs(2))
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig::new(self.broker_config()).with_deadline(Duration::from_secs(5))
    }

    /// Every frame received so far, in order.
    pub fn frames(&self) -> Vec<ReceivedFrame> {
        self.frames.lock().unwrap().clone()
    }

    /// Received frames with the given command.
    pub fn frames_named(&self, command: &str) -> Vec<ReceivedFrame> {
        self.frames()
            .into_iter()
            .filter(|f| f.command == command)
            .collect()
    }

    /// The handshake frame, whichever of CONNECT or STOMP the client used.
    pub fn connect_frame(&self) -> Option<ReceivedFrame> {
        self.frames()
            .into_iter()
            .find(|f| f.command == "CONNECT" || f.command == "STOMP")
    }

    /// Wait until at least `count` frames named `command` arrived.
    /// Client writes are queued, so they can land after the call returns.
    pub async fn wait_for(&self, command: &str, count: usize) -> Vec<ReceivedFrame> {
        for _ in 0..200 {
            let frames = self.frames_named(command);
            if frames.len() >= count {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.frames_named(command)
    }
}

/// A port nothing listens on.
#[allow(dead_code)]
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn encode(command: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("{}\n", command).into_bytes();
    for (k, v) in headers {
        out.extend_from_slice(format!("{}:{}\n", k, v).as_bytes());
    }
    if !body.is_empty() {
        out.extend_from_slice(format!("content-length:{}\n", body.len()).as_bytes());
    }
    out.push(b'\n');
    out.extend_from_slice(body);
    out.push(0);
    out
}

async fn write_frame(w: &mut OwnedWriteHalf, command: &str, headers: &[(&str, &str)], body: &[u8]) {
    let _ = w.write_all(&encode(command, headers, body)).await;
}

async fn deliver(
    w: &mut OwnedWriteHalf,
    sub_id: &str,
    destination: &str,
    n: usize,
    content_type: &str,
    body: &[u8],
) {
    let message_id = format!("ID:fake-broker:{}", n);
    let headers = [
        ("subscription", sub_id),
        ("destination", destination),
        ("message-id", message_id.as_str()),
        ("content-type", content_type),
    ];
    write_frame(w, "MESSAGE", &headers, body).await;
}

async fn serve(stream: TcpStream, behavior: Behavior, recorded: Arc<Mutex<Vec<ReceivedFrame>>>) {
    let (r, mut w) = stream.into_split();
    let mut reader = BufReader::new(r);
    // destination -> pending bodies (content-type, body)
    let mut pending: HashMap<String, Vec<(String, Vec<u8>)>> = HashMap::new();
    // subscription id -> destination
    let mut subscriptions: HashMap<String, String> = HashMap::new();
    let mut counter = 0usize;
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match reader.read_until(0, &mut raw).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        raw.pop();
        let Some(frame) = ReceivedFrame::parse(&raw) else {
            continue;
        };
        recorded.lock().unwrap().push(frame.clone());

        match frame.command.as_str() {
            "CONNECT" | "STOMP" => {
                if behavior.silent_handshake {
                    continue;
                }
                if let Some(ref creds) = behavior.require_login {
                    let ok = frame.get("login") == Some(creds.login.as_str())
                        && frame.get("passcode") == Some(creds.passcode.as_str());
                    if !ok {
                        write_frame(
                            &mut w,
                            "ERROR",
                            &[("message", "Authentication failed")],
                            b"User name or password is invalid.",
                        )
                        .await;
                        return;
                    }
                }
                write_frame(
                    &mut w,
                    "CONNECTED",
                    &[("version", "1.2"), ("server", "fake-broker/1.0")],
                    b"",
                )
                .await;
                if behavior.close_after_connected {
                    return;
                }
            }
            "SEND" => {
                if !behavior.echo {
                    continue;
                }
                let destination = frame.get("destination").unwrap_or_default().to_string();
                let content_type = frame.get("content-type").unwrap_or_default().to_string();
                pending
                    .entry(destination)
                    .or_default()
                    .push((content_type, frame.body.clone()));
            }
            "SUBSCRIBE" => {
                let id = frame.get("id").unwrap_or_default().to_string();
                let destination = frame.get("destination").unwrap_or_default().to_string();
                subscriptions.insert(id, destination);
                if let Some(ref error) = behavior.error_on_subscribe {
                    write_frame(&mut w, "ERROR", &[("message", error.as_str())], b"").await;
                    continue;
                }
                if let Some(ref bytes) = behavior.raw_after_subscribe {
                    let _ = w.write_all(bytes).await;
                    return;
                }
                if behavior.close_after_subscribe {
                    return;
                }
            }
            "UNSUBSCRIBE" => {
                if let Some(id) = frame.get("id") {
                    subscriptions.remove(id);
                }
            }
            "DISCONNECT" => {
                if let Some(receipt) = frame.get("receipt") {
                    write_frame(&mut w, "RECEIPT", &[("receipt-id", receipt)], b"").await;
                }
                return;
            }
            _ => {}
        }

        // Flush queued messages to whoever is subscribed now
        let subs: Vec<(String, String)> = subscriptions
            .iter()
            .map(|(id, dest)| (id.clone(), dest.clone()))
            .collect();
        for (sub_id, destination) in subs {
            let Some(queued) = pending.remove(&destination) else {
                continue;
            };
            for (content_type, body) in queued {
                for i in 0..behavior.noise_before_echo {
                    counter += 1;
                    let noise = format!("noise-{}", i);
                    deliver(&mut w, &sub_id, &destination, counter, "text/plain", noise.as_bytes())
                        .await;
                }
                counter += 1;
                deliver(&mut w, &sub_id, &destination, counter, &content_type, &body).await;
            }
        }
    }
}
