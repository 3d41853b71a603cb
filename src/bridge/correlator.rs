//! Request/response correlation over the unordered OSC link
//!
//! The transport carries no correlation id of its own. The bridge therefore
//! allows exactly one outstanding request: it is resolved by the next valid
//! inbound reply, or fails on timeout. A second `send` while one is pending
//! fails fast with [`BridgeError::Busy`].
//!
//! When sequence ids are enabled the bridge stamps a `seq` field into object
//! payloads. A host that echoes it lets the bridge recognise and drop orphaned
//! replies to requests that already timed out.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::BridgeConfig;
use super::codec::{self, MAX_DATAGRAM};
use super::command::{Command, Response, SEQ_KEY};
use super::error::{BridgeError, BridgeResult, CodecError};

/// Issuer-side bridge to the host
pub struct Bridge {
    config: BridgeConfig,
    link: Option<Link>,
    shared: Arc<Shared>,
}

struct Link {
    send_socket: UdpSocket,
    target: SocketAddr,
    local_addr: SocketAddr,
    listener: JoinHandle<()>,
}

struct PendingRequest {
    token: u64,
    seq: Option<u64>,
    address: String,
    reply: oneshot::Sender<Response>,
}

struct Shared {
    pending: Mutex<Option<PendingRequest>>,
    stats: Mutex<BridgeStats>,
    next_token: AtomicU64,
}

/// Traffic counters and timestamps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Datagrams sent to the host
    pub sent: u64,
    /// Replies matched to a pending request
    pub received: u64,
    /// Inbound datagrams dropped (malformed, stale or unsolicited)
    pub dropped: u64,
    /// Requests that timed out
    pub timeouts: u64,
    /// Time of the last send
    pub last_sent_at: Option<DateTime<Utc>>,
    /// Time of the last matched reply
    pub last_received_at: Option<DateTime<Utc>>,
}

/// Snapshot of the bridge state
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    /// Whether the transport is open
    pub open: bool,
    /// Local address replies are received on
    pub local_addr: Option<SocketAddr>,
    /// Host address requests are sent to
    pub target: SocketAddr,
    /// Address of the request currently awaiting a reply
    pub pending: Option<String>,
    /// Traffic counters
    pub stats: BridgeStats,
}

impl Bridge {
    /// Create an unopened bridge
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            link: None,
            shared: Arc::new(Shared {
                pending: Mutex::new(None),
                stats: Mutex::new(BridgeStats::default()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Create and open a bridge in one step
    pub async fn connect(config: BridgeConfig) -> BridgeResult<Self> {
        let mut bridge = Self::new(config);
        bridge.open().await?;
        Ok(bridge)
    }

    /// Bind the receive channel and the send channel.
    ///
    /// Opening an already open bridge is a no-op.
    pub async fn open(&mut self) -> BridgeResult<()> {
        if self.link.is_some() {
            return Ok(());
        }

        let recv_socket =
            UdpSocket::bind(SocketAddr::new(self.config.host, self.config.from_host_port)).await?;
        let local_addr = recv_socket.local_addr()?;
        let send_socket = UdpSocket::bind(SocketAddr::new(self.config.host, 0)).await?;
        let target = self.config.target();

        tracing::info!(%target, "OSC client ready");
        tracing::info!(%local_addr, "OSC server listening");

        let listener = tokio::spawn(listen(recv_socket, Arc::clone(&self.shared)));
        self.link = Some(Link {
            send_socket,
            target,
            local_addr,
            listener,
        });
        Ok(())
    }

    /// Close both channels and discard any pending request
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            link.listener.abort();
            self.shared.pending.lock().take();
            tracing::info!("OSC bridge closed");
        }
    }

    /// Whether the transport is open
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Local address replies are received on, once open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.local_addr)
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether a request is awaiting its reply
    pub fn is_pending(&self) -> bool {
        self.shared.pending.lock().is_some()
    }

    /// Snapshot of the bridge state
    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            open: self.is_open(),
            local_addr: self.local_addr(),
            target: self.config.target(),
            pending: self
                .shared
                .pending
                .lock()
                .as_ref()
                .map(|p| p.address.clone()),
            stats: self.shared.stats.lock().clone(),
        }
    }

    /// Send a typed command with the configured timeout policy.
    ///
    /// Batch requests get one replay spacing per layer on top of the base
    /// timeout, since the host answers only after the last layer exists.
    pub async fn call(&self, command: &Command) -> BridgeResult<Response> {
        let payload = command.payload().map_err(CodecError::from)?;
        let mut timeout = self.config.timeout();
        if let Command::Ui(batch) = command {
            let layers = u32::try_from(batch.layers.len()).unwrap_or(u32::MAX);
            timeout += self.config.replay_spacing() * layers;
        }
        self.send(&command.address().path(), &payload, timeout).await
    }

    /// Send one request and wait for the next reply.
    ///
    /// Callers must await each `send` before issuing the next; overlapping
    /// calls fail with [`BridgeError::Busy`].
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        address: &str,
        payload: &T,
        timeout: Duration,
    ) -> BridgeResult<Response> {
        let link = self.link.as_ref().ok_or(BridgeError::NotInitialized)?;

        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        let seq = self.config.sequence_ids.then_some(token);

        let mut payload = serde_json::to_value(payload).map_err(CodecError::from)?;
        if let (Some(seq), Value::Object(map)) = (seq, &mut payload) {
            map.insert(SEQ_KEY.to_string(), Value::from(seq));
        }
        let bytes = codec::encode(address, &payload)?;

        let reply = self.shared.arm(token, seq, address)?;
        let _slot = SlotGuard {
            shared: &self.shared,
            token,
        };

        tracing::info!(address, payload = %payload, "osc send");
        let started = Instant::now();
        link.send_socket.send_to(&bytes, link.target).await?;
        self.shared.record_sent();

        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BridgeError::Closed(address.to_string())),
            Err(_) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                self.shared.stats.lock().timeouts += 1;
                tracing::warn!(address, elapsed_ms, "host response timeout");
                Err(BridgeError::Timeout {
                    address: address.to_string(),
                    elapsed_ms,
                })
            }
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(link) = &self.link {
            link.listener.abort();
        }
    }
}

impl Shared {
    fn arm(
        &self,
        token: u64,
        seq: Option<u64>,
        address: &str,
    ) -> BridgeResult<oneshot::Receiver<Response>> {
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.as_ref() {
            return Err(BridgeError::Busy {
                pending: existing.address.clone(),
                address: address.to_string(),
            });
        }

        let (tx, rx) = oneshot::channel();
        *pending = Some(PendingRequest {
            token,
            seq,
            address: address.to_string(),
            reply: tx,
        });
        Ok(rx)
    }

    fn deliver(&self, response: Response) {
        let mut pending = self.pending.lock();
        let Some(request) = pending.take() else {
            tracing::debug!("no request pending, dropping unsolicited reply");
            self.stats.lock().dropped += 1;
            return;
        };

        if let (Some(expected), Some(got)) = (request.seq, response.seq) {
            if expected != got {
                tracing::warn!(expected, got, "dropping stale reply");
                *pending = Some(request);
                self.stats.lock().dropped += 1;
                return;
            }
        }
        drop(pending);

        {
            let mut stats = self.stats.lock();
            stats.received += 1;
            stats.last_received_at = Some(Utc::now());
        }

        if request.reply.send(response).is_err() {
            tracing::debug!(address = %request.address, "requester went away before reply");
        }
    }

    fn record_sent(&self) {
        let mut stats = self.stats.lock();
        stats.sent += 1;
        stats.last_sent_at = Some(Utc::now());
    }

    fn record_dropped(&self) {
        self.stats.lock().dropped += 1;
    }
}

/// Clears the pending slot when a `send` ends without a matched reply
struct SlotGuard<'a> {
    shared: &'a Shared,
    token: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.shared.pending.lock();
        if pending.as_ref().is_some_and(|p| p.token == self.token) {
            *pending = None;
        }
    }
}

/// Pause applied after a receive error that is not known to be transient
const RECV_BACKOFF: Duration = Duration::from_millis(100);

/// How long the listener waits before receiving again after `err`.
///
/// ICMP-induced resets and interrupted calls retry at once; anything else
/// backs off so a persistent failure cannot spin the task.
fn recv_backoff(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::Interrupted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused => Duration::ZERO,
        _ => RECV_BACKOFF,
    }
}

async fn listen(socket: UdpSocket, shared: Arc<Shared>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                let backoff = recv_backoff(&err);
                if backoff.is_zero() {
                    tracing::debug!(error = %err, "transient receive error");
                } else {
                    tracing::error!(error = %err, ?backoff, "OSC server error");
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }
        };

        let inbound = match codec::decode(&buf[..len]) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::warn!(%peer, error = %err, "failed to parse host response");
                shared.record_dropped();
                continue;
            }
        };

        tracing::info!(address = %inbound.address, payload = %inbound.payload, "osc recv");

        match serde_json::from_value::<Response>(inbound.payload) {
            Ok(response) => shared.deliver(response),
            Err(err) => {
                tracing::warn!(%peer, error = %err, "host response is not a valid envelope");
                shared.record_dropped();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let bridge = Bridge::new(BridgeConfig::default());
        let err = bridge
            .send("/lofi/init", &json!({}), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotInitialized));
        assert!(!bridge.is_pending());
    }

    #[test]
    fn test_stale_seq_keeps_request_pending() {
        let shared = Shared {
            pending: Mutex::new(None),
            stats: Mutex::new(BridgeStats::default()),
            next_token: AtomicU64::new(1),
        };
        let mut rx = shared.arm(2, Some(2), "/lofi/create").unwrap();

        shared.deliver(Response::ok().with_seq(Some(1)));
        assert!(shared.pending.lock().is_some());
        assert!(rx.try_recv().is_err());

        shared.deliver(Response::ok().with_id("osc").with_seq(Some(2)));
        assert!(shared.pending.lock().is_none());
        assert_eq!(rx.try_recv().unwrap().id.as_deref(), Some("osc"));
        assert_eq!(shared.stats.lock().dropped, 1);
    }

    #[test]
    fn test_reply_without_seq_matches_fifo() {
        let shared = Shared {
            pending: Mutex::new(None),
            stats: Mutex::new(BridgeStats::default()),
            next_token: AtomicU64::new(1),
        };
        let mut rx = shared.arm(5, Some(5), "/lofi/map").unwrap();
        shared.deliver(Response::ok().with_parameter("cutoff"));
        assert_eq!(rx.try_recv().unwrap().parameter.as_deref(), Some("cutoff"));
    }

    #[test]
    fn test_recv_errors_back_off_unless_transient() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(recv_backoff(&reset), Duration::ZERO);

        let interrupted = io::Error::from(io::ErrorKind::Interrupted);
        assert_eq!(recv_backoff(&interrupted), Duration::ZERO);

        let broken = io::Error::other("socket gone");
        assert_eq!(recv_backoff(&broken), RECV_BACKOFF);
        assert!(!RECV_BACKOFF.is_zero());
    }

    #[test]
    fn test_arm_while_pending_is_busy() {
        let shared = Shared {
            pending: Mutex::new(None),
            stats: Mutex::new(BridgeStats::default()),
            next_token: AtomicU64::new(1),
        };
        let _rx = shared.arm(1, None, "/lofi/ui").unwrap();
        let err = shared.arm(2, None, "/lofi/wire").unwrap_err();
        assert!(
            matches!(err, BridgeError::Busy { pending, address } if pending == "/lofi/ui" && address == "/lofi/wire")
        );
    }
}
