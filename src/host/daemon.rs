//! Host daemon loop
//!
//! A single cooperative task that owns the dispatcher. It waits on either the
//! next inbound datagram or the next replay tick, never both at once, so only
//! one host operation runs at a time. Replies always go to the configured
//! reply address.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::HostConfig;
use super::dispatcher::{Dispatcher, Outcome};
use super::model::Host;
use crate::bridge::codec::{self, MAX_DATAGRAM};
use crate::bridge::command::{RESPONSE_ADDRESS, Response};

/// UDP front end for a [`Dispatcher`]
pub struct HostDaemon<H: Host> {
    socket: UdpSocket,
    reply_to: SocketAddr,
    tick_delay: Duration,
    dispatcher: Dispatcher<H>,
}

impl<H: Host> HostDaemon<H> {
    /// Bind the listen address
    pub async fn bind(config: &HostConfig, host: H) -> io::Result<Self> {
        let socket = UdpSocket::bind(config.listen).await?;
        let listen = socket.local_addr()?;
        tracing::info!(%listen, reply_to = %config.reply_to, "host daemon bound");
        Ok(Self {
            socket,
            reply_to: config.reply_to,
            tick_delay: config.tick_delay(),
            dispatcher: Dispatcher::new(host),
        })
    }

    /// Address commands are received on
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Redirect replies
    pub fn set_reply_to(&mut self, addr: SocketAddr) {
        self.reply_to = addr;
    }

    /// Dispatcher state
    pub fn dispatcher(&self) -> &Dispatcher<H> {
        &self.dispatcher
    }

    /// Serve until `shutdown` resolves, then hand back the dispatcher
    pub async fn run_until<F>(mut self, shutdown: F) -> io::Result<Dispatcher<H>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut next_tick = Instant::now();

        loop {
            let replaying = self.dispatcher.replay_active();
            tokio::select! {
                _ = &mut shutdown => break,
                received = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(received) => received,
                        Err(err) => {
                            tracing::warn!(error = %err, "receive failed");
                            continue;
                        }
                    };
                    tracing::debug!(%peer, len, "datagram received");
                    match self.dispatcher.handle_datagram(&buf[..len]) {
                        Outcome::Reply(response) => self.respond(&response).await,
                        // First tick fires right away, later ones are spaced.
                        Outcome::Deferred => next_tick = Instant::now(),
                    }
                }
                _ = tokio::time::sleep_until(next_tick), if replaying => {
                    if let Some(response) = self.dispatcher.tick() {
                        self.respond(&response).await;
                    }
                    next_tick = Instant::now() + self.tick_delay;
                }
            }
        }

        tracing::info!("host daemon stopped");
        Ok(self.dispatcher)
    }

    async fn respond(&self, response: &Response) {
        let bytes = match codec::encode(RESPONSE_ADDRESS, response) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode reply");
                return;
            }
        };
        if let Err(err) = self.socket.send_to(&bytes, self.reply_to).await {
            tracing::warn!(reply_to = %self.reply_to, error = %err, "failed to send reply");
        }
    }
}
