//! tokio event loops that run a [`Sender`] or [`Receiver`] over UDP.
//!
//! # Architecture
//!
//! ```text
//!  Application                     SenderSession               ReceiverSession              Application
//!      │ send(data)  ┌────────────────────────────┐        ┌───────────────────────┐   recv()    ▲
//!      └───────────▶ │ Sender ── Outbox ── Sim ───┼──DATA─▶│ Receiver ── Outbox ───┼───────────┘
//!                    │   ▲           RetransmitTimer◀──ACK─┼── Sim                 │
//!                    └───┼────────────────────────┘        └───────────────────────┘
//!                      on_ack / on_timeout
//! ```
//!
//! The state machines only record side effects in an outbox (their
//! [`SenderOps`] / [`ReceiverOps`] collaborator).  After every event the loop
//! flushes the outbox: datagrams go through the [`Simulator`] and the
//! [`Socket`], timer commands arm or cancel the [`RetransmitTimer`].
//!
//! A receiver session serves the first address that reaches it and drops
//! datagrams from any other source.
//!
//! ```ignore
//! let tx = SenderSession::spawn(Socket::bind(any).await?, peer, SessionConfig::default());
//! tx.send(b"hello".to_vec()).await?;
//! let stats = tx.finish().await?;
//! ```

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::ops::{ReceiverOps, SenderOps};
use crate::packet;
use crate::receiver::{Receiver, ReceiverStats};
use crate::sender::{Sender, SenderStats};
use crate::simulator::Simulator;
use crate::socket::Socket;
use crate::timer::RetransmitTimer;

const CHANNEL_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Outboxes
// ---------------------------------------------------------------------------

/// Timer command left by the sender; the last one in an event wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerCommand {
    Arm,
    Cancel,
}

#[derive(Debug, Default)]
struct SendOutbox {
    datagrams: Vec<Vec<u8>>,
    timer: Option<TimerCommand>,
}

impl SenderOps for SendOutbox {
    fn transmit(&mut self, packet: &[u8]) {
        self.datagrams.push(packet.to_vec());
    }

    fn start_timer(&mut self) {
        self.timer = Some(TimerCommand::Arm);
    }

    fn stop_timer(&mut self) {
        self.timer = Some(TimerCommand::Cancel);
    }
}

#[derive(Debug, Default)]
struct RecvOutbox {
    acks: Vec<u64>,
    notified: bool,
}

impl ReceiverOps for RecvOutbox {
    fn send_ack(&mut self, ackno: u64) {
        self.acks.push(ackno);
    }

    fn notify_app(&mut self) {
        self.notified = true;
    }
}

/// Push one datagram through the fault model and onto the wire.
///
/// Send failures are logged and otherwise treated as channel loss.
async fn emit(socket: &Socket, sim: &mut Simulator, datagram: &[u8], dest: SocketAddr) {
    for wire in sim.process(datagram) {
        if let Err(e) = socket.send_to(&wire, dest).await {
            log::warn!("[rdt:session] send to {dest} failed: {e}");
        }
    }
}

/// Some platforms surface ICMP unreachable errors on the next `recv_from`;
/// those are transient for a connectionless protocol.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}

// ---------------------------------------------------------------------------
// SenderSession
// ---------------------------------------------------------------------------

/// Handle to a background task streaming bytes to one peer.
pub struct SenderSession {
    data_tx: mpsc::Sender<Vec<u8>>,
    handle: JoinHandle<Result<SenderStats, SessionError>>,
}

impl SenderSession {
    /// Spawn the sender event loop on the current tokio runtime.
    pub fn spawn(socket: Socket, peer: SocketAddr, config: SessionConfig) -> Self {
        let (data_tx, data_rx) = mpsc::channel(CHANNEL_DEPTH);
        let handle = tokio::spawn(sender_loop(socket, peer, config, data_rx));
        Self { data_tx, handle }
    }

    /// Queue `data` for reliable delivery.
    ///
    /// Waits only when the session is backlogged.  Fails if the background
    /// task has already stopped.
    pub async fn send(&self, data: Vec<u8>) -> Result<(), SessionError> {
        self.data_tx
            .send(data)
            .await
            .map_err(|_| SessionError::TaskFailed)
    }

    /// Close the input and wait until every queued byte is acknowledged.
    pub async fn finish(self) -> Result<SenderStats, SessionError> {
        drop(self.data_tx);
        self.handle.await.map_err(|_| SessionError::TaskFailed)?
    }
}

async fn sender_loop(
    socket: Socket,
    peer: SocketAddr,
    config: SessionConfig,
    mut app_rx: mpsc::Receiver<Vec<u8>>,
) -> Result<SenderStats, SessionError> {
    let mut sender = Sender::new(SendOutbox::default());
    let mut sim = Simulator::new(config.faults.clone());
    let mut timer = RetransmitTimer::new(config.rto);
    let segment_len = config.max_segment_len.max(1);
    let window = config.window_segments.max(1);

    // Application data already split into segments but not yet handed to the sender.
    let mut backlog: VecDeque<Vec<u8>> = VecDeque::new();
    let mut app_open = true;
    let mut timeouts = 0u32;

    loop {
        while sender.in_flight() < window {
            let Some(chunk) = backlog.pop_front() else {
                break;
            };
            sender.send(&chunk);
        }

        let outbox = sender.ops_mut();
        match outbox.timer.take() {
            Some(TimerCommand::Arm) => timer.arm(),
            Some(TimerCommand::Cancel) => timer.cancel(),
            None => {}
        }
        for datagram in std::mem::take(&mut outbox.datagrams) {
            emit(&socket, &mut sim, &datagram, peer).await;
        }

        if !app_open && backlog.is_empty() && sender.is_idle() {
            log::debug!(
                "[rdt:session] all {} byte(s) acknowledged by {peer}",
                sender.next_seqno()
            );
            return Ok(sender.stats());
        }

        tokio::select! {
            maybe_data = app_rx.recv(), if app_open && backlog.is_empty() => {
                match maybe_data {
                    Some(data) => backlog.extend(data.chunks(segment_len).map(<[u8]>::to_vec)),
                    None => {
                        log::debug!("[rdt:session] application closed the stream");
                        app_open = false;
                    }
                }
            }

            result = socket.recv_from() => {
                let (datagram, addr) = match result {
                    Ok(v) => v,
                    Err(e) if is_transient(&e) => continue,
                    Err(e) => return Err(e.into()),
                };
                if addr != peer {
                    continue;
                }
                match packet::decode_ack(&datagram) {
                    Ok(ackno) => {
                        let before = sender.send_base();
                        sender.on_ack(ackno);
                        if sender.send_base() > before {
                            timeouts = 0;
                        }
                    }
                    Err(e) => log::debug!("[rdt:session] ignoring bad ACK from {addr}: {e}"),
                }
            }

            _ = timer.expired() => {
                timeouts += 1;
                if timeouts > config.max_retransmits {
                    log::warn!("[rdt:session] {peer} stopped acknowledging; giving up");
                    return Err(SessionError::PeerUnresponsive(config.max_retransmits));
                }
                sender.on_timeout();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ReceiverSession
// ---------------------------------------------------------------------------

/// Handle to a background task reassembling the stream arriving on a socket.
pub struct ReceiverSession {
    data_rx: mpsc::Receiver<Vec<u8>>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<ReceiverStats, SessionError>>,
}

impl ReceiverSession {
    /// Spawn the receiver event loop on the current tokio runtime.
    pub fn spawn(socket: Socket, config: SessionConfig) -> Self {
        let (data_tx, data_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(receiver_loop(socket, config, data_tx, shutdown_rx));
        Self {
            data_rx,
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    /// Next in-order chunk of the stream, or `None` once the session ended.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.data_rx.recv().await
    }

    /// Ask the background task to stop without waiting for the idle timeout.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Stop the session and collect its statistics.
    ///
    /// Bytes not yet read through [`recv`](Self::recv) are discarded.
    pub async fn finish(mut self) -> Result<ReceiverStats, SessionError> {
        self.shutdown();
        drop(self.data_rx);
        self.handle.await.map_err(|_| SessionError::TaskFailed)?
    }
}

async fn receiver_loop(
    socket: Socket,
    config: SessionConfig,
    app_tx: mpsc::Sender<Vec<u8>>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<ReceiverStats, SessionError> {
    let mut receiver = Receiver::new(RecvOutbox::default());
    let mut sim = Simulator::new(config.faults.clone());
    let mut chunk = vec![0u8; config.read_chunk.max(1)];
    let mut peer: Option<SocketAddr> = None;

    loop {
        let idle = tokio::time::sleep(config.idle_timeout);

        tokio::select! {
            _ = &mut shutdown => {
                log::debug!("[rdt:session] receiver shut down");
                break;
            }

            _ = idle, if peer.is_some() => {
                log::debug!(
                    "[rdt:session] idle for {:?}; closing at recv_base={}",
                    config.idle_timeout,
                    receiver.recv_base()
                );
                break;
            }

            result = socket.recv_from() => {
                let (datagram, addr) = match result {
                    Ok(v) => v,
                    Err(e) if is_transient(&e) => continue,
                    Err(e) => return Err(e.into()),
                };
                match peer {
                    Some(p) if p != addr => {
                        log::debug!("[rdt:session] ignoring datagram from {addr}; bound to {p}");
                        continue;
                    }
                    Some(_) => {}
                    None => {
                        log::debug!("[rdt:session] receiving from {addr}");
                        peer = Some(addr);
                    }
                }
                receiver.on_packet(&datagram);

                let outbox = receiver.ops_mut();
                let acks = std::mem::take(&mut outbox.acks);
                let notified = std::mem::take(&mut outbox.notified);
                for ackno in acks {
                    emit(&socket, &mut sim, &packet::encode_ack(ackno), addr).await;
                }

                if notified {
                    loop {
                        let n = receiver.app_recv(&mut chunk);
                        if n == 0 {
                            break;
                        }
                        if app_tx.send(chunk[..n].to_vec()).await.is_err() {
                            log::debug!("[rdt:session] application stopped reading");
                            return Ok(receiver.stats());
                        }
                    }
                }
            }
        }
    }

    Ok(receiver.stats())
}
