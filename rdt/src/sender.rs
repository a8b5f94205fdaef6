//! Send-side state machine: cumulative-ACK sliding window, one timer.
//!
//! [`Sender`] numbers every outgoing byte, keeps a copy of each transmitted
//! segment until a cumulative ACK covers it, and drives a single
//! retransmission timer through its [`SenderOps`] collaborator.
//!
//! # Protocol contract
//!
//! - Sequence numbers are absolute byte offsets (`u64`, no wrap-around).
//! - ACKs are **cumulative**: `ackno = K` means the receiver holds every byte
//!   with sequence `< K`.
//! - Every ACK restarts the timer while data is outstanding, even one that
//!   acknowledges nothing new; the timer stops once everything is acked.
//! - On timeout only the single segment covering `send_base` is resent, not
//!   the whole window.
//!
//! This module only manages state; all I/O goes through [`SenderOps`].

use std::collections::VecDeque;

use crate::ops::SenderOps;
use crate::packet;

// ---------------------------------------------------------------------------
// OutstandingSegment
// ---------------------------------------------------------------------------

/// A transmitted segment that is not yet cumulatively acknowledged.
#[derive(Debug, Clone)]
struct OutstandingSegment {
    /// Sequence number of the first payload byte.
    seq: u64,
    /// The full encoded packet (header + payload), ready to resend verbatim.
    packet: Vec<u8>,
    /// Number of times this segment has been transmitted (1 = first send).
    tx_count: u32,
}

impl OutstandingSegment {
    fn payload_len(&self) -> u64 {
        (self.packet.len() - packet::PACKET_HEADER_LEN) as u64
    }

    /// First sequence number after this segment's payload.
    fn end(&self) -> u64 {
        self.seq + self.payload_len()
    }

    fn contains(&self, seq: u64) -> bool {
        self.seq <= seq && seq < self.end()
    }
}

/// Counters describing the sender's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Segments transmitted for the first time.
    pub segments_sent: u64,
    /// Segments resent after a timeout.
    pub retransmissions: u64,
    /// ACKs processed, whether or not they advanced the window.
    pub acks_received: u64,
    /// ACKs that acknowledged nothing new.
    pub duplicate_acks: u64,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Reliable send-side state for one logical connection.
///
/// # Sequence-number layout
///
/// ```text
///  send_base          next_seqno
///      │                  │
///  ────┼──────────────────┼──────────────────▶ seq space
///      │ <── in flight ──▶│ <── unsent ─────▶
/// ```
///
/// Invariant: `send_base <= next_seqno`, and the outstanding segments cover
/// `[send_base, next_seqno)` in increasing order.
#[derive(Debug)]
pub struct Sender<O: SenderOps> {
    /// Lowest unacknowledged byte.
    send_base: u64,
    /// Sequence number assigned to the next outgoing byte.
    next_seqno: u64,
    timer_running: bool,
    /// Unacked segments ordered by sequence number (front = oldest).
    outstanding: VecDeque<OutstandingSegment>,
    stats: SenderStats,
    ops: O,
}

impl<O: SenderOps> Sender<O> {
    /// Create an idle sender whose first byte will carry sequence number 0.
    pub fn new(ops: O) -> Self {
        Self {
            send_base: 0,
            next_seqno: 0,
            timer_running: false,
            outstanding: VecDeque::new(),
            stats: SenderStats::default(),
            ops,
        }
    }

    /// Transmit `data` as one segment and retain it until acknowledged.
    ///
    /// Empty input is a no-op.  Exactly one transmission and at most one
    /// timer start happen per call.
    pub fn send(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let seq = self.next_seqno;
        let pkt = match packet::build_packet(seq, data) {
            Ok(pkt) => pkt,
            Err(e) => {
                log::warn!("[rdt:sender] dropping {} byte(s) at seq={seq}: {e}", data.len());
                return;
            }
        };

        self.ops.transmit(&pkt);
        self.stats.segments_sent += 1;

        // A segment we cannot retain behaves like one the channel lost.
        if self.outstanding.try_reserve(1).is_ok() {
            self.outstanding.push_back(OutstandingSegment {
                seq,
                packet: pkt,
                tx_count: 1,
            });
        } else {
            log::warn!("[rdt:sender] could not retain segment seq={seq}");
        }

        self.next_seqno += data.len() as u64;
        log::debug!(
            "[rdt:sender] → DATA seq={seq} len={} in_flight={}",
            data.len(),
            self.outstanding.len()
        );

        if !self.timer_running {
            self.ops.start_timer();
            self.timer_running = true;
        }
    }

    /// Process a cumulative ACK.
    ///
    /// An `ackno` at or below `send_base` changes nothing but still restarts
    /// the timer when data is outstanding.  An `ackno` beyond `next_seqno`
    /// acknowledges bytes that were never sent and is likewise ignored.
    pub fn on_ack(&mut self, ackno: u64) {
        self.stats.acks_received += 1;

        if ackno > self.send_base && ackno <= self.next_seqno {
            self.send_base = ackno;
            let before = self.outstanding.len();
            while self
                .outstanding
                .front()
                .is_some_and(|seg| seg.end() <= ackno)
            {
                self.outstanding.pop_front();
            }
            log::debug!(
                "[rdt:sender] ← ACK ack={ackno} (slid {} seg)",
                before - self.outstanding.len()
            );
        } else {
            self.stats.duplicate_acks += 1;
            if ackno > self.next_seqno {
                log::warn!(
                    "[rdt:sender] ignoring ACK {ackno} beyond next_seqno={}",
                    self.next_seqno
                );
            } else {
                log::trace!("[rdt:sender] ← dup ACK ack={ackno}");
            }
        }

        if self.is_idle() {
            if self.timer_running {
                self.ops.stop_timer();
                self.timer_running = false;
            }
        } else {
            self.restart_timer();
        }
    }

    /// Retransmit the segment covering `send_base` and restart the timer.
    ///
    /// With nothing retained there is nothing to resend; the timer is
    /// stopped instead.
    pub fn on_timeout(&mut self) {
        let send_base = self.send_base;
        let Some(idx) = self
            .outstanding
            .iter()
            .position(|seg| seg.contains(send_base))
            .or_else(|| (!self.outstanding.is_empty()).then_some(0))
        else {
            // Nothing retained to resend; leave no timer claimed as running.
            if self.timer_running {
                self.ops.stop_timer();
                self.timer_running = false;
            }
            return;
        };

        let seg = &mut self.outstanding[idx];
        seg.tx_count += 1;
        log::debug!(
            "[rdt:sender] timeout, retransmitting seq={} len={} (tx #{})",
            seg.seq,
            seg.payload_len(),
            seg.tx_count
        );
        self.ops.transmit(&seg.packet);
        self.stats.retransmissions += 1;
        self.restart_timer();
    }

    fn restart_timer(&mut self) {
        if self.timer_running {
            self.ops.stop_timer();
        }
        self.ops.start_timer();
        self.timer_running = true;
    }

    /// Lowest unacknowledged byte.
    pub fn send_base(&self) -> u64 {
        self.send_base
    }

    /// Sequence number the next sent byte will carry.
    pub fn next_seqno(&self) -> u64 {
        self.next_seqno
    }

    pub fn timer_running(&self) -> bool {
        self.timer_running
    }

    /// Number of segments awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.outstanding.len()
    }

    /// `true` when every sent byte has been acknowledged.
    pub fn is_idle(&self) -> bool {
        self.send_base == self.next_seqno
    }

    /// Iterate `(seq, payload_len, tx_count)` over the outstanding segments,
    /// oldest first.
    pub fn outstanding(&self) -> impl Iterator<Item = (u64, u64, u32)> + '_ {
        self.outstanding
            .iter()
            .map(|seg| (seg.seq, seg.payload_len(), seg.tx_count))
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut O {
        &mut self.ops
    }

    pub fn into_ops(self) -> O {
        self.ops
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
