//! Receive-side state machine: out-of-order buffering and reassembly.
//!
//! [`Receiver`] accepts segments in any order, holds the ones that arrive
//! ahead of the contiguous frontier, and folds them into a
//! [`ReassemblyBuffer`] once the gap before them closes.
//!
//! - Every data segment (new, duplicate, or out of order) is answered with a
//!   cumulative ACK carrying `recv_base`, so the sender sees duplicate ACKs
//!   when something is missing.
//! - The application is notified only when the frontier actually advances.
//! - Probes (no payload) and undecodable datagrams are answered with the
//!   current ACK and never buffered.
//!
//! This module only manages state; all I/O goes through [`ReceiverOps`].

use std::collections::BTreeMap;

use crate::buffer::ReassemblyBuffer;
use crate::ops::ReceiverOps;
use crate::packet;

/// Counters describing the receiver's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Data segments that decoded with a non-empty payload.
    pub segments_received: u64,
    /// Segments discarded because their bytes were already held or delivered.
    pub duplicates: u64,
    /// Probes and undecodable datagrams.
    pub probes: u64,
    /// Bytes handed to the application through [`Receiver::app_recv`].
    pub bytes_delivered: u64,
}

/// Reliable receive-side state for one logical connection.
///
/// ```text
///  app_delivered_upto   recv_base
///          │                │
///  ────────┼────────────────┼─────── ─ ─ ──────▶ seq space
///  consumed│<─ reassembly ─▶│<─ out-of-order ─▶
/// ```
///
/// Invariant: `app_delivered_upto <= recv_base` and the reassembly buffer
/// holds exactly `recv_base - app_delivered_upto` bytes.
///
/// Segments ahead of the frontier are held without limit or eviction, so
/// memory grows with whatever the channel delivers ahead of a gap.
#[derive(Debug)]
pub struct Receiver<O: ReceiverOps> {
    /// Next byte needed to extend the contiguous prefix.
    recv_base: u64,
    /// Bytes already handed to the application.
    app_delivered_upto: u64,
    /// Segments received ahead of `recv_base`, keyed by starting sequence.
    out_of_order: BTreeMap<u64, Vec<u8>>,
    reassembly: ReassemblyBuffer,
    stats: ReceiverStats,
    ops: O,
}

impl<O: ReceiverOps> Receiver<O> {
    /// Create a receiver expecting the stream to start at sequence number 0.
    pub fn new(ops: O) -> Self {
        Self {
            recv_base: 0,
            app_delivered_upto: 0,
            out_of_order: BTreeMap::new(),
            reassembly: ReassemblyBuffer::new(),
            stats: ReceiverStats::default(),
            ops,
        }
    }

    /// Process one raw datagram from the channel.
    pub fn on_packet(&mut self, pkt: &[u8]) {
        let (seq, payload) = match packet::decode(pkt) {
            Ok((seq, payload)) if !payload.is_empty() => (seq, payload),
            Ok(_) => return self.answer_probe(),
            Err(e) => {
                log::debug!("[rdt:receiver] undecodable datagram ({e}); treating as probe");
                return self.answer_probe();
            }
        };
        let Some(end) = seq.checked_add(payload.len() as u64) else {
            log::debug!("[rdt:receiver] segment seq={seq} runs past the sequence space; treating as probe");
            return self.answer_probe();
        };
        self.stats.segments_received += 1;

        if end > self.app_delivered_upto {
            self.insert(seq, payload);
        } else {
            self.stats.duplicates += 1;
        }

        let added = self.fold_contiguous();
        self.ops.send_ack(self.recv_base);
        log::debug!(
            "[rdt:receiver] ← DATA seq={seq} len={} added={added}; → ACK ack={}",
            payload.len(),
            self.recv_base
        );

        if added > 0 {
            self.ops.notify_app();
        }
    }

    /// Copy up to `buf.len()` in-order bytes into `buf`.
    ///
    /// Non-blocking: returns 0 when nothing is ready.  Call again to drain
    /// any remainder.
    pub fn app_recv(&mut self, buf: &mut [u8]) -> usize {
        let n = self.reassembly.read(buf);
        self.app_delivered_upto += n as u64;
        self.stats.bytes_delivered += n as u64;
        self.reassembly.shrink_if_empty();
        n
    }

    fn answer_probe(&mut self) {
        self.stats.probes += 1;
        log::trace!("[rdt:receiver] ← probe; → ACK ack={}", self.recv_base);
        self.ops.send_ack(self.recv_base);
    }

    /// Hold a segment until the gap before it closes.
    ///
    /// Bytes below `recv_base` are trimmed first; a segment starting where
    /// one is already held is a duplicate.
    fn insert(&mut self, seq: u64, payload: &[u8]) {
        let (seq, payload) = if seq < self.recv_base {
            let overlap = (self.recv_base - seq) as usize;
            if overlap >= payload.len() {
                self.stats.duplicates += 1;
                return;
            }
            (self.recv_base, &payload[overlap..])
        } else {
            (seq, payload)
        };

        if self.out_of_order.contains_key(&seq) {
            self.stats.duplicates += 1;
            return;
        }

        let mut copy = Vec::new();
        if copy.try_reserve_exact(payload.len()).is_err() {
            log::warn!("[rdt:receiver] could not buffer segment seq={seq}; dropping");
            return;
        }
        copy.extend_from_slice(payload);
        self.out_of_order.insert(seq, copy);
    }

    /// Move every held segment that touches the frontier into the reassembly
    /// buffer.  Returns the number of bytes appended.
    fn fold_contiguous(&mut self) -> usize {
        let mut added = 0usize;
        while let Some(entry) = self.out_of_order.first_entry() {
            let seq = *entry.key();
            if seq > self.recv_base {
                break;
            }
            // `on_packet` only admits segments whose end fits in `u64`.
            let end = seq + entry.get().len() as u64;
            if end <= self.recv_base {
                entry.remove();
                continue;
            }

            let skip = (self.recv_base - seq) as usize;
            if !self.reassembly.try_append(&entry.get()[skip..]) {
                log::warn!("[rdt:receiver] reassembly buffer full at recv_base={}", self.recv_base);
                break;
            }
            added += entry.get().len() - skip;
            self.recv_base = end;
            entry.remove();
        }
        added
    }

    /// Next sequence number needed to extend the contiguous prefix.
    pub fn recv_base(&self) -> u64 {
        self.recv_base
    }

    pub fn app_delivered_upto(&self) -> u64 {
        self.app_delivered_upto
    }

    /// Bytes reassembled but not yet consumed by the application.
    pub fn buffered(&self) -> usize {
        self.reassembly.len()
    }

    /// Number of segments held ahead of the frontier.
    pub fn out_of_order(&self) -> usize {
        self.out_of_order.len()
    }

    pub fn stats(&self) -> ReceiverStats {
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
