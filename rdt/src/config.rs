//! Tunables for the tokio session layer.

use std::time::Duration;

use crate::simulator::SimulatorConfig;

/// Session parameters.  The protocol core itself has none.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Fixed retransmission timeout.
    pub rto: Duration,
    /// Largest payload placed in one data segment.
    pub max_segment_len: usize,
    /// Segments the sender session keeps in flight before it stops pulling
    /// application data.
    pub window_segments: usize,
    /// Consecutive timeouts without progress before the peer is declared gone.
    pub max_retransmits: u32,
    /// Receiver session ends after this long without a datagram once data
    /// has started flowing.
    pub idle_timeout: Duration,
    /// Largest chunk the receiver session pulls per `app_recv` call.
    pub read_chunk: usize,
    /// Faults applied to this side's outgoing datagrams.
    pub faults: SimulatorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rto: Duration::from_millis(200),
            max_segment_len: 1024,
            window_segments: 32,
            max_retransmits: 10,
            idle_timeout: Duration::from_secs(5),
            read_chunk: 4096,
            faults: SimulatorConfig::default(),
        }
    }
}
