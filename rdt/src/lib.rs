//! `rdt`: reliable byte-stream delivery over an unreliable datagram channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   data segments  ┌──────────┐
//!  │  Sender  │─────────────────▶│ Receiver │──▶ app_recv()
//!  └────┬─────┘                  └─────┬────┘
//!       │ ▲     cumulative ACKs        │
//!       │ └────────────────────────────┘
//!       │ start/stop
//!  ┌────▼─────┐
//!  │  timer   │──▶ on_timeout()
//!  └──────────┘
//! ```
//!
//! The sender numbers every byte, keeps unacknowledged segments, and resends
//! the segment at the left window edge when its single timer fires.  The
//! receiver buffers out-of-order segments, reassembles the contiguous prefix,
//! and hands it to the application on demand.  Both are plain state machines
//! driven one event at a time through `&mut self`; a host that spans threads
//! wraps each instance in a `Mutex`.
//!
//! Each module has a single responsibility:
//! - [`packet`]: wire format (data segments and ACKs)
//! - [`ops`]: collaborator traits through which all side effects flow
//! - [`buffer`]: growable reassembly buffer
//! - [`sender`]: send-side sliding window and retransmission
//! - [`receiver`]: receive-side buffering and in-order delivery
//! - [`simulator`]: seeded loss/reorder/duplicate/corrupt network model
//! - [`config`]: session tunables
//! - [`timer`]: one-shot retransmission timer (tokio)
//! - [`socket`]: async UDP socket abstraction
//! - [`session`]: tokio event loops driving sender and receiver over UDP
//! - [`error`]: session-layer errors

pub mod buffer;
pub mod config;
pub mod error;
pub mod ops;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod timer;

pub use config::SessionConfig;
pub use error::SessionError;
pub use ops::{ReceiverOps, SenderOps};
pub use receiver::{Receiver, ReceiverStats};
pub use sender::{Sender, SenderStats};
pub use session::{ReceiverSession, SenderSession};
pub use simulator::{Simulator, SimulatorConfig};
