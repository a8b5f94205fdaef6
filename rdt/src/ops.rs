//! Collaborator contracts for the protocol state machines.
//!
//! [`crate::sender::Sender`] and [`crate::receiver::Receiver`] never touch a
//! socket or a clock.  Every side effect goes through one of these traits, so
//! the same state machines run under the tokio session layer, the in-memory
//! simulator used by the tests, or any other event driver.
//!
//! All methods are best-effort and infallible from the protocol's point of
//! view: a transmission that never reaches the peer is indistinguishable from
//! channel loss and is recovered by retransmission.

/// Side effects requested by the sender.
pub trait SenderOps {
    /// Hand a complete data segment to the unreliable channel.
    ///
    /// The channel may drop, reorder, or duplicate it.
    fn transmit(&mut self, packet: &[u8]);

    /// Arm the one-shot retransmission timer.
    ///
    /// When it fires the driver calls [`crate::sender::Sender::on_timeout`].
    fn start_timer(&mut self);

    /// Disarm the retransmission timer.  Stopping an idle timer is a no-op.
    fn stop_timer(&mut self);
}

/// Side effects requested by the receiver.
pub trait ReceiverOps {
    /// Send a cumulative ACK: all bytes with sequence `< ackno` are received.
    fn send_ack(&mut self, ackno: u64);

    /// Wake the application because new in-order bytes are ready.
    ///
    /// Edge-triggered and payload-free; several notifications before the
    /// application drains are equivalent to one.
    fn notify_app(&mut self);
}

impl<T: SenderOps + ?Sized> SenderOps for &mut T {
    fn transmit(&mut self, packet: &[u8]) {
        (**self).transmit(packet)
    }

    fn start_timer(&mut self) {
        (**self).start_timer()
    }

    fn stop_timer(&mut self) {
        (**self).stop_timer()
    }
}

impl<T: ReceiverOps + ?Sized> ReceiverOps for &mut T {
    fn send_ack(&mut self, ackno: u64) {
        (**self).send_ack(ackno)
    }

    fn notify_app(&mut self) {
        (**self).notify_app()
    }
}
