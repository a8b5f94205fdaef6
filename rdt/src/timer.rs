//! One-shot retransmission timer for the tokio session layer.
//!
//! [`RetransmitTimer`] wraps a `tokio::time::Sleep` that is re-armed in place
//! rather than recreated.  A disarmed timer never completes, so it can sit in
//! a `tokio::select!` branch unconditionally.
//!
//! The timeout is fixed: the protocol restarts the timer on every ACK and on
//! every retransmission, with no back-off.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// A re-armable one-shot alarm.
#[derive(Debug)]
pub struct RetransmitTimer {
    rto: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl RetransmitTimer {
    /// Create a disarmed timer that fires `rto` after each [`arm`](Self::arm).
    pub fn new(rto: Duration) -> Self {
        Self {
            rto,
            sleep: Box::pin(tokio::time::sleep(rto)),
            armed: false,
        }
    }

    /// Arm (or re-arm) the timer to fire one `rto` from now.
    pub fn arm(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.rto);
        self.armed = true;
    }

    /// Disarm the timer.  Idempotent.
    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Resolve when the armed deadline passes; pend forever while disarmed.
    ///
    /// Completing disarms the timer: it is one-shot.
    pub fn expired(&mut self) -> Expired<'_> {
        Expired { timer: self }
    }
}

/// Future returned by [`RetransmitTimer::expired`].
#[derive(Debug)]
pub struct Expired<'a> {
    timer: &'a mut RetransmitTimer,
}

impl Future for Expired<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let timer = &mut *self.timer;
        if !timer.armed {
            return Poll::Pending;
        }
        match timer.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => {
                timer.armed = false;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn armed_timer_fires_once() {
        let mut timer = RetransmitTimer::new(Duration::from_millis(10));
        timer.arm();
        tokio::time::timeout(Duration::from_secs(2), timer.expired())
            .await
            .expect("armed timer should fire");
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn disarmed_timer_never_fires() {
        let mut timer = RetransmitTimer::new(Duration::from_millis(5));
        timer.arm();
        timer.cancel();
        let res = tokio::time::timeout(Duration::from_millis(50), timer.expired()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn rearm_pushes_deadline_out() {
        let mut timer = RetransmitTimer::new(Duration::from_millis(200));
        timer.arm();
        tokio::time::sleep(Duration::from_millis(100)).await;
        timer.arm();
        let early = tokio::time::timeout(Duration::from_millis(150), timer.expired()).await;
        assert!(early.is_err());
        assert!(timer.is_armed());
    }
}
