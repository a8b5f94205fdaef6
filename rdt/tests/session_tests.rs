//! Integration tests for the tokio session layer.
//!
//! Each test runs a sender session and a receiver session over the loopback
//! interface.  Both sides are background tasks, so they make progress
//! concurrently while the test body drives the application ends.

use std::time::Duration;

use rdt::packet;
use rdt::socket::Socket;
use rdt::{ReceiverSession, SenderSession, SessionConfig, SessionError, SimulatorConfig};

/// Bind a socket to an OS-assigned port on loopback.
async fn ephemeral() -> Socket {
    let addr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        rto: Duration::from_millis(20),
        max_segment_len: 100,
        window_segments: 8,
        max_retransmits: 200,
        idle_timeout: Duration::from_millis(500),
        ..SessionConfig::default()
    }
}

async fn collect(rx: &mut ReceiverSession, expected: usize) -> Vec<u8> {
    let mut got = Vec::new();
    while got.len() < expected {
        match rx.recv().await {
            Some(chunk) => got.extend_from_slice(&chunk),
            None => break,
        }
    }
    got
}

// ---------------------------------------------------------------------------
// Test 1: clean loopback transfer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stream_arrives_intact() {
    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let mut rx = ReceiverSession::spawn(rx_sock, fast_config());

    let data = pattern(10_000);
    let tx = SenderSession::spawn(ephemeral().await, rx_addr, fast_config());
    for piece in data.chunks(777) {
        tx.send(piece.to_vec()).await.expect("send");
    }

    let got = tokio::time::timeout(Duration::from_secs(10), collect(&mut rx, data.len()))
        .await
        .expect("receiver timed out");
    assert_eq!(got, data);

    let sent = tokio::time::timeout(Duration::from_secs(10), tx.finish())
        .await
        .expect("sender timed out")
        .expect("sender failed");
    assert!(sent.segments_sent >= 100);

    let received = rx.finish().await.expect("receiver failed");
    assert_eq!(received.bytes_delivered, data.len() as u64);
}

// ---------------------------------------------------------------------------
// Test 2: both directions lossy, reordering, duplicating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stream_survives_faulty_links() {
    let faults = SimulatorConfig {
        loss_rate: 0.15,
        duplicate_rate: 0.1,
        reorder_rate: 0.15,
        corrupt_rate: 0.05,
        seed: Some(2024),
    };

    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let mut rx = ReceiverSession::spawn(
        rx_sock,
        SessionConfig {
            faults: SimulatorConfig {
                seed: Some(7),
                ..faults.clone()
            },
            ..fast_config()
        },
    );

    let data = pattern(5_000);
    let tx = SenderSession::spawn(
        ephemeral().await,
        rx_addr,
        SessionConfig {
            faults,
            ..fast_config()
        },
    );
    tx.send(data.clone()).await.expect("send");

    let got = tokio::time::timeout(Duration::from_secs(30), collect(&mut rx, data.len()))
        .await
        .expect("receiver timed out");
    assert_eq!(got, data);

    let sent = tokio::time::timeout(Duration::from_secs(30), tx.finish())
        .await
        .expect("sender timed out")
        .expect("sender failed");
    assert!(sent.retransmissions > 0);

    let received = rx.finish().await.expect("receiver failed");
    assert!(received.duplicates > 0 || received.probes > 0);
}

// ---------------------------------------------------------------------------
// Test 3: nobody acknowledges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unresponsive_peer_is_reported() {
    // Bound but never read: datagrams vanish, no ACK ever comes back.
    let silent = ephemeral().await;

    let tx = SenderSession::spawn(
        ephemeral().await,
        silent.local_addr,
        SessionConfig {
            rto: Duration::from_millis(10),
            max_retransmits: 3,
            ..SessionConfig::default()
        },
    );
    tx.send(b"anyone there?".to_vec()).await.expect("send");

    let result = tokio::time::timeout(Duration::from_secs(5), tx.finish())
        .await
        .expect("sender should give up");
    assert!(matches!(result, Err(SessionError::PeerUnresponsive(3))));
    drop(silent);
}

// ---------------------------------------------------------------------------
// Test 4: receiver ends after going idle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_closes_after_idle_timeout() {
    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let mut rx = ReceiverSession::spawn(
        rx_sock,
        SessionConfig {
            idle_timeout: Duration::from_millis(100),
            ..SessionConfig::default()
        },
    );

    let tx = SenderSession::spawn(ephemeral().await, rx_addr, fast_config());
    tx.send(b"short".to_vec()).await.expect("send");
    tx.finish().await.expect("sender failed");

    assert_eq!(rx.recv().await.as_deref(), Some(&b"short"[..]));
    let end = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("idle timeout should end the session");
    assert!(end.is_none());

    let stats = rx.finish().await.expect("receiver failed");
    assert_eq!(stats.bytes_delivered, 5);
}

// ---------------------------------------------------------------------------
// Test 5: finish with nothing sent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_finish_without_data_returns_immediately() {
    let peer = ephemeral().await;
    let tx = SenderSession::spawn(ephemeral().await, peer.local_addr, fast_config());
    let stats = tokio::time::timeout(Duration::from_secs(2), tx.finish())
        .await
        .expect("idle sender should finish")
        .expect("sender failed");
    assert_eq!(stats.segments_sent, 0);
}

// ---------------------------------------------------------------------------
// Test 6: a second source cannot join the stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_ignores_datagrams_from_other_sources() {
    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let mut rx = ReceiverSession::spawn(rx_sock, fast_config());

    let first = ephemeral().await;
    let stranger = ephemeral().await;

    first
        .send_to(&packet::build_packet(0, b"abc").unwrap(), rx_addr)
        .await
        .unwrap();
    let (ack, _) = tokio::time::timeout(Duration::from_secs(2), first.recv_from())
        .await
        .expect("no ACK for first segment")
        .unwrap();
    assert_eq!(packet::decode_ack(&ack), Ok(3));

    stranger
        .send_to(&packet::build_packet(3, b"zzz").unwrap(), rx_addr)
        .await
        .unwrap();
    let answered =
        tokio::time::timeout(Duration::from_millis(200), stranger.recv_from()).await;
    assert!(answered.is_err(), "stranger should get no ACK");

    first
        .send_to(&packet::build_packet(3, b"def").unwrap(), rx_addr)
        .await
        .unwrap();

    let got = tokio::time::timeout(Duration::from_secs(2), collect(&mut rx, 6))
        .await
        .expect("receiver timed out");
    assert_eq!(got, b"abcdef");

    let stats = rx.finish().await.expect("receiver failed");
    assert_eq!(stats.segments_received, 2);
}
