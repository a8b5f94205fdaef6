//! Entry point for `rdt`.
//!
//! Parses CLI arguments and dispatches into either **send** or **recv** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing, file I/O).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use rdt::socket::Socket;
use rdt::{ReceiverSession, SenderSession, SessionConfig, SessionError, SimulatorConfig};

/// Reliable byte stream over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Stream a file (or stdin) to a receiver.
    Send {
        /// Receiver address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        peer: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// File to send; stdin when omitted.
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Retransmission timeout in milliseconds.
        #[arg(long, default_value_t = 200)]
        rto_ms: u64,
        /// Maximum payload bytes per segment.
        #[arg(long, default_value_t = 1024)]
        mss: usize,
        /// Segments kept in flight.
        #[arg(long, default_value_t = 32)]
        window: usize,
        /// Consecutive timeouts without progress before giving up.
        #[arg(long, default_value_t = 10)]
        max_retransmits: u32,
        #[command(flatten)]
        faults: FaultArgs,
    },
    /// Receive a stream and write it to a file (or stdout).
    Recv {
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Stop after this many milliseconds without a datagram.
        #[arg(long, default_value_t = 5000)]
        idle_ms: u64,
        #[command(flatten)]
        faults: FaultArgs,
    },
}

/// Faults injected into this side's outgoing datagrams.
#[derive(Args)]
struct FaultArgs {
    /// Drop probability.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Duplication probability.
    #[arg(long, default_value_t = 0.0)]
    dup: f64,
    /// Reordering probability.
    #[arg(long, default_value_t = 0.0)]
    reorder: f64,
    /// Single-bit corruption probability.
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,
    /// Seed for reproducible fault patterns.
    #[arg(long)]
    seed: Option<u64>,
}

impl From<FaultArgs> for SimulatorConfig {
    fn from(a: FaultArgs) -> Self {
        Self {
            loss_rate: a.loss,
            duplicate_rate: a.dup,
            reorder_rate: a.reorder,
            corrupt_rate: a.corrupt,
            seed: a.seed,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.mode {
        Mode::Send {
            peer,
            bind,
            file,
            rto_ms,
            mss,
            window,
            max_retransmits,
            faults,
        } => {
            let config = SessionConfig {
                rto: Duration::from_millis(rto_ms),
                max_segment_len: mss,
                window_segments: window,
                max_retransmits,
                faults: faults.into(),
                ..SessionConfig::default()
            };
            run_send(bind, peer, file, config).await
        }
        Mode::Recv {
            bind,
            out,
            idle_ms,
            faults,
        } => {
            let config = SessionConfig {
                idle_timeout: Duration::from_millis(idle_ms),
                faults: faults.into(),
                ..SessionConfig::default()
            };
            run_recv(bind, out, config).await
        }
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run_send(
    bind: SocketAddr,
    peer: SocketAddr,
    file: Option<PathBuf>,
    config: SessionConfig,
) -> Result<(), SessionError> {
    let mut input: Box<dyn AsyncRead + Unpin + Send> = match &file {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };

    let socket = Socket::bind(bind).await?;
    log::info!("Sending from {} to {peer}", socket.local_addr);
    let read_size = config.max_segment_len.max(1) * 8;
    let session = SenderSession::spawn(socket, peer, config);

    let mut buf = vec![0u8; read_size];
    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        session.send(buf[..n].to_vec()).await?;
    }

    let stats = session.finish().await?;
    log::info!(
        "Delivered: {} segment(s), {} retransmission(s), {} ACK(s) ({} duplicate)",
        stats.segments_sent,
        stats.retransmissions,
        stats.acks_received,
        stats.duplicate_acks
    );
    Ok(())
}

async fn run_recv(
    bind: SocketAddr,
    out: Option<PathBuf>,
    config: SessionConfig,
) -> Result<(), SessionError> {
    let mut output: Box<dyn AsyncWrite + Unpin + Send> = match &out {
        Some(path) => Box::new(tokio::fs::File::create(path).await?),
        None => Box::new(tokio::io::stdout()),
    };

    let socket = Socket::bind(bind).await?;
    log::info!("Receiving on {}", socket.local_addr);
    let mut session = ReceiverSession::spawn(socket, config);

    loop {
        tokio::select! {
            chunk = session.recv() => match chunk {
                Some(data) => output.write_all(&data).await?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted; shutting down");
                break;
            }
        }
    }
    output.flush().await?;

    let stats = session.finish().await?;
    log::info!(
        "Received: {} byte(s) from {} segment(s), {} duplicate(s), {} probe(s)",
        stats.bytes_delivered,
        stats.segments_received,
        stats.duplicates,
        stats.probes
    );
    Ok(())
}
