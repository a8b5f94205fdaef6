//! Wire-format definitions for data segments and cumulative ACKs.
//!
//! Two kinds of datagram cross the channel:
//! - **data segments** (sender → receiver): a fixed header carrying the
//!   sequence number of the first payload byte, followed by the payload.
//! - **ACKs** (receiver → sender): a single cumulative acknowledgement number.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  data segment
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                   Sequence Number (64 bit)                    +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            Checksum           |          Payload ...          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The ACK message has the same shape with the acknowledgement number in
//! place of the sequence number and no payload.
//!
//! A data segment whose payload is empty is a **probe**: it only asks the
//! receiver for a fresh cumulative ACK.

/// Byte length of the fixed-size data segment header on the wire.
/// seq(8) + checksum(2)
pub const PACKET_HEADER_LEN: usize = 10;

/// Byte length of an encoded ACK message.
/// ackno(8) + checksum(2)
pub const ACK_LEN: usize = 10;

const OFF_SEQ: usize = 0;
const OFF_CHECKSUM: usize = 8;

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// Buffer shorter than the fixed header size.
    #[error("buffer too short to contain a header")]
    BufferTooShort,
    /// An ACK datagram was not exactly [`ACK_LEN`] bytes long.
    #[error("datagram length does not match an ACK message")]
    LengthMismatch,
    /// Checksum did not match recomputed value.
    #[error("checksum verification failed")]
    ChecksumFailed,
    /// The payload buffer could not be allocated.
    #[error("could not allocate a {0}-byte packet buffer")]
    OutOfMemory(usize),
}

/// Embed `seq` into the header of `packet` in place and seal it with a checksum.
///
/// The first [`PACKET_HEADER_LEN`] bytes of `packet` are reserved for the
/// header; whatever they contain is overwritten.
///
/// # Panics
///
/// Panics if `packet` is shorter than [`PACKET_HEADER_LEN`].
pub fn packetize(packet: &mut [u8], seq: u64) {
    assert!(
        packet.len() >= PACKET_HEADER_LEN,
        "packet buffer of {} bytes cannot hold a header",
        packet.len()
    );
    packet[OFF_SEQ..OFF_SEQ + 8].copy_from_slice(&seq.to_be_bytes());
    seal(packet);
}

/// Allocate a data segment carrying `payload` at sequence number `seq`.
///
/// The buffer is reserved fallibly so callers can degrade gracefully instead
/// of aborting when memory is exhausted.
pub fn build_packet(seq: u64, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    let total = PACKET_HEADER_LEN + payload.len();
    let mut packet = Vec::new();
    packet
        .try_reserve_exact(total)
        .map_err(|_| PacketError::OutOfMemory(total))?;
    packet.resize(PACKET_HEADER_LEN, 0);
    packet.extend_from_slice(payload);
    packetize(&mut packet, seq);
    Ok(packet)
}

/// Parse a data segment into `(seq, payload)`.
///
/// The payload borrows from `packet`; an empty payload marks a probe.
pub fn decode(packet: &[u8]) -> Result<(u64, &[u8]), PacketError> {
    if packet.len() < PACKET_HEADER_LEN {
        return Err(PacketError::BufferTooShort);
    }
    verify(packet)?;
    Ok((read_u64(packet, OFF_SEQ), &packet[PACKET_HEADER_LEN..]))
}

/// Encode a cumulative acknowledgement: all bytes with sequence `< ackno`
/// have been received.
pub fn encode_ack(ackno: u64) -> [u8; ACK_LEN] {
    let mut buf = [0u8; ACK_LEN];
    buf[OFF_SEQ..OFF_SEQ + 8].copy_from_slice(&ackno.to_be_bytes());
    seal(&mut buf);
    buf
}

/// Parse an ACK datagram back into its acknowledgement number.
pub fn decode_ack(buf: &[u8]) -> Result<u64, PacketError> {
    if buf.len() != ACK_LEN {
        return Err(PacketError::LengthMismatch);
    }
    verify(buf)?;
    Ok(read_u64(buf, OFF_SEQ))
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[off..off + 8]);
    u64::from_be_bytes(word)
}

/// Zero the checksum field, compute the checksum, and store it.
fn seal(buf: &mut [u8]) {
    buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&0u16.to_be_bytes());
    let csum = internet_checksum(buf);
    buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());
}

/// Summing a buffer that carries its own valid checksum folds to `0xffff`,
/// so verification needs no scratch copy.
fn verify(buf: &[u8]) -> Result<(), PacketError> {
    if internet_checksum(buf) == 0 {
        Ok(())
    } else {
        Err(PacketError::ChecksumFailed)
    }
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// Sum consecutive 16-bit big-endian words, fold the carry, return the
/// one's-complement.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for pair in &mut chunks {
        sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
    }
    // Odd trailing byte: pad with a zero byte on the right.
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
