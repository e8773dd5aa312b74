//! Stream framing for packets
//!
//! Each frame is a 4-byte big-endian length followed by the bincode encoding
//! of a [`WireFrame`]. Frames are bounded by [`MAX_FRAME_SIZE`]; a frame whose
//! body fails to decode is reported as [`FrameError::Malformed`] with the
//! stream still positioned at the next frame, so readers may skip it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::packet::{Origin, Packet, PacketKind};

pub const MAX_FRAME_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the 64 KiB limit")]
    TooLarge(usize),
    #[error("malformed frame: {0}")]
    Malformed(#[from] bincode::Error),
}

impl FrameError {
    /// Whether the stream is still usable after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireFrame {
    pub origin: Origin,
    pub kind: PacketKind,
    pub sequence: Option<u32>,
    pub words: Vec<String>,
}

impl From<&Packet> for WireFrame {
    fn from(packet: &Packet) -> Self {
        Self {
            origin: packet.origin,
            kind: packet.kind,
            sequence: packet.sequence(),
            words: packet.words.clone(),
        }
    }
}

impl From<WireFrame> for Packet {
    fn from(frame: WireFrame) -> Self {
        Packet::new(frame.origin, frame.kind, frame.sequence, frame.words)
    }
}

/// Encodes a packet into a complete length-prefixed frame
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, FrameError> {
    let body = bincode::serialize(&WireFrame::from(packet))?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(body.len()));
    }

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a frame body (without its length prefix)
pub fn decode_body(body: &[u8]) -> Result<Packet, FrameError> {
    let frame: WireFrame = bincode::deserialize(body)?;
    Ok(frame.into())
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next packet. Returns `Ok(None)` when the peer closed the stream
/// cleanly between frames.
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len = [0u8; 4];
    match reader.read_exact(&mut len).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_body(&body).map(Some)
}
