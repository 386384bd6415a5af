use crate::codec::{decode_payload, encode_envelope};
use crate::messages::{BatchEnvelope, ENVELOPE_TAG};
use anyhow::{anyhow, Result};
use colbind_core::error::ColbindError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Reads one framed envelope. Returns `None` when the stream ends cleanly
/// before a new frame starts.
pub async fn read_envelope<S: AsyncRead + Unpin>(
    stream: &mut S,
    max_frame_bytes: usize,
) -> Result<Option<BatchEnvelope>> {
    let tag = match stream.read_u8().await {
        Ok(v) => v,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if tag != ENVELOPE_TAG {
        return Err(ColbindError::MalformedEnvelope(format!("unexpected tag 0x{tag:02x}")).into());
    }
    let len = stream.read_u32().await? as usize;
    if len > max_frame_bytes {
        return Err(anyhow!("envelope of {len} bytes exceeds limit of {max_frame_bytes}"));
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(Some(decode_payload(&payload)?))
}

pub async fn write_envelope<S: AsyncWrite + Unpin>(stream: &mut S, envelope: &BatchEnvelope) -> Result<()> {
    let frame = encode_envelope(envelope)?;
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}
