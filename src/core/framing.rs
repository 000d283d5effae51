//! Streaming BER frame reader.
//!
//! Parses one tag/length header at a time directly off a live stream, then
//! reads exactly the declared payload. All reads use `read_exact` semantics, so
//! a transport that delivers one byte at a time still frames correctly.
//!
//! Validation is strict DER: the top-level tag must be SEQUENCE (`0x30`),
//! indefinite lengths are rejected, declared lengths are bounded below
//! [`MAX_MESSAGE_LEN`] while the header is still being parsed, and superfluous
//! leading zeros in a long-form length are rejected as non-minimal.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{MAX_MESSAGE_LEN, SEQUENCE_TAG};
use crate::error::{FramingError, ProxyError, Result};

/// Decoded ASN.1 identifier and length octets.
///
/// Derived purely from the header bytes; consumed immediately to know how many
/// payload bytes follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagAndLength {
    /// Tag class (top two bits of the identifier octet).
    pub class: u8,
    /// Constructed (as opposed to primitive) encoding bit.
    pub constructed: bool,
    /// Tag number (low five bits; high-tag-number form is unsupported).
    pub tag: u8,
    /// Declared payload length in bytes.
    pub length: usize,
}

/// Read one complete frame: header plus exactly the declared payload.
///
/// Returns the raw wire bytes in read order. An end-of-stream or transport
/// failure maps to [`ProxyError::ConnectionClosed`] / [`ProxyError::Io`];
/// framing violations map to [`ProxyError::Framing`].
pub async fn read_frame<R>(stream: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::with_capacity(64);
    let header = read_tag_and_length(stream, &mut raw).await?;

    let start = raw.len();
    raw.resize(start + header.length, 0);
    stream
        .read_exact(&mut raw[start..])
        .await
        .map_err(map_io_err)?;

    Ok(raw)
}

/// Parse an ASN.1 tag and length pair from a live stream, appending every
/// consumed byte to `raw`.
pub async fn read_tag_and_length<R>(stream: &mut R, raw: &mut Vec<u8>) -> Result<TagAndLength>
where
    R: AsyncRead + Unpin,
{
    let b0 = read_byte(stream, raw).await?;
    let class = b0 >> 6;
    let constructed = b0 & 0x20 != 0;
    let tag = b0 & 0x1f;

    // Every top-level message must be a universal SEQUENCE. Anything else means
    // we have lost framing and cannot resynchronize within the stream.
    if b0 != SEQUENCE_TAG {
        return Err(FramingError::UnexpectedTag(b0).into());
    }

    let b1 = read_byte(stream, raw).await?;
    let length = if b1 & 0x80 == 0 {
        // The length is encoded in the bottom 7 bits.
        usize::from(b1 & 0x7f)
    } else {
        // Bottom 7 bits give the number of length bytes to follow.
        let num_bytes = b1 & 0x7f;
        if num_bytes == 0 {
            return Err(FramingError::IndefiniteLength.into());
        }
        let mut length = 0usize;
        for _ in 0..num_bytes {
            if length >= MAX_MESSAGE_LEN {
                // Shifting further would run past the bound.
                return Err(FramingError::LengthTooLarge.into());
            }
            let b = read_byte(stream, raw).await?;
            length = (length << 8) | usize::from(b);
            if length == 0 {
                // DER requires that lengths be minimal.
                return Err(FramingError::NonMinimalLength.into());
            }
        }
        if length >= MAX_MESSAGE_LEN {
            return Err(FramingError::LengthTooLarge.into());
        }
        length
    };

    Ok(TagAndLength {
        class,
        constructed,
        tag,
        length,
    })
}

async fn read_byte<R>(stream: &mut R, raw: &mut Vec<u8>) -> Result<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).await.map_err(map_io_err)?;
    raw.push(buf[0]);
    Ok(buf[0])
}

/// A short read means the connection is gone, not that the protocol was
/// violated; keep the two distinguishable for session logs.
fn map_io_err(e: std::io::Error) -> ProxyError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProxyError::ConnectionClosed
    } else {
        ProxyError::Io(e)
    }
}
