//! Minimal LDAP envelope decoding.
//!
//! [`EnvelopeDecoder`] is the default [`MessageDecoder`] delegate: it reads the
//! LDAPMessage envelope (outer SEQUENCE, messageID INTEGER, protocol op
//! application tag) and reports the operation by name. It deliberately stops
//! there; the inner operation payload is opaque to the tap.

use crate::protocol::decoder::{DecodeError, DecodeResult, DecodedMessage, MessageDecoder};

/// RFC 4511 application tags for protocol ops, as they appear on the wire.
fn operation_name(tag: u8) -> Option<&'static str> {
    match tag {
        0x60 => Some("BindRequest"),
        0x61 => Some("BindResponse"),
        0x42 => Some("UnbindRequest"),
        0x63 => Some("SearchRequest"),
        0x64 => Some("SearchResultEntry"),
        0x65 => Some("SearchResultDone"),
        0x73 => Some("SearchResultReference"),
        0x66 => Some("ModifyRequest"),
        0x67 => Some("ModifyResponse"),
        0x68 => Some("AddRequest"),
        0x69 => Some("AddResponse"),
        0x4A => Some("DelRequest"),
        0x6B => Some("DelResponse"),
        0x6C => Some("ModifyDNRequest"),
        0x6D => Some("ModifyDNResponse"),
        0x6E => Some("CompareRequest"),
        0x6F => Some("CompareResponse"),
        0x50 => Some("AbandonRequest"),
        0x77 => Some("ExtendedRequest"),
        0x78 => Some("ExtendedResponse"),
        0x79 => Some("IntermediateResponse"),
        _ => None,
    }
}

/// Summarizes LDAP messages from their envelope.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeDecoder;

impl MessageDecoder for EnvelopeDecoder {
    fn decode(&self, bytes: &[u8]) -> DecodeResult {
        let mut reader = BerReader::new(bytes);

        // LDAPMessage ::= SEQUENCE { messageID, protocolOp, controls [0] OPTIONAL }
        reader.expect_tag(0x30)?;
        reader.read_length()?;

        let message_id = reader.read_integer()?;
        let op_tag = reader.read_u8()?;
        let operation = operation_name(op_tag)
            .ok_or_else(|| DecodeError::new(format!("unknown protocol op tag 0x{op_tag:02x}")))?;

        Ok(DecodedMessage {
            message_id,
            operation: operation.to_string(),
        })
    }
}

/// Cursor over in-memory BER content.
struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| DecodeError::new("truncated BER content"))?;
        self.pos += 1;
        Ok(b)
    }

    fn expect_tag(&mut self, expected: u8) -> Result<(), DecodeError> {
        let tag = self.read_u8()?;
        if tag != expected {
            return Err(DecodeError::new(format!(
                "expected tag 0x{expected:02x}, got 0x{tag:02x}"
            )));
        }
        Ok(())
    }

    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let first = self.read_u8()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }
        let num_bytes = usize::from(first & 0x7f);
        if num_bytes == 0 {
            return Err(DecodeError::new("indefinite length in content"));
        }
        if num_bytes > 4 {
            return Err(DecodeError::new(format!(
                "length of {num_bytes} bytes is not supported"
            )));
        }
        let mut length = 0usize;
        for _ in 0..num_bytes {
            length = (length << 8) | usize::from(self.read_u8()?);
        }
        Ok(length)
    }

    fn read_integer(&mut self) -> Result<i64, DecodeError> {
        self.expect_tag(0x02)?;
        let length = self.read_length()?;
        if length == 0 || length > 8 {
            return Err(DecodeError::new(format!(
                "INTEGER of {length} bytes is not supported"
            )));
        }
        let mut value: i64 = 0;
        for i in 0..length {
            let b = self.read_u8()?;
            if i == 0 && b & 0x80 != 0 {
                value = -1;
            }
            value = (value << 8) | i64::from(b);
        }
        Ok(value)
    }
}
