use bytes::Bytes;
use std::fmt;

/// Which peer produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server traffic
    Client,
    /// Server to client traffic
    Server,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Client => "CLIENT",
            Direction::Server => "SERVER",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One complete BER-framed protocol message, exactly as read from the wire.
///
/// `bytes` holds the tag and length header followed by exactly the declared
/// payload, in read order. Frames are immutable once produced; cloning is
/// cheap and the forward and dump paths share the same underlying buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub direction: Direction,
    /// Per-direction sequence number, starting at 1.
    pub sequence: u64,
    pub bytes: Bytes,
}

impl Frame {
    /// Total size on the wire, header included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
