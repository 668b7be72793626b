//! Error taxonomy and the negative outcome codes carried on the wire.

use std::io;

use thiserror::Error;

/// Outcome codes as they appear in the PDU `error_code` field and in the
/// original driver's return values.
pub mod codes {
    pub const NO_ERROR: i32 = 0;
    pub const GENERAL: i32 = -1;
    pub const PROTOCOL: i32 = -2;
    pub const BUFF_UNDERSIZED: i32 = -4;
    pub const BUFF_OVERSIZED: i32 = -8;
    pub const CONNECTION_CLOSED: i32 = -16;
    pub const BAD_DGRAM: i32 = -32;
}

/// Everything the protocol drivers can report.
///
/// Precondition failures (`AddrNotInit`, `BufferOversized`) are detected
/// before any I/O. Framing failures (`BadDatagram`, `BufferUndersized`) are
/// detected on the receive side and answered with an ERROR-typed reply
/// before being surfaced. `Closed` is the distinguished teardown outcome,
/// returned both when the peer closes the session and when a released
/// session is used again.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket creation, bind, send, or receive failed underneath us.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// An address slot was used before anything initialized it.
    #[error("{0} peer address not initialized")]
    AddrNotInit(&'static str),

    /// A connect or close handshake did not complete as required.
    #[error("handshake failed: {0}")]
    Handshake(&'static str),

    /// The peer sent a message type outside the recognized vocabulary, or
    /// a protocol reply could not be transmitted in full.
    #[error("protocol violation: unexpected message type {mtype:#x}")]
    Protocol { mtype: u32 },

    /// The inbound header declared more payload than the receive buffer
    /// can hold.
    #[error("declared payload size {declared} exceeds receive buffer of {capacity} bytes")]
    BufferUndersized { declared: usize, capacity: usize },

    /// The caller offered a staging buffer larger than one datagram.
    #[error("receive buffer of {capacity} bytes exceeds the maximum datagram size")]
    BufferOversized { capacity: usize },

    /// The session is closed; either the peer tore it down or it was
    /// already released locally.
    #[error("connection closed")]
    Closed,

    /// An inbound datagram was shorter than one header.
    #[error("datagram of {len} bytes is shorter than one header")]
    BadDatagram { len: usize },
}

impl Error {
    /// The original driver's negative return code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            Error::Transport(_) | Error::AddrNotInit(_) | Error::Handshake(_) => codes::GENERAL,
            Error::Protocol { .. } => codes::PROTOCOL,
            Error::BufferUndersized { .. } => codes::BUFF_UNDERSIZED,
            Error::BufferOversized { .. } => codes::BUFF_OVERSIZED,
            Error::Closed => codes::CONNECTION_CLOSED,
            Error::BadDatagram { .. } => codes::BAD_DGRAM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes() {
        assert_eq!(Error::AddrNotInit("outbound").code(), -1);
        assert_eq!(Error::Handshake("no reply").code(), -1);
        assert_eq!(Error::Protocol { mtype: 6 }.code(), -2);
        assert_eq!(Error::BufferUndersized { declared: 4096, capacity: 532 }.code(), -4);
        assert_eq!(Error::BufferOversized { capacity: 4096 }.code(), -8);
        assert_eq!(Error::Closed.code(), -16);
        assert_eq!(Error::BadDatagram { len: 3 }.code(), -32);
    }
}
