//! PDU codec — the fixed 20-byte control header prefixed to every datagram.
//!
//! # Format
//!
//! All fields are 4-byte big-endian integers, in this order:
//!
//! ```text
//!  ┌───────────────────────────────────────────────┐
//!  │                      PDU                      │
//!  ├───────────────────────────────────────────────┤
//!  │              Protocol Version (1)             │
//!  ├───────────────────────────────────────────────┤
//!  │            Message Type (bitmask)             │
//!  ├───────────────────────────────────────────────┤
//!  │               Sequence Number                 │
//!  ├───────────────────────────────────────────────┤
//!  │                 Payload Size                  │
//!  ├───────────────────────────────────────────────┤
//!  │              Error Code (signed)              │
//!  ├───────────────────────────────────────────────┤
//!  │ Application Data (variable length, ≤ 512 B)   │
//!  └───────────────────────────────────────────────┘
//! ```
//!
//! The message type is not an enumeration: each named type is an
//! independent bit, and values compose by bitwise OR. An acknowledgment is
//! the acknowledged type OR'ed with the ACK bit, and a datagram is a
//! fragment iff the FRAGMENT bit is set, regardless of the base operation.
//! [`MsgType`] keeps that structure as a tagged value and only produces the
//! raw bit pattern at the serialization boundary.
//!
//! No I/O happens here — this is pure data layout.

use std::fmt;

use crate::error::Error;

/// Protocol version carried in every header. Parsed but not enforced.
pub const PROTO_VERSION: u32 = 1;

/// Byte length of the fixed header on the wire.
pub const HEADER_LEN: usize = 20;

/// Maximum application payload per datagram.
pub const MAX_PAYLOAD: usize = 512;

/// Maximum datagram size: one header plus one full payload.
pub const MAX_DGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

/// Bit values of the message-type field.
pub mod bits {
    /// Acknowledgment.
    pub const ACK: u32 = 1;
    /// Data transfer.
    pub const SEND: u32 = 2;
    /// Connection request.
    pub const CONNECT: u32 = 4;
    /// Teardown request.
    pub const CLOSE: u32 = 8;
    /// Negative acknowledgment.
    pub const NACK: u32 = 16;
    /// Datagram is one piece of a larger transfer.
    pub const FRAGMENT: u32 = 32;
    /// Receiver detected a framing fault.
    pub const ERROR: u32 = 64;
}

/// Base operation a message type decorates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Ack,
    Send,
    Connect,
    Close,
    Nack,
    Error,
}

impl Op {
    fn bit(self) -> u32 {
        match self {
            // a bare ACK has no base bit of its own
            Op::Ack => 0,
            Op::Send => bits::SEND,
            Op::Connect => bits::CONNECT,
            Op::Close => bits::CLOSE,
            Op::Nack => bits::NACK,
            Op::Error => bits::ERROR,
        }
    }
}

/// One point in the message-type vocabulary: a base operation plus the two
/// orthogonal decorations (acknowledged, fragment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgType {
    op: Op,
    ack: bool,
    fragment: bool,
}

impl MsgType {
    pub const ACK: MsgType = MsgType { op: Op::Ack, ack: true, fragment: false };
    pub const SEND: MsgType = MsgType { op: Op::Send, ack: false, fragment: false };
    pub const CONNECT: MsgType = MsgType { op: Op::Connect, ack: false, fragment: false };
    pub const CLOSE: MsgType = MsgType { op: Op::Close, ack: false, fragment: false };
    pub const NACK: MsgType = MsgType { op: Op::Nack, ack: false, fragment: false };
    pub const ERROR: MsgType = MsgType { op: Op::Error, ack: false, fragment: false };

    pub fn op(self) -> Op {
        self.op
    }

    pub fn is_ack(self) -> bool {
        self.ack
    }

    pub fn is_fragment(self) -> bool {
        self.fragment
    }

    /// The acknowledgment of this type: same base bits, ACK bit set.
    pub fn acked(self) -> MsgType {
        MsgType { ack: true, ..self }
    }

    /// This type with the FRAGMENT bit set or cleared.
    pub fn fragmented(self, fragment: bool) -> MsgType {
        MsgType { fragment, ..self }
    }

    /// Wire bit pattern.
    pub fn bits(self) -> u32 {
        let mut b = self.op.bit();
        if self.ack {
            b |= bits::ACK;
        }
        if self.fragment {
            b |= bits::FRAGMENT;
        }
        b
    }

    /// Decode a wire bit pattern. `None` for anything outside the
    /// vocabulary (no base bit, or more than one base bit).
    pub fn from_bits(b: u32) -> Option<MsgType> {
        let ack = b & bits::ACK != 0;
        let fragment = b & bits::FRAGMENT != 0;
        let op = match b & !(bits::ACK | bits::FRAGMENT) {
            0 if ack => Op::Ack,
            bits::SEND => Op::Send,
            bits::CONNECT => Op::Connect,
            bits::CLOSE => Op::Close,
            bits::NACK => Op::Nack,
            bits::ERROR => Op::Error,
            _ => return None,
        };
        Some(MsgType { op, ack, fragment })
    }

    fn name(self) -> &'static str {
        match (self.op, self.ack, self.fragment) {
            (Op::Ack, _, _) => "ACK",
            (Op::Send, false, false) => "SEND",
            (Op::Send, true, false) => "SEND/ACK",
            (Op::Send, false, true) => "SENDFRAG",
            (Op::Send, true, true) => "SENDFRAG/ACK",
            (Op::Connect, false, _) => "CONNECT",
            (Op::Connect, true, _) => "CONNECT/ACK",
            (Op::Close, false, _) => "CLOSE",
            (Op::Close, true, _) => "CLOSE/ACK",
            (Op::Nack, _, _) => "NACK",
            (Op::Error, _, _) => "ERROR",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded header. Constructed fresh for every outbound datagram and
/// parsed fresh from every inbound one; it has no identity beyond the
/// single datagram it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pdu {
    pub version: u32,
    /// Raw message-type bits as they appeared (or will appear) on the wire.
    /// Kept raw so that a datagram with an unrecognized type can still be
    /// sequenced and answered; [`Pdu::msg_type`] gives the tagged view.
    pub mtype: u32,
    pub seq: u32,
    pub payload_size: u32,
    pub err: i32,
}

impl Pdu {
    pub fn new(mtype: MsgType, seq: u32, payload_size: u32) -> Pdu {
        Pdu {
            version: PROTO_VERSION,
            mtype: mtype.bits(),
            seq,
            payload_size,
            err: 0,
        }
    }

    /// A pure control message: no payload, no error.
    pub fn control(mtype: MsgType, seq: u32) -> Pdu {
        Pdu::new(mtype, seq, 0)
    }

    pub fn with_err(mut self, err: i32) -> Pdu {
        self.err = err;
        self
    }

    pub fn msg_type(&self) -> Option<MsgType> {
        MsgType::from_bits(self.mtype)
    }

    pub fn is_fragment(&self) -> bool {
        self.mtype & bits::FRAGMENT != 0
    }

    /// Human-readable type name for tracing.
    pub fn type_name(&self) -> &'static str {
        match self.msg_type() {
            Some(t) => t.name(),
            None => "***UNKNOWN***",
        }
    }

    /// Serialize the header into its fixed wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.version.to_be_bytes());
        buf[4..8].copy_from_slice(&self.mtype.to_be_bytes());
        buf[8..12].copy_from_slice(&self.seq.to_be_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_be_bytes());
        buf[16..20].copy_from_slice(&self.err.to_be_bytes());
        buf
    }

    /// Parse a header from the front of `buf`.
    ///
    /// The only failure is a buffer shorter than [`HEADER_LEN`]; callers
    /// that size their buffers to at least one header never hit it.
    pub fn parse(buf: &[u8]) -> Result<Pdu, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::BadDatagram { len: buf.len() });
        }
        let word = |i: usize| u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Ok(Pdu {
            version: word(0),
            mtype: word(4),
            seq: word(8),
            payload_size: word(12),
            err: word(16) as i32,
        })
    }
}
