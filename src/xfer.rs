//! Message-level protocol driver: whole-buffer transfers and the
//! connect/close handshakes, built by repeatedly invoking the
//! datagram-level driver.
//!
//! Everything here is strictly synchronous request/reply: a second
//! datagram is never issued before the acknowledgment of the first has
//! been observed. There is no retransmission and, unless a receive
//! deadline was configured, no timeout.

use tracing::{info, warn};

use crate::error::Error;
use crate::pdu::{HEADER_LEN, MAX_DGRAM, MsgType, Pdu};
use crate::sess::Session;

impl Session {
    /// Transfer `buf` to the peer, slicing it into acknowledged datagrams
    /// of at most one payload each. Returns the total payload bytes sent.
    pub fn send(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let mut rest = buf;
        let mut total = 0;

        while !rest.is_empty() {
            let n = self.send_datagram(rest)?;
            total += n;
            rest = &rest[n..];
        }

        if total != buf.len() {
            warn!(sent = total, requested = buf.len(), "send total does not match request");
        }
        Ok(total)
    }

    /// Receive one complete transfer into `buf`: datagrams are appended in
    /// arrival order for as long as the FRAGMENT bit stays set. Returns
    /// the total payload bytes received. A teardown by the peer surfaces
    /// as [`Error::Closed`] immediately, overriding any partial count.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut scratch = [0u8; MAX_DGRAM];
        let mut total = 0;

        loop {
            let n = self.recv_datagram(&mut scratch)?;
            let inbound = Pdu::parse(&scratch[..n])?;

            let payload = n - HEADER_LEN;
            if payload > 0 {
                let end = total + payload;
                if end > buf.len() {
                    return Err(Error::BufferUndersized {
                        declared: payload,
                        capacity: buf.len() - total,
                    });
                }
                buf[total..end].copy_from_slice(&scratch[HEADER_LEN..n]);
                total = end;
            }

            if !inbound.is_fragment() {
                break;
            }
        }
        Ok(total)
    }

    /// Client side of the connection handshake: send CONNECT, require a
    /// CONNECT/ACK back, advance the sequence counter by one.
    pub fn connect(&mut self) -> Result<(), Error> {
        let request = Pdu::control(MsgType::CONNECT, self.sequence());
        if self.send_raw(&request.to_bytes())? != HEADER_LEN {
            return Err(Error::Handshake("short connect send"));
        }

        let mut buf = [0u8; HEADER_LEN];
        if self.recv_raw(&mut buf)? != HEADER_LEN {
            return Err(Error::Handshake("short connect reply"));
        }
        let reply = Pdu::parse(&buf)?;
        if reply.msg_type() != Some(MsgType::CONNECT.acked()) {
            return Err(Error::Handshake("expected CONNECT/ACK"));
        }

        self.advance_seq(1);
        self.mark_connected();
        info!("connection established");
        Ok(())
    }

    /// Server side of the connection handshake: block for one inbound
    /// header, adopt its sequence number plus one, and acknowledge with
    /// CONNECT/ACK.
    ///
    /// The first datagram received is treated as the connection request
    /// whatever its message type says.
    pub fn listen(&mut self) -> Result<(), Error> {
        info!("waiting for a connection");

        let mut buf = [0u8; HEADER_LEN];
        if self.recv_raw(&mut buf)? != HEADER_LEN {
            return Err(Error::Handshake("short connection request"));
        }
        let request = Pdu::parse(&buf)?;

        self.adopt_seq(request.seq + 1);
        let reply = Pdu::control(MsgType::CONNECT.acked(), self.sequence());
        if self.send_raw(&reply.to_bytes())? != HEADER_LEN {
            return Err(Error::Handshake("short connect reply send"));
        }

        self.mark_connected();
        info!("connection established");
        Ok(())
    }

    /// Tear the session down: send CLOSE, expect CLOSE/ACK, and release
    /// the session's resources whether or not the handshake completed
    /// cleanly. After this call the session is unusable.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        if let Err(e) = self.close_handshake() {
            warn!(error = %e, "close handshake did not complete cleanly");
        }
        self.release();
        info!("connection closed");
        Ok(())
    }

    fn close_handshake(&mut self) -> Result<(), Error> {
        let request = Pdu::control(MsgType::CLOSE, self.sequence());
        if self.send_raw(&request.to_bytes())? != HEADER_LEN {
            return Err(Error::Handshake("short close send"));
        }

        let mut buf = [0u8; HEADER_LEN];
        if self.recv_raw(&mut buf)? != HEADER_LEN {
            return Err(Error::Handshake("short close reply"));
        }
        let reply = Pdu::parse(&buf)?;
        if reply.msg_type() != Some(MsgType::CLOSE.acked()) {
            return Err(Error::Handshake("expected CLOSE/ACK"));
        }

        self.advance_seq(1);
        Ok(())
    }
}
