//! Datagram-level protocol driver: one datagram in, one reply out.
//!
//! The receive side interprets a single inbound datagram into the
//! appropriate reply (ACK, fragment ACK, close ACK, or ERROR) and applies
//! the sequence-number update. The send side transmits one header+chunk
//! datagram and blocks for its acknowledgment. Multi-datagram transfers
//! are composed out of these calls by the message-level driver.

use tracing::warn;

use crate::error::{Error, codes};
use crate::pdu::{HEADER_LEN, MAX_DGRAM, MAX_PAYLOAD, MsgType, Pdu};
use crate::sess::Session;

impl Session {
    /// Receive one datagram into `buf` and answer it.
    ///
    /// Framing faults (datagram shorter than a header, declared payload
    /// larger than `buf`) are answered with an ERROR-typed reply and
    /// surfaced as the corresponding error; the sequence number still
    /// advances by exactly 1. A CLOSE releases the session and surfaces
    /// [`Error::Closed`]. Any message type outside SEND, SEND|FRAGMENT,
    /// and CLOSE is a protocol violation and gets no reply at all.
    ///
    /// On success returns the raw byte count received, header included.
    pub(crate) fn recv_datagram(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.len() > MAX_DGRAM {
            return Err(Error::BufferOversized { capacity: buf.len() });
        }

        let n = self.recv_raw(buf)?;

        if n < HEADER_LEN {
            self.advance_seq(1);
            self.send_reply(
                Pdu::control(MsgType::ERROR, self.sequence()).with_err(codes::BAD_DGRAM),
            )?;
            return Err(Error::BadDatagram { len: n });
        }

        let inbound = Pdu::parse(&buf[..n])?;
        if inbound.payload_size as usize > buf.len() {
            self.advance_seq(1);
            self.send_reply(
                Pdu::control(MsgType::ERROR, self.sequence()).with_err(codes::BUFF_UNDERSIZED),
            )?;
            return Err(Error::BufferUndersized {
                declared: inbound.payload_size as usize,
                capacity: buf.len(),
            });
        }

        // a pure control message still advances the counter by one
        if inbound.payload_size == 0 {
            self.advance_seq(1);
        } else {
            self.advance_seq(inbound.payload_size);
        }

        match inbound.msg_type() {
            Some(t) if t == MsgType::SEND || t == MsgType::SEND.fragmented(true) => {
                self.send_reply(Pdu::control(t.acked(), self.sequence()))?;
                Ok(n)
            }
            Some(t) if t == MsgType::CLOSE => {
                self.send_reply(Pdu::control(MsgType::CLOSE.acked(), self.sequence()))?;
                self.release();
                Err(Error::Closed)
            }
            _ => {
                warn!(mtype = inbound.mtype, "unexpected message type in header");
                Err(Error::Protocol { mtype: inbound.mtype })
            }
        }
    }

    /// Send one chunk of `chunk` (at most [`MAX_PAYLOAD`] bytes) and block
    /// for its acknowledgment.
    ///
    /// The FRAGMENT flag is inferred here: it is set iff more than one
    /// datagram's worth of buffer remains at the time of this call. A
    /// short raw send and an unexpected acknowledgment type are logged,
    /// not failed; the caller proceeds with what was transferred.
    ///
    /// Returns the number of payload bytes consumed from `chunk`.
    pub(crate) fn send_datagram(&mut self, chunk: &[u8]) -> Result<usize, Error> {
        let fragment = chunk.len() > MAX_PAYLOAD;
        let take = chunk.len().min(MAX_PAYLOAD);

        let mtype = MsgType::SEND.fragmented(fragment);
        let expected = mtype.acked();

        let mut dgram = [0u8; MAX_DGRAM];
        dgram[..HEADER_LEN].copy_from_slice(&Pdu::new(mtype, self.sequence(), take as u32).to_bytes());
        dgram[HEADER_LEN..HEADER_LEN + take].copy_from_slice(&chunk[..take]);

        let total = HEADER_LEN + take;
        let sent = self.send_raw(&dgram[..total])?;
        if sent != total {
            warn!(sent, expected = total, "short raw send");
        }

        if take == 0 {
            self.advance_seq(1);
        } else {
            self.advance_seq(take as u32);
        }

        let mut ack = [0u8; HEADER_LEN];
        let n = self.recv_raw(&mut ack)?;
        if n < HEADER_LEN {
            warn!(got = n, "short acknowledgment reply");
        } else {
            let reply = Pdu::parse(&ack)?;
            if reply.msg_type() != Some(expected) {
                warn!(got = reply.type_name(), expected = %expected, "acknowledgment type mismatch");
            }
        }

        Ok(take)
    }

    fn send_reply(&mut self, pdu: Pdu) -> Result<(), Error> {
        let sent = self.send_raw(&pdu.to_bytes())?;
        if sent != HEADER_LEN {
            return Err(Error::Protocol { mtype: pdu.mtype });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sess::SessionConfig;
    use std::net::UdpSocket;
    use std::time::Duration;

    fn quiet() -> SessionConfig {
        SessionConfig { debug: false, recv_deadline: None }
    }

    fn server_and_peer() -> (Session, UdpSocket) {
        let sess = Session::server_with(0, quiet()).unwrap();
        let port = sess.local_addr().unwrap().port();
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        peer.connect(("127.0.0.1", port)).unwrap();
        (sess, peer)
    }

    fn read_reply(peer: &UdpSocket) -> Pdu {
        let mut buf = [0u8; MAX_DGRAM];
        let n = peer.recv(&mut buf).unwrap();
        Pdu::parse(&buf[..n]).unwrap()
    }

    #[test]
    fn short_datagram_gets_an_error_reply_and_advances_seq_by_one() {
        let (mut sess, peer) = server_and_peer();
        peer.send(&[1, 2, 3]).unwrap();

        let mut buf = [0u8; MAX_DGRAM];
        let err = sess.recv_datagram(&mut buf).unwrap_err();
        assert!(matches!(err, Error::BadDatagram { len: 3 }));
        assert_eq!(sess.sequence(), 1);

        let reply = read_reply(&peer);
        assert_eq!(reply.mtype, 64);
        assert_eq!(reply.err, codes::BAD_DGRAM);
        assert_eq!(reply.seq, 1);
        assert_eq!(reply.payload_size, 0);
    }

    #[test]
    fn oversized_payload_declaration_gets_an_error_reply() {
        let (mut sess, peer) = server_and_peer();
        let lying = Pdu::new(MsgType::SEND, 0, 4096);
        peer.send(&lying.to_bytes()).unwrap();

        let mut buf = [0u8; MAX_DGRAM];
        let err = sess.recv_datagram(&mut buf).unwrap_err();
        assert!(matches!(err, Error::BufferUndersized { declared: 4096, .. }));
        assert_eq!(sess.sequence(), 1);

        let reply = read_reply(&peer);
        assert_eq!(reply.mtype, 64);
        assert_eq!(reply.err, codes::BUFF_UNDERSIZED);
        assert_eq!(reply.seq, 1);
    }

    #[test]
    fn send_is_acknowledged_with_the_matching_ack_type() {
        let (mut sess, peer) = server_and_peer();
        let payload = b"snail mail";
        let mut dgram = Pdu::new(MsgType::SEND, 0, payload.len() as u32).to_bytes().to_vec();
        dgram.extend_from_slice(payload);
        peer.send(&dgram).unwrap();

        let mut buf = [0u8; MAX_DGRAM];
        let n = sess.recv_datagram(&mut buf).unwrap();
        assert_eq!(n, HEADER_LEN + payload.len());
        assert_eq!(sess.sequence(), payload.len() as u32);

        let reply = read_reply(&peer);
        assert_eq!(reply.mtype, 3);
        assert_eq!(reply.seq, payload.len() as u32);
        assert_eq!(reply.err, 0);
    }

    #[test]
    fn fragment_is_acknowledged_with_the_fragment_ack_type() {
        let (mut sess, peer) = server_and_peer();
        let payload = vec![0x5A; MAX_PAYLOAD];
        let mut dgram = Pdu::new(MsgType::SEND.fragmented(true), 0, MAX_PAYLOAD as u32)
            .to_bytes()
            .to_vec();
        dgram.extend_from_slice(&payload);
        peer.send(&dgram).unwrap();

        let mut buf = [0u8; MAX_DGRAM];
        sess.recv_datagram(&mut buf).unwrap();
        assert_eq!(read_reply(&peer).mtype, 35);
    }

    #[test]
    fn close_is_acknowledged_and_releases_the_session() {
        let (mut sess, peer) = server_and_peer();
        peer.send(&Pdu::control(MsgType::CLOSE, 7).to_bytes()).unwrap();

        let mut buf = [0u8; MAX_DGRAM];
        assert!(matches!(sess.recv_datagram(&mut buf), Err(Error::Closed)));
        assert!(sess.is_closed());
        assert_eq!(sess.sequence(), 1);

        let reply = read_reply(&peer);
        assert_eq!(reply.mtype, 9);
        assert_eq!(reply.seq, 1);
    }

    #[test]
    fn unexpected_type_is_a_protocol_error_with_no_reply() {
        let (mut sess, peer) = server_and_peer();
        peer.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        peer.send(&Pdu::control(MsgType::NACK, 0).to_bytes()).unwrap();

        let mut buf = [0u8; MAX_DGRAM];
        let err = sess.recv_datagram(&mut buf).unwrap_err();
        assert!(matches!(err, Error::Protocol { mtype: 16 }));
        // sequence still advanced for the control message
        assert_eq!(sess.sequence(), 1);
        // and nothing came back
        let mut scratch = [0u8; MAX_DGRAM];
        assert!(peer.recv(&mut scratch).is_err());
    }

    #[test]
    fn staging_buffer_larger_than_a_datagram_is_rejected_up_front() {
        let (mut sess, _peer) = server_and_peer();
        let mut buf = [0u8; MAX_DGRAM + 1];
        let err = sess.recv_datagram(&mut buf).unwrap_err();
        assert!(matches!(err, Error::BufferOversized { .. }));
        assert_eq!(sess.sequence(), 0);
    }
}
