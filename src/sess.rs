//! Session state and the raw transport adapter.
//!
//! A [`Session`] is the stateful record of one logical connection: the
//! sequence counter, the UDP socket, the connected flag, and the two peer
//! address slots. The raw layer ([`Session::send_raw`],
//! [`Session::recv_raw`]) moves exactly one datagram to or from the
//! unreliable transport and knows nothing about protocol semantics beyond
//! tracing the header.
//!
//! One session is driven by one thread at a time; nothing here is
//! synchronized for concurrent callers.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::error::Error;
use crate::pdu::{MAX_DGRAM, Pdu};

/// Construction-time knobs for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Emit a `debug!` trace for every PDU in and out.
    pub debug: bool,
    /// Give up on a blocking receive after this long. `None` blocks
    /// forever, which is the protocol's native behavior: a lost peer reply
    /// stalls the caller indefinitely.
    pub recv_deadline: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { debug: true, recv_deadline: None }
    }
}

/// One peer address slot. A slot is "initialized" once it holds an
/// address; sends require the outbound slot, receives the inbound one.
#[derive(Debug, Clone, Copy, Default)]
struct PeerSlot {
    addr: Option<SocketAddr>,
}

impl PeerSlot {
    fn set(&mut self, addr: SocketAddr) {
        self.addr = Some(addr);
    }

    fn is_init(&self) -> bool {
        self.addr.is_some()
    }

    fn require(&self, which: &'static str) -> Result<SocketAddr, Error> {
        self.addr.ok_or(Error::AddrNotInit(which))
    }
}

/// The stateful record of one logical connection over UDP.
pub struct Session {
    /// Monotonically non-decreasing; advanced by every successful send or
    /// receive of a datagram.
    seq: u32,
    /// `None` once the session has been released.
    sock: Option<UdpSocket>,
    connected: bool,
    outbound: PeerSlot,
    inbound: PeerSlot,
    debug: bool,
}

impl Session {
    fn new(sock: UdpSocket, config: &SessionConfig) -> Result<Session, Error> {
        sock.set_read_timeout(config.recv_deadline)?;
        Ok(Session {
            seq: 0,
            sock: Some(sock),
            connected: false,
            outbound: PeerSlot::default(),
            inbound: PeerSlot::default(),
            debug: config.debug,
        })
    }

    /// Server-role session bound to the wildcard address on `port`, with
    /// address reuse enabled so repeated test runs are not blocked by
    /// lingering ports. The peer stays unknown until the first datagram
    /// arrives.
    pub fn server(port: u16) -> Result<Session, Error> {
        Session::server_with(port, SessionConfig::default())
    }

    pub fn server_with(port: u16, config: SessionConfig) -> Result<Session, Error> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        sock.set_reuse_address(true)?;
        #[cfg(unix)]
        sock.set_reuse_port(true)?;
        sock.bind(&bind_addr.into())?;

        let mut sess = Session::new(sock.into(), &config)?;
        sess.inbound.set(sess.local_addr()?);
        Ok(sess)
    }

    /// Client-role session targeting `host:port`. The inbound slot is a
    /// copy of the outbound one: the client expects replies from the same
    /// address it sends to.
    pub fn client(host: &str, port: u16) -> Result<Session, Error> {
        Session::client_with(host, port, SessionConfig::default())
    }

    pub fn client_with(host: &str, port: u16, config: SessionConfig) -> Result<Session, Error> {
        let peer = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no usable server address"))?;
        let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;

        let mut sess = Session::new(sock, &config)?;
        sess.outbound.set(peer);
        sess.inbound.set(peer);
        Ok(sess)
    }

    // accessors

    pub fn sequence(&self) -> u32 {
        self.seq
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_closed(&self) -> bool {
        self.sock.is_none()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.sock()?.local_addr()?)
    }

    /// The peer this session sends to: configured for a client, learned
    /// from the first inbound datagram for a server.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.outbound.addr
    }

    /// Largest datagram the session will stage: one header plus one full
    /// payload.
    pub fn max_dgram(&self) -> usize {
        MAX_DGRAM
    }

    // crate-internal state transitions, driven by the protocol layers

    pub(crate) fn advance_seq(&mut self, by: u32) {
        self.seq += by;
    }

    pub(crate) fn adopt_seq(&mut self, seq: u32) {
        self.seq = seq;
    }

    pub(crate) fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Drop the socket and leave the session unusable. Safe to call twice.
    pub(crate) fn release(&mut self) {
        self.sock = None;
        self.connected = false;
    }

    fn sock(&self) -> Result<&UdpSocket, Error> {
        self.sock.as_ref().ok_or(Error::Closed)
    }

    // raw transport adapter

    /// Transmit exactly `bytes` to the outbound peer. Returns the count
    /// actually transmitted; callers compare it against what they asked
    /// for to detect partial sends. No retries here.
    pub(crate) fn send_raw(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        let peer = self.outbound.require("outbound")?;
        let n = self.sock()?.send_to(bytes, peer)?;
        self.trace_pdu("out", bytes);
        Ok(n)
    }

    /// Block until one datagram arrives (honoring the configured
    /// deadline), record the sender as the outbound peer, and return the
    /// byte count. The first such recording is the moment a server-role
    /// session learns who it is talking to.
    pub(crate) fn recv_raw(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.inbound.require("inbound")?;
        let (n, src) = self.sock()?.recv_from(buf)?;
        if !self.outbound.is_init() {
            info!(peer = %src, "learned peer address from first inbound datagram");
        }
        self.outbound.set(src);
        self.trace_pdu("in", &buf[..n]);
        Ok(n)
    }

    fn trace_pdu(&self, dir: &str, bytes: &[u8]) {
        if !self.debug {
            return;
        }
        if let Ok(pdu) = Pdu::parse(bytes) {
            debug!(
                dir,
                version = pdu.version,
                mtype = pdu.type_name(),
                seq = pdu.seq,
                size = pdu.payload_size,
                err = pdu.err,
                "pdu"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{HEADER_LEN, MsgType};

    fn quiet() -> SessionConfig {
        SessionConfig { debug: false, recv_deadline: None }
    }

    #[test]
    fn server_slots_start_half_initialized() {
        let sess = Session::server_with(0, quiet()).unwrap();
        assert!(sess.inbound.is_init());
        assert!(!sess.outbound.is_init());
        assert_eq!(sess.sequence(), 0);
        assert!(!sess.is_connected());
    }

    #[test]
    fn client_slots_both_point_at_the_server() {
        let sess = Session::client_with("127.0.0.1", 2080, quiet()).unwrap();
        assert_eq!(sess.inbound.addr, sess.outbound.addr);
        assert_eq!(sess.peer_addr().unwrap().port(), 2080);
    }

    #[test]
    fn send_without_peer_is_a_precondition_failure() {
        let mut sess = Session::server_with(0, quiet()).unwrap();
        let err = sess.send_raw(b"anything").unwrap_err();
        assert!(matches!(err, Error::AddrNotInit("outbound")));
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn recv_learns_the_sender_as_outbound_peer() {
        let mut sess = Session::server_with(0, quiet()).unwrap();
        let addr = sess.local_addr().unwrap();

        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.send_to(&Pdu::control(MsgType::SEND, 0).to_bytes(), ("127.0.0.1", addr.port()))
            .unwrap();

        let mut buf = [0u8; MAX_DGRAM];
        let n = sess.recv_raw(&mut buf).unwrap();
        assert_eq!(n, HEADER_LEN);
        assert_eq!(sess.peer_addr(), Some(peer.local_addr().unwrap()));
    }

    #[test]
    fn released_session_reports_closed() {
        let mut sess = Session::client_with("127.0.0.1", 2080, quiet()).unwrap();
        sess.release();
        assert!(sess.is_closed());
        assert!(matches!(sess.send_raw(b"x"), Err(Error::Closed)));
        assert!(matches!(sess.local_addr(), Err(Error::Closed)));
    }

    #[test]
    fn recv_deadline_turns_silence_into_a_transport_error() {
        let cfg = SessionConfig { debug: false, recv_deadline: Some(Duration::from_millis(30)) };
        let mut sess = Session::server_with(0, cfg).unwrap();
        let mut buf = [0u8; MAX_DGRAM];
        assert!(matches!(sess.recv_raw(&mut buf), Err(Error::Transport(_))));
    }
}
