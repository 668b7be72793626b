//! # seqlink — a minimal reliable-delivery session protocol 🔗 over UDP
//!
//! Connection establishment, fragmented data transfer with acknowledgment,
//! and graceful teardown, layered over plain UDP. Every datagram carries a
//! fixed 20-byte control header; payloads above 512 bytes are split into
//! acknowledged fragments and reassembled in arrival order.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  message-level driver      connect / listen / send /   │
//! │  (xfer)                    recv / disconnect           │
//! ├────────────────────────────────────────────────────────┤
//! │  datagram-level driver     one datagram in, one reply  │
//! │  (dgram)                   out, sequence bookkeeping   │
//! ├────────────────────────────────────────────────────────┤
//! │  session + raw adapter     peer slots, one send_to /   │
//! │  (sess)                    recv_from per call          │
//! ├────────────────────────────────────────────────────────┤
//! │  UDP                       unreliable, unordered       │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Every layer is synchronous and blocking; one session is driven by one
//! thread. There is no retransmission and no receive timeout unless a
//! deadline is configured — the protocol assumes the low-loss, in-order
//! behavior of a loopback-style network.

mod dgram;
pub mod error;
pub mod pdu;
mod sess;
pub mod util;
mod xfer;

pub use error::Error;
pub use sess::{Session, SessionConfig};
