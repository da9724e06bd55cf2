//! Wirecall Transport Layer
//!
//! Two channels, one guarantee: every `send` on a channel pairs with exactly
//! one `receive` at the peer, carrying the same bytes.
//!
//! - **[`TcpChannel`]**: one message per length-prefixed frame on a stream
//!   socket. Wire format: `[4-byte length, big-endian][payload]`.
//! - **[`UdpChannel`]**: one message per handshake-and-ordered-fragments
//!   exchange on a datagram socket. Safe on a LAN, not on lossy links.
//!
//! Channels move raw bytes; pairing them with the codec is the callers'
//! business (the client invoker and the server loops).
//!
//! Neither channel supports more than one in-flight message per direction:
//! callers serialize access (the client invoker holds a mutex across its
//! `send`/`receive` pair).

pub mod tcp;
pub mod udp;


pub use tcp::TcpChannel;
pub use udp::{UdpChannel, MAX_DATA_SIZE, MAX_PACKET_SIZE};
