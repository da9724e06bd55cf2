use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::codec::Reader;
use crate::protocol::error::{Result, WirecallError};

/// A reliable-message channel over datagram sockets (synchronous).
///
/// Every `send` pairs with exactly one `receive` at the peer. A message
/// travels as one handshake packet followed by index-addressed data packets:
///
/// ```text
/// handshake   [tag = -1 : i8][id : i32][message size : i32]
/// data        [tag = -2 : i8][id : i32][index : i32][chunk size : i32][chunk]
/// ```
///
/// All integers are big-endian. The receiver acknowledges the handshake by
/// echoing it; that single acknowledgment gates the whole burst, and data
/// packets are not individually acknowledged. Delivery relies on LAN
/// ordering plus the index-addressed reassembly buffer; the protocol is not
/// safe on lossy links, which is a design limit rather than a defect.
///
/// Errors are split into critical (the socket is unusable: bind and IO
/// failures) and non-critical (timeouts, foreign or malformed packets);
/// server loops stop on the former and keep serving on the latter. See
/// [`WirecallError::is_critical`].
pub struct UdpChannel {
    socket: UdpSocket,
    data_timeout: Duration,
    last_peer: Option<SocketAddr>,
    closed: bool,
}

/// Maximum datagram size, well under the 65 535-byte IP limit minus headers.
pub const MAX_PACKET_SIZE: usize = 60_000;

/// Payload bytes per data packet: the packet minus its 13-byte header.
pub const MAX_DATA_SIZE: usize = MAX_PACKET_SIZE - 3 * 4 - 1;

const HANDSHAKE_TAG: i8 = -1;
const DATA_TAG: i8 = -2;

const HANDSHAKE_LEN: usize = 1 + 2 * 4;
const DATA_HEADER_LEN: usize = 1 + 3 * 4;

/// Absolute wait for the first handshake of an incoming message.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default wait for the acknowledgment and each data packet.
const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_millis(1000);

impl UdpChannel {
    /// Binds a channel to the given local address (`port 0` for ephemeral).
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|e| WirecallError::Bind(e.to_string()))?;
        Ok(Self {
            socket,
            data_timeout: DEFAULT_DATA_TIMEOUT,
            last_peer: None,
            closed: false,
        })
    }

    /// Sets the wait for the acknowledgment and each data packet.
    ///
    /// The default is 1000 ms; tune it to the link quality.
    pub fn set_data_timeout(&mut self, timeout: Duration) {
        self.data_timeout = timeout;
    }

    /// The source address of the last message [`receive`](Self::receive)
    /// accepted; the server addresses its reply here.
    pub fn last_peer(&self) -> Option<SocketAddr> {
        self.last_peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Marks the channel closed. Idempotent; later `send` and `receive`
    /// calls fail with [`WirecallError::NotConnected`].
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sends one message to `peer`.
    ///
    /// Transmits the handshake, waits for its echo under the data timeout,
    /// then streams the data packets without further acknowledgment. For the
    /// duration of the exchange, datagrams from any other source are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Non-critical: [`WirecallError::Timeout`] when the acknowledgment
    /// never arrives, [`WirecallError::UnexpectedPacket`] when the reply is
    /// not a handshake. Critical: [`WirecallError::Io`] from the socket
    /// layer.
    pub fn send(&mut self, message: &[u8], peer: SocketAddr) -> Result<()> {
        if self.closed {
            return Err(WirecallError::NotConnected);
        }

        let message_id: i32 = rand::random();
        let packets = message.len().div_ceil(MAX_DATA_SIZE);

        // [handshake_tag][message_id][message_size]
        let mut handshake = Vec::with_capacity(HANDSHAKE_LEN);
        handshake.push(HANDSHAKE_TAG as u8);
        handshake.extend_from_slice(&message_id.to_be_bytes());
        let size = i32::try_from(message.len())
            .map_err(|_| WirecallError::MalformedLength(message.len() as i64))?;
        handshake.extend_from_slice(&size.to_be_bytes());

        self.socket.send_to(&handshake, peer)?;

        // The acknowledgment is the handshake echoed back; nothing else is
        // expected on the socket until then.
        let ack = self.receive_from_peer(peer, self.data_timeout)?;
        let tag = Reader::new(&ack).read_i8()?;
        if tag != HANDSHAKE_TAG {
            return Err(WirecallError::UnexpectedPacket {
                expected: HANDSHAKE_TAG,
                found: tag,
            });
        }

        let mut packet = Vec::with_capacity(MAX_PACKET_SIZE);
        for (index, chunk) in message.chunks(MAX_DATA_SIZE).enumerate() {
            // [data_tag][message_id][packet_index][data_size][data]
            packet.clear();
            packet.push(DATA_TAG as u8);
            packet.extend_from_slice(&message_id.to_be_bytes());
            packet.extend_from_slice(&(index as i32).to_be_bytes());
            packet.extend_from_slice(&(chunk.len() as i32).to_be_bytes());
            packet.extend_from_slice(chunk);
            self.socket.send_to(&packet, peer)?;
        }

        tracing::trace!(id = message_id, packets, size = message.len(), "message sent");
        Ok(())
    }

    /// Receives one message.
    ///
    /// Waits up to 2000 ms for a handshake from any source, locks onto that
    /// sender, acknowledges, then collects the announced data packets under
    /// the data timeout. Foreign, stale and malformed data packets are
    /// dropped without advancing; a packet pointing outside the announced
    /// size is [`WirecallError::OutOfBounds`].
    ///
    /// A zero-size message is legal: the handshake announces `0`, no data
    /// packets follow, and an empty buffer is returned.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        if self.closed {
            return Err(WirecallError::NotConnected);
        }

        let (handshake, peer) = self.receive_from_any(HANDSHAKE_TIMEOUT)?;

        let mut header = Reader::new(&handshake);
        let tag = header.read_i8()?;
        if tag != HANDSHAKE_TAG {
            return Err(WirecallError::UnexpectedPacket {
                expected: HANDSHAKE_TAG,
                found: tag,
            });
        }
        let message_id = header.read_i32()?;
        let size = header.read_i32()?;
        if size < 0 {
            return Err(WirecallError::MalformedLength(i64::from(size)));
        }
        let size = size as usize;

        self.last_peer = Some(peer);

        let mut message = vec![0u8; size];
        let packets = size.div_ceil(MAX_DATA_SIZE);

        // Echo the handshake back as the acknowledgment.
        self.socket.send_to(&handshake, peer)?;

        let mut received = 0;
        while received < packets {
            let packet = self.receive_from_peer(peer, self.data_timeout)?;
            let mut header = Reader::new(&packet);

            // Wrong tag or stale id: a foreign packet, skip it without
            // advancing.
            if header.read_i8()? != DATA_TAG || header.read_i32()? != message_id {
                tracing::trace!("discarding foreign packet during receive");
                continue;
            }

            let index = header.read_i32()?;
            let chunk_size = header.read_i32()?;
            if index < 0
                || chunk_size < 0
                || chunk_size as usize > packet.len() - DATA_HEADER_LEN
                || (index as usize) * MAX_DATA_SIZE + chunk_size as usize > size
            {
                return Err(WirecallError::OutOfBounds {
                    index,
                    chunk: chunk_size,
                    size,
                });
            }

            let offset = index as usize * MAX_DATA_SIZE;
            message[offset..offset + chunk_size as usize]
                .copy_from_slice(header.read_bytes(chunk_size as usize)?);
            received += 1;
        }

        tracing::trace!(id = message_id, packets, size, "message received");
        Ok(message)
    }

    /// One datagram from anywhere, under `timeout`.
    fn receive_from_any(&self, timeout: Duration) -> Result<(Vec<u8>, SocketAddr)> {
        self.socket.set_read_timeout(Some(timeout))?;
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let (len, src) = self
            .socket
            .recv_from(&mut buf)
            .map_err(|e| map_timeout(e, timeout))?;
        Ok((buf[..len].to_vec(), src))
    }

    /// One datagram from `peer`, under `timeout` overall.
    ///
    /// The userspace rendition of the original's connected-socket filter:
    /// datagrams from other sources are dropped, and the time they consumed
    /// counts against the same deadline.
    fn receive_from_peer(&self, peer: SocketAddr, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = std::time::Instant::now() + timeout;
        let mut buf = [0u8; MAX_PACKET_SIZE];

        loop {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or(WirecallError::Timeout(timeout.as_millis() as u64))?;
            self.socket.set_read_timeout(Some(remaining))?;

            let (len, src) = self
                .socket
                .recv_from(&mut buf)
                .map_err(|e| map_timeout(e, timeout))?;
            if src == peer {
                return Ok(buf[..len].to_vec());
            }
            tracing::trace!(%src, "dropping datagram from a foreign source");
        }
    }
}

fn map_timeout(err: std::io::Error, timeout: Duration) -> WirecallError {
    match err.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
            WirecallError::Timeout(timeout.as_millis() as u64)
        }
        _ => WirecallError::Io(err),
    }
}
