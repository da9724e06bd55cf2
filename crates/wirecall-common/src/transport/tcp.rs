use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::protocol::error::{Result, WirecallError};

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Maximum accepted frame payload (100 MB), guarding the receive-side
/// allocation against a corrupt or hostile length prefix.
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// A message-framed TCP channel (synchronous).
///
/// Every `send` writes one frame; every `receive` reads one frame. The
/// channel is either `Open` or `Closed`; `close` is idempotent, and a
/// blocked `receive` on another thread is unblocked by closing the channel's
/// socket, surfacing [`WirecallError::ChannelClosed`] there.
///
/// # Wire Protocol
///
/// ```text
/// [4-byte length, big-endian] [length bytes of payload]
/// ```
///
/// # Example
///
/// ```no_run
/// use wirecall_common::transport::TcpChannel;
///
/// let mut channel = TcpChannel::connect("127.0.0.1:4710").unwrap();
/// channel.send(b"ping").unwrap();
/// let reply = channel.receive().unwrap();
/// # let _ = reply;
/// ```
pub struct TcpChannel {
    stream: TcpStream,
    closed: bool,
}

impl TcpChannel {
    /// Connects to a remote endpoint.
    ///
    /// The address may resolve to several socket addresses; each is tried in
    /// turn with a 2 s timeout until one accepts.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket_addrs = addr
            .to_socket_addrs()
            .map_err(|e| WirecallError::Connect(format!("invalid address: {}", e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(Self::from_stream(stream)),
                Err(e) => last_err = Some(e),
            }
        }

        Err(WirecallError::Connect(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "address resolved to nothing".to_string()),
        ))
    }

    /// Wraps an accepted socket (server side).
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Sends one framed message.
    ///
    /// Writes the 4-byte length prefix and the payload, then flushes so the
    /// frame leaves immediately.
    ///
    /// # Errors
    ///
    /// [`WirecallError::NotConnected`] on a closed channel;
    /// [`WirecallError::Io`] on a write failure.
    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        if self.closed {
            return Err(WirecallError::NotConnected);
        }

        let len = u32::try_from(message.len())
            .map_err(|_| WirecallError::FrameTooLarge(message.len() as u64))?;
        self.stream.write_all(&len.to_be_bytes())?;
        self.stream.write_all(message)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Receives one framed message.
    ///
    /// Blocks until a full frame arrives, the peer disconnects, or the
    /// socket is shut down by [`close`](Self::close) from another thread.
    ///
    /// # Errors
    ///
    /// - [`WirecallError::NotConnected`] on a closed channel
    /// - [`WirecallError::ChannelClosed`] when the peer disconnected before
    ///   the header
    /// - [`WirecallError::ShortHeader`] when the stream ended inside the
    ///   header
    /// - [`WirecallError::FrameTooLarge`] when the announced length exceeds
    ///   [`MAX_FRAME_SIZE`]
    /// - [`WirecallError::Io`] on a stream failure
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        if self.closed {
            return Err(WirecallError::NotConnected);
        }

        let mut header = [0u8; 4];
        let read = self.read_until_full(&mut header)?;
        if read == 0 {
            return Err(WirecallError::ChannelClosed);
        }
        if read < header.len() {
            return Err(WirecallError::ShortHeader(read));
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(WirecallError::FrameTooLarge(len as u64));
        }

        let mut message = vec![0u8; len];
        let read = self.read_until_full(&mut message)?;
        if read < len {
            return Err(WirecallError::ChannelClosed);
        }
        Ok(message)
    }

    /// Reads until `buf` is full or the stream ends; returns the byte count.
    fn read_until_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.stream.read(&mut buf[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        Ok(filled)
    }

    /// Closes the channel. Idempotent: closing an already-closed channel is
    /// a no-op.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            // NotConnected here just means the peer beat us to it
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
