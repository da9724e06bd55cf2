use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use wirecall_common::codec::{self, Reader};
use wirecall_common::protocol::{Result, Value, ValueDescriptor, WirecallError};
use wirecall_common::transport::{TcpChannel, UdpChannel};

/// A client invoker over the framed TCP channel.
///
/// Cheap to share behind an `Arc`; concurrent callers are serialized by the
/// internal mutex so each request/response pair stays intact.
pub struct TcpClient {
    channel: Mutex<TcpChannel>,
}

impl TcpClient {
    /// Connects to a wirecall TCP server.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self {
            channel: Mutex::new(TcpChannel::connect(addr)?),
        })
    }

    /// Invokes `operation` with `args`.
    ///
    /// `returns = None` declares a void operation: nothing is read back and
    /// the call yields `None`. Otherwise the reply is decoded with the given
    /// descriptor; a null reply decodes to `Some(Value::Null)`.
    ///
    /// Errors (channel, codec or server-side) surface unchanged; the
    /// client stays usable unless the channel itself failed.
    pub fn invoke(
        &self,
        returns: Option<&ValueDescriptor>,
        operation: &str,
        args: &[(ValueDescriptor, Value)],
    ) -> Result<Option<Value>> {
        let request = encode_request(operation, args)?;
        tracing::debug!(operation, bytes = request.len(), "invoking over TCP");

        // send and (for non-void) receive as one atomic step: without the
        // lock, two threads could pair the wrong reply with their request
        let reply = {
            let mut channel = lock(&self.channel);
            channel.send(&request)?;
            match returns {
                Some(_) => Some(channel.receive()?),
                None => None,
            }
        };

        decode_reply(returns, reply)
    }

    /// Closes the underlying channel. Idempotent; later invocations fail
    /// with [`WirecallError::NotConnected`].
    pub fn disconnect(&self) {
        lock(&self.channel).close();
    }
}

/// A client invoker over the reliable-message UDP channel.
///
/// Bound to one server address at construction. The same serialization
/// guarantee as [`TcpClient`] applies.
pub struct UdpClient {
    channel: Mutex<UdpChannel>,
    server: SocketAddr,
}

impl UdpClient {
    /// Binds a local socket (`client_port = 0` for ephemeral) aimed at the
    /// given server.
    pub fn connect(server: impl ToSocketAddrs, client_port: u16) -> Result<Self> {
        let server = server
            .to_socket_addrs()
            .map_err(|e| WirecallError::Connect(format!("invalid address: {}", e)))?
            .next()
            .ok_or_else(|| {
                WirecallError::Connect("address resolved to nothing".to_string())
            })?;

        Ok(Self {
            channel: Mutex::new(UdpChannel::bind(("0.0.0.0", client_port))?),
            server,
        })
    }

    /// Sets the wait for the acknowledgment and each data packet (default
    /// 1000 ms).
    pub fn set_data_timeout(&self, timeout: Duration) {
        lock(&self.channel).set_data_timeout(timeout);
    }

    /// Closes the underlying channel. Idempotent; later invocations fail
    /// with [`WirecallError::NotConnected`].
    pub fn disconnect(&self) {
        lock(&self.channel).close();
    }

    /// Invokes `operation` with `args`. See [`TcpClient::invoke`].
    pub fn invoke(
        &self,
        returns: Option<&ValueDescriptor>,
        operation: &str,
        args: &[(ValueDescriptor, Value)],
    ) -> Result<Option<Value>> {
        let request = encode_request(operation, args)?;
        tracing::debug!(operation, bytes = request.len(), "invoking over UDP");

        let reply = {
            let mut channel = lock(&self.channel);
            channel.send(&request, self.server)?;
            match returns {
                Some(_) => Some(channel.receive()?),
                None => None,
            }
        };

        decode_reply(returns, reply)
    }
}

/// `operation name :: arg₁ :: … :: argₙ`, each a value slot.
fn encode_request(operation: &str, args: &[(ValueDescriptor, Value)]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    codec::encode(&mut buf, &ValueDescriptor::Utf8String, &Value::from(operation))?;
    for (descriptor, value) in args {
        codec::encode(&mut buf, descriptor, value)?;
    }
    Ok(buf)
}

fn decode_reply(
    returns: Option<&ValueDescriptor>,
    reply: Option<Vec<u8>>,
) -> Result<Option<Value>> {
    match (returns, reply) {
        (Some(descriptor), Some(bytes)) => {
            let mut reader = Reader::new(&bytes);
            Ok(Some(codec::decode(&mut reader, descriptor)?))
        }
        _ => Ok(None),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirecall_common::protocol::PrimitiveKind;

    #[test]
    fn test_encode_request_matches_wire_layout() {
        // "echo"("hi"): name slot then one string argument slot
        let request = encode_request(
            "echo",
            &[(ValueDescriptor::Utf8String, Value::from("hi"))],
        )
        .unwrap();
        assert_eq!(
            request,
            [
                0x00, 0x00, 0x00, 0x00, 0x04, 0x65, 0x63, 0x68, 0x6F, 0x00, 0x00, 0x00, 0x00,
                0x02, 0x68, 0x69
            ]
        );
    }

    #[test]
    fn test_encode_request_without_args() {
        let request = encode_request("ping", &[]).unwrap();
        assert_eq!(request.len(), 1 + 4 + 4);
    }

    #[test]
    fn test_decode_reply_for_void_operation() {
        assert_eq!(decode_reply(None, None).unwrap(), None);
    }

    #[test]
    fn test_decode_reply_value() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&7i32.to_be_bytes());
        let value = decode_reply(
            Some(&ValueDescriptor::Primitive(PrimitiveKind::I32)),
            Some(bytes),
        )
        .unwrap();
        assert_eq!(value, Some(Value::I32(7)));
    }

    #[test]
    fn test_connect_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(matches!(
            TcpClient::connect(("127.0.0.1", port)),
            Err(WirecallError::Connect(_))
        ));
    }
}
