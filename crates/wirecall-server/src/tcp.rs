//! The TCP server: one accept thread, one thread per live connection.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use wirecall_common::codec;
use wirecall_common::protocol::{Result, WirecallError};
use wirecall_common::transport::TcpChannel;

use crate::dispatch::dispatch;
use crate::registry::Registry;

/// How often the accept loop checks the stop flag between polls.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A threaded TCP server.
///
/// Each accepted socket gets its own connection thread running
/// `receive → dispatch → send-if-non-void`. A connection whose peer
/// disconnects removes itself from the live set; codec and dispatch errors
/// are logged and the connection keeps serving.
///
/// `stop` ends the accept loop, then closes every live connection's socket
/// (unblocking its `receive`) and joins its thread. A stopped server cannot
/// be started again.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wirecall_common::protocol::{Value, ValueDescriptor};
/// use wirecall_server::{Operation, Registry, TcpServer};
///
/// let mut registry = Registry::new();
/// registry.register(
///     "echo",
///     Operation::new(
///         vec![ValueDescriptor::Utf8String],
///         Some(ValueDescriptor::Utf8String),
///         |mut args| Ok(args.remove(0)),
///     ),
/// );
///
/// let mut server = TcpServer::new(Arc::new(registry));
/// server.start(4710).unwrap();
/// // ... serve ...
/// server.stop();
/// ```
pub struct TcpServer {
    registry: Arc<Registry>,
    state: Option<Running>,
    stopped: bool,
}

struct Running {
    stop: Arc<AtomicBool>,
    accept_thread: JoinHandle<()>,
    connections: Arc<Mutex<HashMap<u64, LiveConnection>>>,
    local_addr: SocketAddr,
}

struct LiveConnection {
    socket: TcpStream,
    thread: JoinHandle<()>,
}

impl TcpServer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            state: None,
            stopped: false,
        }
    }

    /// Binds the listener and spawns the accept thread.
    ///
    /// Port `0` binds an ephemeral port; see [`local_addr`](Self::local_addr).
    pub fn start(&mut self, port: u16) -> Result<()> {
        if self.state.is_some() || self.stopped {
            return Err(WirecallError::Bind("server already started".to_string()));
        }

        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| WirecallError::Bind(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| WirecallError::Bind(e.to_string()))?;
        // Accept in non-blocking mode so the stop flag can interrupt the loop.
        listener
            .set_nonblocking(true)
            .map_err(|e| WirecallError::Bind(e.to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(Mutex::new(HashMap::new()));

        let accept_thread = {
            let registry = Arc::clone(&self.registry);
            let stop = Arc::clone(&stop);
            let connections = Arc::clone(&connections);
            std::thread::spawn(move || accept_loop(listener, registry, stop, connections))
        };

        tracing::info!(%local_addr, "TCP server started");
        self.state = Some(Running {
            stop,
            accept_thread,
            connections,
            local_addr,
        });
        Ok(())
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.as_ref().map(|running| running.local_addr)
    }

    /// Live connections at this instant.
    pub fn connection_count(&self) -> usize {
        self.state
            .as_ref()
            .map(|running| lock(&running.connections).len())
            .unwrap_or(0)
    }

    /// Stops the server: ends the accept loop, then closes and joins every
    /// live connection. Idempotent; the server cannot be restarted.
    pub fn stop(&mut self) {
        self.stopped = true;
        let Some(running) = self.state.take() else {
            return;
        };

        running.stop.store(true, Ordering::SeqCst);
        if running.accept_thread.join().is_err() {
            tracing::error!("accept thread panicked");
        }

        // Drain outside the lock so a connection mid-self-removal cannot
        // deadlock against the join below.
        let live: Vec<LiveConnection> = lock(&running.connections).drain().map(|(_, c)| c).collect();
        for connection in live {
            // Unblocks the connection's receive; it observes ChannelClosed
            // and exits.
            let _ = connection.socket.shutdown(Shutdown::Both);
            if connection.thread.join().is_err() {
                tracing::error!("connection thread panicked");
            }
        }
        tracing::info!("TCP server stopped");
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    stop: Arc<AtomicBool>,
    connections: Arc<Mutex<HashMap<u64, LiveConnection>>>,
) {
    static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

    while !stop.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
                continue;
            }
            Err(e) => {
                tracing::error!(error = %WirecallError::Accept(e.to_string()), "stopping server");
                break;
            }
        };
        if stream.set_nonblocking(false).is_err() {
            continue;
        }

        tracing::info!(%peer, "connection established");
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let socket = match stream.try_clone() {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!(%peer, error = %e, "cannot clone socket, dropping connection");
                continue;
            }
        };

        // Register under the lock before the connection can run to its own
        // removal, so a short-lived connection never leaves a stale entry.
        let mut live = lock(&connections);
        let thread = {
            let registry = Arc::clone(&registry);
            let connections = Arc::clone(&connections);
            let channel = TcpChannel::from_stream(stream);
            std::thread::spawn(move || connection_loop(channel, registry, connections, id, peer))
        };
        live.insert(id, LiveConnection { socket, thread });
    }
}

/// Serves one connection until its peer disconnects or the server stops.
fn connection_loop(
    mut channel: TcpChannel,
    registry: Arc<Registry>,
    connections: Arc<Mutex<HashMap<u64, LiveConnection>>>,
    id: u64,
    peer: SocketAddr,
) {
    loop {
        let message = match channel.receive() {
            Ok(message) => message,
            Err(e) if e.is_connection_fatal() => {
                tracing::debug!(%peer, error = %e, "connection ended");
                break;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "receive failed");
                continue;
            }
        };

        let response = match dispatch(&registry, &message) {
            Ok(response) => response,
            Err(e) => {
                // Recoverable: drop the request, keep the connection.
                tracing::warn!(%peer, error = %e, "request failed");
                continue;
            }
        };

        let Some(returns) = &response.returns else {
            continue; // void: no reply
        };

        let mut reply = Vec::new();
        if let Err(e) = codec::encode(&mut reply, returns, &response.value) {
            tracing::warn!(%peer, error = %e, "reply did not encode");
            continue;
        }
        if let Err(e) = channel.send(&reply) {
            tracing::debug!(%peer, error = %e, "connection ended on send");
            break;
        }
    }

    channel.close();
    lock(&connections).remove(&id);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
