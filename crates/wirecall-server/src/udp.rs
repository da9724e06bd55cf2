//! The UDP server: a single receive-dispatch-reply thread.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use wirecall_common::codec;
use wirecall_common::protocol::{Result, WirecallError};
use wirecall_common::transport::UdpChannel;

use crate::dispatch::dispatch;
use crate::registry::Registry;

/// A single-threaded UDP server.
///
/// Messages are processed strictly in arrival order. Non-critical errors
/// (the idle-wait timeout, foreign or malformed packets, codec and dispatch
/// failures) are logged and the loop keeps serving; a critical socket error
/// ends it. Replies go to the address the message came from.
///
/// The channel's built-in handshake timeout doubles as the stop poll: the
/// loop observes the stop flag at least once per idle window, so `stop`
/// joins within a bounded time. A stopped server cannot be started again.
pub struct UdpServer {
    registry: Arc<Registry>,
    data_timeout: Option<Duration>,
    state: Option<Running>,
    stopped: bool,
}

struct Running {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl UdpServer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            data_timeout: None,
            state: None,
            stopped: false,
        }
    }

    /// Pre-configures the channel's per-packet timeout (default 1000 ms).
    ///
    /// Takes effect at [`start`](Self::start).
    pub fn set_data_timeout(&mut self, timeout: Duration) {
        self.data_timeout = Some(timeout);
    }

    /// Binds the message channel and spawns the server thread.
    pub fn start(&mut self, port: u16) -> Result<()> {
        if self.state.is_some() || self.stopped {
            return Err(WirecallError::Bind("server already started".to_string()));
        }

        let mut channel = UdpChannel::bind(("0.0.0.0", port))?;
        if let Some(timeout) = self.data_timeout {
            channel.set_data_timeout(timeout);
        }
        let local_addr = channel.local_addr()?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let registry = Arc::clone(&self.registry);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || serve(channel, registry, stop))
        };

        tracing::info!(%local_addr, "UDP server started");
        self.state = Some(Running {
            stop,
            thread,
            local_addr,
        });
        Ok(())
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.as_ref().map(|running| running.local_addr)
    }

    /// Stops the server and joins its thread. Idempotent.
    pub fn stop(&mut self) {
        self.stopped = true;
        let Some(running) = self.state.take() else {
            return;
        };
        running.stop.store(true, Ordering::SeqCst);
        if running.thread.join().is_err() {
            tracing::error!("server thread panicked");
        }
        tracing::info!("UDP server stopped");
    }
}

impl Drop for UdpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(mut channel: UdpChannel, registry: Arc<Registry>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        let message = match channel.receive() {
            Ok(message) => message,
            Err(WirecallError::Timeout(_)) => continue, // idle window
            Err(e) if e.is_critical() => {
                tracing::error!(error = %e, "stopping server");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "receive failed");
                continue;
            }
        };

        let response = match dispatch(&registry, &message) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "request failed");
                continue;
            }
        };

        let Some(returns) = &response.returns else {
            continue; // void: no reply
        };

        let mut reply = Vec::new();
        if let Err(e) = codec::encode(&mut reply, returns, &response.value) {
            tracing::warn!(error = %e, "reply did not encode");
            continue;
        }

        // Answer the source the receive recorded.
        let Some(peer) = channel.last_peer() else {
            continue;
        };
        match channel.send(&reply, peer) {
            Ok(()) => {}
            Err(e) if e.is_critical() => {
                tracing::error!(error = %e, "stopping server");
                break;
            }
            Err(e) => tracing::warn!(%peer, error = %e, "reply failed"),
        }
    }
}
