//! Wirecall Server
//!
//! The server side of wirecall: an operation registry built at construction
//! time, a dispatcher that turns request bytes into an invocation, and one
//! server loop per transport.
//!
//! # Architecture
//!
//! ```text
//! channel.receive() -> dispatch -> handler -> encode -> channel.send()
//! ```
//!
//! - **[`Registry`]**: name → operation map; overloads are unsupported and
//!   the first registration of a name wins
//! - **[`dispatch`]**: decodes `(operation name, arguments)`, invokes the
//!   handler, returns a typed [`Response`]
//! - **[`TcpServer`]**: one accept thread plus one thread per live
//!   connection, with cooperative shutdown
//! - **[`UdpServer`]**: a single receive-dispatch-reply thread
//!
//! Codec and dispatch failures are logged and the loops keep serving;
//! critical socket failures shut the affected loop down.
//!
//! # Example
//!
//! ```
//! use wirecall_common::protocol::{Value, ValueDescriptor};
//! use wirecall_server::{Operation, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     "echo",
//!     Operation::new(
//!         vec![ValueDescriptor::Utf8String],
//!         Some(ValueDescriptor::Utf8String),
//!         |mut args| Ok(args.remove(0)),
//!     ),
//! );
//! # let _ = registry;
//! ```

pub mod dispatch;
pub mod registry;
pub mod tcp;
pub mod udp;

pub use dispatch::{dispatch, Response};
pub use registry::{Operation, Registry};
pub use tcp::TcpServer;
pub use udp::UdpServer;
