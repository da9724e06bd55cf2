//! Wirecall Client
//!
//! Client-side invokers for the wirecall RPC system. An invoker encodes
//! `(operation name, arguments)`, sends the message through its channel and,
//! for non-void operations, receives and decodes the reply.
//!
//! Invocations on one client are serialized: the `send`/`receive` pair runs
//! under a mutex as one atomic step, so paired request/response frames can
//! never interleave across threads sharing a client.
//!
//! # Example
//!
//! ```no_run
//! use wirecall_client::TcpClient;
//! use wirecall_common::protocol::{Value, ValueDescriptor};
//!
//! let client = TcpClient::connect("127.0.0.1:4710").unwrap();
//! let reply = client
//!     .invoke(
//!         Some(&ValueDescriptor::Utf8String),
//!         "echo",
//!         &[(ValueDescriptor::Utf8String, Value::from("hi"))],
//!     )
//!     .unwrap();
//! assert_eq!(reply, Some(Value::from("hi")));
//! ```

pub mod client;

pub use client::{TcpClient, UdpClient};
