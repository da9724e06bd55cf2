//! Wirecall Common Types, Codec and Transport
//!
//! This crate provides the core protocol definitions, the binary codec and
//! the transport channels for the wirecall RPC system.
//!
//! # Overview
//!
//! Wirecall lets a client invoke named operations on a remote target by
//! transmitting the arguments as bytes and receiving the reply as bytes.
//! This crate contains the shared infrastructure used by both sides:
//!
//! - **Protocol Layer**: value descriptors, dynamic values and error handling
//! - **Codec**: descriptor-directed binary serialization
//! - **Transport Layer**: a framed TCP channel and a reliable-message UDP
//!   channel, each pairing every `send` with exactly one peer `receive`
//!
//! # Wire Format
//!
//! There is no type byte on the wire beyond a one-byte null tag per value
//! slot: both sides must agree on the descriptor list out of band. The RPC
//! layer enforces this by sending the operation name first and looking up
//! its signature on the receiving side.
//!
//! # Example
//!
//! ```
//! use wirecall_common::codec::{self, Reader};
//! use wirecall_common::protocol::{Value, ValueDescriptor};
//!
//! let mut buf = Vec::new();
//! codec::encode(&mut buf, &ValueDescriptor::Utf8String, &Value::from("hi")).unwrap();
//!
//! let mut reader = Reader::new(&buf);
//! let value = codec::decode(&mut reader, &ValueDescriptor::Utf8String).unwrap();
//! assert_eq!(value, Value::from("hi"));
//! ```

pub mod codec;
pub mod protocol;
pub mod transport;

pub use protocol::{Result, Value, ValueDescriptor, WirecallError};
