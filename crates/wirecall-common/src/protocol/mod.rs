//! Wirecall Protocol Definitions
//!
//! This module defines the core protocol types for wirecall: the descriptor
//! tree that drives the codec, the dynamic value tree it produces, and the
//! error type used throughout the system.
//!
//! # Protocol Types
//!
//! - **[`ValueDescriptor`]**: the wire-shape description of a value slot
//! - **[`Value`]**: a decoded value graph (primitives, strings, arrays,
//!   records)
//! - **[`WirecallError`]**: the error type, with critical/non-critical
//!   classification
//!
//! # Error Handling
//!
//! Errors are classified by locality:
//! - **Critical**: socket create/bind/IO failures that leave a socket or
//!   loop unusable; server loops shut down
//! - **Connection-fatal**: failures that end one TCP connection but keep the
//!   server alive
//! - **Recoverable**: timeouts, malformed packets and codec or dispatch
//!   failures; loops log and keep going

pub mod descriptor;
pub mod error;
pub mod value;


pub use descriptor::{FieldDescriptor, PrimitiveKind, RecordDescriptor, ValueDescriptor};
pub use error::{Result, WirecallError};
pub use value::Value;
