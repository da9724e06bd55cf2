//! Value descriptors: the wire-shape description that drives the codec.
//!
//! There is no type information on the wire beyond the null tag, so both
//! peers must hold the same descriptor for every value slot they exchange.
//! Descriptors are normally produced once at startup (by hand or by a stub
//! generator) and shared by reference.

use super::error::{Result, WirecallError};
use super::value::Value;

/// A fixed-width primitive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    I8,
    /// 16-bit unsigned code unit.
    Char,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Encoded body size in bytes.
    pub const fn wire_size(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 => 1,
            PrimitiveKind::Char | PrimitiveKind::I16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::F64 => 8,
        }
    }

    pub const fn kind_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::Char => "char",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        }
    }
}

/// The wire shape of one value slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDescriptor {
    Primitive(PrimitiveKind),
    Utf8String,
    /// Array with a 32-bit signed length. Elements of a primitive array are
    /// written raw, without per-element null tags; elements of any other
    /// array are full value slots.
    Array(Box<ValueDescriptor>),
    Record(RecordDescriptor),
}

impl ValueDescriptor {
    /// Shorthand for an array of `element`.
    pub fn array(element: ValueDescriptor) -> Self {
        ValueDescriptor::Array(Box::new(element))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ValueDescriptor::Primitive(kind) => kind.kind_name(),
            ValueDescriptor::Utf8String => "string",
            ValueDescriptor::Array(_) => "array",
            ValueDescriptor::Record(_) => "record",
        }
    }

    /// The default value for a slot of this shape: zero for primitives,
    /// null for strings, arrays and records. Used for the fields the wire
    /// does not carry.
    pub fn default_value(&self) -> Value {
        match self {
            ValueDescriptor::Primitive(PrimitiveKind::Bool) => Value::Bool(false),
            ValueDescriptor::Primitive(PrimitiveKind::I8) => Value::I8(0),
            ValueDescriptor::Primitive(PrimitiveKind::Char) => Value::Char(0),
            ValueDescriptor::Primitive(PrimitiveKind::I16) => Value::I16(0),
            ValueDescriptor::Primitive(PrimitiveKind::I32) => Value::I32(0),
            ValueDescriptor::Primitive(PrimitiveKind::I64) => Value::I64(0),
            ValueDescriptor::Primitive(PrimitiveKind::F32) => Value::F32(0.0),
            ValueDescriptor::Primitive(PrimitiveKind::F64) => Value::F64(0.0),
            ValueDescriptor::Utf8String
            | ValueDescriptor::Array(_)
            | ValueDescriptor::Record(_) => Value::Null,
        }
    }
}

/// One declared field of a record.
///
/// Immutable fields never travel on the wire: the encoder skips them and the
/// decoder leaves them at their default.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub descriptor: ValueDescriptor,
    pub immutable: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, descriptor: ValueDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            immutable: false,
        }
    }

    pub fn immutable(name: impl Into<String>, descriptor: ValueDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            immutable: true,
        }
    }
}

/// A composite record: an ordered field list plus an optional prototype.
///
/// The prototype is the host-supplied factory for default instances. When
/// present, decoding starts from a clone of it; otherwise each field starts
/// at its descriptor default. The field order here is the wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    pub fields: Vec<FieldDescriptor>,
    prototype: Option<Vec<Value>>,
}

impl RecordDescriptor {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            fields,
            prototype: None,
        }
    }

    /// Attach a default instance, one value per declared field.
    pub fn with_prototype(mut self, prototype: Vec<Value>) -> Self {
        self.prototype = Some(prototype);
        self
    }

    /// Build the default instance the decoder fills in.
    ///
    /// Fails with [`WirecallError::UnconstructibleRecord`] when the attached
    /// prototype does not cover the declared fields.
    pub fn instantiate(&self) -> Result<Vec<Value>> {
        match &self.prototype {
            Some(prototype) => {
                if prototype.len() != self.fields.len() {
                    return Err(WirecallError::UnconstructibleRecord(format!(
                        "prototype has {} values for {} fields",
                        prototype.len(),
                        self.fields.len()
                    )));
                }
                Ok(prototype.clone())
            }
            None => Ok(self
                .fields
                .iter()
                .map(|field| field.descriptor.default_value())
                .collect()),
        }
    }
}
