//! Descriptor-directed binary codec.
//!
//! [`encode`] appends the byte form of one value slot to a buffer;
//! [`decode`] consumes exactly those bytes from a [`Reader`] and rebuilds
//! the value. Both run in a single linear pass and never rewind.
//!
//! # Wire Format
//!
//! Every value slot, except the elements of a primitive array, starts with a
//! one-byte null tag (`0` present, `1` null). A present body is:
//!
//! ```text
//! primitive   [big-endian fixed-width bytes]
//! string      [byte length : i32][UTF-8 bytes]
//! array       [length : i32][elements]       primitive elements are raw,
//!                                            composite elements are slots
//! record      [non-immutable field slots in declared order]
//! ```
//!
//! The format is descriptor-driven, not tag-driven: messages carry no type
//! information, so decoding with the wrong descriptor yields garbage or a
//! decode error, never a type-negotiation round trip.

use crate::protocol::descriptor::{PrimitiveKind, RecordDescriptor, ValueDescriptor};
use crate::protocol::error::{Result, WirecallError};
use crate::protocol::value::Value;

#[cfg(test)]
mod tests;

/// Maximum composite nesting depth, identical on encode and decode.
///
/// Bounds the recursion of the codec; value graphs nested deeper than this
/// are rejected with [`WirecallError::DepthExceeded`] on both sides.
pub const MAX_DEPTH: usize = 20;

const TAG_PRESENT: u8 = 0;
const TAG_NULL: u8 = 1;

/// A forward-only cursor over a byte slice.
///
/// All multi-byte reads are big-endian. Running out of bytes yields
/// [`WirecallError::UnexpectedEnd`] with the shortfall.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(WirecallError::UnexpectedEnd {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.take(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut body = [0u8; 8];
        body.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(body))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let mut body = [0u8; 8];
        body.copy_from_slice(self.take(8)?);
        Ok(f64::from_be_bytes(body))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }
}

/// Encode one value slot into `out`.
///
/// The value must conform to the descriptor; a shape mismatch yields
/// [`WirecallError::TypeMismatch`]. `Null` is legal for every slot except a
/// primitive-array element.
pub fn encode(out: &mut Vec<u8>, descriptor: &ValueDescriptor, value: &Value) -> Result<()> {
    encode_slot(out, descriptor, value, 0)
}

/// Decode one value slot directed by `descriptor`.
///
/// Consumes exactly the bytes the matching [`encode`] produced and leaves
/// the reader positioned after them.
pub fn decode(reader: &mut Reader<'_>, descriptor: &ValueDescriptor) -> Result<Value> {
    decode_slot(reader, descriptor, 0)
}

fn encode_slot(
    out: &mut Vec<u8>,
    descriptor: &ValueDescriptor,
    value: &Value,
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(WirecallError::DepthExceeded);
    }

    if value.is_null() {
        out.push(TAG_NULL);
        return Ok(());
    }
    out.push(TAG_PRESENT);

    match descriptor {
        ValueDescriptor::Primitive(kind) => encode_primitive(out, *kind, value),
        ValueDescriptor::Utf8String => {
            let Value::Str(text) = value else {
                return Err(mismatch(descriptor, value));
            };
            write_len(out, text.len())?;
            out.extend_from_slice(text.as_bytes());
            Ok(())
        }
        ValueDescriptor::Array(element) => encode_array(out, element, value, depth),
        ValueDescriptor::Record(record) => encode_record(out, record, value, depth),
    }
}

fn encode_primitive(out: &mut Vec<u8>, kind: PrimitiveKind, value: &Value) -> Result<()> {
    match (kind, value) {
        (PrimitiveKind::Bool, Value::Bool(v)) => out.push(u8::from(*v)),
        (PrimitiveKind::I8, Value::I8(v)) => out.push(*v as u8),
        (PrimitiveKind::Char, Value::Char(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (PrimitiveKind::I16, Value::I16(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (PrimitiveKind::I32, Value::I32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (PrimitiveKind::I64, Value::I64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (PrimitiveKind::F32, Value::F32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (PrimitiveKind::F64, Value::F64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (kind, value) => {
            return Err(WirecallError::TypeMismatch {
                expected: kind.kind_name().to_string(),
                found: value.kind_name().to_string(),
            })
        }
    }
    Ok(())
}

fn encode_array(
    out: &mut Vec<u8>,
    element: &ValueDescriptor,
    value: &Value,
    depth: usize,
) -> Result<()> {
    let Value::Array(items) = value else {
        return Err(WirecallError::TypeMismatch {
            expected: "array".to_string(),
            found: value.kind_name().to_string(),
        });
    };
    write_len(out, items.len())?;

    match element {
        /* raw bodies, no per-element tags: primitive elements cannot be null */
        ValueDescriptor::Primitive(kind) => {
            for item in items {
                encode_primitive(out, *kind, item)?;
            }
        }
        _ => {
            for item in items {
                encode_slot(out, element, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn encode_record(
    out: &mut Vec<u8>,
    record: &RecordDescriptor,
    value: &Value,
    depth: usize,
) -> Result<()> {
    let Value::Record(fields) = value else {
        return Err(WirecallError::TypeMismatch {
            expected: "record".to_string(),
            found: value.kind_name().to_string(),
        });
    };
    if fields.len() != record.fields.len() {
        return Err(WirecallError::TypeMismatch {
            expected: format!("record with {} fields", record.fields.len()),
            found: format!("record with {} fields", fields.len()),
        });
    }

    for (field, value) in record.fields.iter().zip(fields) {
        if !field.immutable {
            encode_slot(out, &field.descriptor, value, depth + 1)?;
        }
    }
    Ok(())
}

fn decode_slot(
    reader: &mut Reader<'_>,
    descriptor: &ValueDescriptor,
    depth: usize,
) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(WirecallError::DepthExceeded);
    }

    match reader.read_u8()? {
        TAG_PRESENT => {}
        TAG_NULL => {
            return match descriptor {
                ValueDescriptor::Primitive(_) => Err(WirecallError::NullPrimitive),
                _ => Ok(Value::Null),
            };
        }
        tag => return Err(WirecallError::MalformedTag(tag)),
    }

    match descriptor {
        ValueDescriptor::Primitive(kind) => decode_primitive(reader, *kind),
        ValueDescriptor::Utf8String => {
            let length = read_len(reader)?;
            let bytes = reader.read_bytes(length)?;
            Ok(Value::Str(String::from_utf8(bytes.to_vec())?))
        }
        ValueDescriptor::Array(element) => decode_array(reader, element, depth),
        ValueDescriptor::Record(record) => decode_record(reader, record, depth),
    }
}

fn decode_primitive(reader: &mut Reader<'_>, kind: PrimitiveKind) -> Result<Value> {
    Ok(match kind {
        PrimitiveKind::Bool => Value::Bool(reader.read_u8()? == 1),
        PrimitiveKind::I8 => Value::I8(reader.read_i8()?),
        PrimitiveKind::Char => Value::Char(reader.read_u16()?),
        PrimitiveKind::I16 => Value::I16(reader.read_i16()?),
        PrimitiveKind::I32 => Value::I32(reader.read_i32()?),
        PrimitiveKind::I64 => Value::I64(reader.read_i64()?),
        PrimitiveKind::F32 => Value::F32(reader.read_f32()?),
        PrimitiveKind::F64 => Value::F64(reader.read_f64()?),
    })
}

fn decode_array(
    reader: &mut Reader<'_>,
    element: &ValueDescriptor,
    depth: usize,
) -> Result<Value> {
    let length = read_len(reader)?;
    let mut items = Vec::with_capacity(length.min(4096));

    match element {
        ValueDescriptor::Primitive(kind) => {
            for _ in 0..length {
                items.push(decode_primitive(reader, *kind)?);
            }
        }
        _ => {
            for _ in 0..length {
                items.push(decode_slot(reader, element, depth + 1)?);
            }
        }
    }
    Ok(Value::Array(items))
}

fn decode_record(
    reader: &mut Reader<'_>,
    record: &RecordDescriptor,
    depth: usize,
) -> Result<Value> {
    let mut fields = record.instantiate()?;

    for (slot, field) in fields.iter_mut().zip(&record.fields) {
        if !field.immutable {
            *slot = decode_slot(reader, &field.descriptor, depth + 1)?;
        }
    }
    Ok(Value::Record(fields))
}

fn write_len(out: &mut Vec<u8>, length: usize) -> Result<()> {
    let length =
        i32::try_from(length).map_err(|_| WirecallError::MalformedLength(length as i64))?;
    out.extend_from_slice(&length.to_be_bytes());
    Ok(())
}

fn read_len(reader: &mut Reader<'_>) -> Result<usize> {
    let length = reader.read_i32()?;
    if length < 0 {
        return Err(WirecallError::MalformedLength(i64::from(length)));
    }
    Ok(length as usize)
}

fn mismatch(descriptor: &ValueDescriptor, value: &Value) -> WirecallError {
    WirecallError::TypeMismatch {
        expected: descriptor.kind_name().to_string(),
        found: value.kind_name().to_string(),
    }
}
