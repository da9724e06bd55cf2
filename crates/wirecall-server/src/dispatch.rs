//! Request dispatch: from raw message bytes to a typed response envelope.

use wirecall_common::codec::{self, Reader};
use wirecall_common::protocol::{Result, Value, ValueDescriptor, WirecallError};

use crate::registry::Registry;

/// The outcome of one dispatched request.
///
/// `returns = None` means the operation is void: the value is the absent
/// marker and no reply travels back.
#[derive(Debug)]
pub struct Response {
    pub value: Value,
    pub returns: Option<ValueDescriptor>,
}

/// Processes one request message against the registry.
///
/// The message is the operation name followed by the encoded arguments; the
/// argument descriptors come from the registered operation, never from the
/// wire.
///
/// # Errors
///
/// - [`WirecallError::UnknownOperation`] when no operation carries the name
/// - codec errors when the name or an argument does not decode
/// - [`WirecallError::InvocationFailure`] carrying the handler's own error
pub fn dispatch(registry: &Registry, message: &[u8]) -> Result<Response> {
    let mut reader = Reader::new(message);

    let name = match codec::decode(&mut reader, &ValueDescriptor::Utf8String)? {
        Value::Str(name) => name,
        other => {
            return Err(WirecallError::TypeMismatch {
                expected: "operation name".to_string(),
                found: other.kind_name().to_string(),
            })
        }
    };

    let operation = registry
        .get(&name)
        .ok_or_else(|| WirecallError::UnknownOperation(name.clone()))?;

    let mut args = Vec::with_capacity(operation.args().len());
    for descriptor in operation.args() {
        args.push(codec::decode(&mut reader, descriptor)?);
    }

    tracing::debug!(operation = %name, args = args.len(), "dispatching");
    let value = operation
        .invoke(args)
        .map_err(|e| WirecallError::InvocationFailure(e.to_string()))?;

    Ok(Response {
        value,
        returns: operation.returns().cloned(),
    })
}
