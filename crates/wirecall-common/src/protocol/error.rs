use thiserror::Error;

#[derive(Error, Debug)]
pub enum WirecallError {
    /* codec */
    #[error("malformed null tag: {0} (expected 0 or 1)")]
    MalformedTag(u8),

    #[error("malformed length: {0}")]
    MalformedLength(i64),

    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("invalid UTF-8 text: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),

    #[error("null value for a primitive slot")]
    NullPrimitive,

    #[error("value nesting exceeds the maximum depth")]
    DepthExceeded,

    #[error("record prototype does not match its descriptor: {0}")]
    UnconstructibleRecord(String),

    #[error("descriptor/value mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /* channels */
    #[error("channel is not connected")]
    NotConnected,

    #[error("channel closed by peer")]
    ChannelClosed,

    #[error("short frame header: read {0} of 4 bytes")]
    ShortHeader(usize),

    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(u64),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("unexpected packet tag: {found} (expected {expected})")]
    UnexpectedPacket { expected: i8, found: i8 },

    #[error("data packet out of bounds: index {index}, chunk {chunk}, message size {size}")]
    OutOfBounds { index: i32, chunk: i32, size: usize },

    /* dispatch */
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("operation failed: {0}")]
    InvocationFailure(String),

    /* socket layer */
    #[error("bind failed: {0}")]
    Bind(String),

    #[error("accept failed: {0}")]
    Accept(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WirecallError {
    /// Whether this error leaves the socket or loop unusable.
    ///
    /// Server loops shut down on a critical error and keep serving on
    /// anything else. Timeouts, foreign or malformed packets and all codec
    /// and dispatch failures are non-critical.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            WirecallError::Bind(_)
                | WirecallError::Accept(_)
                | WirecallError::Connect(_)
                | WirecallError::NotConnected
                | WirecallError::Io(_)
        )
    }

    /// Whether this error ends a single TCP connection.
    ///
    /// The TCP connection loop exits on these and keeps running on
    /// recoverable errors; the server itself stays up either way.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            WirecallError::ChannelClosed
                | WirecallError::ShortHeader(_)
                | WirecallError::FrameTooLarge(_)
                | WirecallError::NotConnected
                | WirecallError::Connect(_)
                | WirecallError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WirecallError>;
