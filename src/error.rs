use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Decode Errors
/// - [`Error::Malformed`] - Corrupted wire bytes, bad varints, unknown wire types
/// - [`Error::OutOfBounds`] - A read or a declared length ran past the end of the buffer
/// - [`Error::RecursionLimit`] - Nesting exceeded the configured depth
///
/// These are recovered locally by the dispatcher, which hands handlers a `None` tree
/// instead of aborting the pipeline.
///
/// ## Synthesis Errors
/// - [`Error::UnsupportedContentType`] - Appended content was neither a mapping nor a sequence
/// - [`Error::Template`] - A template could not be rendered (unbound placeholder, bad JSON)
///
/// ## Envelope Errors
/// - [`Error::NotEncrypted`] - The blob does not carry the envelope magic
/// - [`Error::KeyMismatch`] - The blob was sealed with a different passphrase
/// - [`Error::Crypto`] - The cipher rejected the payload
///
/// ## Host Boundary Errors
/// - [`Error::Unresolved`] - A required host capability could not be located
///
/// # Examples
///
/// ```rust
/// use wirescope::{wire, Error};
///
/// // field 1, length-delimited, declares 5 bytes but carries 1
/// match wire::decode(&[0x0A, 0x05, 0x41]) {
///     Err(Error::OutOfBounds { .. }) => {}
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The wire bytes are damaged and could not be decoded.
    ///
    /// Includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding.
    ///
    /// Raised for truncated buffers and for length-delimited fields whose declared
    /// length exceeds the remaining bytes.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Recursion limit reached.
    ///
    /// The associated value shows the limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Content handed to the synthesizer is neither a mapping nor a sequence.
    ///
    /// This is a programming error at the call site and is always surfaced to the
    /// caller.
    #[error("Unsupported type for content - {0}")]
    UnsupportedContentType(&'static str),

    /// A packet template could not be rendered.
    #[error("Template '{name}' - {message}")]
    Template {
        /// Name of the template
        name: String,
        /// What went wrong
        message: String,
    },

    /// The blob does not start with the envelope magic.
    #[error("Not an encrypted message")]
    NotEncrypted,

    /// The envelope was sealed with a different passphrase.
    #[error("Encryption key does not match")]
    KeyMismatch,

    /// The cipher rejected the payload (bad padding, bad length).
    #[error("Cipher failure - {0}")]
    Crypto(String),

    /// A compressed blob could not be inflated.
    #[error("Decompression failure - {0}")]
    Decompress(String),

    /// A host capability could not be resolved.
    ///
    /// The associated value is the capability id.
    #[error("Capability '{0}' could not be resolved")]
    Unresolved(String),

    /// JSON conversion failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// A `hex->` scalar carried invalid hex.
    #[error("{0}")]
    Hex(#[from] hex::FromHexError),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` for the errors raised by the wire decoder.
    ///
    /// These correspond to the `DecodeError` class: the payload was seen but could
    /// not be turned into a tree.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Error::Malformed { .. } | Error::OutOfBounds { .. } | Error::RecursionLimit(_)
        )
    }

    /// Returns `true` for envelope integrity failures, which must be shown to the user.
    #[must_use]
    pub fn is_crypto_mismatch(&self) -> bool {
        matches!(self, Error::NotEncrypted | Error::KeyMismatch)
    }
}
