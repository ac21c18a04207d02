//! The transport envelope handed to the host's dispatch function.

use crate::wire;

/// The request that caused a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundRecord {
    /// Command name of the request
    pub command: String,
    /// Raw request body
    pub payload: Vec<u8>,
}

impl OutboundRecord {
    /// Create an outbound record.
    pub fn new(command: impl Into<String>, payload: Vec<u8>) -> Self {
        OutboundRecord {
            command: command.into(),
            payload,
        }
    }
}

/// The received response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRecord {
    /// Command name the response is routed by
    pub command: String,
    /// Raw response body, possibly carrying a 4-byte length header
    pub payload: Vec<u8>,
}

impl InboundRecord {
    /// Create an inbound record.
    pub fn new(command: impl Into<String>, payload: Vec<u8>) -> Self {
        InboundRecord {
            command: command.into(),
            payload,
        }
    }

    /// The body with any length header removed.
    #[must_use]
    pub fn unpacked(&self) -> &[u8] {
        wire::unpack_payload(&self.payload)
    }
}

/// A request/response pair as seen at the interception point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// The request
    pub outbound: OutboundRecord,
    /// The response
    pub inbound: InboundRecord,
}

impl Envelope {
    /// Pair a request with its response.
    #[must_use]
    pub fn new(outbound: OutboundRecord, inbound: InboundRecord) -> Self {
        Envelope { outbound, inbound }
    }

    /// An envelope for a pushed response that has no request.
    pub fn push(command: impl Into<String>, payload: Vec<u8>) -> Self {
        Envelope {
            outbound: OutboundRecord::default(),
            inbound: InboundRecord::new(command, payload),
        }
    }

    /// The response command name.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.inbound.command
    }
}
