// Licensed under the Apache-2.0 license

use thiserror::Error;

pub type MctpResult<T> = Result<T, MctpError>;

/// Reasons a frame or message is dropped, or a response could not be sent.
/// None of these are reported to the peer.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MctpError {
    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),
    #[error("Byte count {byte_count} does not match frame length {len}")]
    ByteCountMismatch { byte_count: u8, len: usize },
    #[error("Destination EID {0:#04x} is not ours")]
    EidMismatch(u8),
    #[error("Sequence mismatch from EID {src_eid:#04x}: expected {expected}, got {got}")]
    SequenceMismatch { src_eid: u8, expected: u8, got: u8 },
    #[error("Tag mismatch from EID {0:#04x}")]
    TagMismatch(u8),
    #[error("No message in progress from EID {0:#04x}")]
    NoSession(u8),
    #[error("Too many messages in progress")]
    SessionTableFull,
    #[error("Message exceeds staging buffer")]
    StagingOverflow,
    #[error("Unsupported message type {0:#04x}")]
    UnsupportedMsgType(u8),
    #[error("Not a request")]
    NotARequest,
    #[error("Buffer too small")]
    BufferTooSmall,
    #[error("Message handler busy")]
    HandlerBusy,
    #[error("Message handler failed")]
    HandlerFailed,
    #[error("Frame write failed")]
    SendFailed,
}
