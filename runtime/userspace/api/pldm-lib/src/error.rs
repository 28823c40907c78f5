// Licensed under the Apache-2.0 license

use mctp_lib::error::MctpError;
use pldm_common::codec::PldmCodecError;

/// Handle non-protocol specific error conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum MsgHandlerError {
    Codec(PldmCodecError),
    PdrRepo(PdrRepoError),
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PdrRepoError {
    /// More records than the transfer table can page through.
    CapacityExceeded,
    NotInitialized,
    InvalidRecordHandle,
    MissingTerminusLocator,
}

impl From<MsgHandlerError> for MctpError {
    fn from(e: MsgHandlerError) -> Self {
        match e {
            MsgHandlerError::NotReady => MctpError::HandlerBusy,
            MsgHandlerError::Codec(PldmCodecError::BufferTooShort) => MctpError::BufferTooSmall,
            _ => MctpError::HandlerFailed,
        }
    }
}
