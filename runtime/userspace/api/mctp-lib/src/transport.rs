// Licensed under the Apache-2.0 license

extern crate alloc;

use crate::error::MctpError;
use alloc::boxed::Box;
use async_trait::async_trait;
use mctp_common::control_msg::MCTP_UUID_LEN;

/// Handler for a complete MCTP message of one message type.
///
/// `msg_buf` holds the message-type byte followed by the message body, `req_len`
/// bytes in total. The response, message-type byte included, is written back
/// into the same buffer and its length returned. `Ok(0)` means no response.
#[async_trait(?Send)]
pub trait MsgHandler {
    async fn handle_message(&self, msg_buf: &mut [u8], req_len: usize)
        -> Result<usize, MctpError>;
}

/// Byte-stream side of the transport: one call per outgoing frame.
///
/// A frame starts with the destination slave address and the byte count. An
/// implementation returns `MctpError::SendFailed` when fewer bytes than
/// requested were written.
#[async_trait(?Send)]
pub trait FrameSink {
    async fn send_frame(&self, frame: &[u8]) -> Result<(), MctpError>;

    async fn delay_ms(&self, ms: u32);
}

/// Owner of the device UUID reported by GetUUID. The same value must back every
/// other place the UUID is published.
pub trait UuidSource {
    fn uuid(&self) -> [u8; MCTP_UUID_LEN];
}

impl UuidSource for [u8; MCTP_UUID_LEN] {
    fn uuid(&self) -> [u8; MCTP_UUID_LEN] {
        *self
    }
}
