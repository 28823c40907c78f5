// Licensed under the Apache-2.0 license

use crate::config::MCTP_STAGING_BUF_SIZE;
use crate::control_context::MctpControlContext;
use crate::error::{MctpError, MctpResult};
use crate::recv::{FrameHeader, MessageAssembler};
use crate::send::send_response;
use crate::transport::{FrameSink, MsgHandler};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use log::{debug, warn};
use mctp_common::base_protocol::{
    eid_matches, MctpFrameHeader, MessageType, MCTP_BYTE_COUNT_EXCLUDED, MCTP_FRAME_HDR_LEN,
    MCTP_MIN_FRAME_LEN, MCTP_RQ_BIT,
};

/// Entry point of the MCTP stack: takes raw frames from the byte-stream side,
/// reassembles them, routes complete requests by message type and sends the
/// responses back through the frame sink.
pub struct CmdInterface<'a> {
    ctrl_ctx: MctpControlContext<'a>,
    pldm_handler: &'a dyn MsgHandler,
    sink: &'a dyn FrameSink,
    assembler: Mutex<NoopRawMutex, MessageAssembler>,
    msg_buf: Mutex<NoopRawMutex, [u8; MCTP_STAGING_BUF_SIZE]>,
}

impl<'a> CmdInterface<'a> {
    pub fn new(
        ctrl_ctx: MctpControlContext<'a>,
        pldm_handler: &'a dyn MsgHandler,
        sink: &'a dyn FrameSink,
    ) -> Self {
        Self {
            ctrl_ctx,
            pldm_handler,
            sink,
            assembler: Mutex::new(MessageAssembler::new()),
            msg_buf: Mutex::new([0; MCTP_STAGING_BUF_SIZE]),
        }
    }

    pub fn control_context(&self) -> &MctpControlContext<'a> {
        &self.ctrl_ctx
    }

    /// Checks framing and addressing of a received frame.
    pub fn validate_frame(&self, frame: &[u8]) -> MctpResult<FrameHeader> {
        if frame.len() < MCTP_MIN_FRAME_LEN {
            return Err(MctpError::FrameTooShort(frame.len()));
        }
        let hdr = MctpFrameHeader::from_frame(frame).ok_or(MctpError::FrameTooShort(frame.len()))?;

        if hdr.byte_count() as usize + MCTP_BYTE_COUNT_EXCLUDED != frame.len() {
            return Err(MctpError::ByteCountMismatch {
                byte_count: hdr.byte_count(),
                len: frame.len(),
            });
        }
        if !eid_matches(hdr.dest_eid(), self.ctrl_ctx.local_eid()) {
            return Err(MctpError::EidMismatch(hdr.dest_eid()));
        }
        Ok(hdr)
    }

    /// Processes one received frame.
    ///
    /// Returns the number of response frames sent, 0 when the frame only
    /// advanced a multi-packet message or needed no reply. Dropped frames are
    /// reported as errors and never answered.
    pub async fn process_packet(&self, frame: &[u8]) -> MctpResult<usize> {
        let hdr = self.validate_frame(frame).inspect_err(|e| {
            debug!("MCTP: dropping frame: {}", e);
        })?;

        let mut msg_buf = self.msg_buf.lock().await;

        let assembled = {
            let mut assembler = self.assembler.lock().await;
            assembler.receive(hdr, &frame[MCTP_FRAME_HDR_LEN..], &mut msg_buf[..])
        };
        let msg = match assembled {
            Ok(Some(msg)) => msg,
            Ok(None) => return Ok(0),
            Err(e) => {
                warn!("MCTP: message dropped: {}", e);
                return Err(e);
            }
        };

        let rsp_len = self.process_message(&mut msg_buf[..], msg.len).await?;
        if rsp_len == 0 {
            return Ok(0);
        }
        send_response(self.sink, &msg.hdr, &msg_buf[..rsp_len]).await
    }

    /// Routes a complete message by its message-type byte. Only requests are
    /// answered.
    pub async fn process_message(&self, msg_buf: &mut [u8], len: usize) -> MctpResult<usize> {
        if len < 2 {
            return Err(MctpError::BufferTooSmall);
        }
        if msg_buf[1] & MCTP_RQ_BIT == 0 {
            debug!("MCTP: ignoring non-request message");
            return Ok(0);
        }

        match MessageType::from(msg_buf[0]) {
            MessageType::MctpControl => self.ctrl_ctx.handle_message(msg_buf, len).await,
            MessageType::Pldm => self.pldm_handler.handle_message(msg_buf, len).await,
            MessageType::Unsupported => {
                warn!("MCTP: unsupported message type {:#04x}", msg_buf[0]);
                Err(MctpError::UnsupportedMsgType(msg_buf[0]))
            }
        }
    }
}
