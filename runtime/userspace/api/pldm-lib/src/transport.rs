// Licensed under the Apache-2.0 license

extern crate alloc;

use crate::cmd_interface::CmdInterface;
use alloc::boxed::Box;
use async_trait::async_trait;
use log::error;
use mctp_lib::error::MctpError;
use mctp_lib::transport::MsgHandler;
use pldm_common::protocol::base::PLDM_MSG_HEADER_LEN;
use pldm_common::util::mctp_transport::PLDM_MSG_OFFSET;

/// Hooks the PLDM responder into the MCTP message-type dispatch.
#[async_trait(?Send)]
impl MsgHandler for CmdInterface<'_> {
    async fn handle_message(&self, msg_buf: &mut [u8], req_len: usize) -> Result<usize, MctpError> {
        if req_len < PLDM_MSG_OFFSET + PLDM_MSG_HEADER_LEN {
            return Err(MctpError::BufferTooSmall);
        }
        self.process_request(msg_buf, req_len).await.map_err(|e| {
            error!("PLDM: request not processed: {:?}", e);
            MctpError::from(e)
        })
    }
}
