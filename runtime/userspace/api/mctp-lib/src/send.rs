// Licensed under the Apache-2.0 license

use crate::config::{
    MCTP_FRAGMENT_DELAY_MS, MCTP_LOCAL_SLAVE_ADDR, MCTP_MAX_FRAGMENT_PAYLOAD, MCTP_MAX_FRAME_LEN,
};
use crate::error::{MctpError, MctpResult};
use crate::recv::FrameHeader;
use crate::transport::FrameSink;
use arrayvec::ArrayVec;
use log::{debug, error};
use mctp_common::base_protocol::{MCTP_BYTE_COUNT_EXCLUDED, MCTP_FRAME_HDR_LEN, MCTP_SEQ_MODULO};

/// Builds the frame carrying fragment `index` of a response.
pub fn build_fragment(
    req_hdr: &FrameHeader,
    index: usize,
    last: bool,
    chunk: &[u8],
) -> MctpResult<ArrayVec<u8, MCTP_MAX_FRAME_LEN>> {
    if chunk.len() > MCTP_MAX_FRAGMENT_PAYLOAD {
        return Err(MctpError::BufferTooSmall);
    }

    let mut hdr = req_hdr.response_header(MCTP_LOCAL_SLAVE_ADDR);
    hdr.set_som((index == 0) as u8);
    hdr.set_eom(last as u8);
    hdr.set_pkt_seq((index % MCTP_SEQ_MODULO as usize) as u8);
    hdr.set_byte_count((MCTP_FRAME_HDR_LEN + chunk.len() - MCTP_BYTE_COUNT_EXCLUDED) as u8);

    let mut frame = ArrayVec::new();
    frame
        .try_extend_from_slice(&hdr.0)
        .and_then(|_| frame.try_extend_from_slice(chunk))
        .map_err(|_| MctpError::BufferTooSmall)?;
    Ok(frame)
}

/// Sends `msg` back to the requester of `req_hdr`, split into as many frames as
/// needed. Stops at the first frame the sink fails to write.
///
/// Returns the number of frames sent.
pub async fn send_response(
    sink: &dyn FrameSink,
    req_hdr: &FrameHeader,
    msg: &[u8],
) -> MctpResult<usize> {
    let count = msg.len().div_ceil(MCTP_MAX_FRAGMENT_PAYLOAD);

    for (index, chunk) in msg.chunks(MCTP_MAX_FRAGMENT_PAYLOAD).enumerate() {
        let last = index + 1 == count;
        let frame = build_fragment(req_hdr, index, last, chunk)?;

        if let Err(e) = sink.send_frame(&frame).await {
            error!("MCTP: fragment {} of {} not sent: {}", index + 1, count, e);
            return Err(e);
        }
        debug!("MCTP: sent fragment {} of {}", index + 1, count);

        if !last {
            sink.delay_ms(MCTP_FRAGMENT_DELAY_MS).await;
        }
    }

    Ok(count)
}
