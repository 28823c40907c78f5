// Licensed under the Apache-2.0 license

use crate::error::UtilError;
use crate::protocol::base::PLDM_MSG_HEADER_LEN;
use bitfield::bitfield;

pub const MCTP_CONTROL_MSG_TYPE: u8 = 0x00;
pub const MCTP_PLDM_MSG_TYPE: u8 = 0x01;
pub const MCTP_COMMON_HEADER_OFFSET: usize = 0;
pub const PLDM_MSG_OFFSET: usize = 1;

bitfield! {
    #[derive(Copy, Clone, PartialEq)]
    pub struct MctpCommonHeader(u8);
    impl Debug;
    pub u8, ic, set_ic: 7, 7;
    pub u8, msg_type, set_msg_type: 6, 0;
}

/// Returns the PLDM message that follows the MCTP message-type byte.
///
/// Fails if the payload cannot hold a PLDM header, or if the message type is not
/// PLDM or carries an integrity check.
pub fn extract_pldm_msg(mctp_payload: &mut [u8]) -> Result<&mut [u8], UtilError> {
    if mctp_payload.len() < PLDM_MSG_OFFSET + PLDM_MSG_HEADER_LEN {
        return Err(UtilError::InvalidMctpPayloadLength);
    }

    let hdr = MctpCommonHeader(mctp_payload[MCTP_COMMON_HEADER_OFFSET]);
    if hdr.ic() != 0 || hdr.msg_type() != MCTP_PLDM_MSG_TYPE {
        return Err(UtilError::InvalidMctpMsgType);
    }

    Ok(&mut mctp_payload[PLDM_MSG_OFFSET..])
}

/// Writes the PLDM message-type byte and returns the space left for the PLDM message.
pub fn construct_mctp_pldm_msg(mctp_payload: &mut [u8]) -> Result<&mut [u8], UtilError> {
    if mctp_payload.len() < PLDM_MSG_OFFSET + PLDM_MSG_HEADER_LEN {
        return Err(UtilError::InvalidMctpPayloadLength);
    }

    let mut hdr = MctpCommonHeader(0);
    hdr.set_ic(0);
    hdr.set_msg_type(MCTP_PLDM_MSG_TYPE);
    mctp_payload[MCTP_COMMON_HEADER_OFFSET] = hdr.0;

    Ok(&mut mctp_payload[PLDM_MSG_OFFSET..])
}
