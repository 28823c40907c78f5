// Licensed under the Apache-2.0 license

//! Frame layout of an MCTP packet as it arrives from the SMBus/I2C slave
//! interface, together with the helpers used to build response fragments.

use bitfield::bitfield;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Bytes preceding the MCTP payload: slave addresses, byte count, header
/// version, endpoint ids and the tag/sequence flags.
pub const MCTP_FRAME_HDR_LEN: usize = 7;

/// Smallest frame that carries a message-type byte after the header.
pub const MCTP_MIN_FRAME_LEN: usize = MCTP_FRAME_HDR_LEN + 1;

/// `byte_count` excludes the destination slave address and itself.
pub const MCTP_BYTE_COUNT_EXCLUDED: usize = 2;

/// Largest payload carried by a single outgoing fragment.
pub const MCTP_BASELINE_TRANSMISSION_UNIT: usize = 64;

pub const MCTP_NULL_EID: u8 = 0x00;
pub const MCTP_BROADCAST_EID: u8 = 0xFF;

pub const MCTP_SEQ_MODULO: u8 = 4;

/// Bit 7 of the byte following the message type marks a request, for both
/// MCTP control and PLDM.
pub const MCTP_RQ_BIT: u8 = 0x80;

bitfield! {
    #[repr(C)]
    #[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
    pub struct MctpFrameHeader([u8]);
    impl Debug;
    u8;
    pub dest_slave_addr, set_dest_slave_addr: 7, 0;
    pub byte_count, set_byte_count: 15, 8;
    pub src_slave_addr, set_src_slave_addr: 23, 16;
    pub hdr_version, set_hdr_version: 31, 24;
    pub dest_eid, set_dest_eid: 39, 32;
    pub src_eid, set_src_eid: 47, 40;
    pub msg_tag, set_msg_tag: 50, 48;
    pub tag_owner, set_tag_owner: 51, 51;
    pub pkt_seq, set_pkt_seq: 53, 52;
    pub eom, set_eom: 54, 54;
    pub som, set_som: 55, 55;
}

impl MctpFrameHeader<[u8; MCTP_FRAME_HDR_LEN]> {
    /// Reads the header from the front of a received frame.
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        Self::read_from_prefix(frame).ok().map(|(hdr, _)| hdr)
    }

    pub fn next_pkt_seq(&self) -> u8 {
        (self.pkt_seq() + 1) % MCTP_SEQ_MODULO
    }

    pub fn single_pkt(&self) -> bool {
        self.som() == 1 && self.eom() == 1
    }

    pub fn middle_pkt(&self) -> bool {
        self.som() == 0 && self.eom() == 0
    }

    /// Header of the first response fragment to a request carrying this header.
    /// Slave addresses are derived from the request, endpoint ids are swapped
    /// and the tag and header version are kept.
    pub fn response_header(&self, local_slave_addr: u8) -> Self {
        let mut rsp = MctpFrameHeader([0; MCTP_FRAME_HDR_LEN]);
        rsp.set_dest_slave_addr((self.src_slave_addr() & !1) >> 1);
        rsp.set_src_slave_addr((local_slave_addr << 1) | 1);
        rsp.set_hdr_version(self.hdr_version());
        rsp.set_dest_eid(self.src_eid());
        rsp.set_src_eid(self.dest_eid());
        rsp.set_msg_tag(self.msg_tag());
        rsp
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum MessageType {
    MctpControl = 0x00,
    Pldm = 0x01,
    Unsupported,
}

impl From<u8> for MessageType {
    fn from(val: u8) -> MessageType {
        match val & 0x7F {
            0x00 => MessageType::MctpControl,
            0x01 => MessageType::Pldm,
            _ => MessageType::Unsupported,
        }
    }
}

impl MessageType {
    pub const SUPPORTED: [MessageType; 2] = [MessageType::MctpControl, MessageType::Pldm];
}

/// True if `dest_eid` addresses this endpoint. The null EID is always accepted
/// so that an endpoint can be reached before it has been assigned an EID.
pub fn eid_matches(dest_eid: u8, local_eid: u8) -> bool {
    dest_eid == local_eid || dest_eid == MCTP_NULL_EID
}

pub fn valid_eid(eid: u8) -> bool {
    eid != MCTP_NULL_EID && eid != MCTP_BROADCAST_EID
}
