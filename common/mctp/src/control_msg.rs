// Licensed under the Apache-2.0 license

use bitfield::bitfield;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Message-type byte followed by the rq/d/instance byte and the command code.
pub const MCTP_CTRL_MSG_HEADER_LEN: usize = 3;
pub const MCTP_UUID_LEN: usize = 16;

bitfield! {
    #[repr(C)]
    #[derive(Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
    pub struct MctpCtrlMsgHdr(MSB0 [u8]);
    impl Debug;
    u8;
    pub ic, _: 0, 0;
    pub msg_type, _: 7, 1;
    pub rq, set_rq: 8, 8;
    pub datagram, set_datagram: 9, 9;
    rsvd, _: 10, 10;
    pub instance_id, set_instance_id: 15, 11;
    pub cmd, set_cmd: 23, 16;
}

impl MctpCtrlMsgHdr<[u8; MCTP_CTRL_MSG_HEADER_LEN]> {
    /// Response header for this request: same message type, instance id and
    /// command with rq and d cleared.
    pub fn into_response(&self) -> Self {
        let mut rsp = self.clone();
        rsp.set_rq(0);
        rsp.set_datagram(0);
        rsp
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MctpCtrlCmd {
    SetEid = 0x01,
    GetEid = 0x02,
    GetUuid = 0x03,
    GetVersion = 0x04,
    GetMsgTypeSupport = 0x05,
    Unsupported,
}

impl From<u8> for MctpCtrlCmd {
    fn from(val: u8) -> MctpCtrlCmd {
        match val {
            0x01 => MctpCtrlCmd::SetEid,
            0x02 => MctpCtrlCmd::GetEid,
            0x03 => MctpCtrlCmd::GetUuid,
            0x04 => MctpCtrlCmd::GetVersion,
            0x05 => MctpCtrlCmd::GetMsgTypeSupport,
            _ => MctpCtrlCmd::Unsupported,
        }
    }
}

impl MctpCtrlCmd {
    pub fn req_data_len(&self) -> usize {
        match self {
            MctpCtrlCmd::SetEid => 2,
            MctpCtrlCmd::GetVersion => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum CmdCompletionCode {
    Success = 0x00,
    Error = 0x01,
    ErrorInvalidData = 0x02,
    ErrorInvalidLength = 0x03,
    ErrorNotReady = 0x04,
    ErrorNotSupportedCmd = 0x05,
    MessageTypeNotSupported = 0x80,
}

bitfield! {
    #[repr(C)]
    #[derive(Clone, FromBytes, IntoBytes, Immutable)]
    pub struct SetEidReq([u8]);
    impl Debug;
    u8;
    pub op, _: 1, 0;
    rsvd, _: 7, 2;
    pub eid, _: 15, 8;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetEidOp {
    SetEid,
    ForceEid,
    ResetEid,
    SetDiscoveredFlag,
}

impl From<u8> for SetEidOp {
    fn from(val: u8) -> SetEidOp {
        match val & 0x03 {
            0 => SetEidOp::SetEid,
            1 => SetEidOp::ForceEid,
            2 => SetEidOp::ResetEid,
            _ => SetEidOp::SetDiscoveredFlag,
        }
    }
}

bitfield! {
    #[repr(C)]
    #[derive(Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
    pub struct SetEidResp([u8]);
    impl Debug;
    u8;
    pub completion_code, set_completion_code: 7, 0;
    pub eid_alloc_status, set_eid_alloc_status: 9, 8;
    rsvd1, _: 11, 10;
    pub eid_assign_status, set_eid_assign_status: 13, 12;
    rsvd2, _: 15, 14;
    pub assigned_eid, set_assigned_eid: 23, 16;
    pub eid_pool_size, set_eid_pool_size: 31, 24;
}

impl Default for SetEidResp<[u8; 4]> {
    fn default() -> Self {
        SetEidResp([0; 4])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetEidStatus {
    Accepted = 0,
    Rejected = 1,
}

bitfield! {
    #[repr(C)]
    #[derive(Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
    pub struct GetEidResp([u8]);
    impl Debug;
    u8;
    pub completion_code, set_completion_code: 7, 0;
    pub eid, set_eid: 15, 8;
    pub eid_type, set_eid_type: 17, 16;
    rsvd1, _: 19, 18;
    pub endpoint_type, set_endpoint_type: 21, 20;
    rsvd2, _: 23, 22;
    pub medium_spec_info, set_medium_spec_info: 31, 24;
}

impl Default for GetEidResp<[u8; 4]> {
    fn default() -> Self {
        GetEidResp([0; 4])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointType {
    Simple = 0,
    BusOwnerBridge = 1,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EidType {
    DynamicOnly = 0,
    StaticSupported = 1,
    StaticMatching = 2,
    StaticNonMatching = 3,
}

/// Version queries accepted by Get MCTP Version Support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VersionQuery {
    BaseSpec,
    ControlProtocol,
    PldmOverMctpBinding,
    Unsupported,
}

impl From<u8> for VersionQuery {
    fn from(val: u8) -> VersionQuery {
        match val {
            0xFF => VersionQuery::BaseSpec,
            0x00 => VersionQuery::ControlProtocol,
            0x01 => VersionQuery::PldmOverMctpBinding,
            _ => VersionQuery::Unsupported,
        }
    }
}

/// DSP0236 1.3.1, reported for both the base and control protocol queries.
pub const MCTP_BASE_SPEC_VERSION: u32 = 0xF1F3_F100;
/// DSP0241 1.0.0.
pub const PLDM_OVER_MCTP_BINDING_VERSION: u32 = 0xF1F0_F000;

impl VersionQuery {
    pub fn version(&self) -> Option<u32> {
        match self {
            VersionQuery::BaseSpec | VersionQuery::ControlProtocol => Some(MCTP_BASE_SPEC_VERSION),
            VersionQuery::PldmOverMctpBinding => Some(PLDM_OVER_MCTP_BINDING_VERSION),
            VersionQuery::Unsupported => None,
        }
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
pub struct GetVersionResp {
    pub completion_code: u8,
    pub version_count: u8,
    /// Big-endian ver32 as the four wire bytes.
    pub version: [u8; 4],
}

impl GetVersionResp {
    pub fn new(version: u32) -> Self {
        GetVersionResp {
            completion_code: CmdCompletionCode::Success as u8,
            version_count: 1,
            version: version.to_be_bytes(),
        }
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
pub struct GetMsgTypeSupportResp {
    pub completion_code: u8,
    pub msg_type_count: u8,
    pub msg_types: [u8; 2],
}

#[repr(C, packed)]
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
pub struct GetUuidResp {
    pub completion_code: u8,
    pub uuid: [u8; MCTP_UUID_LEN],
}
