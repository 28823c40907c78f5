// Licensed under the Apache-2.0 license

use crate::codec::{encode_tail, PldmCodec, PldmCodecError};
use crate::protocol::base::{
    InstanceId, PldmControlCmd, PldmMsgHeader, PldmMsgType, PldmSupportedType,
    TransferOperationFlag, TransferRespFlag, PLDM_MSG_HEADER_LEN,
};
use crate::protocol::version::{Ver32, VER32_LEN};
use zerocopy::{FromBytes, Immutable, IntoBytes};

pub const PLDM_CMDS_BITMAP_LEN: usize = 32;
pub const PLDM_TYPES_BITMAP_LEN: usize = 8;

#[repr(C, packed)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
pub struct GetTidRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl GetTidRequest {
    pub fn new(instance_id: InstanceId, message_type: PldmMsgType) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                message_type,
                PldmSupportedType::Base,
                PldmControlCmd::GetTid as u8,
            ),
        }
    }
}

#[repr(C, packed)]
#[derive(Debug, PartialEq, FromBytes, IntoBytes, Immutable)]
pub struct GetTidResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub tid: u8,
}

impl GetTidResponse {
    pub fn new(instance_id: InstanceId, tid: u8, completion_code: u8) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmSupportedType::Base,
                PldmControlCmd::GetTid as u8,
            ),
            completion_code,
            tid,
        }
    }
}

#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct SetTidRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub tid: u8,
}

impl SetTidRequest {
    pub fn new(instance_id: InstanceId, message_type: PldmMsgType, tid: u8) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                message_type,
                PldmSupportedType::Base,
                PldmControlCmd::SetTid as u8,
            ),
            tid,
        }
    }
}

#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct SetTidResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl SetTidResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8) -> Self {
        SetTidResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmSupportedType::Base,
                PldmControlCmd::SetTid as u8,
            ),
            completion_code,
        }
    }
}

#[repr(C, packed)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
pub struct GetPldmCommandsRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub pldm_type: u8,
    pub protocol_version: Ver32,
}

impl GetPldmCommandsRequest {
    pub fn new(
        instance_id: InstanceId,
        message_type: PldmMsgType,
        pldm_type: u8,
        protocol_version: Ver32,
    ) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                message_type,
                PldmSupportedType::Base,
                PldmControlCmd::GetPldmCommands as u8,
            ),
            pldm_type,
            protocol_version,
        }
    }
}

#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPldmCommandsResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub supported_cmds: [u8; PLDM_CMDS_BITMAP_LEN],
}

impl GetPldmCommandsResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8, supported_cmds: &[u8]) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmSupportedType::Base,
                PldmControlCmd::GetPldmCommands as u8,
            ),
            completion_code,
            supported_cmds: construct_bitmap::<PLDM_CMDS_BITMAP_LEN>(supported_cmds),
        }
    }
}

#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPldmTypeRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl GetPldmTypeRequest {
    pub fn new(instance_id: InstanceId, message_type: PldmMsgType) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                message_type,
                PldmSupportedType::Base,
                PldmControlCmd::GetPldmTypes as u8,
            ),
        }
    }
}

fn construct_bitmap<const N: usize>(items: &[u8]) -> [u8; N] {
    let mut bitmap = [0u8; N];
    for &item in items {
        if let Some(byte) = bitmap.get_mut((item / 8) as usize) {
            *byte |= 1 << (item % 8);
        }
    }
    bitmap
}

#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPldmTypeResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub pldm_types: [u8; PLDM_TYPES_BITMAP_LEN],
}

impl GetPldmTypeResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8, supported_types: &[u8]) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmSupportedType::Base,
                PldmControlCmd::GetPldmTypes as u8,
            ),
            completion_code,
            pldm_types: construct_bitmap::<PLDM_TYPES_BITMAP_LEN>(supported_types),
        }
    }
}

#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPldmVersionRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub data_transfer_handle: u32,
    pub transfer_op_flag: u8,
    pub pldm_type: u8,
}

impl GetPldmVersionRequest {
    pub fn new(
        instance_id: InstanceId,
        message_type: PldmMsgType,
        data_transfer_handle: u32,
        transfer_op_flag: TransferOperationFlag,
        pldm_type: PldmSupportedType,
    ) -> Self {
        Self {
            hdr: PldmMsgHeader::new(
                instance_id,
                message_type,
                PldmSupportedType::Base,
                PldmControlCmd::GetPldmVersion as u8,
            ),
            data_transfer_handle,
            transfer_op_flag: transfer_op_flag as u8,
            pldm_type: pldm_type as u8,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPldmVersionResponseFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub next_transfer_handle: u32,
    pub transfer_rsp_flag: u8,
}

/// One page of a type's version list. The CRC-32 of the whole list trails the
/// last page.
#[derive(Debug, Clone, PartialEq)]
pub struct GetPldmVersionResponse<'a> {
    pub fixed: GetPldmVersionResponseFixed,
    pub versions: &'a [Ver32],
    pub crc32: Option<u32>,
}

impl<'a> GetPldmVersionResponse<'a> {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        next_transfer_handle: u32,
        transfer_rsp_flag: TransferRespFlag,
        versions: &'a [Ver32],
        crc32: Option<u32>,
    ) -> Self {
        Self {
            fixed: GetPldmVersionResponseFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    PldmMsgType::Response,
                    PldmSupportedType::Base,
                    PldmControlCmd::GetPldmVersion as u8,
                ),
                completion_code,
                next_transfer_handle,
                transfer_rsp_flag: transfer_rsp_flag as u8,
            },
            versions,
            crc32,
        }
    }

    pub fn codec_size_in_bytes(&self) -> usize {
        core::mem::size_of::<GetPldmVersionResponseFixed>()
            + self.versions.len() * VER32_LEN
            + self.crc32.map_or(0, |_| core::mem::size_of::<u32>())
    }
}

impl PldmCodec for GetPldmVersionResponse<'_> {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        if buffer.len() < self.codec_size_in_bytes() {
            return Err(PldmCodecError::BufferTooShort);
        }

        let mut offset = self.fixed.encode(buffer)?;
        for version in self.versions {
            offset = encode_tail(buffer, offset, &version.to_le_bytes())?;
        }
        if let Some(crc) = self.crc32 {
            offset = encode_tail(buffer, offset, &crc.to_le_bytes())?;
        }
        Ok(offset)
    }

    // The version list length is not carried on the wire. Requesters read the
    // fixed part and walk the remainder themselves.
    fn decode(_buffer: &[u8]) -> Result<Self, PldmCodecError> {
        Err(PldmCodecError::Unsupported)
    }
}
