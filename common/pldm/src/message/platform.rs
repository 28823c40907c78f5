// Licensed under the Apache-2.0 license

use crate::codec::{encode_tail, PldmCodec, PldmCodecError};
use crate::protocol::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmSupportedType, TransferOperationFlag,
    PLDM_MSG_HEADER_LEN,
};
use crate::protocol::platform::{
    EventMessageEnable, PdrRepositoryState, PdrTransferFlag, PlatformCmd, SensorDataSize,
    SensorOperationalState, SensorState, Timestamp104,
};
use zerocopy::{FromBytes, Immutable, IntoBytes};

fn platform_header(
    instance_id: InstanceId,
    message_type: PldmMsgType,
    cmd: PlatformCmd,
) -> PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]> {
    PldmMsgHeader::new(
        instance_id,
        message_type,
        PldmSupportedType::Platform,
        cmd as u8,
    )
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct SetNumericSensorEnableRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub sensor_id: u16,
    pub sensor_operational_state: u8,
    pub sensor_event_message_enable: u8,
}

impl SetNumericSensorEnableRequest {
    pub fn new(
        instance_id: InstanceId,
        message_type: PldmMsgType,
        sensor_id: u16,
        op_state: SensorOperationalState,
        event_enable: EventMessageEnable,
    ) -> Self {
        Self {
            hdr: platform_header(instance_id, message_type, PlatformCmd::SetNumericSensorEnable),
            sensor_id,
            sensor_operational_state: op_state as u8,
            sensor_event_message_enable: event_enable as u8,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct SetNumericSensorEnableResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl SetNumericSensorEnableResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8) -> Self {
        Self {
            hdr: platform_header(
                instance_id,
                PldmMsgType::Response,
                PlatformCmd::SetNumericSensorEnable,
            ),
            completion_code,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetSensorReadingRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub sensor_id: u16,
    pub rearm_event_state: u8,
}

impl GetSensorReadingRequest {
    pub fn new(
        instance_id: InstanceId,
        message_type: PldmMsgType,
        sensor_id: u16,
        rearm_event_state: bool,
    ) -> Self {
        Self {
            hdr: platform_header(instance_id, message_type, PlatformCmd::GetSensorReading),
            sensor_id,
            rearm_event_state: rearm_event_state as u8,
        }
    }
}

/// GetSensorReading response. Readings are always reported as sint16.
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetSensorReadingResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub sensor_data_size: u8,
    pub sensor_operational_state: u8,
    pub sensor_event_message_enable: u8,
    pub present_state: u8,
    pub previous_state: u8,
    pub event_state: u8,
    pub present_reading: i16,
}

impl GetSensorReadingResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        op_state: SensorOperationalState,
        reading: i16,
    ) -> Self {
        let (present, previous, event, reading) = if op_state == SensorOperationalState::Enabled {
            (SensorState::Normal, SensorState::Unknown, SensorState::Normal, reading)
        } else {
            (SensorState::Unknown, SensorState::Unknown, SensorState::Unknown, 0)
        };
        Self {
            hdr: platform_header(instance_id, PldmMsgType::Response, PlatformCmd::GetSensorReading),
            completion_code,
            sensor_data_size: SensorDataSize::Sint16 as u8,
            sensor_operational_state: op_state as u8,
            sensor_event_message_enable: EventMessageEnable::NoEventGeneration as u8,
            present_state: present as u8,
            previous_state: previous as u8,
            event_state: event as u8,
            present_reading: reading,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPdrRepositoryInfoRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl GetPdrRepositoryInfoRequest {
    pub fn new(instance_id: InstanceId, message_type: PldmMsgType) -> Self {
        Self {
            hdr: platform_header(instance_id, message_type, PlatformCmd::GetPdrRepositoryInfo),
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPdrRepositoryInfoResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub repository_state: u8,
    pub update_time: Timestamp104,
    pub oem_update_time: Timestamp104,
    pub record_count: u32,
    pub repository_size: u32,
    pub largest_record_size: u32,
    pub data_transfer_handle_timeout: u8,
}

/// Repository summary reported by GetPDRRepositoryInfo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdrRepositoryInfo {
    pub state: PdrRepositoryState,
    pub update_time: Timestamp104,
    pub oem_update_time: Timestamp104,
    pub record_count: u32,
    pub repository_size: u32,
    pub largest_record_size: u32,
    pub data_transfer_handle_timeout: u8,
}

impl GetPdrRepositoryInfoResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8, info: &PdrRepositoryInfo) -> Self {
        Self {
            hdr: platform_header(
                instance_id,
                PldmMsgType::Response,
                PlatformCmd::GetPdrRepositoryInfo,
            ),
            completion_code,
            repository_state: info.state as u8,
            update_time: info.update_time,
            oem_update_time: info.oem_update_time,
            record_count: info.record_count,
            repository_size: info.repository_size,
            largest_record_size: info.largest_record_size,
            data_transfer_handle_timeout: info.data_transfer_handle_timeout,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPdrRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub record_handle: u32,
    pub data_transfer_handle: u32,
    pub transfer_op_flag: u8,
    pub request_count: u16,
    pub record_change_number: u16,
}

impl GetPdrRequest {
    pub fn new(
        instance_id: InstanceId,
        message_type: PldmMsgType,
        record_handle: u32,
        data_transfer_handle: u32,
        transfer_op_flag: TransferOperationFlag,
        request_count: u16,
        record_change_number: u16,
    ) -> Self {
        Self {
            hdr: platform_header(instance_id, message_type, PlatformCmd::GetPdr),
            record_handle,
            data_transfer_handle,
            transfer_op_flag: transfer_op_flag as u8,
            request_count,
            record_change_number,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetPdrResponseFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub next_record_handle: u32,
    pub next_data_transfer_handle: u32,
    pub transfer_flag: u8,
    pub response_count: u16,
}

pub const GET_PDR_RESPONSE_FIXED_LEN: usize = core::mem::size_of::<GetPdrResponseFixed>();

#[derive(Debug, Clone, PartialEq)]
pub struct GetPdrResponse<'a> {
    pub fixed: GetPdrResponseFixed,
    pub record_data: &'a [u8],
    pub crc8: Option<u8>,
}

impl<'a> GetPdrResponse<'a> {
    pub fn new(
        instance_id: InstanceId,
        next_record_handle: u32,
        next_data_transfer_handle: u32,
        transfer_flag: PdrTransferFlag,
        record_data: &'a [u8],
        crc8: Option<u8>,
    ) -> Self {
        Self {
            fixed: GetPdrResponseFixed {
                hdr: platform_header(instance_id, PldmMsgType::Response, PlatformCmd::GetPdr),
                completion_code: 0,
                next_record_handle,
                next_data_transfer_handle,
                transfer_flag: transfer_flag as u8,
                response_count: record_data.len() as u16,
            },
            record_data,
            crc8,
        }
    }

    pub fn codec_size_in_bytes(&self) -> usize {
        GET_PDR_RESPONSE_FIXED_LEN + self.record_data.len() + self.crc8.map_or(0, |_| 1)
    }
}

impl PldmCodec for GetPdrResponse<'_> {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, PldmCodecError> {
        if buffer.len() < self.codec_size_in_bytes() {
            return Err(PldmCodecError::BufferTooShort);
        }

        let offset = self.fixed.encode(buffer)?;
        let mut offset = encode_tail(buffer, offset, self.record_data)?;
        if let Some(crc) = self.crc8 {
            offset = encode_tail(buffer, offset, &[crc])?;
        }
        Ok(offset)
    }

    // The record bytes borrow from the source repository; a requester decodes
    // the fixed part and slices `response_count` bytes itself.
    fn decode(_buffer: &[u8]) -> Result<Self, PldmCodecError> {
        Err(PldmCodecError::Unsupported)
    }
}
