// Licensed under the Apache-2.0 license

extern crate alloc;

use crate::cmd_interface::{generate_failure_response, request_bytes};
use crate::config::{MAX_PDR_CHUNK_SIZE, PDR_TRANSFER_SLOTS};
use crate::error::MsgHandlerError;
use crate::pdr_repo::PdrRepository;
use crate::sensor_ops::SensorOps;
use crate::transfer::TransferTable;
use alloc::boxed::Box;
use async_trait::async_trait;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use log::{debug, warn};
use pldm_common::codec::PldmCodec;
use pldm_common::message::platform::{
    GetPdrRepositoryInfoRequest, GetPdrRepositoryInfoResponse, GetPdrRequest, GetPdrResponse,
    GetSensorReadingRequest, GetSensorReadingResponse, SetNumericSensorEnableRequest,
    SetNumericSensorEnableResponse,
};
use pldm_common::protocol::base::{
    PldmBaseCompletionCode, PldmPlatformCompletionCode, TransferOperationFlag,
};
use pldm_common::protocol::platform::{
    EventMessageEnable, PdrRepositoryState, PdrTransferFlag, SensorOperationalState,
};
use pldm_common::util::crc::crc8;

/// State behind the PLDM Type 2 (platform monitoring and control) commands.
pub struct PlatformContext<'a> {
    pdr_repo: &'a PdrRepository,
    sensor_ops: &'a dyn SensorOps,
    pdr_xfers: Mutex<NoopRawMutex, TransferTable<PDR_TRANSFER_SLOTS>>,
}

impl<'a> PlatformContext<'a> {
    pub fn new(pdr_repo: &'a PdrRepository, sensor_ops: &'a dyn SensorOps) -> Self {
        Self {
            pdr_repo,
            sensor_ops,
            pdr_xfers: Mutex::new(TransferTable::new()),
        }
    }

    pub fn pdr_repo(&self) -> &PdrRepository {
        self.pdr_repo
    }
}

#[async_trait(?Send)]
pub trait PlatformCmdResponder {
    async fn set_numeric_sensor_enable_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
    async fn get_sensor_reading_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
    async fn get_pdr_repository_info_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
    async fn get_pdr_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
}

#[async_trait(?Send)]
impl PlatformCmdResponder for PlatformContext<'_> {
    async fn set_numeric_sensor_enable_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = match SetNumericSensorEnableRequest::decode(request_bytes(payload, req_len)) {
            Ok(req) => req,
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmBaseCompletionCode::InvalidLength as u8,
                )
            }
        };
        let sensor_id = req.sensor_id;

        let op_state = match SensorOperationalState::try_from(req.sensor_operational_state) {
            Ok(state) if state.is_settable() => state,
            _ => {
                return generate_failure_response(
                    payload,
                    PldmPlatformCompletionCode::INVALID_SENSOR_OPERATIONAL_STATE,
                )
            }
        };

        if EventMessageEnable::try_from(req.sensor_event_message_enable)
            != Ok(EventMessageEnable::NoEventGeneration)
        {
            return generate_failure_response(
                payload,
                PldmPlatformCompletionCode::EVENT_GENERATION_NOT_SUPPORTED,
            );
        }

        if !self.pdr_repo.sensor_exists(sensor_id).await {
            debug!("PLDM: enable for unknown sensor {}", sensor_id);
            return generate_failure_response(payload, PldmPlatformCompletionCode::INVALID_SENSOR_ID);
        }

        let completion_code = match self
            .sensor_ops
            .set_numeric_sensor_enable(sensor_id, op_state)
            .await
        {
            Ok(()) => PldmBaseCompletionCode::Success as u8,
            Err(e) => {
                warn!("PLDM: enable of sensor {} failed: {:?}", sensor_id, e);
                e.enable_completion_code()
            }
        };

        let resp = SetNumericSensorEnableResponse::new(req.hdr.instance_id(), completion_code);
        resp.encode(payload).map_err(MsgHandlerError::Codec)
    }

    async fn get_sensor_reading_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = match GetSensorReadingRequest::decode(request_bytes(payload, req_len)) {
            Ok(req) => req,
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmBaseCompletionCode::InvalidLength as u8,
                )
            }
        };
        let sensor_id = req.sensor_id;

        if !self.pdr_repo.sensor_exists(sensor_id).await {
            debug!("PLDM: reading for unknown sensor {}", sensor_id);
            return generate_failure_response(payload, PldmPlatformCompletionCode::INVALID_SENSOR_ID);
        }

        if req.rearm_event_state != 0 {
            return generate_failure_response(
                payload,
                PldmPlatformCompletionCode::REARM_UNAVAILABLE_IN_PRESENT_STATE,
            );
        }

        let reading = match self.sensor_ops.get_sensor_reading(sensor_id).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("PLDM: reading of sensor {} failed: {:?}", sensor_id, e);
                return generate_failure_response(payload, e.reading_completion_code());
            }
        };

        let resp = GetSensorReadingResponse::new(
            req.hdr.instance_id(),
            PldmBaseCompletionCode::Success as u8,
            reading.op_state,
            reading.value,
        );
        resp.encode(payload).map_err(MsgHandlerError::Codec)
    }

    async fn get_pdr_repository_info_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = GetPdrRepositoryInfoRequest::decode(request_bytes(payload, req_len))
            .map_err(MsgHandlerError::Codec)?;
        let info = self.pdr_repo.info().await;
        let resp = GetPdrRepositoryInfoResponse::new(
            req.hdr.instance_id(),
            PldmBaseCompletionCode::Success as u8,
            &info,
        );
        resp.encode(payload).map_err(MsgHandlerError::Codec)
    }

    async fn get_pdr_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = match GetPdrRequest::decode(request_bytes(payload, req_len)) {
            Ok(req) => req,
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmBaseCompletionCode::InvalidLength as u8,
                )
            }
        };
        let record_handle = req.record_handle;
        let xfer_handle = req.data_transfer_handle;
        let change_number = req.record_change_number;
        let chunk_size = MAX_PDR_CHUNK_SIZE.min(req.request_count as usize);

        let info = self.pdr_repo.info().await;
        if info.state == PdrRepositoryState::UpdateInProgress {
            return generate_failure_response(
                payload,
                PldmPlatformCompletionCode::REPOSITORY_UPDATE_IN_PROGRESS,
            );
        }
        if record_handle >= info.record_count {
            return generate_failure_response(
                payload,
                PldmPlatformCompletionCode::INVALID_RECORD_HANDLE,
            );
        }
        let key = record_handle as usize;

        let mut xfers = self.pdr_xfers.lock().await;
        let (offset, check_change) = match TransferOperationFlag::try_from(req.transfer_op_flag) {
            Ok(TransferOperationFlag::GetFirstPart) => {
                xfers.start(key);
                (0, false)
            }
            Ok(TransferOperationFlag::GetNextPart) => match xfers.resolve(xfer_handle) {
                Some((slot, offset)) if slot == key => (offset, true),
                _ => {
                    debug!(
                        "PLDM: stale PDR transfer handle {:#010x} for record {}",
                        xfer_handle, record_handle
                    );
                    return generate_failure_response(
                        payload,
                        PldmPlatformCompletionCode::INVALID_DATA_TRANSFER_HANDLE,
                    );
                }
            },
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmPlatformCompletionCode::INVALID_TRANSFER_OPERATION_FLAG,
                )
            }
        };

        let instance_id = req.hdr.instance_id();
        let next_record_handle = (record_handle + 1) % info.record_count;
        let encoded = self
            .pdr_repo
            .with_record(record_handle, |record| {
                if check_change && record.change_number() != change_number {
                    return Err(PldmPlatformCompletionCode::INVALID_RECORD_CHANGE_NUMBER);
                }

                let bytes = record.wire_bytes();
                let offset = offset.min(bytes.len());
                let end = bytes.len().min(offset + chunk_size);
                let (flag, next_xfer_handle, crc) = if end < bytes.len() {
                    xfers.advance(key, end);
                    let flag = if offset == 0 {
                        PdrTransferFlag::Start
                    } else {
                        PdrTransferFlag::Middle
                    };
                    (flag, xfers.handle(key), None)
                } else {
                    xfers.finish(key);
                    if offset == 0 {
                        (PdrTransferFlag::StartAndEnd, 0, None)
                    } else {
                        (PdrTransferFlag::End, 0, Some(crc8(bytes)))
                    }
                };

                Ok(GetPdrResponse::new(
                    instance_id,
                    next_record_handle,
                    next_xfer_handle,
                    flag,
                    &bytes[offset..end],
                    crc,
                )
                .encode(payload))
            })
            .await
            .map_err(MsgHandlerError::PdrRepo)?;

        match encoded {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(MsgHandlerError::Codec(e)),
            Err(completion_code) => {
                // The transfer stays open so the requester can retry the part.
                debug!("PLDM: record {} changed during transfer", record_handle);
                generate_failure_response(payload, completion_code)
            }
        }
    }
}
