// Licensed under the Apache-2.0 license

use crate::control_context::{ControlContext, CtrlCmdResponder, ProtocolCapability};
use crate::error::MsgHandlerError;
use crate::pdr_repo::PdrRepository;
use crate::platform_context::{PlatformCmdResponder, PlatformContext};
use crate::sensor_ops::SensorOps;
use core::sync::atomic::{AtomicBool, Ordering};
use log::debug;
use pldm_common::codec::PldmCodec;
use pldm_common::protocol::base::{
    PldmBaseCompletionCode, PldmControlCmd, PldmFailureResponse, PldmMsgHeader, PldmSupportedType,
};
use pldm_common::protocol::platform::PlatformCmd;
use pldm_common::util::mctp_transport::PLDM_MSG_OFFSET;

pub type PldmCompletionErrorCode = u8;

// Helper function to write a failure response message into payload
pub(crate) fn generate_failure_response(
    payload: &mut [u8],
    completion_code: u8,
) -> Result<usize, MsgHandlerError> {
    let header = PldmMsgHeader::decode(payload).map_err(MsgHandlerError::Codec)?;
    let resp = PldmFailureResponse {
        hdr: header.into_response(),
        completion_code,
    };
    resp.encode(payload).map_err(MsgHandlerError::Codec)
}

/// The request part of a payload buffer. Bytes past `req_len` are left over
/// from earlier messages and must not be decoded.
pub(crate) fn request_bytes(payload: &[u8], req_len: usize) -> &[u8] {
    &payload[..req_len.min(payload.len())]
}

/// PLDM responder: validates the header of each request and hands it to the
/// Type 0 or Type 2 context.
pub struct CmdInterface<'a> {
    ctrl_ctx: ControlContext<'a>,
    platform_ctx: PlatformContext<'a>,
    busy: AtomicBool,
}

impl<'a> CmdInterface<'a> {
    pub fn new(
        protocol_capabilities: &'a [ProtocolCapability],
        pdr_repo: &'a PdrRepository,
        sensor_ops: &'a dyn SensorOps,
    ) -> Self {
        Self {
            ctrl_ctx: ControlContext::new(protocol_capabilities, pdr_repo),
            platform_ctx: PlatformContext::new(pdr_repo, sensor_ops),
            busy: AtomicBool::new(false),
        }
    }

    pub fn control_context(&self) -> &ControlContext<'a> {
        &self.ctrl_ctx
    }

    pub fn platform_context(&self) -> &PlatformContext<'a> {
        &self.platform_ctx
    }

    /// Processes the PLDM request following the MCTP message-type byte in
    /// `msg_buf` and writes the response in its place. `req_len` counts the
    /// message-type byte.
    ///
    /// Returns the response length including the message-type byte.
    pub async fn process_request(
        &self,
        msg_buf: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        // Check if the handler is busy processing a request
        if self.busy.load(Ordering::SeqCst) {
            return Err(MsgHandlerError::NotReady);
        }

        self.busy.store(true, Ordering::SeqCst);

        // Get the pldm payload from msg_buf
        let payload = &mut msg_buf[PLDM_MSG_OFFSET..];
        let reserved_len = PLDM_MSG_OFFSET;
        let req_len = req_len.saturating_sub(PLDM_MSG_OFFSET);

        let request = request_bytes(payload, req_len);
        let (pldm_type, cmd_opcode) = match self.preprocess_request(request) {
            Ok(result) => result,
            Err(e) => {
                self.busy.store(false, Ordering::SeqCst);
                debug!("PLDM: request rejected with {:#04x}", e);
                return Ok(reserved_len + generate_failure_response(payload, e)?);
            }
        };

        let resp_len = match pldm_type {
            PldmSupportedType::Platform => {
                self.process_platform_cmd(cmd_opcode, payload, req_len).await
            }
            _ => self.process_control_cmd(cmd_opcode, payload, req_len).await,
        };

        self.busy.store(false, Ordering::SeqCst);

        resp_len.map(|bytes| reserved_len + bytes)
    }

    async fn process_control_cmd(
        &self,
        cmd_opcode: u8,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        match PldmControlCmd::try_from(cmd_opcode) {
            Ok(cmd) => match cmd {
                PldmControlCmd::GetTid => self.ctrl_ctx.get_tid_rsp(payload, req_len).await,
                PldmControlCmd::SetTid => self.ctrl_ctx.set_tid_rsp(payload, req_len).await,
                PldmControlCmd::GetPldmTypes => {
                    self.ctrl_ctx.get_pldm_types_rsp(payload, req_len).await
                }
                PldmControlCmd::GetPldmCommands => {
                    self.ctrl_ctx.get_pldm_commands_rsp(payload, req_len).await
                }
                PldmControlCmd::GetPldmVersion => {
                    self.ctrl_ctx.get_pldm_version_rsp(payload, req_len).await
                }
            },
            Err(_) => {
                generate_failure_response(payload, PldmBaseCompletionCode::UnsupportedPldmCmd as u8)
            }
        }
    }

    async fn process_platform_cmd(
        &self,
        cmd_opcode: u8,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        match PlatformCmd::try_from(cmd_opcode) {
            Ok(cmd) => match cmd {
                PlatformCmd::SetNumericSensorEnable => {
                    self.platform_ctx.set_numeric_sensor_enable_rsp(payload, req_len).await
                }
                PlatformCmd::GetSensorReading => {
                    self.platform_ctx.get_sensor_reading_rsp(payload, req_len).await
                }
                PlatformCmd::GetPdrRepositoryInfo => {
                    self.platform_ctx.get_pdr_repository_info_rsp(payload, req_len).await
                }
                PlatformCmd::GetPdr => self.platform_ctx.get_pdr_rsp(payload, req_len).await,
            },
            Err(_) => {
                generate_failure_response(payload, PldmBaseCompletionCode::UnsupportedPldmCmd as u8)
            }
        }
    }

    fn preprocess_request(
        &self,
        payload: &[u8],
    ) -> Result<(PldmSupportedType, u8), PldmCompletionErrorCode> {
        let header = PldmMsgHeader::decode(payload)
            .map_err(|_| PldmBaseCompletionCode::InvalidData as u8)?;
        if !(header.is_request() && header.is_hdr_ver_valid()) {
            Err(PldmBaseCompletionCode::InvalidData as u8)?;
        }

        let pldm_type = PldmSupportedType::try_from(header.pldm_type())
            .map_err(|_| PldmBaseCompletionCode::InvalidPldmType as u8)?;

        if !self.ctrl_ctx.is_supported_type(pldm_type) {
            Err(PldmBaseCompletionCode::InvalidPldmType as u8)?;
        }

        let cmd_opcode = header.cmd_code();
        if self.ctrl_ctx.is_supported_command(pldm_type, cmd_opcode) {
            Ok((pldm_type, cmd_opcode))
        } else {
            Err(PldmBaseCompletionCode::UnsupportedPldmCmd as u8)
        }
    }
}

#[cfg(test)]
mod test {
    extern crate alloc;

    use super::*;
    use crate::config::PLDM_PROTOCOL_CAPABILITIES;
    use crate::pdr_repo::test::{TestProfile, TEST_UID};
    use crate::sensor_ops::{SensorOpsError, SensorReading};
    use alloc::boxed::Box;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use pldm_common::message::control::{GetTidRequest, GetTidResponse};
    use pldm_common::message::platform::GetPdrRepositoryInfoRequest;
    use pldm_common::protocol::base::PldmMsgType;
    use pldm_common::protocol::platform::SensorOperationalState;
    use pldm_common::util::mctp_transport::MCTP_PLDM_MSG_TYPE;

    struct NoSensors;

    #[async_trait(?Send)]
    impl SensorOps for NoSensors {
        async fn set_numeric_sensor_enable(
            &self,
            _sensor_id: u16,
            _op_state: SensorOperationalState,
        ) -> Result<(), SensorOpsError> {
            Err(SensorOpsError::NoResponse)
        }

        async fn get_sensor_reading(
            &self,
            _sensor_id: u16,
        ) -> Result<SensorReading, SensorOpsError> {
            Err(SensorOpsError::NoResponse)
        }
    }

    fn construct_request<T: PldmCodec>(buf: &mut [u8], request_msg: T) -> usize {
        buf[0] = MCTP_PLDM_MSG_TYPE;
        PLDM_MSG_OFFSET + request_msg.encode(&mut buf[PLDM_MSG_OFFSET..]).unwrap()
    }

    fn validate_response<T: PldmCodec + PartialEq>(buf: &[u8], expected_rsp_msg: T) {
        assert_eq!(buf[0], MCTP_PLDM_MSG_TYPE);
        let rsp = T::decode(&buf[PLDM_MSG_OFFSET..]).unwrap();
        assert_eq!(rsp, expected_rsp_msg);
    }

    #[test]
    fn test_dispatch_by_type() {
        let data = TestProfile::new();
        let repo = PdrRepository::new();
        block_on(repo.init(&data.profile(), &TEST_UID)).unwrap();
        let ops = NoSensors;
        let cmd_interface = CmdInterface::new(PLDM_PROTOCOL_CAPABILITIES.get(), &repo, &ops);
        let mut msg_buf = [0u8; 128];

        let req_len =
            construct_request(&mut msg_buf, GetTidRequest::new(0x01, PldmMsgType::Request));
        let len = block_on(cmd_interface.process_request(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, 1 + 5);
        validate_response(&msg_buf, GetTidResponse::new(0x01, 0, 0));

        let req_len = construct_request(
            &mut msg_buf,
            GetPdrRepositoryInfoRequest::new(0x02, PldmMsgType::Request),
        );
        let len = block_on(cmd_interface.process_request(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, 1 + 44);
        assert_eq!(msg_buf[1..5], [0x02, 0x02, 0x50, 0x00]);
    }

    #[test]
    fn test_header_rejects() {
        let repo = PdrRepository::new();
        let ops = NoSensors;
        let cmd_interface = CmdInterface::new(PLDM_PROTOCOL_CAPABILITIES.get(), &repo, &ops);
        let mut msg_buf = [0u8; 128];
        let req_len = 4;

        // Firmware update type is not served.
        msg_buf[..4].copy_from_slice(&[MCTP_PLDM_MSG_TYPE, 0x81, 0x05, 0x01]);
        let len = block_on(cmd_interface.process_request(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, 5);
        validate_response(
            &msg_buf,
            PldmFailureResponse::new(
                0x01,
                PldmSupportedType::FwUpdate,
                0x01,
                PldmBaseCompletionCode::InvalidPldmType as u8,
            ),
        );

        // GetStateSensorReadings is a Type 2 command this responder lacks.
        msg_buf[..4].copy_from_slice(&[MCTP_PLDM_MSG_TYPE, 0x81, 0x02, 0x21]);
        block_on(cmd_interface.process_request(&mut msg_buf, req_len)).unwrap();
        assert_eq!(msg_buf[4], PldmBaseCompletionCode::UnsupportedPldmCmd as u8);

        // Header version 1.
        msg_buf[..4].copy_from_slice(&[MCTP_PLDM_MSG_TYPE, 0x81, 0x40, 0x02]);
        block_on(cmd_interface.process_request(&mut msg_buf, req_len)).unwrap();
        assert_eq!(msg_buf[4], PldmBaseCompletionCode::InvalidData as u8);
    }
}
