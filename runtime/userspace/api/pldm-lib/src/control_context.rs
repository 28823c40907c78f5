// Licensed under the Apache-2.0 license

extern crate alloc;

use crate::cmd_interface::{generate_failure_response, request_bytes};
use crate::config::{MAX_PROTOCOL_VERSIONS, MAX_VERSIONS_PER_RESPONSE, VERSION_TRANSFER_SLOTS};
use crate::error::MsgHandlerError;
use crate::pdr_repo::PdrRepository;
use crate::transfer::TransferTable;
use alloc::boxed::Box;
use async_trait::async_trait;
use core::sync::atomic::{AtomicUsize, Ordering};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use log::{debug, warn};
use pldm_common::codec::PldmCodec;
use pldm_common::error::PldmError;
use pldm_common::message::control::{
    GetPldmCommandsRequest, GetPldmCommandsResponse, GetPldmTypeRequest, GetPldmTypeResponse,
    GetPldmVersionRequest, GetPldmVersionResponse, GetTidRequest, GetTidResponse, SetTidRequest,
    SetTidResponse,
};
use pldm_common::protocol::base::{
    PldmBaseCompletionCode, PldmControlCompletionCode, PldmSupportedType, TransferOperationFlag,
    TransferRespFlag,
};
use pldm_common::protocol::version::{PldmVersion, ProtocolVersionStr, Ver32};
use pldm_common::util::crc::crc32_ver32_list;

pub type Tid = u8;
pub type CmdOpCode = u8;
pub const UNASSIGNED_TID: Tid = 0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProtocolCapability<'a> {
    pub pldm_type: PldmSupportedType,
    pub protocol_version: Ver32,
    pub supported_commands: &'a [CmdOpCode],
}

impl<'a> ProtocolCapability<'a> {
    pub fn new(
        pldm_type: PldmSupportedType,
        protocol_version: ProtocolVersionStr,
        supported_commands: &'a [CmdOpCode],
    ) -> Result<Self, PldmError> {
        Ok(Self {
            pldm_type,
            protocol_version: PldmVersion::try_from(protocol_version)
                .map_err(|_| PldmError::InvalidProtocolVersion)?
                .to_ver32(),
            supported_commands,
        })
    }
}

/// State behind the PLDM Type 0 commands.
///
/// * `tid` - Terminus ID assigned by SetTID. Mirrored into the terminus
///   locator PDR.
/// * `capabilities` - Supported (type, version, commands) triples.
/// * `version_xfers` - Multipart GetPLDMVersion transfers, one per PLDM type.
pub struct ControlContext<'a> {
    tid: AtomicUsize,
    capabilities: &'a [ProtocolCapability<'a>],
    pdr_repo: &'a PdrRepository,
    version_xfers: Mutex<NoopRawMutex, TransferTable<VERSION_TRANSFER_SLOTS>>,
}

impl<'a> ControlContext<'a> {
    pub fn new(capabilities: &'a [ProtocolCapability<'a>], pdr_repo: &'a PdrRepository) -> Self {
        Self {
            tid: AtomicUsize::new(UNASSIGNED_TID as usize),
            capabilities,
            pdr_repo,
            version_xfers: Mutex::new(TransferTable::new()),
        }
    }

    pub fn get_tid(&self) -> Tid {
        self.tid.load(Ordering::SeqCst) as Tid
    }

    pub fn set_tid(&self, tid: Tid) {
        self.tid.store(tid as usize, Ordering::SeqCst);
    }

    pub fn get_supported_commands(
        &self,
        pldm_type: PldmSupportedType,
        protocol_version: Ver32,
    ) -> Option<&[CmdOpCode]> {
        self.capabilities
            .iter()
            .find(|cap| cap.pldm_type == pldm_type && cap.protocol_version == protocol_version)
            .map(|cap| cap.supported_commands)
    }

    pub fn get_protocol_versions(
        &self,
        pldm_type: PldmSupportedType,
        versions: &mut [Ver32],
    ) -> usize {
        let mut count = 0;
        for cap in self
            .capabilities
            .iter()
            .filter(|cap| cap.pldm_type == pldm_type)
        {
            if count < versions.len() {
                versions[count] = cap.protocol_version;
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    pub fn get_supported_types(&self, types: &mut [u8]) -> usize {
        let mut count = 0;
        for cap in self.capabilities.iter() {
            let pldm_type = cap.pldm_type as u8;
            if !types[..count].contains(&pldm_type) {
                if count < types.len() {
                    types[count] = pldm_type;
                    count += 1;
                } else {
                    break;
                }
            }
        }
        count
    }

    pub fn is_supported_type(&self, pldm_type: PldmSupportedType) -> bool {
        self.capabilities
            .iter()
            .any(|cap| cap.pldm_type == pldm_type)
    }

    pub fn is_supported_version(
        &self,
        pldm_type: PldmSupportedType,
        protocol_version: Ver32,
    ) -> bool {
        self.capabilities
            .iter()
            .any(|cap| cap.pldm_type == pldm_type && cap.protocol_version == protocol_version)
    }

    pub fn is_supported_command(&self, pldm_type: PldmSupportedType, cmd: u8) -> bool {
        self.capabilities
            .iter()
            .filter(|cap| cap.pldm_type == pldm_type)
            .any(|cap| cap.supported_commands.contains(&cmd))
    }

    fn supported_type_in_request(&self, pldm_type: u8) -> Option<PldmSupportedType> {
        PldmSupportedType::try_from(pldm_type)
            .ok()
            .filter(|t| self.is_supported_type(*t))
    }
}

/// Responder for the PLDM Type 0 (messaging control and discovery) commands.
///
/// Each method decodes its request from the first `req_len` bytes of
/// `payload`, writes the response over it and returns the response length.
#[async_trait(?Send)]
pub trait CtrlCmdResponder {
    async fn get_tid_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
    async fn set_tid_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
    async fn get_pldm_types_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
    async fn get_pldm_commands_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
    async fn get_pldm_version_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError>;
}

#[async_trait(?Send)]
impl CtrlCmdResponder for ControlContext<'_> {
    async fn get_tid_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = GetTidRequest::decode(request_bytes(payload, req_len))
            .map_err(MsgHandlerError::Codec)?;
        let resp = GetTidResponse::new(
            req.hdr.instance_id(),
            self.get_tid(),
            PldmBaseCompletionCode::Success as u8,
        );
        resp.encode(payload).map_err(MsgHandlerError::Codec)
    }

    async fn set_tid_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = match SetTidRequest::decode(request_bytes(payload, req_len)) {
            Ok(req) => req,
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmBaseCompletionCode::InvalidLength as u8,
                )
            }
        };

        self.set_tid(req.tid);
        if let Err(e) = self.pdr_repo.update_tid(req.tid).await {
            warn!("PLDM: TID {} not stored in PDR repository: {:?}", req.tid, e);
        }

        let resp =
            SetTidResponse::new(req.hdr.instance_id(), PldmBaseCompletionCode::Success as u8);
        resp.encode(payload).map_err(MsgHandlerError::Codec)
    }

    async fn get_pldm_types_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = GetPldmTypeRequest::decode(request_bytes(payload, req_len))
            .map_err(MsgHandlerError::Codec)?;
        let mut types = [0x0u8; 6];
        let num_types = self.get_supported_types(&mut types);
        let resp = GetPldmTypeResponse::new(
            req.hdr.instance_id(),
            PldmBaseCompletionCode::Success as u8,
            &types[..num_types],
        );
        resp.encode(payload).map_err(MsgHandlerError::Codec)
    }

    async fn get_pldm_commands_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = match GetPldmCommandsRequest::decode(request_bytes(payload, req_len)) {
            Ok(req) => req,
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmBaseCompletionCode::InvalidLength as u8,
                )
            }
        };

        let Some(pldm_type_in_req) = self.supported_type_in_request(req.pldm_type) else {
            return generate_failure_response(
                payload,
                PldmControlCompletionCode::InvalidPldmTypeInRequestData as u8,
            );
        };

        let version_in_req = req.protocol_version;
        let Some(cmds) = self.get_supported_commands(pldm_type_in_req, version_in_req) else {
            return generate_failure_response(
                payload,
                PldmControlCompletionCode::InvalidPldmVersionInRequestData as u8,
            );
        };

        let resp = GetPldmCommandsResponse::new(
            req.hdr.instance_id(),
            PldmBaseCompletionCode::Success as u8,
            cmds,
        );

        match resp.encode(payload) {
            Ok(bytes) => Ok(bytes),
            Err(_) => {
                generate_failure_response(payload, PldmBaseCompletionCode::InvalidLength as u8)
            }
        }
    }

    async fn get_pldm_version_rsp(
        &self,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MsgHandlerError> {
        let req = match GetPldmVersionRequest::decode(request_bytes(payload, req_len)) {
            Ok(req) => req,
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmBaseCompletionCode::InvalidLength as u8,
                )
            }
        };

        let Some(pldm_type_in_req) = self.supported_type_in_request(req.pldm_type) else {
            return generate_failure_response(
                payload,
                PldmControlCompletionCode::InvalidPldmTypeInRequestData as u8,
            );
        };
        let key = pldm_type_in_req as usize;

        let mut xfers = self.version_xfers.lock().await;
        let offset = match TransferOperationFlag::try_from(req.transfer_op_flag) {
            Ok(TransferOperationFlag::GetFirstPart) => {
                xfers.start(key);
                0
            }
            Ok(TransferOperationFlag::GetNextPart) => match xfers.resolve(req.data_transfer_handle)
            {
                Some((slot, offset)) if slot == key => offset,
                _ => {
                    let handle = req.data_transfer_handle;
                    debug!("PLDM: stale version transfer handle {:#010x}", handle);
                    return generate_failure_response(
                        payload,
                        PldmControlCompletionCode::InvalidDataTransferHandle as u8,
                    );
                }
            },
            Err(_) => {
                return generate_failure_response(
                    payload,
                    PldmControlCompletionCode::InvalidTransferOperationFlag as u8,
                )
            }
        };

        let mut versions = [0u32; MAX_PROTOCOL_VERSIONS];
        let count = self.get_protocol_versions(pldm_type_in_req, &mut versions);
        if count == 0 {
            xfers.finish(key);
            return generate_failure_response(payload, PldmBaseCompletionCode::Error as u8);
        }
        let versions = &versions[..count];

        let offset = offset.min(count);
        let end = count.min(offset + MAX_VERSIONS_PER_RESPONSE);
        let (flag, next_handle, crc) = if end < count {
            xfers.advance(key, end);
            let flag = if offset == 0 {
                TransferRespFlag::Start
            } else {
                TransferRespFlag::Middle
            };
            (flag, xfers.handle(key), None)
        } else {
            xfers.finish(key);
            let flag = if offset == 0 {
                TransferRespFlag::StartAndEnd
            } else {
                TransferRespFlag::End
            };
            (flag, 0, Some(crc32_ver32_list(versions)))
        };

        let resp = GetPldmVersionResponse::new(
            req.hdr.instance_id(),
            PldmBaseCompletionCode::Success as u8,
            next_handle,
            flag,
            &versions[offset..end],
            crc,
        );

        match resp.encode(payload) {
            Ok(bytes) => Ok(bytes),
            Err(_) => {
                generate_failure_response(payload, PldmBaseCompletionCode::InvalidLength as u8)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pdr_repo::test::{TestProfile, TEST_UID};
    use crate::pdr_repo::PdrRecord;
    use futures::executor::block_on;
    use pldm_common::message::control::GetPldmVersionResponseFixed;
    use pldm_common::protocol::base::{
        PldmControlCmd, PldmFailureResponse, PldmMsgType, PLDM_FAILURE_RESP_LEN,
    };
    use pldm_common::protocol::platform::PlatformCmd;
    use pldm_common::util::crc::crc32;

    const PAY_LOAD_BUFFER_LEN: usize = 256;
    const SUPPORTED_CTRL_CMDS: [u8; 5] = [
        PldmControlCmd::SetTid as u8,
        PldmControlCmd::GetTid as u8,
        PldmControlCmd::GetPldmCommands as u8,
        PldmControlCmd::GetPldmVersion as u8,
        PldmControlCmd::GetPldmTypes as u8,
    ];
    const SUPPORTED_PLATFORM_CMDS: [u8; 4] = [
        PlatformCmd::SetNumericSensorEnable as u8,
        PlatformCmd::GetSensorReading as u8,
        PlatformCmd::GetPdrRepositoryInfo as u8,
        PlatformCmd::GetPdr as u8,
    ];

    static PLDM_PROTOCOL_CAPABILITIES: [ProtocolCapability<'static>; 2] = [
        ProtocolCapability {
            pldm_type: PldmSupportedType::Base,
            protocol_version: 0xF1F1F000, //"1.1.0"
            supported_commands: &SUPPORTED_CTRL_CMDS,
        },
        ProtocolCapability {
            pldm_type: PldmSupportedType::Platform,
            protocol_version: 0xF1F2F200, // 1.2.2
            supported_commands: &SUPPORTED_PLATFORM_CMDS,
        },
    ];

    fn construct_request<T: PldmCodec>(buf: &mut [u8], request_msg: T) -> usize {
        request_msg.encode(buf).unwrap()
    }

    fn validate_response<T: PldmCodec + PartialEq>(buf: &mut [u8], expected_rsp_msg: T) {
        let rsp = T::decode(buf).unwrap();
        assert_eq!(rsp, expected_rsp_msg);
    }

    fn version_request(buf: &mut [u8], handle: u32, flag: TransferOperationFlag) -> usize {
        construct_request(
            buf,
            GetPldmVersionRequest::new(
                0x01,
                PldmMsgType::Request,
                handle,
                flag,
                PldmSupportedType::Base,
            ),
        )
    }

    #[test]
    fn test_protocol_capability() {
        let cap = ProtocolCapability::new(PldmSupportedType::Base, "1.1.0", &SUPPORTED_CTRL_CMDS);
        assert!(cap.is_ok());
        let cap = cap.unwrap();
        assert_eq!(cap.pldm_type, PldmSupportedType::Base);
        assert_eq!(cap.protocol_version, 0xF1F1F000);
        assert_eq!(cap.supported_commands, SUPPORTED_CTRL_CMDS);

        let cap = ProtocolCapability::new(
            PldmSupportedType::Platform,
            "1.2.2",
            &SUPPORTED_PLATFORM_CMDS,
        )
        .unwrap();
        assert_eq!(cap.protocol_version, 0xF1F2F200);

        assert!(ProtocolCapability::new(PldmSupportedType::Base, "one", &[]).is_err());
    }

    #[test]
    fn test_control_context() {
        let repo = PdrRepository::new();
        let ctx = ControlContext::new(&PLDM_PROTOCOL_CAPABILITIES, &repo);

        assert_eq!(ctx.get_tid(), UNASSIGNED_TID);
        ctx.set_tid(0x42);
        assert_eq!(ctx.get_tid(), 0x42);

        let mut types = [0u8; 6];
        assert_eq!(ctx.get_supported_types(&mut types), 2);
        assert_eq!(types[..2], [0, 2]);

        assert!(ctx.is_supported_version(PldmSupportedType::Platform, 0xF1F2F200));
        assert!(!ctx.is_supported_version(PldmSupportedType::Platform, 0xF1F1F000));
        assert!(ctx.is_supported_command(PldmSupportedType::Platform, 0x51));
        assert!(!ctx.is_supported_command(PldmSupportedType::Base, 0x51));
        assert!(!ctx.is_supported_type(PldmSupportedType::FwUpdate));
        assert_eq!(
            ctx.get_supported_commands(PldmSupportedType::Base, 0xF1F1F000),
            Some(&SUPPORTED_CTRL_CMDS[..])
        );
    }

    #[test]
    fn test_get_and_set_tid() {
        let data = TestProfile::new();
        let repo = PdrRepository::new();
        block_on(repo.init(&data.profile(), &TEST_UID)).unwrap();
        let ctx = ControlContext::new(&PLDM_PROTOCOL_CAPABILITIES, &repo);
        let mut msg_buf = [0u8; PAY_LOAD_BUFFER_LEN];

        let req_len =
            construct_request(&mut msg_buf, SetTidRequest::new(0x03, PldmMsgType::Request, 0x07));
        let len = block_on(ctx.set_tid_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, 4);
        validate_response(&mut msg_buf, SetTidResponse::new(0x03, 0));

        let req_len =
            construct_request(&mut msg_buf, GetTidRequest::new(0x04, PldmMsgType::Request));
        block_on(ctx.get_tid_rsp(&mut msg_buf, req_len)).unwrap();
        validate_response(&mut msg_buf, GetTidResponse::new(0x04, 0x07, 0));

        let (tid, change) = block_on(repo.with_record(0, |r| match r {
            PdrRecord::TerminusLocator(pdr) => (pdr.tid, r.change_number()),
            _ => (0, 0),
        }))
        .unwrap();
        assert_eq!((tid, change), (0x07, 1));
    }

    #[test]
    fn test_get_pldm_types() {
        let repo = PdrRepository::new();
        let ctx = ControlContext::new(&PLDM_PROTOCOL_CAPABILITIES, &repo);
        let mut msg_buf = [0u8; PAY_LOAD_BUFFER_LEN];

        let req_len =
            construct_request(&mut msg_buf, GetPldmTypeRequest::new(0x01, PldmMsgType::Request));
        assert_eq!(block_on(ctx.get_pldm_types_rsp(&mut msg_buf, req_len)).unwrap(), 12);
        assert_eq!(msg_buf[3], 0);
        assert_eq!(msg_buf[4..12], [0b0000_0101, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_get_pldm_commands() {
        let repo = PdrRepository::new();
        let ctx = ControlContext::new(&PLDM_PROTOCOL_CAPABILITIES, &repo);
        let mut msg_buf = [0u8; PAY_LOAD_BUFFER_LEN];

        let req_len = construct_request(
            &mut msg_buf,
            GetPldmCommandsRequest::new(0x01, PldmMsgType::Request, 2, 0xF1F2F200),
        );
        block_on(ctx.get_pldm_commands_rsp(&mut msg_buf, req_len)).unwrap();
        validate_response(
            &mut msg_buf,
            GetPldmCommandsResponse::new(0x01, 0, &SUPPORTED_PLATFORM_CMDS),
        );
        // 0x10, 0x11 in byte 2; 0x50, 0x51 in byte 10.
        assert_eq!(msg_buf[4 + 2], 0x03);
        assert_eq!(msg_buf[4 + 10], 0x03);

        let req_len = construct_request(
            &mut msg_buf,
            GetPldmCommandsRequest::new(0x01, PldmMsgType::Request, 5, 0xF1F3F000),
        );
        block_on(ctx.get_pldm_commands_rsp(&mut msg_buf, req_len)).unwrap();
        validate_response(
            &mut msg_buf,
            PldmFailureResponse::new(
                0x01,
                PldmSupportedType::Base,
                PldmControlCmd::GetPldmCommands as u8,
                PldmControlCompletionCode::InvalidPldmTypeInRequestData as u8,
            ),
        );

        let req_len = construct_request(
            &mut msg_buf,
            GetPldmCommandsRequest::new(0x01, PldmMsgType::Request, 2, 0xF1F0F000),
        );
        let len = block_on(ctx.get_pldm_commands_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, PLDM_FAILURE_RESP_LEN);
        assert_eq!(
            msg_buf[3],
            PldmControlCompletionCode::InvalidPldmVersionInRequestData as u8
        );
    }

    #[test]
    fn test_get_pldm_version_single_part() {
        let repo = PdrRepository::new();
        let ctx = ControlContext::new(&PLDM_PROTOCOL_CAPABILITIES, &repo);
        let mut msg_buf = [0u8; PAY_LOAD_BUFFER_LEN];

        let req_len = version_request(&mut msg_buf, 0, TransferOperationFlag::GetFirstPart);
        let len = block_on(ctx.get_pldm_version_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, 10 + 4 + 4);

        let fixed = GetPldmVersionResponseFixed::decode(&msg_buf).unwrap();
        assert_eq!(fixed.completion_code, 0);
        assert_eq!({ fixed.next_transfer_handle }, 0);
        assert_eq!(fixed.transfer_rsp_flag, TransferRespFlag::StartAndEnd as u8);
        assert_eq!(msg_buf[10..14], [0x00, 0xF0, 0xF1, 0xF1]);
        let crc = crc32(&[0x00, 0xF0, 0xF1, 0xF1]);
        assert_eq!(msg_buf[14..18], crc.to_le_bytes());
    }

    #[test]
    fn test_get_pldm_version_multipart() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();

        let mut caps = Vec::new();
        for minor in 0..10u8 {
            let mut cap = PLDM_PROTOCOL_CAPABILITIES[0];
            cap.protocol_version = PldmVersion::new(1, minor, 0xFF, 0).to_ver32();
            caps.push(cap);
        }
        let repo = PdrRepository::new();
        let ctx = ControlContext::new(&caps, &repo);
        let mut msg_buf = [0u8; PAY_LOAD_BUFFER_LEN];

        let req_len = version_request(&mut msg_buf, 0, TransferOperationFlag::GetFirstPart);
        let len = block_on(ctx.get_pldm_version_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, 10 + 8 * 4);
        let fixed = GetPldmVersionResponseFixed::decode(&msg_buf).unwrap();
        assert_eq!(fixed.transfer_rsp_flag, TransferRespFlag::Start as u8);
        let handle = fixed.next_transfer_handle;
        assert_ne!(handle, 0);

        let req_len = version_request(&mut msg_buf, handle, TransferOperationFlag::GetNextPart);
        let len = block_on(ctx.get_pldm_version_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(len, 10 + 2 * 4 + 4);
        let fixed = GetPldmVersionResponseFixed::decode(&msg_buf).unwrap();
        assert_eq!(fixed.transfer_rsp_flag, TransferRespFlag::End as u8);
        assert_eq!({ fixed.next_transfer_handle }, 0);
        assert_eq!(msg_buf[10..14], caps[8].protocol_version.to_le_bytes());

        let all: Vec<u32> = caps.iter().map(|c| c.protocol_version).collect();
        assert_eq!(msg_buf[18..22], crc32_ver32_list(&all).to_le_bytes());

        // The finished transfer no longer accepts its handle.
        let req_len = version_request(&mut msg_buf, handle, TransferOperationFlag::GetNextPart);
        block_on(ctx.get_pldm_version_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(
            msg_buf[3],
            PldmControlCompletionCode::InvalidDataTransferHandle as u8
        );
    }

    #[test]
    fn test_get_pldm_version_rejects() {
        let repo = PdrRepository::new();
        let ctx = ControlContext::new(&PLDM_PROTOCOL_CAPABILITIES, &repo);
        let mut msg_buf = [0u8; PAY_LOAD_BUFFER_LEN];

        let req_len = version_request(&mut msg_buf, 0, TransferOperationFlag::GetFirstPart);
        msg_buf[8] = 7;
        block_on(ctx.get_pldm_version_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(
            msg_buf[3],
            PldmControlCompletionCode::InvalidPldmTypeInRequestData as u8
        );

        let req_len = version_request(&mut msg_buf, 0x1234, TransferOperationFlag::GetNextPart);
        block_on(ctx.get_pldm_version_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(
            msg_buf[3],
            PldmControlCompletionCode::InvalidDataTransferHandle as u8
        );

        let req_len = version_request(&mut msg_buf, 0, TransferOperationFlag::GetFirstPart);
        msg_buf[7] = 2;
        block_on(ctx.get_pldm_version_rsp(&mut msg_buf, req_len)).unwrap();
        assert_eq!(
            msg_buf[3],
            PldmControlCompletionCode::InvalidTransferOperationFlag as u8
        );
    }
}
