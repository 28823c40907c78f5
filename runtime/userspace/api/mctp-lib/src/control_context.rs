// Licensed under the Apache-2.0 license

extern crate alloc;

use crate::error::{MctpError, MctpResult};
use crate::transport::{MsgHandler, UuidSource};
use alloc::boxed::Box;
use async_trait::async_trait;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use log::{info, warn};
use mctp_common::base_protocol::{valid_eid, MessageType, MCTP_NULL_EID};
use mctp_common::control_msg::{
    CmdCompletionCode, EidType, EndpointType, GetEidResp, GetMsgTypeSupportResp, GetUuidResp,
    GetVersionResp, MctpCtrlCmd, MctpCtrlMsgHdr, SetEidOp, SetEidReq, SetEidResp, SetEidStatus,
    VersionQuery, MCTP_CTRL_MSG_HEADER_LEN, MCTP_UUID_LEN,
};
use zerocopy::{FromBytes, IntoBytes};

/// Largest request body any supported control command carries.
const MAX_CTRL_REQ_DATA_LEN: usize = 2;

/// Endpoint state answered through MCTP control messages: the assigned EID and
/// the device UUID, which is read from `uuid_source` on every GetUUID.
pub struct MctpControlContext<'a> {
    local_eid: AtomicU8,
    eid_assigned: AtomicBool,
    uuid_source: &'a dyn UuidSource,
}

impl<'a> MctpControlContext<'a> {
    pub fn new(uuid_source: &'a dyn UuidSource) -> Self {
        Self {
            local_eid: AtomicU8::new(MCTP_NULL_EID),
            eid_assigned: AtomicBool::new(false),
            uuid_source,
        }
    }

    pub fn local_eid(&self) -> u8 {
        self.local_eid.load(Ordering::SeqCst)
    }

    pub fn is_eid_assigned(&self) -> bool {
        self.eid_assigned.load(Ordering::SeqCst)
    }

    fn assign_eid(&self, eid: u8) {
        self.local_eid.store(eid, Ordering::SeqCst);
        self.eid_assigned.store(true, Ordering::SeqCst);
        info!("MCTP: local EID set to {:#04x}", eid);
    }

    /// Writes the response body (completion code onward) for `cmd` into `rsp`
    /// and returns its length.
    pub fn process_ctrl_cmd(
        &self,
        cmd: MctpCtrlCmd,
        req: &[u8],
        rsp: &mut [u8],
    ) -> MctpResult<usize> {
        if req.len() < cmd.req_data_len() {
            warn!("MCTP: {:?} request too short ({} bytes)", cmd, req.len());
            return write_rsp(&[CmdCompletionCode::ErrorInvalidLength as u8], rsp);
        }

        match cmd {
            MctpCtrlCmd::SetEid => self.set_eid_rsp(req, rsp),
            MctpCtrlCmd::GetEid => self.get_eid_rsp(rsp),
            MctpCtrlCmd::GetUuid => self.get_uuid_rsp(rsp),
            MctpCtrlCmd::GetVersion => self.get_version_rsp(req, rsp),
            MctpCtrlCmd::GetMsgTypeSupport => self.get_msg_type_support_rsp(rsp),
            MctpCtrlCmd::Unsupported => {
                write_rsp(&[CmdCompletionCode::ErrorNotSupportedCmd as u8], rsp)
            }
        }
    }

    fn set_eid_rsp(&self, req: &[u8], rsp: &mut [u8]) -> MctpResult<usize> {
        let (req, _) = SetEidReq::<[u8; 2]>::read_from_prefix(req)
            .map_err(|_| MctpError::BufferTooSmall)?;
        let eid = req.eid();
        let mut resp = SetEidResp::default();

        if !valid_eid(eid) {
            resp.set_completion_code(CmdCompletionCode::ErrorInvalidData as u8);
            return write_rsp(resp.as_bytes(), rsp);
        }

        match SetEidOp::from(req.op()) {
            SetEidOp::SetEid if self.is_eid_assigned() => {
                warn!("MCTP: SetEID {:#04x} rejected, EID already assigned", eid);
                resp.set_completion_code(CmdCompletionCode::Success as u8);
                resp.set_eid_assign_status(SetEidStatus::Rejected as u8);
                resp.set_assigned_eid(self.local_eid());
            }
            SetEidOp::SetEid | SetEidOp::ForceEid => {
                self.assign_eid(eid);
                resp.set_completion_code(CmdCompletionCode::Success as u8);
                resp.set_eid_assign_status(SetEidStatus::Accepted as u8);
                resp.set_assigned_eid(eid);
            }
            SetEidOp::ResetEid | SetEidOp::SetDiscoveredFlag => {
                resp.set_completion_code(CmdCompletionCode::ErrorInvalidData as u8);
            }
        }
        write_rsp(resp.as_bytes(), rsp)
    }

    fn get_eid_rsp(&self, rsp: &mut [u8]) -> MctpResult<usize> {
        let mut resp = GetEidResp::default();
        resp.set_completion_code(CmdCompletionCode::Success as u8);
        resp.set_eid(self.local_eid());
        resp.set_eid_type(EidType::StaticSupported as u8);
        resp.set_endpoint_type(EndpointType::Simple as u8);
        write_rsp(resp.as_bytes(), rsp)
    }

    fn get_uuid_rsp(&self, rsp: &mut [u8]) -> MctpResult<usize> {
        let resp = GetUuidResp {
            completion_code: CmdCompletionCode::Success as u8,
            uuid: self.uuid_source.uuid(),
        };
        write_rsp(resp.as_bytes(), rsp)
    }

    fn get_version_rsp(&self, req: &[u8], rsp: &mut [u8]) -> MctpResult<usize> {
        match VersionQuery::from(req[0]).version() {
            Some(version) => write_rsp(GetVersionResp::new(version).as_bytes(), rsp),
            None => write_rsp(&[CmdCompletionCode::MessageTypeNotSupported as u8], rsp),
        }
    }

    fn get_msg_type_support_rsp(&self, rsp: &mut [u8]) -> MctpResult<usize> {
        let resp = GetMsgTypeSupportResp {
            completion_code: CmdCompletionCode::Success as u8,
            msg_type_count: MessageType::SUPPORTED.len() as u8,
            msg_types: MessageType::SUPPORTED.map(|t| t as u8),
        };
        write_rsp(resp.as_bytes(), rsp)
    }
}

fn write_rsp(body: &[u8], rsp: &mut [u8]) -> MctpResult<usize> {
    rsp.get_mut(..body.len())
        .ok_or(MctpError::BufferTooSmall)?
        .copy_from_slice(body);
    Ok(body.len())
}

#[async_trait(?Send)]
impl MsgHandler for MctpControlContext<'_> {
    async fn handle_message(
        &self,
        msg_buf: &mut [u8],
        req_len: usize,
    ) -> Result<usize, MctpError> {
        if req_len < MCTP_CTRL_MSG_HEADER_LEN || msg_buf.len() < req_len {
            return Err(MctpError::BufferTooSmall);
        }

        let (hdr, _) = MctpCtrlMsgHdr::<[u8; MCTP_CTRL_MSG_HEADER_LEN]>::read_from_prefix(msg_buf)
            .map_err(|_| MctpError::BufferTooSmall)?;
        if hdr.rq() != 1 {
            return Err(MctpError::NotARequest);
        }

        // The response overwrites the request body, so keep a copy of it.
        let req_data = &msg_buf[MCTP_CTRL_MSG_HEADER_LEN..req_len];
        let mut req = [0u8; MAX_CTRL_REQ_DATA_LEN];
        let req_data_len = req_data.len().min(MAX_CTRL_REQ_DATA_LEN);
        req[..req_data_len].copy_from_slice(&req_data[..req_data_len]);

        let cmd = MctpCtrlCmd::from(hdr.cmd());
        let body_len = self.process_ctrl_cmd(
            cmd,
            &req[..req_data_len],
            &mut msg_buf[MCTP_CTRL_MSG_HEADER_LEN..],
        )?;

        msg_buf[..MCTP_CTRL_MSG_HEADER_LEN].copy_from_slice(&hdr.into_response().0);
        Ok(MCTP_CTRL_MSG_HEADER_LEN + body_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::executor::block_on;
    use mctp_common::control_msg::{MCTP_BASE_SPEC_VERSION, PLDM_OVER_MCTP_BINDING_VERSION};

    const UUID: [u8; MCTP_UUID_LEN] = [
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E,
        0x1F,
    ];

    fn request(ctx: &MctpControlContext<'_>, cmd: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = [0u8; 64];
        buf[..3].copy_from_slice(&[0x00, 0x80 | 0x03, cmd]);
        buf[3..3 + data.len()].copy_from_slice(data);
        let len = block_on(ctx.handle_message(&mut buf, 3 + data.len())).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn test_set_eid() {
        let ctx = MctpControlContext::new(&UUID);
        assert!(!ctx.is_eid_assigned());

        let rsp = request(&ctx, 0x01, &[0x00, 0x0A]);
        assert_eq!(rsp, [0x00, 0x03, 0x01, 0x00, 0x00, 0x0A, 0x00]);
        assert_eq!(ctx.local_eid(), 0x0A);

        // A second plain SET is rejected but still succeeds at the command level.
        let rsp = request(&ctx, 0x01, &[0x00, 0x0B]);
        assert_eq!(rsp, [0x00, 0x03, 0x01, 0x00, 0x10, 0x0A, 0x00]);
        assert_eq!(ctx.local_eid(), 0x0A);

        let rsp = request(&ctx, 0x01, &[0x01, 0x0B]);
        assert_eq!(rsp, [0x00, 0x03, 0x01, 0x00, 0x00, 0x0B, 0x00]);
        assert_eq!(ctx.local_eid(), 0x0B);
    }

    #[test]
    fn test_set_eid_invalid() {
        let ctx = MctpControlContext::new(&UUID);
        for data in [[0x00, 0x00], [0x01, 0xFF], [0x02, 0x0A], [0x03, 0x0A]] {
            let rsp = request(&ctx, 0x01, &data);
            assert_eq!(rsp[3], CmdCompletionCode::ErrorInvalidData as u8);
            assert_eq!(rsp.len(), 7);
        }
        assert!(!ctx.is_eid_assigned());
        assert_eq!(ctx.local_eid(), MCTP_NULL_EID);
    }

    #[test]
    fn test_get_eid_and_uuid() {
        let ctx = MctpControlContext::new(&UUID);
        assert_eq!(request(&ctx, 0x02, &[]), [0x00, 0x03, 0x02, 0x00, 0x00, 0x01, 0x00]);
        request(&ctx, 0x01, &[0x00, 0x08]);
        assert_eq!(request(&ctx, 0x02, &[])[4], 0x08);

        let rsp = request(&ctx, 0x03, &[]);
        assert_eq!(rsp.len(), 3 + 1 + MCTP_UUID_LEN);
        assert_eq!(rsp[4..], UUID);
    }

    #[test]
    fn test_get_version() {
        let ctx = MctpControlContext::new(&UUID);
        let base = MCTP_BASE_SPEC_VERSION.to_be_bytes();
        for query in [0xFF, 0x00] {
            let rsp = request(&ctx, 0x04, &[query]);
            assert_eq!(rsp[3..], [0x00, 0x01, base[0], base[1], base[2], base[3]]);
        }
        let rsp = request(&ctx, 0x04, &[0x01]);
        assert_eq!(rsp[5..], PLDM_OVER_MCTP_BINDING_VERSION.to_be_bytes());
        assert_eq!(request(&ctx, 0x04, &[0x02])[3..], [0x80]);
        assert_eq!(request(&ctx, 0x04, &[])[3..], [0x03]);
    }

    #[test]
    fn test_get_msg_type_support_and_unknown() {
        let ctx = MctpControlContext::new(&UUID);
        assert_eq!(request(&ctx, 0x05, &[])[3..], [0x00, 0x02, 0x00, 0x01]);
        assert_eq!(request(&ctx, 0x7E, &[]), [0x00, 0x03, 0x7E, 0x05]);
    }

    #[test]
    fn test_response_is_rejected() {
        let ctx = MctpControlContext::new(&UUID);
        let mut buf = [0x00, 0x03, 0x02, 0x00];
        assert_eq!(
            block_on(ctx.handle_message(&mut buf, 3)),
            Err(MctpError::NotARequest)
        );
    }
}
