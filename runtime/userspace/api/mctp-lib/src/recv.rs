// Licensed under the Apache-2.0 license

use crate::config::{MCTP_MAX_REASSEMBLY_SESSIONS, MCTP_STAGING_BUF_SIZE};
use crate::error::{MctpError, MctpResult};
use arrayvec::ArrayVec;
use log::{debug, warn};
use mctp_common::base_protocol::{MctpFrameHeader, MCTP_FRAME_HDR_LEN};

pub type FrameHeader = MctpFrameHeader<[u8; MCTP_FRAME_HDR_LEN]>;

/// A multi-packet message being collected from one source endpoint.
struct ReassemblySession {
    /// Header of the SOM packet. Responses are addressed from it.
    first_hdr: FrameHeader,
    last_seq: u8,
    staging: ArrayVec<u8, MCTP_STAGING_BUF_SIZE>,
}

impl ReassemblySession {
    fn start(hdr: FrameHeader, payload: &[u8]) -> MctpResult<Self> {
        let mut staging = ArrayVec::new();
        staging
            .try_extend_from_slice(payload)
            .map_err(|_| MctpError::StagingOverflow)?;
        Ok(Self {
            first_hdr: hdr,
            last_seq: hdr.pkt_seq(),
            staging,
        })
    }

    fn src_eid(&self) -> u8 {
        self.first_hdr.src_eid()
    }

    fn expected_seq(&self) -> u8 {
        let mut hdr = self.first_hdr;
        hdr.set_pkt_seq(self.last_seq);
        hdr.next_pkt_seq()
    }
}

/// A complete message handed out by [`MessageAssembler::receive`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssembledMessage {
    pub hdr: FrameHeader,
    pub len: usize,
}

/// Turns frames into complete messages, keeping one reassembly session per
/// source endpoint.
pub struct MessageAssembler {
    sessions: ArrayVec<ReassemblySession, MCTP_MAX_REASSEMBLY_SESSIONS>,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self {
            sessions: ArrayVec::new(),
        }
    }

    pub fn pending_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_pending(&self, src_eid: u8) -> bool {
        self.find(src_eid).is_some()
    }

    /// Drops every message in progress.
    pub fn reset(&mut self) {
        self.sessions.clear();
    }

    /// Accepts one validated frame.
    ///
    /// When the frame completes a message, the message (message-type byte first)
    /// is copied to the front of `msg_buf`. Any error drops the frame, and for
    /// sequence, tag or overflow errors also the whole message it belonged to.
    pub fn receive(
        &mut self,
        hdr: FrameHeader,
        payload: &[u8],
        msg_buf: &mut [u8],
    ) -> MctpResult<Option<AssembledMessage>> {
        let src_eid = hdr.src_eid();

        match (hdr.som() == 1, hdr.eom() == 1) {
            (true, true) => {
                copy_out(payload, msg_buf)?;
                Ok(Some(AssembledMessage {
                    hdr,
                    len: payload.len(),
                }))
            }
            (true, false) => {
                if let Some(idx) = self.find(src_eid) {
                    warn!("MCTP: restarting message from EID {:#04x}", src_eid);
                    self.sessions.remove(idx);
                }
                let session = ReassemblySession::start(hdr, payload)?;
                self.sessions
                    .try_push(session)
                    .map_err(|_| MctpError::SessionTableFull)?;
                debug!("MCTP: SOM from EID {:#04x} seq {}", src_eid, hdr.pkt_seq());
                Ok(None)
            }
            (false, eom) => {
                let idx = self.find(src_eid).ok_or(MctpError::NoSession(src_eid))?;
                if let Err(e) = self.append(idx, hdr, payload) {
                    self.sessions.remove(idx);
                    return Err(e);
                }
                if !eom {
                    return Ok(None);
                }

                let session = self.sessions.remove(idx);
                copy_out(&session.staging, msg_buf)?;
                Ok(Some(AssembledMessage {
                    hdr: session.first_hdr,
                    len: session.staging.len(),
                }))
            }
        }
    }

    fn find(&self, src_eid: u8) -> Option<usize> {
        self.sessions.iter().position(|s| s.src_eid() == src_eid)
    }

    fn append(&mut self, idx: usize, hdr: FrameHeader, payload: &[u8]) -> MctpResult<()> {
        let session = &mut self.sessions[idx];
        let expected = session.expected_seq();
        if hdr.pkt_seq() != expected {
            return Err(MctpError::SequenceMismatch {
                src_eid: session.src_eid(),
                expected,
                got: hdr.pkt_seq(),
            });
        }
        if hdr.msg_tag() != session.first_hdr.msg_tag() {
            return Err(MctpError::TagMismatch(session.src_eid()));
        }
        session
            .staging
            .try_extend_from_slice(payload)
            .map_err(|_| MctpError::StagingOverflow)?;
        session.last_seq = hdr.pkt_seq();
        Ok(())
    }
}

fn copy_out(msg: &[u8], msg_buf: &mut [u8]) -> MctpResult<()> {
    msg_buf
        .get_mut(..msg.len())
        .ok_or(MctpError::BufferTooSmall)?
        .copy_from_slice(msg);
    Ok(())
}
