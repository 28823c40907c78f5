// Licensed under the Apache-2.0 license

extern crate alloc;

use super::{BmcErr, BmcEvent, BmcProxy, BmcProxyError, BmcStat, BMC_NAME};
use crate::config::{BMC_RX_BUF_SIZE, BMC_TASK_PERIOD_MS, BMC_WRITE_TIMEOUT_MS};
use crate::fw_if::FwIfError;
use crate::timer::elapsed_ms;
use alloc::boxed::Box;
use arrayvec::ArrayVec;
use async_trait::async_trait;
use log::{debug, error, warn};
use mctp_common::base_protocol::{MctpFrameHeader, MCTP_BYTE_COUNT_EXCLUDED, MCTP_FRAME_HDR_LEN};
use mctp_lib::cmd_interface::CmdInterface;
use mctp_lib::error::MctpError;
use mctp_lib::transport::FrameSink;
use pldm_common::codec::PldmCodec;
use pldm_common::protocol::base::{PldmMsgHeader, PldmSupportedType, PLDM_MSG_HEADER_LEN};
use pldm_common::protocol::platform::PlatformCmd;
use pldm_common::util::mctp_transport::MCTP_PLDM_MSG_TYPE;

/// Slave address and byte count, which the FW_IF strips from received frames.
const RX_FRAME_PREFIX_LEN: usize = MCTP_BYTE_COUNT_EXCLUDED;

/// PDR event worth telling subscribers about for a single-packet PLDM request.
fn pdr_event(frame: &[u8]) -> Option<BmcEvent> {
    let hdr = MctpFrameHeader::from_frame(frame)?;
    if hdr.som() != 1 || frame.get(MCTP_FRAME_HDR_LEN) != Some(&MCTP_PLDM_MSG_TYPE) {
        return None;
    }
    let pldm_hdr =
        PldmMsgHeader::<[u8; PLDM_MSG_HEADER_LEN]>::decode(frame.get(MCTP_FRAME_HDR_LEN + 1..)?)
            .ok()?;
    if pldm_hdr.pldm_type() != PldmSupportedType::Platform as u8 {
        return None;
    }
    match PlatformCmd::try_from(pldm_hdr.cmd_code()) {
        Ok(PlatformCmd::GetPdr) => Some(BmcEvent::GetPdr),
        Ok(PlatformCmd::GetPdrRepositoryInfo) => Some(BmcEvent::GetPdrRepositoryInfo),
        _ => None,
    }
}

impl BmcProxy<'_> {
    /// Receive task. Polls the FW_IF forever, one pass every task period.
    pub async fn run(&self, mctp: &CmdInterface<'_>) {
        loop {
            if let Err(e) = self.run_once(mctp).await {
                debug!("{}: {}", BMC_NAME, e);
            }
            self.timer.sleep_ms(BMC_TASK_PERIOD_MS).await;
        }
    }

    /// One pass of the receive task: read at most one frame and process it.
    ///
    /// Returns the number of response frames written.
    pub async fn run_once(&self, mctp: &CmdInterface<'_>) -> Result<usize, BmcProxyError> {
        self.validate(true)?;
        let start_ms = self.timer.now_ms();
        let timeout_ms = self.with_inner(|inner| inner.config.read_timeout_ms);

        let mut rx = [0u8; BMC_RX_BUF_SIZE];
        let result = match self.fw_if.read(&mut rx, timeout_ms).await {
            Ok(0) | Err(FwIfError::Timeout) => Ok(0),
            Ok(len) => match rx.get(..len) {
                Some(data) => self.process_rx(mctp, data).await,
                None => Err(BmcProxyError::OversizedFrame(len)),
            },
            Err(e) => {
                self.with_inner(|inner| inner.error_with_state(BmcErr::FwIfReadFailed));
                Err(BmcProxyError::FwIf(e))
            }
        };

        let task_ms = elapsed_ms(self.timer, start_ms);
        self.with_inner(|inner| inner.counters.add_stat(BmcStat::TaskTimeMs, task_ms));
        result
    }

    /// Processes `data` as if it had just been read from the FW_IF.
    pub async fn emulate_received_message(
        &self,
        mctp: &CmdInterface<'_>,
        data: &[u8],
    ) -> Result<usize, BmcProxyError> {
        self.validate(true)?;
        self.process_rx(mctp, data).await
    }

    async fn process_rx(&self, mctp: &CmdInterface<'_>, data: &[u8]) -> Result<usize, BmcProxyError> {
        let request_ms = self.timer.now_ms();

        self.with_inner(|inner| {
            inner.counters.inc_stat(BmcStat::TakeMutex);
            inner.bridge.reset();
            inner.counters.inc_stat(BmcStat::ReleaseMutex);
        });
        self.raise_event(BmcEvent::MsgArrival)?;

        if data.is_empty() {
            return Ok(0);
        }
        let byte_count =
            u8::try_from(data.len()).map_err(|_| BmcProxyError::OversizedFrame(data.len()))?;

        let mut frame = ArrayVec::<u8, { BMC_RX_BUF_SIZE + RX_FRAME_PREFIX_LEN }>::new();
        frame.push(0);
        frame.push(byte_count);
        frame
            .try_extend_from_slice(data)
            .map_err(|_| BmcProxyError::OversizedFrame(data.len()))?;

        match mctp.process_packet(&frame).await {
            Ok(sent) => {
                debug!(
                    "{}: message processing took {} ms",
                    BMC_NAME,
                    elapsed_ms(self.timer, request_ms)
                );
                if sent > 0 {
                    if let Some(event) = pdr_event(&frame) {
                        // Counted by raise_event; the response is already out.
                        let _ = self.raise_event(event);
                    }
                }
                Ok(sent)
            }
            Err(e) => {
                warn!("{}: request not processed: {}", BMC_NAME, e);
                let _ = self.raise_event(BmcEvent::InvalidRequestReceived);
                Err(BmcProxyError::Mctp(e))
            }
        }
    }
}

#[async_trait(?Send)]
impl FrameSink for BmcProxy<'_> {
    async fn send_frame(&self, frame: &[u8]) -> Result<(), MctpError> {
        let (addr, body) = match frame {
            [addr, _byte_count, body @ ..] => (*addr, body),
            _ => return Err(MctpError::BufferTooSmall),
        };

        let written = self
            .fw_if
            .write(addr as u64, body, BMC_WRITE_TIMEOUT_MS)
            .await;
        debug!(
            "{}: payload size {} destination {:#04x}: {:02x?}",
            BMC_NAME,
            body.len(),
            addr,
            body
        );
        match written {
            Ok(n) if n == body.len() => Ok(()),
            other => {
                error!("{}: FW_IF write failed: {:?}", BMC_NAME, other);
                self.with_inner(|inner| inner.counters.inc_error(BmcErr::FwIfWriteFailed));
                Err(MctpError::SendFailed)
            }
        }
    }

    async fn delay_ms(&self, ms: u32) {
        self.timer.sleep_ms(ms).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bmc::test::{setup_logger, Board, MockFwIf, MockTimer, TEST_UUID};
    use crate::bmc::BmcProxyConfig;
    use crate::evl::{EvlCallback, EvlError, EvlSignal};
    use crate::stats::ModuleState;
    use core::cell::RefCell;
    use futures::executor::block_on;
    use mctp_lib::control_context::MctpControlContext;
    use pldm_lib::cmd_interface::CmdInterface as PldmCmdInterface;
    use pldm_lib::config::PLDM_PROTOCOL_CAPABILITIES;
    use pldm_lib::pdr_repo::PdrRepository;

    const LOCAL_EID: u8 = 0x08;
    const BMC_EID: u8 = 0x0A;

    #[derive(Default)]
    struct EventLog {
        events: RefCell<Vec<u8>>,
    }

    impl EvlCallback for EventLog {
        fn on_event(&self, signal: &EvlSignal) -> Result<(), EvlError> {
            self.events.borrow_mut().push(signal.event_id);
            Ok(())
        }
    }

    /// Frame body as the FW_IF hands it over: from the source slave address on.
    fn rx_body(dest_eid: u8, flags: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0x21, 0x01, dest_eid, BMC_EID, flags];
        body.extend_from_slice(payload);
        body
    }

    fn set_eid_body() -> Vec<u8> {
        rx_body(0x00, 0xC8, &[0x00, 0x81, 0x01, 0x00, LOCAL_EID])
    }

    #[test]
    fn test_received_frame_is_answered_over_fw_if() {
        setup_logger();
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(2, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        let log = EventLog::default();
        bmc.bind_callback(&log).unwrap();
        let pldm = PldmCmdInterface::new(PLDM_PROTOCOL_CAPABILITIES.get(), &repo, &bmc);
        let mctp = CmdInterface::new(MctpControlContext::new(&bmc), &pldm, &bmc);

        fw_if.rx.borrow_mut().push(Ok(set_eid_body()));
        assert_eq!(block_on(bmc.run_once(&mctp)), Ok(1));
        assert_eq!(mctp.control_context().local_eid(), LOCAL_EID);

        let written = fw_if.written.borrow();
        assert_eq!(written.len(), 1);
        // Written to the requester's slave address without the address and
        // byte count.
        assert_eq!(written[0].0, 0x10);
        assert_eq!(
            written[0].1,
            [0x31, 0x01, BMC_EID, 0x00, 0xC0, 0x00, 0x01, 0x01, 0x00, 0x00, LOCAL_EID, 0x00]
        );
        assert_eq!(*log.events.borrow(), [BmcEvent::MsgArrival as u8]);
        assert!(bmc.stat(BmcStat::TaskTimeMs) > 0);
    }

    #[test]
    fn test_idle_poll_and_read_failure() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(2, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        let pldm = PldmCmdInterface::new(PLDM_PROTOCOL_CAPABILITIES.get(), &repo, &bmc);
        let mctp = CmdInterface::new(MctpControlContext::new(&bmc), &pldm, &bmc);

        assert_eq!(block_on(bmc.run_once(&mctp)), Ok(0));
        assert_eq!(bmc.get_state(), Ok(ModuleState::Ok));

        fw_if.rx.borrow_mut().push(Err(FwIfError::ReadFailed));
        assert_eq!(
            block_on(bmc.run_once(&mctp)),
            Err(BmcProxyError::FwIf(FwIfError::ReadFailed))
        );
        assert_eq!(bmc.error_count(BmcErr::FwIfReadFailed), 1);
        assert_eq!(bmc.get_state(), Ok(ModuleState::Error));
    }

    #[test]
    fn test_rejected_frame_raises_invalid_request() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(2, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        let log = EventLog::default();
        bmc.bind_callback(&log).unwrap();
        let pldm = PldmCmdInterface::new(PLDM_PROTOCOL_CAPABILITIES.get(), &repo, &bmc);
        let mctp = CmdInterface::new(MctpControlContext::new(&bmc), &pldm, &bmc);

        let result = block_on(bmc.emulate_received_message(&mctp, &rx_body(0x33, 0xC8, &[0x00])));
        assert_eq!(
            result,
            Err(BmcProxyError::Mctp(MctpError::EidMismatch(0x33)))
        );
        assert_eq!(
            *log.events.borrow(),
            [
                BmcEvent::MsgArrival as u8,
                BmcEvent::InvalidRequestReceived as u8
            ]
        );
        assert!(fw_if.written.borrow().is_empty());
    }

    #[test]
    fn test_short_write_counts_and_fails() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(2, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        fw_if.short_write_at.set(Some(0));

        let frame = [0x10, 0x05, 0x31, 0x01, 0x0A, 0x08, 0xC0];
        assert_eq!(block_on(bmc.send_frame(&frame)), Err(MctpError::SendFailed));
        assert_eq!(bmc.error_count(BmcErr::FwIfWriteFailed), 1);
        assert_eq!(block_on(bmc.send_frame(&[0x10])), Err(MctpError::BufferTooSmall));
    }

    #[test]
    fn test_pdr_event_detection() {
        let mut frame = vec![0x00, 0x00];
        frame.extend(rx_body(LOCAL_EID, 0xC8, &[0x01, 0x80, 0x02, 0x51]));
        assert_eq!(pdr_event(&frame), Some(BmcEvent::GetPdr));

        frame[10] = 0x50;
        assert_eq!(pdr_event(&frame), Some(BmcEvent::GetPdrRepositoryInfo));

        frame[10] = 0x11;
        assert_eq!(pdr_event(&frame), None);

        // Middle fragments carry no PLDM header.
        frame[6] = 0x48;
        frame[10] = 0x51;
        assert_eq!(pdr_event(&frame), None);
    }
}
