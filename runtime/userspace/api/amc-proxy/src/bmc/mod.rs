// Licensed under the Apache-2.0 license

//! BMC proxy driver.
//!
//! Owns the out-of-band link to the BMC: it pulls frames off the FW_IF, runs
//! them through the MCTP/PLDM stack, writes the responses back and bridges
//! sensor requests to whichever firmware component subscribed to its events.

mod bridge;
mod task;

pub use bridge::{GetSensorResponse, SensorEnableResponse};

use crate::config::BMC_READ_TIMEOUT_MS;
use crate::evl::{EvlCallback, EvlError, EvlRecord, EvlSignal};
use crate::fw_if::{FwIf, FwIfError};
use crate::stats::{Counters, ModuleState};
use crate::timer::Timer;
use crate::{LOWER_FIREWALL, UPPER_FIREWALL};
use bridge::SensorBridge;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::{error, info, warn};
use mctp_lib::error::MctpError;
use mctp_lib::transport::UuidSource;
use pldm_common::protocol::platform::DEVICE_UID_LEN;
use pldm_lib::error::PdrRepoError;
use pldm_lib::pdr_repo::{PdrProfile, PdrRepository};
use strum::EnumCount;
use strum_macros::{EnumCount, EnumIter, IntoStaticStr};
use thiserror::Error;

const BMC_NAME: &str = "BMC";

/// Event ids raised through the BMC proxy's event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BmcEvent {
    MsgArrival = 0,
    GetPdr = 1,
    GetPdrRepositoryInfo = 2,
    GetSensorInfo = 3,
    EnableSensor = 4,
    InvalidRequestReceived = 5,
}

impl TryFrom<u8> for BmcEvent {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(BmcEvent::MsgArrival),
            1 => Ok(BmcEvent::GetPdr),
            2 => Ok(BmcEvent::GetPdrRepositoryInfo),
            3 => Ok(BmcEvent::GetSensorInfo),
            4 => Ok(BmcEvent::EnableSensor),
            5 => Ok(BmcEvent::InvalidRequestReceived),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, EnumIter, EnumCount, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BmcStat {
    InitOverallComplete,
    CreateMutex,
    CreateSemaphore,
    PendSemaphore,
    PostSemaphore,
    TakeMutex,
    ReleaseMutex,
    TaskTimeMs,
    StatusRetrieval,
    GetSensorIdRequest,
}

#[derive(Debug, Clone, Copy, EnumIter, EnumCount, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BmcErr {
    MutexReleaseFailed,
    MutexTakeFailed,
    CreateSemaphore,
    PendSemaphore,
    PostSemaphore,
    FwIfOpenFailed,
    FwIfReadFailed,
    MemAllocFailed,
    ValidationFailed,
    InitMutexCreateFailed,
    InitTaskCreateFailed,
    UnsupportedOpcodeRx,
    FwIfWriteFailed,
    BindCbFailed,
    InitEvlRecordFailed,
    RaiseEventFail,
    UnexpectedSensorId,
    UnexpectedFlag,
}

crate::counter_id!(BmcStat, BmcErr);

pub type BmcCounters = Counters<BmcStat, BmcErr, { BmcStat::COUNT }, { BmcErr::COUNT }>;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BmcProxyError {
    #[error("Driver context failed validation")]
    ValidationFailed,
    #[error("Driver not initialised")]
    NotInitialised,
    #[error("Driver already initialised")]
    AlreadyInitialised,
    #[error("FW_IF: {0}")]
    FwIf(FwIfError),
    #[error("PDR repository: {0:?}")]
    PdrRepo(PdrRepoError),
    #[error("Event: {0}")]
    Evl(EvlError),
    #[error("MCTP: {0}")]
    Mctp(MctpError),
    #[error("Received frame of {0} bytes is too long")]
    OversizedFrame(usize),
    #[error("Response for sensor {got}, awaiting sensor {expected}")]
    UnexpectedSensorId { expected: u16, got: u16 },
    #[error("No sensor request is awaiting this response")]
    UnexpectedResponse,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BmcProxyConfig {
    /// Module id placed in every raised signal.
    pub proxy_id: u8,
    pub uuid: [u8; DEVICE_UID_LEN],
    pub read_timeout_ms: u32,
}

impl BmcProxyConfig {
    pub fn new(proxy_id: u8, uuid: [u8; DEVICE_UID_LEN]) -> Self {
        Self {
            proxy_id,
            uuid,
            read_timeout_ms: BMC_READ_TIMEOUT_MS,
        }
    }
}

struct BmcInner {
    upper_firewall: u32,
    initialised: bool,
    config: BmcProxyConfig,
    state: ModuleState,
    instance: u8,
    counters: BmcCounters,
    bridge: SensorBridge,
    lower_firewall: u32,
}

impl BmcInner {
    fn firewall_intact(&self) -> bool {
        self.upper_firewall == UPPER_FIREWALL && self.lower_firewall == LOWER_FIREWALL
    }

    fn error_with_state(&mut self, error: BmcErr) {
        self.state = ModuleState::Error;
        self.counters.inc_error(error);
    }

    fn next_signal(&mut self, event: BmcEvent) -> EvlSignal {
        let signal = EvlSignal {
            module_id: self.config.proxy_id,
            event_id: event as u8,
            instance: self.instance,
            payload: 0,
        };
        self.instance = self.instance.wrapping_add(1);
        signal
    }
}

pub struct BmcProxy<'a> {
    fw_if: &'a dyn FwIf,
    timer: &'a dyn Timer,
    pdr_repo: &'a PdrRepository,
    evl: EvlRecord<'a>,
    inner: Mutex<NoopRawMutex, RefCell<BmcInner>>,
}

impl<'a> BmcProxy<'a> {
    pub fn new(
        config: BmcProxyConfig,
        fw_if: &'a dyn FwIf,
        timer: &'a dyn Timer,
        pdr_repo: &'a PdrRepository,
    ) -> Self {
        Self {
            fw_if,
            timer,
            pdr_repo,
            evl: EvlRecord::new(),
            inner: Mutex::new(RefCell::new(BmcInner {
                upper_firewall: UPPER_FIREWALL,
                initialised: false,
                config,
                state: ModuleState::Init,
                instance: 0,
                counters: BmcCounters::new(),
                bridge: SensorBridge::default(),
                lower_firewall: LOWER_FIREWALL,
            })),
        }
    }

    // Callers must not raise events or await while inside `f`.
    fn with_inner<R>(&self, f: impl FnOnce(&mut BmcInner) -> R) -> R {
        self.inner.lock(|inner| f(&mut inner.borrow_mut()))
    }

    fn validate(&self, need_init: bool) -> Result<(), BmcProxyError> {
        self.with_inner(|inner| {
            if !inner.firewall_intact() {
                inner.counters.inc_error(BmcErr::ValidationFailed);
                return Err(BmcProxyError::ValidationFailed);
            }
            if need_init && !inner.initialised {
                inner.counters.inc_error(BmcErr::ValidationFailed);
                return Err(BmcProxyError::NotInitialised);
            }
            Ok(())
        })
    }

    /// Builds the PDR repository from `profile`, with the configured UUID in
    /// the terminus locator, and opens the FW_IF. Can only succeed once.
    pub async fn initialise(&self, profile: &PdrProfile<'_>) -> Result<(), BmcProxyError> {
        self.validate(false)?;
        if self.with_inner(|inner| inner.initialised) {
            self.with_inner(|inner| inner.counters.inc_error(BmcErr::ValidationFailed));
            return Err(BmcProxyError::AlreadyInitialised);
        }

        if let Err(e) = self.pdr_repo.init(profile, self).await {
            error!("{}: PDR repository init failed: {:?}", BMC_NAME, e);
            self.with_inner(|inner| inner.error_with_state(BmcErr::MemAllocFailed));
            return Err(BmcProxyError::PdrRepo(e));
        }

        if let Err(e) = self.fw_if.open().await {
            error!("{}: error opening FW_IF: {}", BMC_NAME, e);
            self.with_inner(|inner| inner.error_with_state(BmcErr::FwIfOpenFailed));
            return Err(BmcProxyError::FwIf(e));
        }

        self.with_inner(|inner| {
            inner.initialised = true;
            inner.state = ModuleState::Ok;
            inner.counters.inc_stat(BmcStat::CreateMutex);
            inner.counters.inc_stat(BmcStat::CreateSemaphore);
            inner.counters.inc_stat(BmcStat::InitOverallComplete);
        });
        info!("{}: proxy initialised", BMC_NAME);
        Ok(())
    }

    pub fn bind_callback(&self, callback: &'a dyn EvlCallback) -> Result<(), BmcProxyError> {
        self.validate(true)?;
        self.evl.bind(callback).map_err(|e| {
            self.with_inner(|inner| inner.error_with_state(BmcErr::BindCbFailed));
            BmcProxyError::Evl(e)
        })
    }

    /// Raises `event` to every subscriber and returns the signal sent.
    pub(crate) fn raise_event(&self, event: BmcEvent) -> Result<EvlSignal, BmcProxyError> {
        let signal = self.with_inner(|inner| inner.next_signal(event));
        self.raise_signal(&signal)?;
        Ok(signal)
    }

    pub(crate) fn raise_signal(&self, signal: &EvlSignal) -> Result<(), BmcProxyError> {
        self.evl.raise(signal).map_err(|e| {
            error!(
                "{}: error attempting to raise event {:#x}: {}",
                BMC_NAME, signal.event_id, e
            );
            self.with_inner(|inner| inner.counters.inc_error(BmcErr::RaiseEventFail));
            BmcProxyError::Evl(e)
        })
    }

    pub fn get_uuid(&self) -> Result<[u8; DEVICE_UID_LEN], BmcProxyError> {
        self.validate(true)?;
        Ok(self.uuid())
    }

    pub fn print_statistics(&self) -> Result<(), BmcProxyError> {
        self.validate(false)?;
        self.with_inner(|inner| inner.counters.log(BMC_NAME));
        Ok(())
    }

    pub fn clear_statistics(&self) -> Result<(), BmcProxyError> {
        self.validate(true)?;
        self.with_inner(|inner| inner.counters.clear());
        Ok(())
    }

    pub fn get_state(&self) -> Result<ModuleState, BmcProxyError> {
        self.validate(false)?;
        Ok(self.with_inner(|inner| {
            inner.counters.inc_stat(BmcStat::TakeMutex);
            inner.counters.inc_stat(BmcStat::StatusRetrieval);
            inner.counters.inc_stat(BmcStat::ReleaseMutex);
            inner.state
        }))
    }

    pub fn stat(&self, stat: BmcStat) -> u32 {
        self.with_inner(|inner| inner.counters.stat(stat))
    }

    pub fn error_count(&self, error: BmcErr) -> u32 {
        self.with_inner(|inner| inner.counters.error(error))
    }

    #[cfg(test)]
    pub(crate) fn corrupt_firewall(&self) {
        self.with_inner(|inner| inner.lower_firewall = 0);
    }
}

/// The configured UUID backs both MCTP GetUUID and the terminus locator PDR.
impl UuidSource for BmcProxy<'_> {
    fn uuid(&self) -> [u8; DEVICE_UID_LEN] {
        self.with_inner(|inner| inner.config.uuid)
    }
}

/// Logs a warning for a response setter called with no request pending.
fn unexpected_response(what: &str, sensor_id: u16) -> BmcProxyError {
    warn!(
        "{}: {} for sensor {} with no request pending",
        BMC_NAME, what, sensor_id
    );
    BmcProxyError::UnexpectedResponse
}

#[cfg(test)]
pub(crate) mod test {
    extern crate alloc;

    use super::*;
    use alloc::boxed::Box;
    use async_trait::async_trait;
    use core::cell::Cell;
    use futures::executor::block_on;
    use pldm_common::protocol::platform::{NumericSensorPdr, PdrCommonHeader, PdrType};

    pub(crate) const TEST_UUID: [u8; DEVICE_UID_LEN] = [
        0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6, 0x07, 0x18, 0x29, 0x3A, 0x4B, 0x5C, 0x6D, 0x7E, 0x8F,
        0x90,
    ];

    #[derive(Default)]
    pub(crate) struct MockFwIf {
        pub rx: RefCell<Vec<Result<Vec<u8>, FwIfError>>>,
        pub written: RefCell<Vec<(u64, Vec<u8>)>>,
        pub fail_open: Cell<bool>,
        pub short_write_at: Cell<Option<usize>>,
    }

    #[async_trait(?Send)]
    impl FwIf for MockFwIf {
        async fn open(&self) -> Result<(), FwIfError> {
            if self.fail_open.get() {
                return Err(FwIfError::OpenFailed);
            }
            Ok(())
        }

        async fn read(&self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, FwIfError> {
            let mut rx = self.rx.borrow_mut();
            if rx.is_empty() {
                return Err(FwIfError::Timeout);
            }
            let data = rx.remove(0)?;
            buf[..data.len()].copy_from_slice(&data);
            Ok(data.len())
        }

        async fn write(&self, addr: u64, data: &[u8], _timeout_ms: u32) -> Result<usize, FwIfError> {
            let mut written = self.written.borrow_mut();
            if self.short_write_at.get() == Some(written.len()) {
                return Ok(data.len() / 2);
            }
            written.push((addr, data.to_vec()));
            Ok(data.len())
        }
    }

    #[derive(Default)]
    pub(crate) struct MockTimer {
        pub now: Cell<u64>,
        pub sleeps: RefCell<Vec<u32>>,
    }

    #[async_trait(?Send)]
    impl Timer for MockTimer {
        fn now_ms(&self) -> u64 {
            // Every query advances time so task durations are non-zero.
            let now = self.now.get();
            self.now.set(now + 1);
            now
        }

        async fn sleep_ms(&self, ms: u32) {
            self.sleeps.borrow_mut().push(ms);
            self.now.set(self.now.get() + ms as u64);
        }
    }

    pub(crate) fn numeric_sensor(sensor_id: u16) -> NumericSensorPdr {
        NumericSensorPdr {
            hdr: PdrCommonHeader::new(PdrType::NumericSensor),
            sensor_id,
            ..Default::default()
        }
    }

    pub(crate) struct Board {
        pub temperature: [NumericSensorPdr; 2],
        pub power: [NumericSensorPdr; 1],
    }

    impl Board {
        pub(crate) fn new() -> Self {
            Self {
                temperature: [numeric_sensor(1), numeric_sensor(2)],
                power: [numeric_sensor(30)],
            }
        }

        pub(crate) fn profile(&self) -> PdrProfile<'_> {
            PdrProfile {
                temperature: &self.temperature,
                voltage: &[],
                current: &[],
                power: &self.power,
                names: &[],
            }
        }
    }

    pub(crate) fn setup_logger() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    }

    #[test]
    fn test_initialise_once() {
        setup_logger();
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(1, TEST_UUID), &fw_if, &timer, &repo);

        assert_eq!(bmc.get_state(), Ok(ModuleState::Init));
        assert_eq!(bmc.get_uuid(), Err(BmcProxyError::NotInitialised));

        block_on(bmc.initialise(&board.profile())).unwrap();
        assert_eq!(bmc.get_state(), Ok(ModuleState::Ok));
        assert_eq!(bmc.get_uuid(), Ok(TEST_UUID));
        assert_eq!(bmc.stat(BmcStat::InitOverallComplete), 1);
        assert_eq!(bmc.stat(BmcStat::StatusRetrieval), 2);
        assert_eq!(block_on(repo.record_count()), 4);

        assert_eq!(
            block_on(bmc.initialise(&board.profile())),
            Err(BmcProxyError::AlreadyInitialised)
        );
        assert_eq!(bmc.error_count(BmcErr::ValidationFailed), 2);
    }

    #[test]
    fn test_open_failure_sets_error_state() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        fw_if.fail_open.set(true);
        let bmc = BmcProxy::new(BmcProxyConfig::new(1, TEST_UUID), &fw_if, &timer, &repo);

        assert_eq!(
            block_on(bmc.initialise(&board.profile())),
            Err(BmcProxyError::FwIf(FwIfError::OpenFailed))
        );
        assert_eq!(bmc.get_state(), Ok(ModuleState::Error));
        assert_eq!(bmc.error_count(BmcErr::FwIfOpenFailed), 1);
    }

    #[test]
    fn test_corrupted_firewall_rejects_every_call() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(1, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        bmc.corrupt_firewall();

        assert_eq!(bmc.get_state(), Err(BmcProxyError::ValidationFailed));
        assert_eq!(bmc.get_uuid(), Err(BmcProxyError::ValidationFailed));
        assert_eq!(bmc.print_statistics(), Err(BmcProxyError::ValidationFailed));
        assert_eq!(bmc.error_count(BmcErr::ValidationFailed), 3);
    }

    #[test]
    fn test_clear_statistics() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(1, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        bmc.get_state().unwrap();
        bmc.print_statistics().unwrap();
        bmc.clear_statistics().unwrap();
        assert_eq!(bmc.stat(BmcStat::StatusRetrieval), 0);
        assert_eq!(bmc.stat(BmcStat::InitOverallComplete), 0);
    }

    #[test]
    fn test_event_ids() {
        assert_eq!(BmcEvent::try_from(3), Ok(BmcEvent::GetSensorInfo));
        assert_eq!(BmcEvent::EnableSensor as u8, 4);
        assert!(BmcEvent::try_from(6).is_err());
    }
}
