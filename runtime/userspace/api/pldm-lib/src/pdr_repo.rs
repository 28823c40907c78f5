// Licensed under the Apache-2.0 license

use crate::config::PDR_TRANSFER_SLOTS;
use crate::control_context::Tid;
use crate::error::PdrRepoError;
use arrayvec::ArrayVec;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use log::{debug, error, info};
use mctp_lib::transport::UuidSource;
use pldm_common::message::platform::PdrRepositoryInfo;
use pldm_common::protocol::platform::{
    NumericSensorPdr, PdrCommonHeader, PdrRepositoryState, SensorNamePdr, TerminusLocatorPdr,
    Timestamp104, PDR_COMMON_HEADER_LEN,
};
use zerocopy::IntoBytes;

/// Board description the repository is built from. The numeric sensor tables
/// are inserted in field order after the terminus locator, followed by names.
#[derive(Debug, Clone, Copy)]
pub struct PdrProfile<'a> {
    pub temperature: &'a [NumericSensorPdr],
    pub voltage: &'a [NumericSensorPdr],
    pub current: &'a [NumericSensorPdr],
    pub power: &'a [NumericSensorPdr],
    pub names: &'a [SensorNamePdr],
}

impl PdrProfile<'_> {
    pub fn record_count(&self) -> usize {
        1 + self.temperature.len()
            + self.voltage.len()
            + self.current.len()
            + self.power.len()
            + self.names.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PdrRecord {
    TerminusLocator(TerminusLocatorPdr),
    NumericSensor(NumericSensorPdr),
    SensorName(SensorNamePdr),
}

impl PdrRecord {
    /// The record as transmitted. Name records stop after the name's
    /// terminating zero unit.
    pub fn wire_bytes(&self) -> &[u8] {
        match self {
            PdrRecord::TerminusLocator(pdr) => pdr.as_bytes(),
            PdrRecord::NumericSensor(pdr) => pdr.as_bytes(),
            PdrRecord::SensorName(pdr) => {
                let bytes = pdr.as_bytes();
                &bytes[..bytes.len() - pdr.unused_name_bytes()]
            }
        }
    }

    pub fn header(&self) -> PdrCommonHeader {
        match self {
            PdrRecord::TerminusLocator(pdr) => pdr.hdr,
            PdrRecord::NumericSensor(pdr) => pdr.hdr,
            PdrRecord::SensorName(pdr) => pdr.hdr,
        }
    }

    pub fn change_number(&self) -> u16 {
        self.header().record_change_num
    }

    fn header_mut(&mut self) -> &mut PdrCommonHeader {
        match self {
            PdrRecord::TerminusLocator(pdr) => &mut pdr.hdr,
            PdrRecord::NumericSensor(pdr) => &mut pdr.hdr,
            PdrRecord::SensorName(pdr) => &mut pdr.hdr,
        }
    }

    fn numeric_sensor_id(&self) -> Option<u16> {
        match self {
            PdrRecord::NumericSensor(pdr) => Some(pdr.sensor_id),
            _ => None,
        }
    }
}

pub struct PdrRepository {
    inner: Mutex<NoopRawMutex, PdrRepoInner>,
}

struct PdrRepoInner {
    initialized: bool,
    state: PdrRepositoryState,
    update_time: Timestamp104,
    oem_update_time: Timestamp104,
    repository_size: u32,
    largest_record_size: u32,
    records: ArrayVec<PdrRecord, PDR_TRANSFER_SLOTS>,
}

impl Default for PdrRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PdrRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PdrRepoInner {
                initialized: false,
                state: PdrRepositoryState::Failed,
                update_time: Timestamp104::default(),
                oem_update_time: Timestamp104::default(),
                repository_size: 0,
                largest_record_size: 0,
                records: ArrayVec::new(),
            }),
        }
    }

    /// Populates the repository from `profile`. The terminus locator carries
    /// the UUID of `uuid_source`. Only the first successful call has any effect.
    pub async fn init(
        &self,
        profile: &PdrProfile<'_>,
        uuid_source: &dyn UuidSource,
    ) -> Result<(), PdrRepoError> {
        let mut inner = self.inner.lock().await;
        if inner.initialized {
            debug!("PDR: repository already initialised");
            return Ok(());
        }

        let count = profile.record_count();
        if count > PDR_TRANSFER_SLOTS {
            error!(
                "PDR: {} records exceed the {} transfer slots",
                count, PDR_TRANSFER_SLOTS
            );
            return Err(PdrRepoError::CapacityExceeded);
        }

        inner.records.clear();
        inner.push(PdrRecord::TerminusLocator(TerminusLocatorPdr::new(
            uuid_source.uuid(),
        )))?;
        for pdr in profile
            .temperature
            .iter()
            .chain(profile.voltage)
            .chain(profile.current)
            .chain(profile.power)
        {
            inner.push(PdrRecord::NumericSensor(*pdr))?;
        }
        for pdr in profile.names {
            inner.push(PdrRecord::SensorName(*pdr))?;
        }

        inner.update_time = Timestamp104::repository_default();
        inner.oem_update_time = Timestamp104::repository_default();
        inner.state = PdrRepositoryState::Available;
        inner.initialized = true;
        info!(
            "PDR: {} records, {} bytes, largest {}",
            inner.records.len(),
            inner.repository_size,
            inner.largest_record_size
        );
        Ok(())
    }

    pub async fn info(&self) -> PdrRepositoryInfo {
        let inner = self.inner.lock().await;
        PdrRepositoryInfo {
            state: inner.state,
            update_time: inner.update_time,
            oem_update_time: inner.oem_update_time,
            record_count: inner.records.len() as u32,
            repository_size: inner.repository_size,
            largest_record_size: inner.largest_record_size,
            data_transfer_handle_timeout: 0,
        }
    }

    pub async fn state(&self) -> PdrRepositoryState {
        self.inner.lock().await.state
    }

    pub async fn record_count(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Runs `f` on the record stored under `handle`.
    pub async fn with_record<R>(
        &self,
        handle: u32,
        f: impl FnOnce(&PdrRecord) -> R,
    ) -> Result<R, PdrRepoError> {
        let inner = self.inner.lock().await;
        let record = inner
            .records
            .get(handle as usize)
            .ok_or(PdrRepoError::InvalidRecordHandle)?;
        Ok(f(record))
    }

    /// Whether a numeric sensor PDR with this id exists.
    pub async fn sensor_exists(&self, sensor_id: u16) -> bool {
        let inner = self.inner.lock().await;
        inner
            .records
            .iter()
            .any(|r| r.numeric_sensor_id() == Some(sensor_id))
    }

    pub async fn begin_update(&self) {
        self.inner.lock().await.state = PdrRepositoryState::UpdateInProgress;
    }

    pub async fn end_update(&self) {
        let mut inner = self.inner.lock().await;
        inner.update_time = Timestamp104::repository_default();
        inner.state = PdrRepositoryState::Available;
    }

    /// Writes a new TID into the terminus locator record and bumps its change
    /// number.
    pub async fn update_tid(&self, tid: Tid) -> Result<(), PdrRepoError> {
        {
            let inner = self.inner.lock().await;
            if !inner.initialized {
                return Err(PdrRepoError::NotInitialized);
            }
        }

        self.begin_update().await;
        let result = {
            let mut inner = self.inner.lock().await;
            match inner.records.first_mut() {
                Some(PdrRecord::TerminusLocator(pdr)) => {
                    pdr.tid = tid;
                    pdr.hdr.record_change_num = pdr.hdr.record_change_num.wrapping_add(1);
                    let change_num = pdr.hdr.record_change_num;
                    debug!("PDR: TID {} stored, change number {}", tid, change_num);
                    Ok(())
                }
                _ => Err(PdrRepoError::MissingTerminusLocator),
            }
        };
        self.end_update().await;
        result
    }
}

impl PdrRepoInner {
    fn push(&mut self, mut record: PdrRecord) -> Result<(), PdrRepoError> {
        let handle = self.records.len() as u32;
        let size = record.wire_bytes().len();
        let hdr = record.header_mut();
        hdr.record_handle = handle;
        hdr.data_length = (size - PDR_COMMON_HEADER_LEN) as u16;

        self.records
            .try_push(record)
            .map_err(|_| PdrRepoError::CapacityExceeded)?;
        self.repository_size += size as u32;
        self.largest_record_size = self.largest_record_size.max(size as u32);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use futures::executor::block_on;
    use pldm_common::protocol::platform::{PdrType, DEVICE_UID_LEN};

    pub(crate) const TEST_UID: [u8; DEVICE_UID_LEN] = [
        0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x0F, 0xED, 0xCB, 0xA9, 0x87, 0x65, 0x43,
        0x21,
    ];

    pub(crate) fn numeric_sensor(sensor_id: u16) -> NumericSensorPdr {
        NumericSensorPdr {
            hdr: PdrCommonHeader::new(PdrType::NumericSensor),
            sensor_id,
            ..Default::default()
        }
    }

    pub(crate) struct TestProfile {
        pub temperature: [NumericSensorPdr; 2],
        pub voltage: [NumericSensorPdr; 1],
        pub power: [NumericSensorPdr; 1],
        pub names: [SensorNamePdr; 2],
    }

    impl TestProfile {
        pub(crate) fn new() -> Self {
            Self {
                temperature: [numeric_sensor(1), numeric_sensor(2)],
                voltage: [numeric_sensor(10)],
                power: [numeric_sensor(30)],
                names: [
                    SensorNamePdr::new(1, "FPGA Temp"),
                    SensorNamePdr::new(10, "12V PEX"),
                ],
            }
        }

        pub(crate) fn profile(&self) -> PdrProfile<'_> {
            PdrProfile {
                temperature: &self.temperature,
                voltage: &self.voltage,
                current: &[],
                power: &self.power,
                names: &self.names,
            }
        }
    }

    #[test]
    fn test_init_assigns_handles_and_lengths() {
        let data = TestProfile::new();
        let repo = PdrRepository::new();
        assert_eq!(block_on(repo.state()), PdrRepositoryState::Failed);
        block_on(repo.init(&data.profile(), &TEST_UID)).unwrap();

        let info = block_on(repo.info());
        assert_eq!(info.state, PdrRepositoryState::Available);
        assert_eq!(info.record_count, 7);
        let name_len = |n: &SensorNamePdr| 86 - n.unused_name_bytes();
        let expected_size = 35 + 4 * 81 + name_len(&data.names[0]) + name_len(&data.names[1]);
        assert_eq!(info.repository_size as usize, expected_size);
        assert_eq!(info.largest_record_size, 81);
        assert_eq!(info.update_time, Timestamp104::repository_default());

        for handle in 0..7u32 {
            let (hdr, len) = block_on(repo.with_record(handle, |r| (r.header(), r.wire_bytes().len())))
                .unwrap();
            let record_handle = hdr.record_handle;
            let data_length = hdr.data_length;
            assert_eq!(record_handle, handle);
            assert_eq!(data_length as usize, len - PDR_COMMON_HEADER_LEN);
        }

        let sensor_id = block_on(repo.with_record(4, |r| r.numeric_sensor_id())).unwrap();
        assert_eq!(sensor_id, Some(30));
        assert_eq!(
            block_on(repo.with_record(7, |_| ())),
            Err(PdrRepoError::InvalidRecordHandle)
        );
    }

    #[test]
    fn test_init_is_one_shot() {
        let data = TestProfile::new();
        let repo = PdrRepository::new();
        block_on(repo.init(&data.profile(), &TEST_UID)).unwrap();

        let mut smaller = data.profile();
        smaller.names = &[];
        block_on(repo.init(&smaller, &TEST_UID)).unwrap();
        assert_eq!(block_on(repo.record_count()), 7);
    }

    #[test]
    fn test_init_rejects_too_many_records() {
        let sensors = [numeric_sensor(5); PDR_TRANSFER_SLOTS];
        let profile = PdrProfile {
            temperature: &sensors,
            voltage: &[],
            current: &[],
            power: &[],
            names: &[],
        };
        let repo = PdrRepository::new();
        assert_eq!(
            block_on(repo.init(&profile, &TEST_UID)),
            Err(PdrRepoError::CapacityExceeded)
        );
        assert_eq!(block_on(repo.state()), PdrRepositoryState::Failed);
        assert_eq!(block_on(repo.record_count()), 0);
    }

    #[test]
    fn test_push_past_capacity_fails() {
        let repo = PdrRepository::new();
        let mut inner = block_on(repo.inner.lock());
        for id in 0..PDR_TRANSFER_SLOTS as u16 {
            inner.push(PdrRecord::NumericSensor(numeric_sensor(id))).unwrap();
        }
        let size = inner.repository_size;
        assert_eq!(
            inner.push(PdrRecord::NumericSensor(numeric_sensor(0))),
            Err(PdrRepoError::CapacityExceeded)
        );
        assert_eq!(inner.repository_size, size);
        assert_eq!(inner.records.len(), PDR_TRANSFER_SLOTS);
    }

    #[test]
    fn test_sensor_lookup() {
        let data = TestProfile::new();
        let repo = PdrRepository::new();
        block_on(repo.init(&data.profile(), &TEST_UID)).unwrap();
        assert!(block_on(repo.sensor_exists(2)));
        assert!(block_on(repo.sensor_exists(30)));
        assert!(!block_on(repo.sensor_exists(20)));
    }

    #[test]
    fn test_update_tid_bumps_change_number() {
        let data = TestProfile::new();
        let repo = PdrRepository::new();
        assert_eq!(
            block_on(repo.update_tid(5)),
            Err(PdrRepoError::NotInitialized)
        );
        block_on(repo.init(&data.profile(), &TEST_UID)).unwrap();

        block_on(repo.update_tid(5)).unwrap();
        block_on(repo.update_tid(6)).unwrap();
        let (tid, change) = block_on(repo.with_record(0, |r| match r {
            PdrRecord::TerminusLocator(pdr) => (pdr.tid, r.change_number()),
            _ => (0, 0),
        }))
        .unwrap();
        assert_eq!(tid, 6);
        assert_eq!(change, 2);
        assert_eq!(block_on(repo.state()), PdrRepositoryState::Available);
    }
}
