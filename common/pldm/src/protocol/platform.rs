// Licensed under the Apache-2.0 license

use crate::error::PldmError;
use core::convert::TryFrom;
use zerocopy::{FromBytes, Immutable, IntoBytes};

pub const PDR_HEADER_VERSION: u8 = 0x01;
pub const PDR_COMMON_HEADER_LEN: usize = core::mem::size_of::<PdrCommonHeader>();
pub const PDR_MAX_NAME_UNITS: usize = 32;
pub const PDR_SENSOR_NAME_LEN: usize = PDR_MAX_NAME_UNITS * 2;
pub const PDR_LANGUAGE_TAG_LEN: usize = 6;
pub const DEVICE_UID_LEN: usize = 16;
pub const TIMESTAMP104_LEN: usize = 13;

pub const PLDM_TERMINUS_HANDLE: u16 = 0x0000;
pub const PLDM_CONTAINER_ID: u16 = 0x7F7F;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum PlatformCmd {
    SetNumericSensorEnable = 0x10,
    GetSensorReading = 0x11,
    GetPdrRepositoryInfo = 0x50,
    GetPdr = 0x51,
}

impl TryFrom<u8> for PlatformCmd {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0x10 => Ok(PlatformCmd::SetNumericSensorEnable),
            0x11 => Ok(PlatformCmd::GetSensorReading),
            0x50 => Ok(PlatformCmd::GetPdrRepositoryInfo),
            0x51 => Ok(PlatformCmd::GetPdr),
            _ => Err(PldmError::UnsupportedCmd),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum PdrType {
    TerminusLocator = 0x01,
    NumericSensor = 0x02,
    SensorAuxiliaryNames = 0x06,
}

impl TryFrom<u8> for PdrType {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0x01 => Ok(PdrType::TerminusLocator),
            0x02 => Ok(PdrType::NumericSensor),
            0x06 => Ok(PdrType::SensorAuxiliaryNames),
            _ => Err(PldmError::InvalidPdrType),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum PdrRepositoryState {
    Available = 0,
    UpdateInProgress = 1,
    Failed = 2,
}

impl TryFrom<u8> for PdrRepositoryState {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0 => Ok(PdrRepositoryState::Available),
            1 => Ok(PdrRepositoryState::UpdateInProgress),
            2 => Ok(PdrRepositoryState::Failed),
            _ => Err(PldmError::InvalidRepositoryState),
        }
    }
}

/// Transfer flag used by GetPDR responses. Differs from the GetPLDMVersion
/// encoding for Start and Middle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum PdrTransferFlag {
    Start = 0x00,
    Middle = 0x01,
    End = 0x04,
    StartAndEnd = 0x05,
}

impl TryFrom<u8> for PdrTransferFlag {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0x00 => Ok(PdrTransferFlag::Start),
            0x01 => Ok(PdrTransferFlag::Middle),
            0x04 => Ok(PdrTransferFlag::End),
            0x05 => Ok(PdrTransferFlag::StartAndEnd),
            _ => Err(PldmError::InvalidTransferRespFlag),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum SensorOperationalState {
    Enabled = 0,
    Disabled = 1,
    Unavailable = 2,
    StatusUnknown = 3,
    Failed = 4,
    Initializing = 5,
    ShuttingDown = 6,
    InTest = 7,
}

impl TryFrom<u8> for SensorOperationalState {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0 => Ok(SensorOperationalState::Enabled),
            1 => Ok(SensorOperationalState::Disabled),
            2 => Ok(SensorOperationalState::Unavailable),
            3 => Ok(SensorOperationalState::StatusUnknown),
            4 => Ok(SensorOperationalState::Failed),
            5 => Ok(SensorOperationalState::Initializing),
            6 => Ok(SensorOperationalState::ShuttingDown),
            7 => Ok(SensorOperationalState::InTest),
            _ => Err(PldmError::InvalidSensorOperationalState),
        }
    }
}

impl SensorOperationalState {
    /// States a requester may set through SetNumericSensorEnable.
    pub fn is_settable(&self) -> bool {
        matches!(
            self,
            SensorOperationalState::Enabled
                | SensorOperationalState::Disabled
                | SensorOperationalState::Unavailable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum EventMessageEnable {
    NoEventGeneration = 0,
    EventsDisabled = 1,
    EventsEnabled = 2,
    OpEventsOnlyEnabled = 3,
    StateEventsOnlyEnabled = 4,
}

impl TryFrom<u8> for EventMessageEnable {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0 => Ok(EventMessageEnable::NoEventGeneration),
            1 => Ok(EventMessageEnable::EventsDisabled),
            2 => Ok(EventMessageEnable::EventsEnabled),
            3 => Ok(EventMessageEnable::OpEventsOnlyEnabled),
            4 => Ok(EventMessageEnable::StateEventsOnlyEnabled),
            _ => Err(PldmError::InvalidEventMessageEnable),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum SensorState {
    Unknown = 0,
    Normal = 1,
    Warning = 2,
    Critical = 3,
    Fatal = 4,
    LowerWarning = 5,
    LowerCritical = 6,
    LowerFatal = 7,
    UpperWarning = 8,
    UpperCritical = 9,
    UpperFatal = 10,
}

impl TryFrom<u8> for SensorState {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0 => Ok(SensorState::Unknown),
            1 => Ok(SensorState::Normal),
            2 => Ok(SensorState::Warning),
            3 => Ok(SensorState::Critical),
            4 => Ok(SensorState::Fatal),
            5 => Ok(SensorState::LowerWarning),
            6 => Ok(SensorState::LowerCritical),
            7 => Ok(SensorState::LowerFatal),
            8 => Ok(SensorState::UpperWarning),
            9 => Ok(SensorState::UpperCritical),
            10 => Ok(SensorState::UpperFatal),
            _ => Err(PldmError::InvalidSensorState),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum SensorDataSize {
    Uint8 = 0,
    Sint8 = 1,
    Uint16 = 2,
    Sint16 = 3,
    Uint32 = 4,
    Sint32 = 5,
}

impl TryFrom<u8> for SensorDataSize {
    type Error = PldmError;

    fn try_from(value: u8) -> Result<Self, PldmError> {
        match value {
            0 => Ok(SensorDataSize::Uint8),
            1 => Ok(SensorDataSize::Sint8),
            2 => Ok(SensorDataSize::Uint16),
            3 => Ok(SensorDataSize::Sint16),
            4 => Ok(SensorDataSize::Uint32),
            5 => Ok(SensorDataSize::Sint32),
            _ => Err(PldmError::InvalidSensorDataSize),
        }
    }
}

/// DSP0248 timestamp104.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct Timestamp104 {
    pub utc_offset: i16,
    pub microseconds: [u8; 3],
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day: u8,
    pub month: u8,
    pub year: u16,
    pub utc_and_time_resolution: u8,
}

impl Timestamp104 {
    /// The fixed wall-clock value stamped on every repository update. The
    /// controller has no real-time clock.
    pub fn repository_default() -> Self {
        Timestamp104 {
            seconds: 15,
            minutes: 30,
            hours: 8,
            utc_and_time_resolution: 0x0F,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct PdrCommonHeader {
    pub record_handle: u32,
    pub version: u8,
    pub pdr_type: u8,
    pub record_change_num: u16,
    pub data_length: u16,
}

impl PdrCommonHeader {
    pub fn new(pdr_type: PdrType) -> Self {
        PdrCommonHeader {
            record_handle: 0,
            version: PDR_HEADER_VERSION,
            pdr_type: pdr_type as u8,
            record_change_num: 0,
            data_length: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum TerminusLocatorType {
    Uid = 0,
    MctpEid = 1,
    SmbusRelative = 2,
    SystemSoftware = 3,
}

/// Terminus locator PDR using the UID locator form.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct TerminusLocatorPdr {
    pub hdr: PdrCommonHeader,
    pub terminus_handle: u16,
    pub validity: u8,
    pub tid: u8,
    pub container_id: u16,
    pub locator_type: u8,
    pub locator_value_size: u8,
    pub terminus_instance: u8,
    pub device_uid: [u8; DEVICE_UID_LEN],
}

impl TerminusLocatorPdr {
    pub const VALIDITY_VALID: u8 = 1;

    pub fn new(device_uid: [u8; DEVICE_UID_LEN]) -> Self {
        TerminusLocatorPdr {
            hdr: PdrCommonHeader::new(PdrType::TerminusLocator),
            terminus_handle: PLDM_TERMINUS_HANDLE,
            validity: Self::VALIDITY_VALID,
            tid: 0,
            container_id: PLDM_CONTAINER_ID,
            locator_type: TerminusLocatorType::Uid as u8,
            locator_value_size: (DEVICE_UID_LEN + 1) as u8,
            terminus_instance: 1,
            device_uid,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct NumericSensorRangeFormat {
    pub range_field_format: u8,
    pub range_field_support: u8,
    pub nominal_value: i16,
    pub normal_max: i16,
    pub normal_min: i16,
    pub warning_high: i16,
    pub warning_low: i16,
    pub critical_high: i16,
    pub critical_low: i16,
    pub fatal_high: i16,
    pub fatal_low: i16,
}

#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct NumericSensorPdr {
    pub hdr: PdrCommonHeader,
    pub terminus_handle: u16,
    pub sensor_id: u16,
    pub entity_type: u16,
    pub entity_instance_num: u16,
    pub container_id: u16,
    pub sensor_init: u8,
    pub sensor_aux_names_pdr: u8,
    pub base_unit: u8,
    pub unit_modifier: i8,
    pub rate_unit: u8,
    pub base_oem_unit_handle: u8,
    pub aux_unit: u8,
    pub aux_unit_modifier: i8,
    pub aux_rate_unit: u8,
    pub rel: u8,
    pub aux_oem_unit_handle: u8,
    pub is_linear: u8,
    pub sensor_data_size: u8,
    pub resolution: f32,
    pub offset: f32,
    pub accuracy: u16,
    pub plus_tolerance: u8,
    pub minus_tolerance: u8,
    pub hysteresis: i16,
    pub supported_thresholds: u8,
    pub threshold_and_hysteresis_volatility: u8,
    pub state_transition_interval: f32,
    pub update_interval: f32,
    pub max_readable: i16,
    pub min_readable: i16,
    pub range: NumericSensorRangeFormat,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct SensorNamePdr {
    pub hdr: PdrCommonHeader,
    pub terminus_handle: u16,
    pub sensor_id: u16,
    pub sensor_count: u8,
    pub name_string_count: u8,
    pub language_tag: [u8; PDR_LANGUAGE_TAG_LEN],
    pub sensor_name: [u8; PDR_SENSOR_NAME_LEN],
}

impl SensorNamePdr {
    pub const LANGUAGE_TAG_EN_US: [u8; PDR_LANGUAGE_TAG_LEN] = *b"en-US\0";

    /// Builds a name record with `name` stored as UTF-16BE. Names longer than
    /// the field are cut so that a terminating zero unit always fits.
    pub fn new(sensor_id: u16, name: &str) -> Self {
        let mut sensor_name = [0u8; PDR_SENSOR_NAME_LEN];
        for (unit, slot) in name
            .encode_utf16()
            .take(PDR_MAX_NAME_UNITS - 1)
            .zip(sensor_name.chunks_exact_mut(2))
        {
            slot.copy_from_slice(&unit.to_be_bytes());
        }
        SensorNamePdr {
            hdr: PdrCommonHeader::new(PdrType::SensorAuxiliaryNames),
            terminus_handle: PLDM_TERMINUS_HANDLE,
            sensor_id,
            sensor_count: 1,
            name_string_count: 1,
            language_tag: Self::LANGUAGE_TAG_EN_US,
            sensor_name,
        }
    }

    /// Bytes of the name field that follow the terminating zero unit. These are
    /// not transmitted.
    pub fn unused_name_bytes(&self) -> usize {
        let used = self
            .sensor_name
            .chunks_exact(2)
            .take_while(|unit| **unit != [0, 0])
            .count();
        2 * PDR_MAX_NAME_UNITS.saturating_sub(used + 1)
    }
}
