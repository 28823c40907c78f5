// Licensed under the Apache-2.0 license

extern crate alloc;

use alloc::boxed::Box;
use async_trait::async_trait;
use pldm_common::protocol::base::{PldmBaseCompletionCode, PldmPlatformCompletionCode};
use pldm_common::protocol::platform::SensorOperationalState;

/// Outcome reported by whoever owns the sensor hardware.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorOpsError {
    InvalidSensorId,
    InvalidOperationalState,
    EventGenerationNotSupported,
    /// Nobody answered the request.
    NoResponse,
    Failed,
}

impl SensorOpsError {
    /// Completion code returned for a failed SetNumericSensorEnable.
    pub fn enable_completion_code(&self) -> u8 {
        match self {
            SensorOpsError::InvalidSensorId => PldmPlatformCompletionCode::INVALID_SENSOR_ID,
            SensorOpsError::InvalidOperationalState => {
                PldmPlatformCompletionCode::INVALID_SENSOR_OPERATIONAL_STATE
            }
            SensorOpsError::EventGenerationNotSupported => {
                PldmPlatformCompletionCode::EVENT_GENERATION_NOT_SUPPORTED
            }
            SensorOpsError::NoResponse | SensorOpsError::Failed => {
                PldmBaseCompletionCode::Error as u8
            }
        }
    }

    /// Completion code returned for a failed GetSensorReading.
    pub fn reading_completion_code(&self) -> u8 {
        match self {
            SensorOpsError::InvalidSensorId => PldmPlatformCompletionCode::INVALID_SENSOR_ID,
            _ => PldmBaseCompletionCode::Error as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub op_state: SensorOperationalState,
    pub value: i16,
}

/// Access to the sensors described by the numeric sensor PDRs.
#[async_trait(?Send)]
pub trait SensorOps {
    async fn set_numeric_sensor_enable(
        &self,
        sensor_id: u16,
        op_state: SensorOperationalState,
    ) -> Result<(), SensorOpsError>;

    async fn get_sensor_reading(&self, sensor_id: u16) -> Result<SensorReading, SensorOpsError>;
}
