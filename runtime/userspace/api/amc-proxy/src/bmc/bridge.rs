// Licensed under the Apache-2.0 license

extern crate alloc;

use super::{unexpected_response, BmcErr, BmcEvent, BmcProxy, BmcProxyError, BmcStat, BMC_NAME};
use crate::evl::EvlSignal;
use alloc::boxed::Box;
use async_trait::async_trait;
use log::{debug, warn};
use pldm_common::protocol::platform::SensorOperationalState;
use pldm_lib::sensor_ops::{SensorOps, SensorOpsError, SensorReading};

/// Answer to an EnableSensor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorEnableResponse {
    Ok = 0,
    InvalidSensorId = 1,
    InvalidOperationalState = 2,
    EventGenerationNotSupported = 3,
}

/// Answer to a GetSensorInfo event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GetSensorResponse {
    Ok = 0,
    InvalidSensorId = 1,
    InvalidOperationalState = 2,
    RearmUnavailableInPresentState = 3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BridgedReading {
    response: GetSensorResponse,
    op_state: u8,
    value: i16,
}

/// The one sensor request in flight. A request is identified by the instance
/// of the signal that announced it.
#[derive(Debug, Default)]
pub(super) struct SensorBridge {
    awaiting: bool,
    request: u8,
    sensor_id: u16,
    op_state: u8,
    enable_response: Option<SensorEnableResponse>,
    reading: Option<BridgedReading>,
}

impl SensorBridge {
    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }

    fn open(&mut self, signal: &EvlSignal, sensor_id: u16, op_state: u8) {
        *self = Self {
            awaiting: true,
            request: signal.instance,
            sensor_id,
            op_state,
            ..Self::default()
        };
    }

    /// Checks a response against the pending request. The request is closed
    /// by the first response for it, matching or not.
    fn accept(&mut self, signal: &EvlSignal, sensor_id: u16) -> Result<(), BmcErr> {
        if !self.awaiting || signal.instance != self.request {
            return Err(BmcErr::UnexpectedFlag);
        }
        self.awaiting = false;
        if sensor_id != self.sensor_id {
            return Err(BmcErr::UnexpectedSensorId);
        }
        Ok(())
    }
}

impl BmcProxy<'_> {
    /// Announces a sensor request and returns the signal that carries it.
    /// Subscribers answer from inside the raise.
    fn request_sensor(
        &self,
        event: BmcEvent,
        sensor_id: u16,
        op_state: u8,
    ) -> Result<EvlSignal, SensorOpsError> {
        self.validate(true).map_err(|_| SensorOpsError::Failed)?;
        let signal = self.with_inner(|inner| {
            let signal = inner.next_signal(event);
            inner.bridge.open(&signal, sensor_id, op_state);
            signal
        });
        self.raise_signal(&signal)
            .map_err(|_| SensorOpsError::Failed)?;
        Ok(signal)
    }

    fn reject_response(&self, err: BmcErr, sensor_id: u16) -> BmcProxyError {
        let expected = self.with_inner(|inner| {
            inner.counters.inc_error(err);
            inner.bridge.sensor_id
        });
        match err {
            BmcErr::UnexpectedSensorId => {
                warn!(
                    "{}: unexpected sensor id {} (awaiting {})",
                    BMC_NAME, sensor_id, expected
                );
                BmcProxyError::UnexpectedSensorId {
                    expected,
                    got: sensor_id,
                }
            }
            _ => unexpected_response("response", sensor_id),
        }
    }

    /// Answer to an EnableSensor event.
    pub fn set_response(
        &self,
        signal: &EvlSignal,
        sensor_id: u16,
        response: SensorEnableResponse,
    ) -> Result<(), BmcProxyError> {
        self.validate(true)?;
        let accepted = self.with_inner(|inner| {
            let accepted = inner.bridge.accept(signal, sensor_id);
            if accepted.is_ok() {
                inner.bridge.enable_response = Some(response);
            }
            accepted
        });
        accepted.map_err(|e| self.reject_response(e, sensor_id))
    }

    /// Answer to a GetSensorInfo event.
    pub fn send_response_for_get_sensor(
        &self,
        signal: &EvlSignal,
        sensor_id: u16,
        value: i16,
        op_state: u8,
        response: GetSensorResponse,
    ) -> Result<(), BmcProxyError> {
        self.validate(true)?;
        let accepted = self.with_inner(|inner| {
            let accepted = inner.bridge.accept(signal, sensor_id);
            if accepted.is_ok() {
                inner.bridge.op_state = op_state;
                inner.bridge.reading = Some(BridgedReading {
                    response,
                    op_state,
                    value,
                });
            }
            accepted
        });
        accepted.map_err(|e| self.reject_response(e, sensor_id))
    }

    /// Sensor id and requested operational state of the pending request.
    pub fn get_sensor_id_request(&self, _signal: &EvlSignal) -> Result<(u16, u8), BmcProxyError> {
        self.validate(true)?;
        Ok(self.with_inner(|inner| {
            inner.counters.inc_stat(BmcStat::GetSensorIdRequest);
            (inner.bridge.sensor_id, inner.bridge.op_state)
        }))
    }
}

#[async_trait(?Send)]
impl SensorOps for BmcProxy<'_> {
    async fn set_numeric_sensor_enable(
        &self,
        sensor_id: u16,
        op_state: SensorOperationalState,
    ) -> Result<(), SensorOpsError> {
        self.request_sensor(BmcEvent::EnableSensor, sensor_id, op_state as u8)?;

        match self.with_inner(|inner| inner.bridge.enable_response.take()) {
            Some(SensorEnableResponse::Ok) => Ok(()),
            Some(SensorEnableResponse::InvalidSensorId) => Err(SensorOpsError::InvalidSensorId),
            Some(SensorEnableResponse::InvalidOperationalState) => {
                Err(SensorOpsError::InvalidOperationalState)
            }
            Some(SensorEnableResponse::EventGenerationNotSupported) => {
                Err(SensorOpsError::EventGenerationNotSupported)
            }
            None => {
                debug!("{}: no enable response for sensor {}", BMC_NAME, sensor_id);
                Err(SensorOpsError::NoResponse)
            }
        }
    }

    async fn get_sensor_reading(&self, sensor_id: u16) -> Result<SensorReading, SensorOpsError> {
        self.request_sensor(BmcEvent::GetSensorInfo, sensor_id, 0)?;

        let reading = self
            .with_inner(|inner| inner.bridge.reading.take())
            .ok_or_else(|| {
                debug!("{}: no reading for sensor {}", BMC_NAME, sensor_id);
                SensorOpsError::NoResponse
            })?;

        match reading.response {
            GetSensorResponse::Ok => {
                let op_state = SensorOperationalState::try_from(reading.op_state).map_err(|_| {
                    warn!(
                        "{}: sensor {} reported invalid state {}",
                        BMC_NAME, sensor_id, reading.op_state
                    );
                    SensorOpsError::Failed
                })?;
                Ok(SensorReading {
                    op_state,
                    value: reading.value,
                })
            }
            GetSensorResponse::InvalidSensorId => Err(SensorOpsError::InvalidSensorId),
            GetSensorResponse::InvalidOperationalState => {
                Err(SensorOpsError::InvalidOperationalState)
            }
            GetSensorResponse::RearmUnavailableInPresentState => Err(SensorOpsError::Failed),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bmc::test::{setup_logger, Board, MockFwIf, MockTimer, TEST_UUID};
    use crate::bmc::BmcProxyConfig;
    use crate::evl::{EvlCallback, EvlError};
    use core::cell::{Cell, RefCell};
    use futures::executor::block_on;
    use pldm_lib::pdr_repo::PdrRepository;

    /// Plays the sensor owner: answers requests from inside the raise.
    struct Responder<'p, 'a> {
        bmc: &'p BmcProxy<'a>,
        answer_as: Cell<Option<u16>>,
        value: i16,
        op_state: u8,
        seen: RefCell<Vec<EvlSignal>>,
    }

    impl<'p, 'a> Responder<'p, 'a> {
        fn new(bmc: &'p BmcProxy<'a>) -> Self {
            Self {
                bmc,
                answer_as: Cell::new(None),
                value: 0,
                op_state: SensorOperationalState::Enabled as u8,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl EvlCallback for Responder<'_, '_> {
        fn on_event(&self, signal: &EvlSignal) -> Result<(), EvlError> {
            self.seen.borrow_mut().push(*signal);
            let Ok((requested, _)) = self.bmc.get_sensor_id_request(signal) else {
                return Err(EvlError::CallbackFailed(1));
            };
            let sensor_id = self.answer_as.get().unwrap_or(requested);
            let result = match BmcEvent::try_from(signal.event_id) {
                Ok(BmcEvent::EnableSensor) => {
                    self.bmc
                        .set_response(signal, sensor_id, SensorEnableResponse::Ok)
                }
                Ok(BmcEvent::GetSensorInfo) => self.bmc.send_response_for_get_sensor(
                    signal,
                    sensor_id,
                    self.value,
                    self.op_state,
                    GetSensorResponse::Ok,
                ),
                _ => Ok(()),
            };
            result.map_err(|_| EvlError::CallbackFailed(1))
        }
    }

    #[test]
    fn test_reading_answered_inside_raise() {
        setup_logger();
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(7, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        let mut responder = Responder::new(&bmc);
        responder.value = -12;
        bmc.bind_callback(&responder).unwrap();

        let reading = block_on(bmc.get_sensor_reading(2)).unwrap();
        assert_eq!(reading.value, -12);
        assert_eq!(reading.op_state, SensorOperationalState::Enabled);

        let seen = responder.seen.borrow();
        assert_eq!(seen[0].module_id, 7);
        assert_eq!(seen[0].event_id, BmcEvent::GetSensorInfo as u8);
        assert_eq!(bmc.stat(BmcStat::GetSensorIdRequest), 1);
    }

    #[test]
    fn test_enable_answered_inside_raise() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(7, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        let responder = Responder::new(&bmc);
        bmc.bind_callback(&responder).unwrap();

        assert_eq!(
            block_on(bmc.set_numeric_sensor_enable(30, SensorOperationalState::Disabled)),
            Ok(())
        );
        let (_, op_state) = bmc.get_sensor_id_request(&EvlSignal::default()).unwrap();
        assert_eq!(op_state, SensorOperationalState::Disabled as u8);
    }

    #[test]
    fn test_mismatched_sensor_is_rejected() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(7, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();
        let responder = Responder::new(&bmc);
        responder.answer_as.set(Some(99));
        bmc.bind_callback(&responder).unwrap();

        // The responder reports its rejected answer as a callback failure.
        assert_eq!(
            block_on(bmc.get_sensor_reading(1)),
            Err(SensorOpsError::Failed)
        );
        assert_eq!(SensorOpsError::Failed.reading_completion_code(), 1);
        assert_eq!(bmc.error_count(BmcErr::UnexpectedSensorId), 1);
        assert_eq!(bmc.error_count(BmcErr::RaiseEventFail), 1);
    }

    #[test]
    fn test_no_subscriber_means_no_response() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(7, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();

        assert_eq!(
            block_on(bmc.set_numeric_sensor_enable(1, SensorOperationalState::Enabled)),
            Err(SensorOpsError::NoResponse)
        );
    }

    #[test]
    fn test_late_and_stale_responses() {
        let (fw_if, timer, repo, board) = (
            MockFwIf::default(),
            MockTimer::default(),
            PdrRepository::new(),
            Board::new(),
        );
        let bmc = BmcProxy::new(BmcProxyConfig::new(7, TEST_UUID), &fw_if, &timer, &repo);
        block_on(bmc.initialise(&board.profile())).unwrap();

        // Nothing pending.
        assert_eq!(
            bmc.set_response(&EvlSignal::default(), 1, SensorEnableResponse::Ok),
            Err(BmcProxyError::UnexpectedResponse)
        );

        // Request announced with instance 0; an answer quoting another
        // instance is stale.
        let _ = block_on(bmc.get_sensor_reading(1));
        let stale = EvlSignal {
            instance: 5,
            ..EvlSignal::default()
        };
        assert_eq!(
            bmc.send_response_for_get_sensor(&stale, 1, 0, 0, GetSensorResponse::Ok),
            Err(BmcProxyError::UnexpectedResponse)
        );
        assert_eq!(bmc.error_count(BmcErr::UnexpectedFlag), 2);
    }
}
