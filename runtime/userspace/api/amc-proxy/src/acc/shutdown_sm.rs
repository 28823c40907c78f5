// Licensed under the Apache-2.0 license

use super::{ClockControl, ShutdownLevel, ShutdownSensor};
use crate::config::ACC_MAX_MONITORED_SENSORS;
use arrayvec::ArrayVec;
use log::debug;
use smlang::statemachine;

// Clock shutdown escalation. A warning crossing never leaves Normal, so the
// machine only tracks the levels that throttle the clock.
statemachine! {
    derive_states: [Clone, Copy, Debug],
    derive_events: [Clone, Debug],
    transitions: {
        *Normal + Critical(ShutdownSensor) [is_monitored] / throttle = CriticalShutdown,
        Normal + Fatal(ShutdownSensor) [is_monitored] / throttle = FatalShutdown,
        CriticalShutdown + Fatal(ShutdownSensor) [is_monitored] / throttle = FatalShutdown,

        _ + Reenable [is_enabled] / restore = Normal
    }
}

impl From<States> for ShutdownLevel {
    fn from(state: States) -> Self {
        match state {
            States::Normal => ShutdownLevel::None,
            States::CriticalShutdown => ShutdownLevel::Critical,
            States::FatalShutdown => ShutdownLevel::Fatal,
        }
    }
}

/// Extended state of the shutdown machine.
pub(crate) struct ShutdownContext<'a> {
    clock: &'a dyn ClockControl,
    pub clock_base: usize,
    /// Global gate; while clear, threshold crossings are ignored.
    pub enabled: bool,
    pub sensors: ArrayVec<ShutdownSensor, ACC_MAX_MONITORED_SENSORS>,
}

impl<'a> ShutdownContext<'a> {
    pub(crate) fn new(clock: &'a dyn ClockControl) -> Self {
        Self {
            clock,
            clock_base: 0,
            enabled: false,
            sensors: ArrayVec::new(),
        }
    }
}

impl StateMachineContext for ShutdownContext<'_> {
    fn is_monitored(&self, sensor: &ShutdownSensor) -> Result<bool, ()> {
        Ok(self.enabled && self.sensors.contains(sensor))
    }

    fn is_enabled(&self) -> Result<bool, ()> {
        Ok(self.enabled)
    }

    fn throttle(&mut self, sensor: ShutdownSensor) -> Result<(), ()> {
        debug!(
            "ACC: throttling clock at {:#x} for {:?} sensor {}",
            self.clock_base, sensor.sensor_type, sensor.id
        );
        self.clock.throttle(self.clock_base);
        Ok(())
    }

    fn restore(&mut self) -> Result<(), ()> {
        debug!("ACC: restoring full clock rate at {:#x}", self.clock_base);
        self.clock.restore(self.clock_base);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::acc::ShutdownSensorType;
    use core::cell::RefCell;

    #[derive(Default)]
    struct RecordingClock {
        writes: RefCell<Vec<(&'static str, usize)>>,
    }

    impl ClockControl for RecordingClock {
        fn throttle(&self, base_addr: usize) {
            self.writes.borrow_mut().push(("throttle", base_addr));
        }

        fn restore(&self, base_addr: usize) {
            self.writes.borrow_mut().push(("restore", base_addr));
        }
    }

    const HOTSPOT: ShutdownSensor = ShutdownSensor {
        id: 4,
        sensor_type: ShutdownSensorType::Temperature,
    };

    fn machine(clock: &RecordingClock) -> StateMachine<ShutdownContext<'_>> {
        let mut ctx = ShutdownContext::new(clock);
        ctx.clock_base = 0x8000_0000;
        ctx.enabled = true;
        ctx.sensors.push(HOTSPOT);
        StateMachine::new(ctx)
    }

    #[test]
    fn test_escalation_only_goes_up() {
        let clock = RecordingClock::default();
        let mut sm = machine(&clock);

        assert!(sm.process_event(Events::Critical(HOTSPOT)).is_ok());
        assert_eq!(*sm.state(), States::CriticalShutdown);
        // Same level again is not an escalation.
        assert!(sm.process_event(Events::Critical(HOTSPOT)).is_err());
        assert!(sm.process_event(Events::Fatal(HOTSPOT)).is_ok());
        assert!(sm.process_event(Events::Critical(HOTSPOT)).is_err());
        assert_eq!(ShutdownLevel::from(*sm.state()), ShutdownLevel::Fatal);

        assert!(sm.process_event(Events::Reenable).is_ok());
        assert_eq!(*sm.state(), States::Normal);
        assert_eq!(
            *clock.writes.borrow(),
            [
                ("throttle", 0x8000_0000),
                ("throttle", 0x8000_0000),
                ("restore", 0x8000_0000)
            ]
        );
    }

    #[test]
    fn test_unmonitored_or_disabled_is_ignored() {
        let clock = RecordingClock::default();
        let mut sm = machine(&clock);

        let other_type = ShutdownSensor {
            sensor_type: ShutdownSensorType::Power,
            ..HOTSPOT
        };
        assert!(sm.process_event(Events::Fatal(other_type)).is_err());

        sm.context_mut().enabled = false;
        assert!(sm.process_event(Events::Fatal(HOTSPOT)).is_err());
        assert!(sm.process_event(Events::Reenable).is_err());
        assert_eq!(*sm.state(), States::Normal);
        assert!(clock.writes.borrow().is_empty());
    }
}
