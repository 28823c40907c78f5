// Licensed under the Apache-2.0 license

//! ACC (clock control) proxy driver.
//!
//! Sensor monitoring posts threshold crossings into the driver's mailbox. The
//! driver task escalates the clock shutdown level, throttles the clock through
//! [`ClockControl`] and reports every transition to its subscribers.

mod shutdown_sm;

use crate::config::{ACC_MAILBOX_DEPTH, ACC_MAX_MONITORED_SENSORS, ACC_TASK_PERIOD_MS};
use crate::evl::{EvlCallback, EvlError, EvlRecord, EvlSignal};
use crate::stats::{Counters, ModuleState};
use crate::timer::{elapsed_ms, Timer};
use crate::{LOWER_FIREWALL, UPPER_FIREWALL};
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use log::{debug, error, info};
use shutdown_sm::{Events, ShutdownContext, StateMachine};
use strum::EnumCount;
use strum_macros::{EnumCount, EnumIter, IntoStaticStr};
use thiserror::Error;

const ACC_NAME: &str = "ACC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccEvent {
    ClockShutdownEnabled = 0,
    ClockShutdownDisabled = 1,
    ClockShutdownActivated = 2,
    ClockReenabled = 3,
}

impl TryFrom<u8> for AccEvent {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(AccEvent::ClockShutdownEnabled),
            1 => Ok(AccEvent::ClockShutdownDisabled),
            2 => Ok(AccEvent::ClockShutdownActivated),
            3 => Ok(AccEvent::ClockReenabled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownSensorType {
    Temperature = 0,
    Voltage = 1,
    Current = 2,
    Power = 3,
}

/// A sensor whose threshold crossings may shut the clock down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSensor {
    pub id: u8,
    pub sensor_type: ShutdownSensorType,
}

impl ShutdownSensor {
    pub const fn new(id: u8, sensor_type: ShutdownSensorType) -> Self {
        Self { id, sensor_type }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownLevel {
    None,
    Warning,
    Critical,
    Fatal,
}

/// Mailbox message posted by the producer API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccMessage {
    Fatal(ShutdownSensor),
    Critical(ShutdownSensor),
    Warning(ShutdownSensor),
    FeatureEnabled,
    FeatureDisabled,
    ReenableClock,
}

/// Access to the clock throttling block.
pub trait ClockControl {
    /// Reduces the clock to its throttled rate.
    fn throttle(&self, base_addr: usize);

    /// Returns the clock to full rate.
    fn restore(&self, base_addr: usize);
}

#[derive(Debug, Clone, Copy, EnumIter, EnumCount, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AccStat {
    Initialisation,
    MailboxCreate,
    MailboxPost,
    MailboxPend,
    MutexCreate,
    MutexTake,
    MutexRelease,
    TaskCreate,
    EventRaise,
    ClockShutdown,
    TaskTimeMs,
    EnableShutdown,
    DisableShutdown,
    StatusRetrieval,
}

#[derive(Debug, Clone, Copy, EnumIter, EnumCount, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AccErr {
    Initialisation,
    MailboxCreate,
    MailboxPost,
    MailboxPend,
    MutexCreate,
    MutexTake,
    MutexRelease,
    TaskCreate,
    EventRaise,
    UnknownMailboxMsg,
    EnableShutdownFailed,
    DisableShutdownFailed,
    ValidationFailed,
    InitEvlRecordFailed,
}

crate::counter_id!(AccStat, AccErr);

pub type AccCounters = Counters<AccStat, AccErr, { AccStat::COUNT }, { AccErr::COUNT }>;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum AccProxyError {
    #[error("Driver context failed validation")]
    ValidationFailed,
    #[error("Driver not initialised")]
    NotInitialised,
    #[error("Driver already initialised")]
    AlreadyInitialised,
    #[error("{0} monitored sensors, at most {max} supported", max = ACC_MAX_MONITORED_SENSORS)]
    TooManySensors(usize),
    #[error("Clock control base address is not set")]
    InvalidClockControlBase,
    #[error("Mailbox full")]
    MailboxFull,
    #[error("Event: {0}")]
    Evl(EvlError),
}

pub struct AccProxyConfig<'c> {
    /// Module id placed in every raised signal.
    pub proxy_id: u8,
    pub sensors: &'c [ShutdownSensor],
    pub clock_control_base: usize,
}

struct AccInner<'a> {
    upper_firewall: u32,
    initialised: bool,
    proxy_id: u8,
    state: ModuleState,
    instance: u8,
    counters: AccCounters,
    machine: StateMachine<ShutdownContext<'a>>,
    lower_firewall: u32,
}

impl AccInner<'_> {
    fn firewall_intact(&self) -> bool {
        self.upper_firewall == UPPER_FIREWALL && self.lower_firewall == LOWER_FIREWALL
    }

    fn error_with_state(&mut self, error: AccErr) {
        self.state = ModuleState::Error;
        self.counters.inc_error(error);
    }

    fn next_signal(&mut self, event: AccEvent, payload: u8) -> EvlSignal {
        let signal = EvlSignal {
            module_id: self.proxy_id,
            event_id: event as u8,
            instance: self.instance,
            payload,
        };
        self.instance = self.instance.wrapping_add(1);
        signal
    }

    fn level(&self) -> ShutdownLevel {
        ShutdownLevel::from(*self.machine.state())
    }
}

pub struct AccProxy<'a> {
    timer: &'a dyn Timer,
    evl: EvlRecord<'a>,
    mailbox: Channel<NoopRawMutex, AccMessage, ACC_MAILBOX_DEPTH>,
    inner: Mutex<NoopRawMutex, RefCell<AccInner<'a>>>,
}

impl<'a> AccProxy<'a> {
    pub fn new(clock: &'a dyn ClockControl, timer: &'a dyn Timer) -> Self {
        Self {
            timer,
            evl: EvlRecord::new(),
            mailbox: Channel::new(),
            inner: Mutex::new(RefCell::new(AccInner {
                upper_firewall: UPPER_FIREWALL,
                initialised: false,
                proxy_id: 0,
                state: ModuleState::Init,
                instance: 0,
                counters: AccCounters::new(),
                machine: StateMachine::new(ShutdownContext::new(clock)),
                lower_firewall: LOWER_FIREWALL,
            })),
        }
    }

    // Callers must not raise events while inside `f`.
    fn with_inner<R>(&self, f: impl FnOnce(&mut AccInner<'a>) -> R) -> R {
        self.inner.lock(|inner| f(&mut inner.borrow_mut()))
    }

    fn validate(&self, need_init: bool) -> Result<(), AccProxyError> {
        self.with_inner(|inner| {
            if !inner.firewall_intact() {
                inner.counters.inc_error(AccErr::ValidationFailed);
                return Err(AccProxyError::ValidationFailed);
            }
            if need_init && !inner.initialised {
                inner.counters.inc_error(AccErr::ValidationFailed);
                return Err(AccProxyError::NotInitialised);
            }
            Ok(())
        })
    }

    /// Stores the monitored sensor table and the clock control base. Clock
    /// shutdown stays disabled until [`Self::enable_shutdown`] is processed.
    pub fn initialise(&self, config: &AccProxyConfig<'_>) -> Result<(), AccProxyError> {
        self.validate(false)?;
        let result = self.with_inner(|inner| {
            if inner.initialised {
                return Err(AccProxyError::AlreadyInitialised);
            }
            if config.sensors.len() > ACC_MAX_MONITORED_SENSORS {
                return Err(AccProxyError::TooManySensors(config.sensors.len()));
            }
            if config.clock_control_base == 0 {
                return Err(AccProxyError::InvalidClockControlBase);
            }

            let ctx = inner.machine.context_mut();
            ctx.sensors.clear();
            ctx.sensors.extend(config.sensors.iter().copied());
            ctx.clock_base = config.clock_control_base;

            inner.proxy_id = config.proxy_id;
            inner.counters.inc_stat(AccStat::MutexCreate);
            inner.counters.inc_stat(AccStat::MailboxCreate);
            inner.counters.inc_stat(AccStat::TaskCreate);
            inner.counters.inc_stat(AccStat::Initialisation);
            inner.initialised = true;
            inner.state = ModuleState::Ok;
            Ok(())
        });

        match result {
            Ok(()) => {
                info!(
                    "{}: proxy initialised, monitoring {} sensor(s)",
                    ACC_NAME,
                    config.sensors.len()
                );
                Ok(())
            }
            Err(e) => {
                error!("{}: initialisation failed: {}", ACC_NAME, e);
                self.with_inner(|inner| inner.counters.inc_error(AccErr::Initialisation));
                Err(e)
            }
        }
    }

    pub fn bind_callback(&self, callback: &'a dyn EvlCallback) -> Result<(), AccProxyError> {
        self.validate(true)?;
        self.evl.bind(callback).map_err(AccProxyError::Evl)
    }

    fn post(&self, msg: AccMessage) -> Result<(), AccProxyError> {
        self.validate(true)?;
        match self.mailbox.try_send(msg) {
            Ok(()) => {
                self.with_inner(|inner| inner.counters.inc_stat(AccStat::MailboxPost));
                Ok(())
            }
            Err(_) => {
                error!("{}: mailbox full, dropping {:?}", ACC_NAME, msg);
                self.with_inner(|inner| inner.error_with_state(AccErr::MailboxPost));
                Err(AccProxyError::MailboxFull)
            }
        }
    }

    pub fn fatal_limit_crossed(
        &self,
        sensor_id: u8,
        sensor_type: ShutdownSensorType,
    ) -> Result<(), AccProxyError> {
        self.post(AccMessage::Fatal(ShutdownSensor::new(sensor_id, sensor_type)))
    }

    pub fn critical_limit_crossed(
        &self,
        sensor_id: u8,
        sensor_type: ShutdownSensorType,
    ) -> Result<(), AccProxyError> {
        self.post(AccMessage::Critical(ShutdownSensor::new(sensor_id, sensor_type)))
    }

    pub fn warning_limit_crossed(
        &self,
        sensor_id: u8,
        sensor_type: ShutdownSensorType,
    ) -> Result<(), AccProxyError> {
        self.post(AccMessage::Warning(ShutdownSensor::new(sensor_id, sensor_type)))
    }

    pub fn enable_shutdown(&self) -> Result<(), AccProxyError> {
        self.post(AccMessage::FeatureEnabled)
    }

    pub fn disable_shutdown(&self) -> Result<(), AccProxyError> {
        self.post(AccMessage::FeatureDisabled)
    }

    /// Requests the clock back at full rate and the shutdown level cleared.
    pub fn reset_shutdown(&self) -> Result<(), AccProxyError> {
        self.post(AccMessage::ReenableClock)
    }

    /// Driver task. Never returns.
    pub async fn run(&self) {
        loop {
            if let Err(e) = self.run_once() {
                debug!("{}: {}", ACC_NAME, e);
            }
            self.timer.sleep_ms(ACC_TASK_PERIOD_MS).await;
        }
    }

    /// Handles at most one mailbox message. Returns the message handled.
    pub fn run_once(&self) -> Result<Option<AccMessage>, AccProxyError> {
        self.validate(true)?;
        let start_ms = self.timer.now_ms();

        let msg = self.mailbox.try_receive().ok();
        if let Some(msg) = msg {
            self.with_inner(|inner| inner.counters.inc_stat(AccStat::MailboxPend));
            self.handle(msg);
        }

        let task_ms = elapsed_ms(self.timer, start_ms);
        self.with_inner(|inner| inner.counters.add_stat(AccStat::TaskTimeMs, task_ms));
        Ok(msg)
    }

    fn handle(&self, msg: AccMessage) {
        match msg {
            AccMessage::Fatal(sensor) => self.escalate(Events::Fatal(sensor), sensor),
            AccMessage::Critical(sensor) => self.escalate(Events::Critical(sensor), sensor),
            AccMessage::Warning(_) => {}
            AccMessage::FeatureEnabled => self.set_enabled(true),
            AccMessage::FeatureDisabled => self.set_enabled(false),
            AccMessage::ReenableClock => self.reenable_clock(),
        }
    }

    fn set_enabled(&self, enabled: bool) {
        let (event, stat, failed) = if enabled {
            (
                AccEvent::ClockShutdownEnabled,
                AccStat::EnableShutdown,
                AccErr::EnableShutdownFailed,
            )
        } else {
            (
                AccEvent::ClockShutdownDisabled,
                AccStat::DisableShutdown,
                AccErr::DisableShutdownFailed,
            )
        };
        let signal = self.with_inner(|inner| {
            inner.machine.context_mut().enabled = enabled;
            inner.next_signal(event, 0)
        });
        info!(
            "{}: clock shutdown {}",
            ACC_NAME,
            if enabled { "enabled" } else { "disabled" }
        );

        match self.evl.raise(&signal) {
            Ok(()) => self.with_inner(|inner| inner.counters.inc_stat(stat)),
            Err(e) => {
                error!("{}: error raising {:?}: {}", ACC_NAME, event, e);
                self.with_inner(|inner| inner.error_with_state(failed));
            }
        }
    }

    fn escalate(&self, event: Events, sensor: ShutdownSensor) {
        let signal = self.with_inner(|inner| {
            inner.machine.process_event(event).ok()?;
            debug!("{}: clock shutdown level is {:?}", ACC_NAME, inner.level());
            Some(inner.next_signal(AccEvent::ClockShutdownActivated, sensor.id))
        });
        if let Some(signal) = signal {
            self.raise(&signal);
        }
    }

    fn reenable_clock(&self) {
        let signal = self.with_inner(|inner| {
            inner.machine.process_event(Events::Reenable).ok()?;
            Some(inner.next_signal(AccEvent::ClockReenabled, 0))
        });
        if let Some(signal) = signal {
            debug!("{}: clock re-enabled", ACC_NAME);
            self.raise(&signal);
        }
    }

    /// Raises a clock shutdown transition. The transition is counted whether
    /// or not every subscriber accepted it.
    fn raise(&self, signal: &EvlSignal) {
        let raised = self.evl.raise(signal);
        self.with_inner(|inner| {
            match raised {
                Ok(()) => inner.counters.inc_stat(AccStat::EventRaise),
                Err(e) => {
                    error!(
                        "{}: error raising event {:#x}: {}",
                        ACC_NAME, signal.event_id, e
                    );
                    inner.error_with_state(AccErr::EventRaise);
                }
            }
            inner.counters.inc_stat(AccStat::ClockShutdown);
        });
    }

    pub fn get_shutdown_level(&self) -> Result<ShutdownLevel, AccProxyError> {
        self.validate(true)?;
        Ok(self.with_inner(|inner| inner.level()))
    }

    pub fn is_shutdown_enabled(&self) -> Result<bool, AccProxyError> {
        self.validate(true)?;
        Ok(self.with_inner(|inner| inner.machine.context().enabled))
    }

    pub fn print_statistics(&self) -> Result<(), AccProxyError> {
        self.validate(false)?;
        self.with_inner(|inner| inner.counters.log(ACC_NAME));
        Ok(())
    }

    pub fn clear_statistics(&self) -> Result<(), AccProxyError> {
        self.validate(false)?;
        self.with_inner(|inner| inner.counters.clear());
        Ok(())
    }

    pub fn get_state(&self) -> Result<ModuleState, AccProxyError> {
        self.validate(false)?;
        Ok(self.with_inner(|inner| {
            inner.counters.inc_stat(AccStat::MutexTake);
            inner.counters.inc_stat(AccStat::StatusRetrieval);
            inner.counters.inc_stat(AccStat::MutexRelease);
            inner.state
        }))
    }

    pub fn stat(&self, stat: AccStat) -> u32 {
        self.with_inner(|inner| inner.counters.stat(stat))
    }

    pub fn error_count(&self, error: AccErr) -> u32 {
        self.with_inner(|inner| inner.counters.error(error))
    }

    #[cfg(test)]
    fn corrupt_firewall(&self) {
        self.with_inner(|inner| inner.upper_firewall = 0);
    }
}
