// Licensed under the Apache-2.0 license

use crate::config::EVL_MAX_BINDINGS;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::{debug, warn};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum EvlError {
    #[error("All {0} bindings in use")]
    BindingsFull(usize),
    #[error("{0} callback(s) failed")]
    CallbackFailed(usize),
}

/// Notification delivered to every callback bound to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvlSignal {
    /// Proxy id of the raising driver.
    pub module_id: u8,
    pub event_id: u8,
    /// Incremented by the raising driver for every signal it sends.
    pub instance: u8,
    pub payload: u8,
}

/// Subscriber to a driver's events.
///
/// Callbacks run synchronously inside the raise, so a subscriber may answer a
/// request (for example a sensor reading) before the raising call returns.
pub trait EvlCallback {
    fn on_event(&self, signal: &EvlSignal) -> Result<(), EvlError>;
}

type Bindings<'a> = [Option<&'a dyn EvlCallback>; EVL_MAX_BINDINGS];

/// Fan-out list owned by one driver.
pub struct EvlRecord<'a> {
    bindings: Mutex<NoopRawMutex, RefCell<Bindings<'a>>>,
}

impl Default for EvlRecord<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> EvlRecord<'a> {
    pub const fn new() -> Self {
        Self {
            bindings: Mutex::new(RefCell::new([None; EVL_MAX_BINDINGS])),
        }
    }

    pub fn bind(&self, callback: &'a dyn EvlCallback) -> Result<(), EvlError> {
        self.bindings.lock(|b| {
            let mut bindings = b.borrow_mut();
            let slot = bindings
                .iter_mut()
                .find(|s| s.is_none())
                .ok_or(EvlError::BindingsFull(EVL_MAX_BINDINGS))?;
            *slot = Some(callback);
            Ok(())
        })
    }

    pub fn binding_count(&self) -> usize {
        self.bindings
            .lock(|b| b.borrow().iter().filter(|s| s.is_some()).count())
    }

    /// Calls every bound callback in binding order. All callbacks run even if
    /// an earlier one fails.
    pub fn raise(&self, signal: &EvlSignal) -> Result<(), EvlError> {
        // Copied out so callbacks can bind or raise without a borrow conflict.
        let bindings = self.bindings.lock(|b| *b.borrow());

        let mut failed = 0;
        for callback in bindings.iter().flatten() {
            if let Err(e) = callback.on_event(signal) {
                warn!(
                    "EVL: callback failed for module {} event {}: {}",
                    signal.module_id, signal.event_id, e
                );
                failed += 1;
            }
        }
        debug!(
            "EVL: module {} raised event {} instance {}",
            signal.module_id, signal.event_id, signal.instance
        );

        if failed > 0 {
            Err(EvlError::CallbackFailed(failed))
        } else {
            Ok(())
        }
    }
}
