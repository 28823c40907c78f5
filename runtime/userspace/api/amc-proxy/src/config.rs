// Licensed under the Apache-2.0 license

/// Largest frame body read from the BMC interface in one go.
pub const BMC_RX_BUF_SIZE: usize = 256;

pub const BMC_TASK_PERIOD_MS: u32 = 10;

pub const BMC_READ_TIMEOUT_MS: u32 = 100;

pub const BMC_WRITE_TIMEOUT_MS: u32 = 100;

/// Sensors the clock shutdown logic can be configured to watch.
pub const ACC_MAX_MONITORED_SENSORS: usize = 10;

pub const ACC_MAILBOX_DEPTH: usize = 10;

pub const ACC_TASK_PERIOD_MS: u32 = 100;

/// Subscribers per event record.
pub const EVL_MAX_BINDINGS: usize = 4;
