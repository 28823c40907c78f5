// Licensed under the Apache-2.0 license

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod acc;
pub mod bmc;
pub mod config;
pub mod evl;
pub mod fw_if;
pub mod stats;
pub mod timer;

/// Sentinels bracketing each driver context. Every public entry point checks
/// them before trusting the rest of the context.
pub const UPPER_FIREWALL: u32 = 0xBABE_CAFE;
pub const LOWER_FIREWALL: u32 = 0xDEAD_FACE;
