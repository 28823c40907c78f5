// Licensed under the Apache-2.0 license

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod cmd_interface;
pub mod config;
pub mod control_context;
pub mod error;
pub mod pdr_repo;
pub mod platform_context;
pub mod sensor_ops;
pub mod transfer;
pub mod transport;
