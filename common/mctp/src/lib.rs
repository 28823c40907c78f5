// Licensed under the Apache-2.0 license

//! MCTP wire types for the SMBus/I2C binding: the physical plus transport
//! frame header and the MCTP control message formats.

#![cfg_attr(target_arch = "riscv32", no_std)]

pub mod base_protocol;
pub mod control_msg;
