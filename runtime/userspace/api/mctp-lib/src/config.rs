// Licensed under the Apache-2.0 license

use mctp_common::base_protocol::{MCTP_BASELINE_TRANSMISSION_UNIT, MCTP_FRAME_HDR_LEN};

/// Payload bytes carried by each outgoing fragment.
pub const MCTP_MAX_FRAGMENT_PAYLOAD: usize = MCTP_BASELINE_TRANSMISSION_UNIT;
pub const MCTP_MAX_FRAME_LEN: usize = MCTP_FRAME_HDR_LEN + MCTP_MAX_FRAGMENT_PAYLOAD;

/// Capacity of a reassembled message, message-type byte included.
pub const MCTP_STAGING_BUF_SIZE: usize = 1024;

/// Concurrent multi-packet messages, one per source endpoint.
pub const MCTP_MAX_REASSEMBLY_SESSIONS: usize = 4;

pub const MCTP_FRAGMENT_DELAY_MS: u32 = 10;

/// 7-bit SMBus address the management controller answers on.
pub const MCTP_LOCAL_SLAVE_ADDR: u8 = 0x18;
