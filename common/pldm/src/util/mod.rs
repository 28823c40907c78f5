// Licensed under the Apache-2.0 license

pub mod crc;
pub mod mctp_transport;
