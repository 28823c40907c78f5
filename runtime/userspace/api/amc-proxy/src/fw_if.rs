// Licensed under the Apache-2.0 license

extern crate alloc;

use alloc::boxed::Box;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FwIfError {
    #[error("Interface not open")]
    NotOpen,
    #[error("Open failed")]
    OpenFailed,
    #[error("Timed out")]
    Timeout,
    #[error("Read failed")]
    ReadFailed,
    #[error("Write failed")]
    WriteFailed,
    #[error("Buffer too small")]
    BufferTooSmall,
}

/// Byte pipe to the BMC, typically an SMBus target.
#[async_trait(?Send)]
pub trait FwIf {
    async fn open(&self) -> Result<(), FwIfError>;

    /// Reads one received message into `buf` and returns its length.
    /// `Ok(0)` and `Err(FwIfError::Timeout)` both mean nothing arrived.
    async fn read(&self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, FwIfError>;

    /// Writes `data` to the device at `addr`. Returns the bytes written.
    async fn write(&self, addr: u64, data: &[u8], timeout_ms: u32) -> Result<usize, FwIfError>;
}
