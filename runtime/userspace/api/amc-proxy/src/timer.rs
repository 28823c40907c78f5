// Licensed under the Apache-2.0 license

extern crate alloc;

use alloc::boxed::Box;
use async_trait::async_trait;

/// Uptime and sleep source for the driver tasks.
#[async_trait(?Send)]
pub trait Timer {
    fn now_ms(&self) -> u64;

    async fn sleep_ms(&self, ms: u32);
}

/// Milliseconds elapsed since `start_ms`, clamped to the counter width.
pub fn elapsed_ms(timer: &dyn Timer, start_ms: u64) -> u32 {
    timer.now_ms().saturating_sub(start_ms).min(u32::MAX as u64) as u32
}
