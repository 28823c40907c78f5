// Licensed under the Apache-2.0 license

use core::marker::PhantomData;
use log::info;
use strum::IntoEnumIterator;

/// Health of a driver as reported to the rest of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Init,
    Ok,
    Error,
}

/// A fieldless enum naming one counter slot.
pub trait CounterId: Copy + IntoEnumIterator + Into<&'static str> {
    fn index(self) -> usize;
}

#[macro_export]
macro_rules! counter_id {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::stats::CounterId for $ty {
                fn index(self) -> usize {
                    self as usize
                }
            }
        )+
    };
}

/// Statistic and error counters of one driver. `NS` and `NE` are the variant
/// counts of `S` and `E`.
pub struct Counters<S: CounterId, E: CounterId, const NS: usize, const NE: usize> {
    stats: [u32; NS],
    errors: [u32; NE],
    _ids: PhantomData<(S, E)>,
}

impl<S: CounterId, E: CounterId, const NS: usize, const NE: usize> Default
    for Counters<S, E, NS, NE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CounterId, E: CounterId, const NS: usize, const NE: usize> Counters<S, E, NS, NE> {
    pub const fn new() -> Self {
        Self {
            stats: [0; NS],
            errors: [0; NE],
            _ids: PhantomData,
        }
    }

    pub fn inc_stat(&mut self, stat: S) {
        if let Some(c) = self.stats.get_mut(stat.index()) {
            *c = c.wrapping_add(1);
        }
    }

    pub fn add_stat(&mut self, stat: S, value: u32) {
        if let Some(c) = self.stats.get_mut(stat.index()) {
            *c = c.wrapping_add(value);
        }
    }

    pub fn inc_error(&mut self, error: E) {
        if let Some(c) = self.errors.get_mut(error.index()) {
            *c = c.wrapping_add(1);
        }
    }

    pub fn stat(&self, stat: S) -> u32 {
        self.stats.get(stat.index()).copied().unwrap_or(0)
    }

    pub fn error(&self, error: E) -> u32 {
        self.errors.get(error.index()).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.stats = [0; NS];
        self.errors = [0; NE];
    }

    /// Dumps every counter at info level.
    pub fn log(&self, name: &str) {
        info!("============================================================");
        info!("{} Statistics:", name);
        for stat in S::iter() {
            let label: &'static str = stat.into();
            info!("{:>50} . . . . {}", label, self.stat(stat));
        }
        info!("------------------------------------------------------------");
        info!("{} Errors:", name);
        for error in E::iter() {
            let label: &'static str = error.into();
            info!("{:>50} . . . . {}", label, self.error(error));
        }
        info!("============================================================");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::EnumCount;
    use strum_macros::{EnumCount, EnumIter, IntoStaticStr};

    #[derive(Debug, Clone, Copy, EnumIter, EnumCount, IntoStaticStr)]
    enum TestStat {
        Polls,
        TimeMs,
    }

    #[derive(Debug, Clone, Copy, EnumIter, EnumCount, IntoStaticStr)]
    enum TestError {
        ReadFailed,
    }

    counter_id!(TestStat, TestError);

    type TestCounters = Counters<TestStat, TestError, { TestStat::COUNT }, { TestError::COUNT }>;

    #[test]
    fn test_counting_and_clear() {
        let mut counters = TestCounters::new();
        counters.inc_stat(TestStat::Polls);
        counters.inc_stat(TestStat::Polls);
        counters.add_stat(TestStat::TimeMs, 25);
        counters.inc_error(TestError::ReadFailed);
        counters.log("TEST");

        assert_eq!(counters.stat(TestStat::Polls), 2);
        assert_eq!(counters.stat(TestStat::TimeMs), 25);
        assert_eq!(counters.error(TestError::ReadFailed), 1);

        counters.clear();
        assert_eq!(counters.stat(TestStat::Polls), 0);
        assert_eq!(counters.error(TestError::ReadFailed), 0);
    }
}
