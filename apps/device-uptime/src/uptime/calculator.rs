use super::types::Percent;
use std::num::NonZeroU32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UptimeSplit {
    pub uptime: Percent,
    pub downtime: Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UptimeCalculator {
    threshold: NonZeroU32,
}

impl UptimeCalculator {
    pub fn new(threshold: NonZeroU32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> NonZeroU32 {
        self.threshold
    }

    /// Full credit once `data_points` reaches the threshold, otherwise the
    /// observed fraction of it.
    pub fn calculate(&self, data_points: u32) -> UptimeSplit {
        let threshold = self.threshold.get();
        let uptime = if data_points >= threshold {
            Percent::FULL
        } else {
            Percent::new((data_points as f64 / threshold as f64) * 100.0)
        };
        UptimeSplit {
            uptime,
            downtime: uptime.complement(),
        }
    }
}
