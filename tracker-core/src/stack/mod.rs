//! Stack margin monitoring for the orchestrator task.

use crate::devices::StackGauge;

/// Previous-reading sentinel so the first sample is always reported.
pub const UNKNOWN_WATERMARK: u32 = u32::MAX;

/// Watermark change reported by [`StackMonitor::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StackReport {
    pub task: &'static str,
    pub remaining_bytes: u32,
}

/// Change filter around a [`StackGauge`].
///
/// Purely diagnostic: the orchestrator logs the reports and never branches
/// on them.
pub struct StackMonitor<P> {
    gauge: P,
    last_remaining: u32,
}

impl<P: StackGauge> StackMonitor<P> {
    pub const fn new(gauge: P) -> Self {
        Self {
            gauge,
            last_remaining: UNKNOWN_WATERMARK,
        }
    }

    /// Reads the gauge and returns a report only when the margin changed.
    pub fn poll(&mut self) -> Option<StackReport> {
        let current = self.gauge.remaining_stack();
        if current == self.last_remaining {
            return None;
        }

        self.last_remaining = current;
        Some(StackReport {
            task: self.gauge.task_name(),
            remaining_bytes: current,
        })
    }

    /// Last observed margin, if any reading has been taken.
    pub fn watermark(&self) -> Option<u32> {
        match self.last_remaining {
            UNKNOWN_WATERMARK => None,
            value => Some(value),
        }
    }

    pub fn gauge(&self) -> &P {
        &self.gauge
    }

    pub fn gauge_mut(&mut self) -> &mut P {
        &mut self.gauge
    }
}
