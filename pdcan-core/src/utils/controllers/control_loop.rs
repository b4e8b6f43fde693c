//! Fixed-period control loop and the state it shares with the main polling loop.
//!
//! The loop is the only writer of drive power and the only producer of power
//! reports. The main loop is the only writer of targets and measured speeds and
//! the only consumer of reports. Reports are handed over through a one-slot
//! [`Signal`]: a new report overwrites an unsent one, and taking it clears the
//! pending state.

use core::cell::RefCell;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    signal::Signal,
};
use embassy_time::{Duration, Instant, Timer};

use super::motor_bank::{MotorBank, PowerReport};
use crate::utils::math::pd::PdGains;

/// Motor bank plus the pending power report, shared by both execution contexts.
pub struct ControlShared {
    bank: Mutex<CriticalSectionRawMutex, RefCell<MotorBank>>,
    pending: Signal<CriticalSectionRawMutex, PowerReport>,
}

impl ControlShared {
    pub const fn new(gains: PdGains) -> Self {
        Self {
            bank: Mutex::new(RefCell::new(MotorBank::new(gains))),
            pending: Signal::new(),
        }
    }

    /// Run `f` with exclusive access to the bank inside a critical section.
    pub fn with_bank<R>(&self, f: impl FnOnce(&mut MotorBank) -> R) -> R {
        self.bank.lock(|bank| f(&mut bank.borrow_mut()))
    }

    /// Whether a report is waiting to be sent.
    pub fn output_pending(&self) -> bool {
        self.pending.signaled()
    }

    /// Take the pending report, clearing the pending state.
    pub fn take_report(&self) -> Option<PowerReport> {
        self.pending.try_take()
    }

    fn publish(&self, report: PowerReport) {
        self.pending.signal(report);
    }
}

/// Counters kept by the control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u32,
    /// Periods that passed without a tick because the task woke late.
    pub skipped: u32,
}

/// Drives [`MotorBank::update_all`] at a fixed period.
pub struct ControlLoop<'a> {
    shared: &'a ControlShared,
    period: Duration,
    stats: LoopStats,
}

impl<'a> ControlLoop<'a> {
    pub fn new(shared: &'a ControlShared, period: Duration) -> Self {
        Self {
            shared,
            period,
            stats: LoopStats::default(),
        }
    }

    /// Run one control step and raise the output-pending signal.
    pub fn tick(&mut self) -> PowerReport {
        let report = self.shared.with_bank(|bank| {
            bank.update_all();
            bank.powers()
        });
        self.shared.publish(report);
        self.stats.ticks = self.stats.ticks.wrapping_add(1);
        report
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Tick forever.
    ///
    /// A late wake runs a single tick and re-anchors the schedule to the current
    /// time; missed periods are counted, never replayed.
    pub async fn run(mut self) -> ! {
        tracing::info!(period_ms = self.period.as_millis(), "control loop started");
        let mut deadline = Instant::now() + self.period;
        loop {
            Timer::at(deadline).await;
            self.tick();

            let (next, skipped) = schedule_next(deadline, Instant::now(), self.period);
            if skipped > 0 {
                self.stats.skipped = self.stats.skipped.saturating_add(skipped as u32);
                tracing::warn!(skipped, "control loop overran its period");
            }
            deadline = next;
        }
    }
}

/// Compute the next deadline after the tick due at `deadline` ran at `now`.
///
/// Returns the deadline and the number of whole periods that were skipped.
fn schedule_next(deadline: Instant, now: Instant, period: Duration) -> (Instant, u64) {
    let next = deadline + period;
    if next > now {
        return (next, 0);
    }
    let late = now - next;
    let skipped = late.as_ticks() / period.as_ticks().max(1) + 1;
    (now + period, skipped)
}
