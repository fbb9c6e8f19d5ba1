use std::ops::ControlFlow;

use tracing::debug;

use crate::error::{TimelineError, TimelineResult};
use crate::schedule::{PhaseSchedule, PhaseState};
use crate::timer::Timer;

/// Elapsed time since trial onset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialClock {
    onset_ms: f64,
}

impl TrialClock {
    pub fn start<T: Timer>(timer: &T) -> Self {
        Self {
            onset_ms: timer.now_ms(),
        }
    }

    pub fn reset<T: Timer>(&mut self, timer: &T) {
        self.onset_ms = timer.now_ms();
    }

    /// Absolute timer time of the onset.
    pub fn onset_ms(&self) -> f64 {
        self.onset_ms
    }

    pub fn elapsed_ms<T: Timer>(&self, timer: &T) -> f64 {
        timer.elapsed_ms(self.onset_ms)
    }
}

/// First rendered frame of a phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOnset {
    pub name: String,
    pub scheduled_ms: f64,
    pub actual_ms: f64,
}

impl PhaseOnset {
    /// How late the first frame of the phase came.
    pub fn lag_ms(&self) -> f64 {
        self.actual_ms - self.scheduled_ms
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriveOutcome {
    pub elapsed_ms: f64,
    pub frames: usize,
    pub onsets: Vec<PhaseOnset>,
    /// True when the frame callback stopped the loop before the last boundary.
    pub interrupted: bool,
}

/// Answers "which phase is active" against a trial clock and drives
/// per-frame rendering until the schedule runs out.
///
/// There is no fixed tick: elapsed time is re-read on every query, so a
/// boundary is seen on the first frame after it is reached.
#[derive(Debug)]
pub struct TimelineController<T: Timer> {
    timer: T,
    schedule: Option<PhaseSchedule>,
    clock: TrialClock,
}

impl<T: Timer> TimelineController<T> {
    pub fn new(timer: T) -> Self {
        let clock = TrialClock::start(&timer);
        Self {
            timer,
            schedule: None,
            clock,
        }
    }

    /// Installs the schedule for the current trial and restarts the clock.
    pub fn register(&mut self, schedule: PhaseSchedule) {
        debug!(phases = schedule.len(), end_ms = schedule.end_ms(), "timeline registered");
        self.schedule = Some(schedule);
        self.clock.reset(&self.timer);
    }

    /// Validates absolute `(name, offset_ms)` pairs and registers them.
    pub fn register_entries<I, S>(&mut self, entries: I) -> TimelineResult<()>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let schedule = PhaseSchedule::new(entries)?;
        self.register(schedule);
        Ok(())
    }

    pub fn schedule(&self) -> TimelineResult<&PhaseSchedule> {
        self.schedule.as_ref().ok_or(TimelineError::NotRegistered)
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn clock(&self) -> &TrialClock {
        &self.clock
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.clock.elapsed_ms(&self.timer)
    }

    /// Absolute timer time at which `name` starts.
    pub fn onset_ms(&self, name: &str) -> TimelineResult<f64> {
        Ok(self.clock.onset_ms() + self.offset(name)?)
    }

    fn offset(&self, name: &str) -> TimelineResult<f64> {
        match &self.schedule {
            Some(s) => s.offset(name),
            None => Err(TimelineError::UnknownPhase(name.to_string())),
        }
    }

    /// True while elapsed time is below the offset of `name`.
    pub fn before(&self, name: &str) -> TimelineResult<bool> {
        let offset = self.offset(name)?;
        Ok(self.elapsed_ms() < offset)
    }

    pub fn after(&self, name: &str) -> TimelineResult<bool> {
        self.before(name).map(|b| !b)
    }

    /// True while elapsed time is in `[offset(a), offset(b))`.
    pub fn between(&self, a: &str, b: &str) -> TimelineResult<bool> {
        let start = self.offset(a)?;
        let end = self.offset(b)?;
        let t = self.elapsed_ms();
        Ok(start <= t && t < end)
    }

    pub fn current(&self) -> TimelineResult<PhaseState<'_>> {
        let schedule = self.schedule()?;
        Ok(schedule.phase_at(self.elapsed_ms()))
    }

    /// Calls `frame` once per loop iteration with the active phase until the
    /// final boundary is crossed or `frame` breaks.
    ///
    /// Each call is expected to render (and present) one frame; holding a
    /// phase is simply re-rendering it.
    pub fn drive<F, E>(&self, mut frame: F) -> Result<DriveOutcome, E>
    where
        F: FnMut(PhaseState<'_>) -> Result<ControlFlow<()>, E>,
        E: From<TimelineError>,
    {
        let schedule = self.schedule()?;
        let mut outcome = DriveOutcome {
            elapsed_ms: 0.0,
            frames: 0,
            onsets: Vec::with_capacity(schedule.len()),
            interrupted: false,
        };
        let mut last_index = None;

        loop {
            let elapsed = self.elapsed_ms();
            let state = schedule.phase_at(elapsed);
            outcome.elapsed_ms = elapsed;

            if let PhaseState::Active { index, name } = state {
                if last_index != Some(index) {
                    last_index = Some(index);
                    let scheduled_ms = schedule.boundaries()[index].offset_ms;
                    debug!(phase = name, scheduled_ms, actual_ms = elapsed, "phase onset");
                    outcome.onsets.push(PhaseOnset {
                        name: name.to_string(),
                        scheduled_ms,
                        actual_ms: elapsed,
                    });
                }
            }
            if state == PhaseState::AfterLast {
                return Ok(outcome);
            }

            outcome.frames += 1;
            if frame(state)?.is_break() {
                outcome.interrupted = true;
                return Ok(outcome);
            }
        }
    }
}
