//! Timing primitives for frame-paced trials: a monotonic millisecond timer,
//! named phase schedules and the timeline controller that sequences them.

pub mod error;
pub mod schedule;
pub mod timeline;
pub mod timer;

pub use error::{TimelineError, TimelineResult};
pub use schedule::{PhaseBoundary, PhaseSchedule, PhaseState};
pub use timeline::{DriveOutcome, PhaseOnset, TimelineController, TrialClock};
pub use timer::{FrameStats, HighPrecisionTimer, ManualTimer, Timer};
