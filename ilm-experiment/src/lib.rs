//! Session logic for the gaze and line-motion cuing experiment: trial
//! construction, the rating scale and the runner that ties them to a host.

pub mod config;
pub mod results;
pub mod scale;
pub mod state;
pub mod trial;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, ExperimentConfig, StimulusConfig, TimingConfig};
pub use results::{JsonResultWriter, ResultSink};
pub use scale::{FrameCallback, ScaleError, ScaleListener, ScaleResponse};
pub use state::{ExperimentRunner, RunOutcome, SessionSummary};
pub use trial::{StimulusLayout, TrialPhase, TrialPlan};
