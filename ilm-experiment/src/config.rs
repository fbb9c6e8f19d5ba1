use std::path::{Path, PathBuf};

use ilm_core::{CuingTask, RequirementKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Phase durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Plain fixation cross at trial start.
    pub fixation_ms: f64,
    /// X-cross (exogenous) or straight-gaze face before the cue.
    pub pre_cue_ms: f64,
    pub cue_ms: f64,
    /// Blank interval between cue offset and the task display.
    pub cue_target_isi_ms: f64,
    /// How long a detection target waits for a keypress.
    pub response_window_ms: f64,
    /// Total time the line stays on screen.
    pub line_ms: f64,
    /// Part of `line_ms` spent drawing a real-motion line.
    pub line_draw_ms: f64,
    pub line_segments: usize,
    /// No timeout when unset.
    pub rating_timeout_ms: Option<f64>,
    pub inter_trial_ms: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fixation_ms: 1000.0,
            pre_cue_ms: 400.0,
            cue_ms: 100.0,
            cue_target_isi_ms: 50.0,
            response_window_ms: 2000.0,
            line_ms: 500.0,
            line_draw_ms: 100.0,
            line_segments: 5,
            rating_timeout_ms: None,
            inter_trial_ms: 1000.0,
        }
    }
}

/// Stimulus sizes in degrees of visual angle, line widths in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub cross_deg: f64,
    pub cross_thickness_px: f64,
    pub probe_deg: f64,
    pub inner_probe_deg: f64,
    pub target_deg: f64,
    pub probe_horizontal_offset_deg: f64,
    pub probe_vertical_offset_deg: f64,
    pub face_deg: f64,
    pub line_thickness_px: f64,
    pub scale_width_deg: f64,
    pub scale_height_deg: f64,
    pub scale_vertical_offset_deg: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            cross_deg: 0.57,
            cross_thickness_px: 3.0,
            probe_deg: 0.57,
            inner_probe_deg: 0.4,
            target_deg: 0.23,
            probe_horizontal_offset_deg: 5.0,
            probe_vertical_offset_deg: 1.1,
            face_deg: 2.0,
            line_thickness_px: 3.0,
            scale_width_deg: 16.0,
            scale_height_deg: 0.6,
            scale_vertical_offset_deg: 4.0,
        }
    }
}

/// Experiment configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub practice_trials: usize,
    pub blocks: usize,
    /// Times each condition combination appears per block.
    pub repetitions: usize,
    pub cuing_tasks: Vec<CuingTask>,
    pub requirements: Vec<RequirementKind>,
    pub px_per_degree: f64,
    pub seed: Option<u64>,
    pub results_path: PathBuf,
    pub font_path: Option<PathBuf>,
    pub timing: TimingConfig,
    pub stimuli: StimulusConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            practice_trials: 10,
            blocks: 4,
            repetitions: 2,
            cuing_tasks: vec![CuingTask::Exogenous, CuingTask::Gaze],
            requirements: vec![RequirementKind::Detection, RequirementKind::LineMotion],
            px_per_degree: 40.0,
            seed: None,
            results_path: PathBuf::from("experiment_results.json"),
            font_path: None,
            timing: TimingConfig::default(),
            stimuli: StimulusConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.blocks == 0 || self.repetitions == 0 {
            return invalid("blocks and repetitions must be at least 1");
        }
        if self.cuing_tasks.is_empty() || self.requirements.is_empty() {
            return invalid("at least one cuing task and one requirement are needed");
        }
        if !(self.px_per_degree > 0.0) {
            return invalid("px_per_degree must be positive");
        }

        let t = &self.timing;
        let durations = [
            ("fixation_ms", t.fixation_ms),
            ("pre_cue_ms", t.pre_cue_ms),
            ("cue_ms", t.cue_ms),
            ("cue_target_isi_ms", t.cue_target_isi_ms),
            ("response_window_ms", t.response_window_ms),
            ("line_ms", t.line_ms),
            ("line_draw_ms", t.line_draw_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, v)| !(*v > 0.0)) {
            return Err(ConfigError::Invalid(format!("{name} must be positive")));
        }
        if !(t.inter_trial_ms >= 0.0) {
            return invalid("inter_trial_ms must be zero or more");
        }
        if t.line_segments == 0 {
            return invalid("line_segments must be at least 1");
        }
        if t.line_draw_ms >= t.line_ms {
            return invalid("line_draw_ms must be shorter than line_ms");
        }
        if t.rating_timeout_ms.is_some_and(|ms| !(ms > 0.0)) {
            return invalid("rating_timeout_ms must be positive when set");
        }

        let s = &self.stimuli;
        let sizes = [
            ("cross_deg", s.cross_deg),
            ("cross_thickness_px", s.cross_thickness_px),
            ("probe_deg", s.probe_deg),
            ("inner_probe_deg", s.inner_probe_deg),
            ("target_deg", s.target_deg),
            ("face_deg", s.face_deg),
            ("line_thickness_px", s.line_thickness_px),
            ("scale_width_deg", s.scale_width_deg),
            ("scale_height_deg", s.scale_height_deg),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| !(*v > 0.0)) {
            return Err(ConfigError::Invalid(format!("{name} must be positive")));
        }
        let offsets = [
            s.probe_horizontal_offset_deg,
            s.probe_vertical_offset_deg,
            s.scale_vertical_offset_deg,
        ];
        if offsets.iter().any(|v| !v.is_finite()) {
            return invalid("stimulus offsets must be finite");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{ "blocks": 2, "timing": { "cue_ms": 50 } }"#).unwrap();
        assert_eq!(config.blocks, 2);
        assert_eq!(config.timing.cue_ms, 50.0);
        assert_eq!(config.timing.fixation_ms, 1000.0);
        assert_eq!(config.stimuli.probe_deg, 0.57);
    }

    #[test]
    fn rejects_line_draw_longer_than_line() {
        let mut config = ExperimentConfig::default();
        config.timing.line_draw_ms = 600.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_durations() {
        let mut config = ExperimentConfig::default();
        config.timing.cue_ms = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cue_ms"));
    }

    #[test]
    fn rejects_nan_inter_trial_interval() {
        let mut config = ExperimentConfig::default();
        config.timing.inter_trial_ms = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.timing.inter_trial_ms = 0.0;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_width_scale_up_front() {
        let mut config = ExperimentConfig::default();
        config.stimuli.scale_width_deg = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scale_width_deg"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ExperimentConfig::load("/nonexistent/ilm.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ilm.json"));
    }
}
