use serde::{Deserialize, Serialize};

use crate::condition::{CueLocation, CuingTask, LineMotion, RequirementKind, Side, Task, TrialConditions};

/// What the participant did, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Response {
    Key { side: Side },
    Scale { value: f64 },
    None,
}

/// Recorded result per trial, handed to the data logger as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub block_num: usize,
    pub trial_num: usize,
    pub practice: bool,
    pub cuing_task: CuingTask,
    pub task_requirement: RequirementKind,
    pub cue_location: CueLocation,
    pub target_location: Option<Side>,
    pub line_motion: Option<LineMotion>,
    pub response: Response,
    /// Milliseconds from target (or scale) onset; -1 when there was no response.
    pub rt_ms: f64,
    pub correct: Option<bool>,
    /// Worst lateness of a phase's first frame relative to its schedule.
    pub max_phase_lag_ms: f64,
}

impl TrialResult {
    pub fn new(block_num: usize, trial_num: usize, practice: bool, conditions: &TrialConditions) -> Self {
        let (target_location, line_motion) = match conditions.task {
            Task::Detection { target } => (Some(target), None),
            Task::LineMotion { motion } => (None, Some(motion)),
        };
        Self {
            block_num,
            trial_num,
            practice,
            cuing_task: conditions.cuing,
            task_requirement: conditions.task.kind(),
            cue_location: conditions.cue,
            target_location,
            line_motion,
            response: Response::None,
            rt_ms: -1.0,
            correct: None,
            max_phase_lag_ms: 0.0,
        }
    }

    pub fn responded(&self) -> bool {
        !matches!(self.response, Response::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_condition_labels() {
        let conditions = TrialConditions {
            cuing: CuingTask::Gaze,
            cue: CueLocation::Neutral,
            task: Task::LineMotion {
                motion: LineMotion::RealLeftward,
            },
        };
        let mut result = TrialResult::new(2, 7, false, &conditions);
        result.response = Response::Scale { value: 0.25 };
        result.rt_ms = 812.5;

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["cuing_task"], "gaze");
        assert_eq!(json["task_requirement"], "line_motion");
        assert_eq!(json["line_motion"], "real_leftward");
        assert_eq!(json["target_location"], serde_json::Value::Null);
        assert_eq!(json["response"]["kind"], "scale");
        assert_eq!(json["response"]["value"], 0.25);
    }

    #[test]
    fn fresh_result_has_no_response() {
        let conditions = TrialConditions {
            cuing: CuingTask::Exogenous,
            cue: CueLocation::Left,
            task: Task::Detection { target: Side::Left },
        };
        let result = TrialResult::new(1, 1, true, &conditions);
        assert!(!result.responded());
        assert_eq!(result.rt_ms, -1.0);
        assert_eq!(result.target_location, Some(Side::Left));
    }
}
