use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// -1 for left, +1 for right.
    pub fn sign(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

/// How attention is cued before the task display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CuingTask {
    /// Peripheral flash at a probe location.
    Exogenous,
    /// Central face whose eyes look to one side.
    Gaze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueLocation {
    Left,
    Right,
    Neutral,
}

impl CueLocation {
    pub const ALL: [CueLocation; 3] = [CueLocation::Left, CueLocation::Right, CueLocation::Neutral];

    pub fn side(self) -> Option<Side> {
        match self {
            CueLocation::Left => Some(Side::Left),
            CueLocation::Right => Some(Side::Right),
            CueLocation::Neutral => None,
        }
    }

    /// Whether a flash or gaze appears at `side` (neutral cues both sides).
    pub fn covers(self, side: Side) -> bool {
        self.side().is_none_or(|s| s == side)
    }
}

/// The line drawn between the probes in the line-motion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineMotion {
    /// Whole line in a single frame.
    Illusory,
    /// Drawn progressively from the right probe toward the left.
    RealLeftward,
    /// Drawn progressively from the left probe toward the right.
    RealRightward,
}

impl LineMotion {
    pub const ALL: [LineMotion; 3] = [
        LineMotion::Illusory,
        LineMotion::RealLeftward,
        LineMotion::RealRightward,
    ];

    /// End the line grows from, if it grows at all.
    pub fn origin(self) -> Option<Side> {
        match self {
            LineMotion::Illusory => None,
            LineMotion::RealLeftward => Some(Side::Right),
            LineMotion::RealRightward => Some(Side::Left),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Detection,
    LineMotion,
}

/// What the participant has to do after the cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Detection { target: Side },
    LineMotion { motion: LineMotion },
}

impl Task {
    pub fn kind(&self) -> RequirementKind {
        match self {
            Task::Detection { .. } => RequirementKind::Detection,
            Task::LineMotion { .. } => RequirementKind::LineMotion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialConditions {
    pub cuing: CuingTask,
    pub cue: CueLocation,
    pub task: Task,
}

impl TrialConditions {
    /// Every cue/task combination for one cuing task and requirement.
    pub fn factorial(cuing: CuingTask, requirement: RequirementKind) -> Vec<TrialConditions> {
        let tasks: Vec<Task> = match requirement {
            RequirementKind::Detection => Side::ALL
                .iter()
                .map(|&target| Task::Detection { target })
                .collect(),
            RequirementKind::LineMotion => LineMotion::ALL
                .iter()
                .map(|&motion| Task::LineMotion { motion })
                .collect(),
        };
        CueLocation::ALL
            .iter()
            .flat_map(|&cue| {
                tasks.iter().map(move |&task| TrialConditions { cuing, cue, task })
            })
            .collect()
    }

    /// Cue and target on the same side.
    pub fn is_valid_cue(&self) -> Option<bool> {
        match (self.task, self.cue.side()) {
            (Task::Detection { target }, Some(cued)) => Some(cued == target),
            _ => None,
        }
    }
}
