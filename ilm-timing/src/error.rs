use thiserror::Error;

pub type TimelineResult<T> = Result<T, TimelineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error("phase schedule is empty")]
    EmptySchedule,

    #[error("phase `{name}` has invalid offset {offset_ms} ms")]
    NegativeOffset { name: String, offset_ms: f64 },

    #[error("phase `{name}` at {offset_ms} ms does not come after {previous_ms} ms")]
    NonMonotonic {
        name: String,
        offset_ms: f64,
        previous_ms: f64,
    },

    #[error("phase `{0}` appears more than once")]
    DuplicatePhase(String),

    #[error("phase `{0}` is not registered")]
    UnknownPhase(String),

    #[error("no phase schedule registered")]
    NotRegistered,
}

impl TimelineError {
    /// Malformed schedule, as opposed to a lookup of a missing phase.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptySchedule
                | Self::NegativeOffset { .. }
                | Self::NonMonotonic { .. }
                | Self::DuplicatePhase(_)
        )
    }
}
