/// Stages of a session, in running order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    Practice,
    Experiment,
    Debrief,
}

impl SessionPhase {
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome => Practice,
            Practice => Experiment,
            Experiment => Debrief,
            Debrief => return None,
        })
    }

    /// Practice and experiment trials are both run, only the latter count.
    pub fn runs_trials(&self) -> bool {
        matches!(self, Self::Practice | Self::Experiment)
    }

    pub fn is_practice(&self) -> bool {
        matches!(self, Self::Practice)
    }
}
