use crate::error::{TimelineError, TimelineResult};

/// One named boundary: the phase called `name` starts at `offset_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseBoundary {
    pub name: String,
    pub offset_ms: f64,
}

/// Which phase a given elapsed time falls in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseState<'a> {
    BeforeFirst,
    Active { index: usize, name: &'a str },
    AfterLast,
}

impl<'a> PhaseState<'a> {
    pub fn name(&self) -> Option<&'a str> {
        match self {
            PhaseState::Active { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_active(&self, phase: &str) -> bool {
        self.name() == Some(phase)
    }
}

/// Ordered phase boundaries of one trial.
///
/// Offsets are strictly increasing and names are unique. Every boundary but
/// the last opens a phase that lasts until the next boundary; the last one
/// marks the end of the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSchedule {
    boundaries: Vec<PhaseBoundary>,
}

impl PhaseSchedule {
    /// Builds a schedule from absolute `(name, offset_ms)` pairs, in order.
    pub fn new<I, S>(entries: I) -> TimelineResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut boundaries: Vec<PhaseBoundary> = Vec::new();
        for (name, offset_ms) in entries {
            let name = name.into();
            if !offset_ms.is_finite() || offset_ms < 0.0 {
                return Err(TimelineError::NegativeOffset { name, offset_ms });
            }
            if boundaries.iter().any(|b| b.name == name) {
                return Err(TimelineError::DuplicatePhase(name));
            }
            if let Some(prev) = boundaries.last() {
                if offset_ms <= prev.offset_ms {
                    return Err(TimelineError::NonMonotonic {
                        name,
                        offset_ms,
                        previous_ms: prev.offset_ms,
                    });
                }
            }
            boundaries.push(PhaseBoundary { name, offset_ms });
        }
        if boundaries.is_empty() {
            return Err(TimelineError::EmptySchedule);
        }
        Ok(Self { boundaries })
    }

    /// Builds a schedule from `(name, delta_ms)` pairs, each delta measured
    /// from the previous boundary (the first from trial onset).
    pub fn from_deltas<I, S>(deltas: I) -> TimelineResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut at = 0.0;
        let absolute: Vec<(String, f64)> = deltas
            .into_iter()
            .map(|(name, delta)| {
                at += delta;
                (name.into(), at)
            })
            .collect();
        Self::new(absolute)
    }

    pub fn offset(&self, name: &str) -> TimelineResult<f64> {
        self.index_of(name)
            .map(|i| self.boundaries[i].offset_ms)
            .ok_or_else(|| TimelineError::UnknownPhase(name.to_string()))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.boundaries.iter().position(|b| b.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// The phase containing `elapsed_ms`. Boundary instants belong to the
    /// phase they open.
    pub fn phase_at(&self, elapsed_ms: f64) -> PhaseState<'_> {
        let started = self
            .boundaries
            .partition_point(|b| b.offset_ms <= elapsed_ms);
        match started {
            0 => PhaseState::BeforeFirst,
            n if n == self.boundaries.len() => PhaseState::AfterLast,
            n => PhaseState::Active {
                index: n - 1,
                name: &self.boundaries[n - 1].name,
            },
        }
    }

    pub fn boundaries(&self) -> &[PhaseBoundary] {
        &self.boundaries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.boundaries.iter().map(|b| b.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Offset of the final boundary.
    pub fn end_ms(&self) -> f64 {
        self.boundaries.last().map_or(0.0, |b| b.offset_ms)
    }
}
