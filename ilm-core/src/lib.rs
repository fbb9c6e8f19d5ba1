pub mod condition;
pub mod geometry;
pub mod host;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use condition::{CueLocation, CuingTask, LineMotion, RequirementKind, Side, Task, TrialConditions};
pub use geometry::{Boundary, Point, Rectangle, ScreenGeometry};
pub use host::{Display, Host, InputEvent, Key, PointerHost};
pub use phase::SessionPhase;
pub use stimulus::{Gaze, Rgba, Scene, SceneElement};
pub use trial::{Response, TrialResult};
