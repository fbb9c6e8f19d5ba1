use ilm_core::stimulus::{BLACK, GREY, WHITE};
use ilm_core::{
    CuingTask, Gaze, LineMotion, Point, Rectangle, Scene, SceneElement,
    ScreenGeometry, Side, Task, TrialConditions,
};
use ilm_timing::{PhaseSchedule, TimelineResult};

use crate::config::{StimulusConfig, TimingConfig};

pub const FIXATION: &str = "fixation";
pub const X_CROSS_ON: &str = "x_cross_on";
pub const FACE_ON: &str = "face_on";
pub const CUE_ONSET: &str = "cue_onset";
pub const CUE_OFFSET: &str = "cue_offset";
pub const TARGET_ONSET: &str = "target_onset";
pub const RESPONSE_DEADLINE: &str = "response_deadline";
pub const LINE_ONSET: &str = "line_onset";
pub const LINE_COMPLETE: &str = "line_complete";
pub const LINE_OFFSET: &str = "line_offset";

/// What is on screen during one phase of a trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialPhase {
    Fixation,
    PreCue,
    Cue,
    CueOffset,
    Target,
    /// `drawn` of `segments` pieces of the line are visible.
    Line { drawn: usize, segments: usize },
}

/// Schedule and per-phase displays for one trial.
#[derive(Debug, Clone)]
pub struct TrialPlan {
    pub conditions: TrialConditions,
    pub schedule: PhaseSchedule,
    /// Display for each schedule boundary except the closing one.
    pub phases: Vec<TrialPhase>,
}

impl TrialPlan {
    pub fn new(conditions: TrialConditions, timing: &TimingConfig) -> TimelineResult<Self> {
        let pre_cue = match conditions.cuing {
            CuingTask::Exogenous => X_CROSS_ON,
            CuingTask::Gaze => FACE_ON,
        };
        let mut deltas: Vec<(String, f64)> = vec![
            (FIXATION.into(), 0.0),
            (pre_cue.into(), timing.fixation_ms),
            (CUE_ONSET.into(), timing.pre_cue_ms),
            (CUE_OFFSET.into(), timing.cue_ms),
        ];
        let mut phases = vec![
            TrialPhase::Fixation,
            TrialPhase::PreCue,
            TrialPhase::Cue,
            TrialPhase::CueOffset,
        ];

        match conditions.task {
            Task::Detection { .. } => {
                deltas.push((TARGET_ONSET.into(), timing.cue_target_isi_ms));
                deltas.push((RESPONSE_DEADLINE.into(), timing.response_window_ms));
                phases.push(TrialPhase::Target);
            }
            Task::LineMotion { motion } => {
                let segments = timing.line_segments;
                match motion {
                    LineMotion::Illusory => {
                        deltas.push((LINE_ONSET.into(), timing.cue_target_isi_ms));
                        deltas.push((LINE_OFFSET.into(), timing.line_ms));
                        phases.push(TrialPhase::Line {
                            drawn: segments,
                            segments,
                        });
                    }
                    LineMotion::RealLeftward | LineMotion::RealRightward => {
                        let step = timing.line_draw_ms / segments as f64;
                        for k in 1..=segments {
                            let delta = if k == 1 { timing.cue_target_isi_ms } else { step };
                            deltas.push((format!("line_segment_{k}"), delta));
                            phases.push(TrialPhase::Line { drawn: k, segments });
                        }
                        deltas.push((LINE_COMPLETE.into(), step));
                        deltas.push((LINE_OFFSET.into(), timing.line_ms - timing.line_draw_ms));
                        phases.push(TrialPhase::Line {
                            drawn: segments,
                            segments,
                        });
                    }
                }
            }
        }

        let schedule = PhaseSchedule::from_deltas(deltas)?;
        debug_assert_eq!(schedule.len(), phases.len() + 1);
        Ok(Self {
            conditions,
            schedule,
            phases,
        })
    }

    pub fn phase(&self, index: usize) -> Option<TrialPhase> {
        self.phases.get(index).copied()
    }
}

/// Stimulus positions and sizes in pixels for a given screen.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusLayout {
    pub center: Point,
    pub cross_size: f64,
    pub cross_thickness: f64,
    pub probe_diameter: f64,
    pub inner_diameter: f64,
    pub target_diameter: f64,
    pub face_diameter: f64,
    pub line_thickness: f64,
    pub left_probe: Point,
    pub right_probe: Point,
    pub scale: Rectangle,
}

impl StimulusLayout {
    pub fn new(screen: &ScreenGeometry, stimuli: &StimulusConfig) -> Self {
        let center = screen.center();
        let dx = screen.deg_to_px(stimuli.probe_horizontal_offset_deg);
        let dy = screen.deg_to_px(stimuli.probe_vertical_offset_deg);
        let scale_center = center.offset(0.0, screen.deg_to_px(stimuli.scale_vertical_offset_deg));
        Self {
            center,
            cross_size: screen.deg_to_px(stimuli.cross_deg),
            cross_thickness: stimuli.cross_thickness_px,
            probe_diameter: screen.deg_to_px(stimuli.probe_deg),
            inner_diameter: screen.deg_to_px(stimuli.inner_probe_deg),
            target_diameter: screen.deg_to_px(stimuli.target_deg),
            face_diameter: screen.deg_to_px(stimuli.face_deg),
            line_thickness: stimuli.line_thickness_px,
            left_probe: center.offset(-dx, -dy),
            right_probe: center.offset(dx, -dy),
            scale: Rectangle::centered(
                scale_center,
                screen.deg_to_px(stimuli.scale_width_deg),
                screen.deg_to_px(stimuli.scale_height_deg),
            ),
        }
    }

    pub fn probe(&self, side: Side) -> Point {
        match side {
            Side::Left => self.left_probe,
            Side::Right => self.right_probe,
        }
    }

    /// Frame for `phase` of a trial with `conditions`.
    pub fn scene(&self, conditions: &TrialConditions, phase: TrialPhase) -> Scene {
        let mut scene = Scene::new(BLACK);
        let cue = conditions.cue;

        // central mark
        match (conditions.cuing, phase) {
            (_, TrialPhase::Fixation) => self.push_cross(&mut scene, false),
            (CuingTask::Exogenous, _) => self.push_cross(&mut scene, true),
            (CuingTask::Gaze, TrialPhase::PreCue) => self.push_face(&mut scene, Gaze::Straight),
            (CuingTask::Gaze, _) => {
                let gaze = cue.side().map_or(Gaze::Straight, Gaze::Averted);
                self.push_face(&mut scene, gaze)
            }
        }

        // an exogenous cue replaces the outer ring of the cued probe
        let flashing = |side: Side| {
            conditions.cuing == CuingTask::Exogenous && phase == TrialPhase::Cue && cue.covers(side)
        };
        for side in Side::ALL {
            if !flashing(side) {
                self.push_outer_probe(&mut scene, side);
            }
        }
        for side in Side::ALL {
            self.push_inner_probe(&mut scene, side);
        }
        for side in Side::ALL {
            if flashing(side) {
                scene.push(SceneElement::Circle {
                    at: self.probe(side),
                    diameter: self.probe_diameter,
                    fill: WHITE,
                    stroke: Some((2.0, WHITE)),
                });
            }
        }

        match (conditions.task, phase) {
            (Task::Detection { target }, TrialPhase::Target) => {
                scene.push(SceneElement::Circle {
                    at: self.probe(target),
                    diameter: self.target_diameter,
                    fill: WHITE,
                    stroke: Some((1.0, BLACK)),
                });
            }
            (Task::LineMotion { motion }, TrialPhase::Line { drawn, segments }) => {
                let (from, to) = self.line_extent(motion, drawn, segments);
                scene.push(SceneElement::Line {
                    from,
                    to,
                    thickness: self.line_thickness,
                    color: WHITE,
                });
            }
            _ => {}
        }

        scene
    }

    /// Visible part of the line after `drawn` of `segments` pieces.
    pub fn line_extent(&self, motion: LineMotion, drawn: usize, segments: usize) -> (Point, Point) {
        let (left, right) = (self.left_probe, self.right_probe);
        let frac = (drawn.min(segments) as f64) / segments.max(1) as f64;
        let length = (right.x - left.x) * frac;
        match motion.origin() {
            None => (left, right),
            Some(Side::Left) => (left, Point::new(left.x + length, left.y)),
            Some(Side::Right) => (Point::new(right.x - length, right.y), right),
        }
    }

    /// Rating display: the scale bar with end labels and a prompt.
    pub fn rating_scene(&self) -> Scene {
        let scale = self.scale;
        let label_y = scale.bottom() + 30.0;
        Scene::new(BLACK)
            .with(SceneElement::Text {
                at: self.center.offset(0.0, -60.0),
                content: "Which way did the line move?".into(),
                size: 28.0,
                color: WHITE,
            })
            .with(SceneElement::Rect {
                rect: scale,
                fill: GREY,
                stroke: Some((2.0, WHITE)),
            })
            .with(SceneElement::Line {
                from: Point::new(scale.center().x, scale.top()),
                to: Point::new(scale.center().x, scale.bottom()),
                thickness: 2.0,
                color: WHITE,
            })
            .with(SceneElement::Text {
                at: Point::new(scale.left(), label_y),
                content: "left".into(),
                size: 22.0,
                color: WHITE,
            })
            .with(SceneElement::Text {
                at: Point::new(scale.right(), label_y),
                content: "right".into(),
                size: 22.0,
                color: WHITE,
            })
    }

    /// Centered message screen.
    pub fn message_scene(&self, lines: &[&str]) -> Scene {
        let mut scene = Scene::new(BLACK);
        let top = self.center.y - (lines.len() as f64 - 1.0) * 20.0;
        for (i, line) in lines.iter().enumerate() {
            scene.push(SceneElement::Text {
                at: Point::new(self.center.x, top + i as f64 * 40.0),
                content: (*line).to_string(),
                size: 26.0,
                color: WHITE,
            });
        }
        scene
    }

    pub fn blank_scene(&self) -> Scene {
        Scene::new(BLACK)
    }

    fn push_cross(&self, scene: &mut Scene, rotated: bool) {
        let (at, size, thickness, color) = (self.center, self.cross_size, self.cross_thickness, WHITE);
        scene.push(if rotated {
            SceneElement::XCross {
                at,
                size,
                thickness,
                color,
            }
        } else {
            SceneElement::FixationCross {
                at,
                size,
                thickness,
                color,
            }
        });
    }

    fn push_face(&self, scene: &mut Scene, gaze: Gaze) {
        scene.push(SceneElement::Face {
            at: self.center,
            diameter: self.face_diameter,
            gaze,
            color: WHITE,
        });
    }

    fn push_outer_probe(&self, scene: &mut Scene, side: Side) {
        scene.push(SceneElement::Circle {
            at: self.probe(side),
            diameter: self.probe_diameter,
            fill: WHITE,
            stroke: Some((1.0, BLACK)),
        });
    }

    fn push_inner_probe(&self, scene: &mut Scene, side: Side) {
        scene.push(SceneElement::Circle {
            at: self.probe(side),
            diameter: self.inner_diameter,
            fill: GREY,
            stroke: Some((1.0, BLACK)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilm_core::{CueLocation, RequirementKind};
    use ilm_timing::PhaseState;

    fn layout() -> StimulusLayout {
        StimulusLayout::new(
            &ScreenGeometry::new(1920, 1080, 40.0),
            &StimulusConfig::default(),
        )
    }

    fn exo(cue: CueLocation, task: Task) -> TrialConditions {
        TrialConditions {
            cuing: CuingTask::Exogenous,
            cue,
            task,
        }
    }

    fn outer_probes(scene: &Scene, layout: &StimulusLayout) -> usize {
        scene
            .elements
            .iter()
            .filter(|e| {
                matches!(e, SceneElement::Circle { diameter, stroke: Some((_, BLACK)), .. }
                    if *diameter == layout.probe_diameter)
            })
            .count()
    }

    #[test]
    fn detection_schedule_uses_configured_deltas() {
        let timing = TimingConfig::default();
        let plan = TrialPlan::new(
            exo(CueLocation::Left, Task::Detection { target: Side::Right }),
            &timing,
        )
        .unwrap();
        let s = &plan.schedule;
        assert_eq!(s.offset(X_CROSS_ON).unwrap(), 1000.0);
        assert_eq!(s.offset(CUE_ONSET).unwrap(), 1400.0);
        assert_eq!(s.offset(CUE_OFFSET).unwrap(), 1500.0);
        assert_eq!(s.offset(TARGET_ONSET).unwrap(), 1550.0);
        assert_eq!(s.end_ms(), 3550.0);
        assert_eq!(s.phase_at(1600.0).name(), Some(TARGET_ONSET));
    }

    #[test]
    fn gaze_trials_show_a_face_before_the_cue() {
        let plan = TrialPlan::new(
            TrialConditions {
                cuing: CuingTask::Gaze,
                cue: CueLocation::Right,
                task: Task::Detection { target: Side::Right },
            },
            &TimingConfig::default(),
        )
        .unwrap();
        assert!(plan.schedule.contains(FACE_ON));
        assert!(!plan.schedule.contains(X_CROSS_ON));
    }

    #[test]
    fn real_motion_has_named_segments_and_keeps_total_duration() {
        let timing = TimingConfig::default();
        let plan = TrialPlan::new(
            exo(
                CueLocation::Neutral,
                Task::LineMotion {
                    motion: LineMotion::RealRightward,
                },
            ),
            &timing,
        )
        .unwrap();
        for k in 1..=timing.line_segments {
            assert!(plan.schedule.contains(&format!("line_segment_{k}")));
        }
        let onset = plan.schedule.offset("line_segment_1").unwrap();
        let offset = plan.schedule.offset(LINE_OFFSET).unwrap();
        assert!((offset - onset - timing.line_ms).abs() < 1e-9);
        assert_eq!(plan.schedule.len(), plan.phases.len() + 1);
    }

    #[test]
    fn every_default_condition_yields_a_valid_plan() {
        let timing = TimingConfig::default();
        for cuing in [CuingTask::Exogenous, CuingTask::Gaze] {
            for req in [RequirementKind::Detection, RequirementKind::LineMotion] {
                for c in TrialConditions::factorial(cuing, req) {
                    let plan = TrialPlan::new(c, &timing).unwrap();
                    assert_eq!(plan.schedule.phase_at(0.0), PhaseState::Active { index: 0, name: FIXATION });
                }
            }
        }
    }

    #[test]
    fn left_cue_replaces_only_the_left_outer_probe() {
        let layout = layout();
        let c = exo(CueLocation::Left, Task::Detection { target: Side::Left });
        let scene = layout.scene(&c, TrialPhase::Cue);
        assert_eq!(outer_probes(&scene, &layout), 1);
        let last_left = scene.circles_at(layout.left_probe).last().unwrap();
        assert!(matches!(last_left, SceneElement::Circle { stroke: Some((_, WHITE)), .. }));
        assert!(matches!(scene.elements[0], SceneElement::XCross { .. }));
    }

    #[test]
    fn neutral_cue_flashes_both_sides() {
        let layout = layout();
        let c = exo(CueLocation::Neutral, Task::Detection { target: Side::Left });
        let scene = layout.scene(&c, TrialPhase::Cue);
        // two cue discs, no plain outer probes
        let cues = scene
            .elements
            .iter()
            .filter(|e| matches!(e, SceneElement::Circle { stroke: Some((_, WHITE)), .. }))
            .count();
        assert_eq!(cues, 2);
        assert_eq!(outer_probes(&scene, &layout), 0);
    }

    #[test]
    fn target_drawn_in_target_probe() {
        let layout = layout();
        let c = exo(CueLocation::Right, Task::Detection { target: Side::Left });
        let scene = layout.scene(&c, TrialPhase::Target);
        let target = scene.elements.last().unwrap();
        assert!(matches!(target, SceneElement::Circle { at, diameter, .. }
            if *at == layout.left_probe && *diameter == layout.target_diameter));
    }

    #[test]
    fn gaze_cue_averts_the_eyes() {
        let layout = layout();
        let c = TrialConditions {
            cuing: CuingTask::Gaze,
            cue: CueLocation::Left,
            task: Task::Detection { target: Side::Left },
        };
        let scene = layout.scene(&c, TrialPhase::Cue);
        assert!(matches!(scene.elements[0], SceneElement::Face { gaze: Gaze::Averted(Side::Left), .. }));
        let pre = layout.scene(&c, TrialPhase::PreCue);
        assert!(matches!(pre.elements[0], SceneElement::Face { gaze: Gaze::Straight, .. }));
    }

    #[test]
    fn real_line_grows_from_its_origin() {
        let layout = layout();
        let (from, to) = layout.line_extent(LineMotion::RealLeftward, 1, 4);
        assert_eq!(to, layout.right_probe);
        let quarter = (layout.right_probe.x - layout.left_probe.x) / 4.0;
        assert!((to.x - from.x - quarter).abs() < 1e-9);
        assert_eq!(
            layout.line_extent(LineMotion::Illusory, 1, 4),
            (layout.left_probe, layout.right_probe)
        );
    }
}
