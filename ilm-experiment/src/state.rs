use std::ops::ControlFlow;

use anyhow::Result;
use ilm_core::{
    Host, InputEvent, Key, Response, Scene, SessionPhase, Side, Task, TrialConditions, TrialResult,
};
use ilm_timing::{PhaseSchedule, PhaseState, TimelineController, Timer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::ExperimentConfig;
use crate::results::ResultSink;
use crate::scale::{ScaleError, ScaleListener};
use crate::trial::{StimulusLayout, TARGET_ONSET, TrialPlan};

const WELCOME: &[&str] = &[
    "Keep your eyes on the centre of the screen.",
    "Press Z if a dot appears on the left, / if it appears on the right.",
    "When a line appears, click where on the scale it seemed to move.",
    "Press space to continue.",
];
const PRACTICE_DONE: &[&str] = &["Practice is over.", "Press space to continue."];
const DEBRIEF: &[&str] = &["That's it, thank you!", "Press space to exit."];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The participant quit; results so far were still handed to the sink.
    Aborted,
}

/// Running tally of experiment (non-practice) trials for the debrief log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub trials: usize,
    pub responses: usize,
    pub correct: usize,
    pub scored: usize,
    rts: Vec<f64>,
}

impl SessionSummary {
    pub fn record(&mut self, result: &TrialResult) {
        self.trials += 1;
        if result.responded() {
            self.responses += 1;
            self.rts.push(result.rt_ms);
        }
        if let Some(correct) = result.correct {
            self.scored += 1;
            self.correct += usize::from(correct);
        }
    }

    pub fn mean_rt_ms(&self) -> Option<f64> {
        (!self.rts.is_empty()).then(|| self.rts.iter().sum::<f64>() / self.rts.len() as f64)
    }

    pub fn log(&self) {
        let response_rate = if self.trials > 0 {
            self.responses as f64 / self.trials as f64
        } else {
            0.0
        };
        let min_rt = self.rts.iter().copied().reduce(f64::min);
        let max_rt = self.rts.iter().copied().reduce(f64::max);
        info!(
            trials = self.trials,
            response_rate,
            accuracy = self.correct as f64 / self.scored.max(1) as f64,
            mean_rt_ms = ?self.mean_rt_ms(),
            ?min_rt,
            ?max_rt,
            "session summary"
        );
    }
}

/// Walks a session from welcome to debrief on a host, one blocking loop per
/// screen or trial.
pub struct ExperimentRunner<T, R>
where
    T: Timer,
    R: Rng,
{
    pub config: ExperimentConfig,
    pub timer: T,
    pub rng: R,
    pub phase: SessionPhase,
    pub summary: SessionSummary,
}

impl<T: Timer> ExperimentRunner<T, StdRng> {
    /// Seeds from `config.seed` when present.
    pub fn from_config(config: ExperimentConfig, timer: T) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::new(config, timer, rng)
    }
}

impl<T, R> ExperimentRunner<T, R>
where
    T: Timer,
    R: Rng,
{
    pub fn new(config: ExperimentConfig, timer: T, rng: R) -> Self {
        Self {
            config,
            timer,
            rng,
            phase: SessionPhase::default(),
            summary: SessionSummary::default(),
        }
    }

    /// Every configured condition `repetitions` times, shuffled.
    pub fn build_block(&mut self) -> Vec<TrialConditions> {
        let mut trials: Vec<TrialConditions> = self
            .all_conditions()
            .into_iter()
            .flat_map(|c| std::iter::repeat_n(c, self.config.repetitions))
            .collect();
        trials.shuffle(&mut self.rng);
        trials
    }

    /// `practice_trials` conditions drawn by cycling a shuffled factorial.
    pub fn build_practice(&mut self) -> Vec<TrialConditions> {
        let mut pool = self.all_conditions();
        pool.shuffle(&mut self.rng);
        pool.iter().cycle().take(self.config.practice_trials).copied().collect()
    }

    fn all_conditions(&self) -> Vec<TrialConditions> {
        let mut all = Vec::new();
        for &cuing in &self.config.cuing_tasks {
            for &requirement in &self.config.requirements {
                all.extend(TrialConditions::factorial(cuing, requirement));
            }
        }
        all
    }

    /// Runs the whole session. The sink is finished even when the session
    /// is aborted or fails.
    pub fn run<H, S>(&mut self, host: &mut H, sink: &mut S) -> Result<RunOutcome>
    where
        H: Host,
        S: ResultSink + ?Sized,
    {
        let outcome = self.run_phases(host, sink);
        let finished = sink.finish();
        let outcome = outcome?;
        finished?;
        Ok(outcome)
    }

    fn run_phases<H, S>(&mut self, host: &mut H, sink: &mut S) -> Result<RunOutcome>
    where
        H: Host,
        S: ResultSink + ?Sized,
    {
        let layout = StimulusLayout::new(&host.screen(), &self.config.stimuli);
        host.hide_cursor();

        loop {
            info!(phase = ?self.phase, "entering phase");
            let flow = match self.phase {
                SessionPhase::Welcome => self.wait_for_key(host, &layout.message_scene(WELCOME))?,
                SessionPhase::Practice => {
                    let trials = self.build_practice();
                    self.run_block(host, sink, &layout, 0, &trials)?
                }
                SessionPhase::Experiment => self.run_blocks(host, sink, &layout)?,
                SessionPhase::Debrief => {
                    self.summary.log();
                    self.wait_for_key(host, &layout.message_scene(DEBRIEF))?
                }
            };
            if flow.is_break() {
                warn!(phase = ?self.phase, "session aborted");
                return Ok(RunOutcome::Aborted);
            }
            match self.phase.next() {
                Some(next) => self.phase = next,
                None => return Ok(RunOutcome::Completed),
            }
        }
    }

    fn run_blocks<H, S>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        layout: &StimulusLayout,
    ) -> Result<ControlFlow<()>>
    where
        H: Host,
        S: ResultSink + ?Sized,
    {
        if self.config.practice_trials > 0 {
            let done = layout.message_scene(PRACTICE_DONE);
            if self.wait_for_key(host, &done)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        let blocks = self.config.blocks;
        for block in 1..=blocks {
            let title = format!("Block {block} of {blocks}");
            let screen = layout.message_scene(&[title.as_str(), "Press space to begin."]);
            if self.wait_for_key(host, &screen)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
            let trials = self.build_block();
            if self.run_block(host, sink, layout, block, &trials)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Block 0 is practice.
    fn run_block<H, S>(
        &mut self,
        host: &mut H,
        sink: &mut S,
        layout: &StimulusLayout,
        block: usize,
        trials: &[TrialConditions],
    ) -> Result<ControlFlow<()>>
    where
        H: Host,
        S: ResultSink + ?Sized,
    {
        let practice = block == 0;
        info!(block, trials = trials.len(), practice, "block start");

        for (i, conditions) in trials.iter().enumerate() {
            let result = match self.run_trial(host, layout, *conditions, block, i + 1, practice)? {
                ControlFlow::Continue(result) => result,
                ControlFlow::Break(()) => return Ok(ControlFlow::Break(())),
            };
            if !practice {
                self.summary.record(&result);
            }
            sink.record(result)?;

            if self.hold(host, &layout.blank_scene(), self.config.timing.inter_trial_ms)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// One trial through its timeline, then the rating scale for line trials.
    pub fn run_trial<H: Host>(
        &mut self,
        host: &mut H,
        layout: &StimulusLayout,
        conditions: TrialConditions,
        block: usize,
        trial: usize,
        practice: bool,
    ) -> Result<ControlFlow<(), TrialResult>> {
        let plan = TrialPlan::new(conditions, &self.config.timing)?;
        let mut result = TrialResult::new(block, trial, practice, &conditions);

        let mut quit = false;
        let mut key: Option<(Side, f64)> = None;

        host.clear_events()?;
        let mut timeline = TimelineController::new(&self.timer);
        timeline.register(plan.schedule.clone());
        let target_onset = match conditions.task {
            Task::Detection { .. } => Some(timeline.onset_ms(TARGET_ONSET)?),
            Task::LineMotion { .. } => None,
        };

        let outcome = timeline.drive(|state| -> Result<ControlFlow<()>> {
            if let PhaseState::Active { index, .. } = state {
                if let Some(phase) = plan.phase(index) {
                    host.render(&layout.scene(&conditions, phase))?;
                }
            }
            for event in host.pump_events()? {
                match event {
                    InputEvent::Quit => {
                        quit = true;
                        return Ok(ControlFlow::Break(()));
                    }
                    InputEvent::KeyPress {
                        key: Key::Response(side),
                        timestamp_ms,
                    } => {
                        // anticipations before the target are ignored
                        if let Some(onset) = target_onset.filter(|&onset| timestamp_ms >= onset) {
                            key = Some((side, timestamp_ms - onset));
                            return Ok(ControlFlow::Break(()));
                        }
                    }
                    _ => {}
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;

        if quit {
            return Ok(ControlFlow::Break(()));
        }
        result.max_phase_lag_ms = outcome.onsets.iter().map(|o| o.lag_ms()).fold(0.0, f64::max);

        match conditions.task {
            Task::Detection { target } => {
                if let Some((side, rt_ms)) = key {
                    result.response = Response::Key { side };
                    result.rt_ms = rt_ms;
                }
                result.correct = Some(key.is_some_and(|(side, _)| side == target));
            }
            Task::LineMotion { .. } => {
                let rating = layout.rating_scene();
                let mut listener = ScaleListener::new(layout.scale.into(), layout.center)?
                    .with_timeout_ms(self.config.timing.rating_timeout_ms)
                    .with_callback(|display| display.render(&rating));
                match listener.collect(host, &self.timer) {
                    Ok(response) => {
                        if let Some(value) = response.value {
                            result.response = Response::Scale { value };
                            result.rt_ms = response.latency_ms;
                        }
                    }
                    Err(ScaleError::Aborted) => return Ok(ControlFlow::Break(())),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        debug!(
            block,
            trial,
            ?conditions,
            response = ?result.response,
            rt_ms = result.rt_ms,
            frames = outcome.frames,
            max_phase_lag_ms = result.max_phase_lag_ms,
            "trial complete"
        );
        Ok(ControlFlow::Continue(result))
    }

    /// Shows `scene` until continue is pressed.
    pub fn wait_for_key<H: Host>(&mut self, host: &mut H, scene: &Scene) -> Result<ControlFlow<()>> {
        host.clear_events()?;
        loop {
            host.render(scene)?;
            for event in host.pump_events()? {
                match event {
                    InputEvent::Quit => return Ok(ControlFlow::Break(())),
                    InputEvent::KeyPress {
                        key: Key::Continue, ..
                    } => return Ok(ControlFlow::Continue(())),
                    _ => {}
                }
            }
        }
    }

    /// Keeps `scene` on screen for `duration_ms`; quitting still works.
    pub fn hold<H: Host>(&mut self, host: &mut H, scene: &Scene, duration_ms: f64) -> Result<ControlFlow<()>> {
        if duration_ms <= 0.0 {
            return Ok(ControlFlow::Continue(()));
        }
        let mut timeline = TimelineController::new(&self.timer);
        timeline.register(PhaseSchedule::new([("hold", 0.0), ("hold_end", duration_ms)])?);
        let outcome = timeline.drive(|_| -> Result<ControlFlow<()>> {
            host.render(scene)?;
            if host.pump_events()?.iter().any(InputEvent::is_quit) {
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(if outcome.interrupted {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    }
}
