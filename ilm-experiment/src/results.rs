use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ilm_core::TrialResult;
use tracing::info;

/// Where finished trials go.
pub trait ResultSink {
    fn record(&mut self, result: TrialResult) -> Result<()>;

    /// Called once after the last trial, also when the session was aborted.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ResultSink for Vec<TrialResult> {
    fn record(&mut self, result: TrialResult) -> Result<()> {
        self.push(result);
        Ok(())
    }
}

/// Buffers results and writes them as a pretty-printed JSON array on finish.
#[derive(Debug)]
pub struct JsonResultWriter {
    path: PathBuf,
    results: Vec<TrialResult>,
}

impl JsonResultWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            results: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }
}

impl ResultSink for JsonResultWriter {
    fn record(&mut self, result: TrialResult) -> Result<()> {
        self.results.push(result);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.results)
            .with_context(|| format!("writing {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("flushing {}", self.path.display()))?;
        info!(path = %self.path.display(), trials = self.results.len(), "results saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilm_core::{CueLocation, CuingTask, Response, Side, Task, TrialConditions};

    #[test]
    fn writer_saves_a_json_array() {
        let path = std::env::temp_dir().join(format!("ilm-results-{}.json", std::process::id()));
        let conditions = TrialConditions {
            cuing: CuingTask::Exogenous,
            cue: CueLocation::Right,
            task: Task::Detection { target: Side::Right },
        };
        let mut result = TrialResult::new(1, 1, false, &conditions);
        result.response = Response::Key { side: Side::Right };
        result.rt_ms = 431.0;
        result.correct = Some(true);

        let mut writer = JsonResultWriter::new(&path);
        writer.record(result.clone()).unwrap();
        writer.finish().unwrap();

        let saved: Vec<TrialResult> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(saved, vec![result]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_disk_is_reported() {
        let conditions = TrialConditions {
            cuing: CuingTask::Exogenous,
            cue: CueLocation::Left,
            task: Task::Detection { target: Side::Left },
        };
        let mut writer = JsonResultWriter::new("/dev/full");
        writer
            .record(TrialResult::new(1, 1, false, &conditions))
            .unwrap();
        let err = writer.finish().unwrap_err();
        assert!(format!("{err:#}").contains("/dev/full"));
    }
}
