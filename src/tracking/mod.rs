//! Experiment tracking for training runs
//!
//! Logging here is fire-and-forget: a failing tracker never interrupts training.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::Serialize;

/// A sink for run parameters and metrics
pub trait ExperimentLogger: Send + Sync {
    /// Start a new run within an experiment
    fn init_experiment(&self, experiment: &str, run: &str);

    /// Record the parameters of the current run
    fn log_params(&self, params: &BTreeMap<String, String>);

    /// Record metrics at a given global step
    fn log_metrics(&self, metrics: &BTreeMap<String, f64>, step: usize);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl ExperimentLogger for NoopLogger {
    fn init_experiment(&self, _experiment: &str, _run: &str) {}

    fn log_params(&self, _params: &BTreeMap<String, String>) {}

    fn log_metrics(&self, _metrics: &BTreeMap<String, f64>, _step: usize) {}
}

/// Writes parameters and metrics to the application log at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl ExperimentLogger for LogLogger {
    fn init_experiment(&self, experiment: &str, run: &str) {
        info!("Experiment '{}', run '{}'", experiment, run);
    }

    fn log_params(&self, params: &BTreeMap<String, String>) {
        for (name, value) in params {
            debug!("param {}: {}", name, value);
        }
    }

    fn log_metrics(&self, metrics: &BTreeMap<String, f64>, step: usize) {
        for (name, value) in metrics {
            debug!("step {} metric {}: {}", step, name, value);
        }
    }
}

#[derive(Serialize)]
struct RunMeta<'a> {
    experiment: &'a str,
    run: &'a str,
}

#[derive(Default)]
struct RunState {
    dir: Option<PathBuf>,
    metrics: Option<csv::Writer<fs::File>>,
}

/// Stores each run under `<root>/<experiment>/<run>/` as `meta.yaml`, `params.yaml` and a
/// `metrics.csv` with one `step,name,value` row per metric
pub struct FileLogger {
    root: PathBuf,
    state: Mutex<RunState>,
}

impl FileLogger {
    /// Create a logger rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(RunState::default()),
        }
    }

    /// The directory of the current run, if one was started
    pub fn run_dir(&self) -> Option<PathBuf> {
        self.state.lock().ok().and_then(|state| state.dir.clone())
    }

    fn start(&self, experiment: &str, run: &str) -> anyhow::Result<()> {
        let dir = self.root.join(experiment).join(run);
        fs::create_dir_all(&dir)?;

        let meta = serde_yaml::to_string(&RunMeta { experiment, run })?;
        fs::write(dir.join("meta.yaml"), meta)?;

        let mut writer = csv::Writer::from_path(dir.join("metrics.csv"))?;
        writer.write_record(["step", "name", "value"])?;
        writer.flush()?;

        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("Experiment logger state is poisoned"))?;

        state.dir = Some(dir);
        state.metrics = Some(writer);

        Ok(())
    }

    fn write_params(&self, params: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let dir = self.current_dir()?;

        let path = dir.join("params.yaml");

        // Merge with parameters logged earlier in the same run
        let mut merged: BTreeMap<String, String> = if path.exists() {
            serde_yaml::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };
        merged.extend(params.clone());

        fs::write(path, serde_yaml::to_string(&merged)?)?;

        Ok(())
    }

    fn write_metrics(&self, metrics: &BTreeMap<String, f64>, step: usize) -> anyhow::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("Experiment logger state is poisoned"))?;

        let writer = state
            .metrics
            .as_mut()
            .ok_or_else(|| anyhow!("No experiment run has been started"))?;

        for (name, value) in metrics {
            writer.write_record([step.to_string(), name.clone(), value.to_string()])?;
        }
        writer.flush()?;

        Ok(())
    }

    fn current_dir(&self) -> anyhow::Result<PathBuf> {
        self.run_dir()
            .ok_or_else(|| anyhow!("No experiment run has been started"))
    }
}

impl ExperimentLogger for FileLogger {
    fn init_experiment(&self, experiment: &str, run: &str) {
        if let Err(err) = self.start(experiment, run) {
            warn!("Unable to start experiment run in {:?}: {}", self.root, err);
        }
    }

    fn log_params(&self, params: &BTreeMap<String, String>) {
        if let Err(err) = self.write_params(params) {
            warn!("Unable to log experiment params: {}", err);
        }
    }

    fn log_metrics(&self, metrics: &BTreeMap<String, f64>, step: usize) {
        if let Err(err) = self.write_metrics(metrics, step) {
            warn!("Unable to log experiment metrics: {}", err);
        }
    }
}

/// Read back the metrics of a run stored by [`FileLogger`]
pub fn read_metrics(run_dir: &Path) -> anyhow::Result<Vec<(usize, String, f64)>> {
    let mut reader = csv::Reader::from_path(run_dir.join("metrics.csv"))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: (usize, String, f64) = record?;
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_file_logger_stores_run() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let logger = FileLogger::new(root.path());

        logger.init_experiment("germeval14", "run-1");
        logger.log_params(&BTreeMap::from([("epochs".to_string(), "2".to_string())]));
        logger.log_params(&BTreeMap::from([("lr".to_string(), "2e-5".to_string())]));
        logger.log_metrics(&BTreeMap::from([("train_loss".to_string(), 0.5)]), 1);
        logger.log_metrics(&BTreeMap::from([("train_loss".to_string(), 0.25)]), 2);

        let run_dir = root.path().join("germeval14").join("run-1");
        assert_eq!(logger.run_dir(), Some(run_dir.clone()));

        let params: BTreeMap<String, String> =
            serde_yaml::from_str(&fs::read_to_string(run_dir.join("params.yaml"))?)?;
        assert_eq!(
            params,
            BTreeMap::from([
                ("epochs".to_string(), "2".to_string()),
                ("lr".to_string(), "2e-5".to_string())
            ])
        );

        assert_eq!(
            read_metrics(&run_dir)?,
            vec![
                (1, "train_loss".to_string(), 0.5),
                (2, "train_loss".to_string(), 0.25)
            ]
        );

        assert!(run_dir.join("meta.yaml").exists());

        Ok(())
    }

    #[test]
    fn test_file_logger_without_run_does_not_fail() {
        let logger = FileLogger::new("/nonexistent/never-created");

        logger.log_params(&BTreeMap::from([("epochs".to_string(), "2".to_string())]));
        logger.log_metrics(&BTreeMap::from([("train_loss".to_string(), 0.5)]), 1);

        assert_eq!(logger.run_dir(), None);
    }
}
