//! Logging Module
//!
//! Installs the global `tracing` subscriber and provides the two progress
//! reporters used by long loops: [`SampleProgress`] for per-sample passes
//! (evaluation) and [`EpochLogger`] for the training loop.
//!
//! `RUST_LOG` takes precedence over the configured level when it is set.

use std::str::FromStr;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::EnvFilter;

use super::error::{Result, ThermalSrError};

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level shown when `RUST_LOG` is not set
    pub level: Level,
    /// Include the module path of each event
    pub show_target: bool,
    /// Colourize output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_target: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Debug level with module paths
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            show_target: true,
            ..Self::default()
        }
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Override the level by name (`trace`, `debug`, `info`, `warn`, `error`)
    pub fn with_level(mut self, name: &str) -> Result<Self> {
        self.level = Level::from_str(name)
            .map_err(|_| ThermalSrError::Config(format!("unknown log level '{}'", name)))?;
        Ok(self)
    }
}

/// Install the global subscriber; fails if one is already set
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_target)
        .with_ansi(config.ansi)
        .compact()
        .try_init()
        .map_err(|e| ThermalSrError::Config(format!("failed to initialize logging: {}", e)))
}

/// Progress of a pass over indexed samples, counting skipped ones
pub struct SampleProgress {
    operation: String,
    total: usize,
    done: usize,
    skipped: usize,
    interval: usize,
    started: Instant,
}

impl SampleProgress {
    pub fn new(operation: &str, total: usize) -> Self {
        Self {
            operation: operation.to_string(),
            total,
            done: 0,
            skipped: 0,
            interval: (total / 10).max(1),
            started: Instant::now(),
        }
    }

    /// Record one finished sample
    pub fn record(&mut self, ok: bool) {
        self.done += 1;
        if !ok {
            self.skipped += 1;
        }
        if self.done % self.interval == 0 || self.done == self.total {
            tracing::info!(
                "{}: {}/{} samples ({} skipped)",
                self.operation,
                self.done,
                self.total,
                self.skipped
            );
        }
    }

    pub fn done(&self) -> usize {
        self.done
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finish(&self) {
        tracing::info!(
            "{}: {} samples in {:.2}s, {} skipped",
            self.operation,
            self.done,
            self.started.elapsed().as_secs_f64(),
            self.skipped
        );
    }
}

/// Per-epoch timing and ETA for the training loop
pub struct EpochLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_started: Instant,
    run_started: Instant,
}

impl EpochLogger {
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_started: Instant::now(),
            run_started: Instant::now(),
        }
    }

    /// Mark the start of `epoch` (1-indexed)
    pub fn start(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_started = Instant::now();
        tracing::info!("Epoch {}/{}", epoch, self.total_epochs);
    }

    /// Seconds left at the mean epoch time so far
    fn eta_secs(&self) -> f64 {
        let finished = self.epoch.max(1) as f64;
        let mean = self.run_started.elapsed().as_secs_f64() / finished;
        self.total_epochs.saturating_sub(self.epoch) as f64 * mean
    }

    pub fn finish(&self, avg_loss: f64, batches_ok: usize, batches_skipped: usize) {
        tracing::info!(
            "Epoch {}/{} done in {:.1}s | loss {:.6} | {} batches ok, {} skipped | ETA {:.0}s",
            self.epoch,
            self.total_epochs,
            self.epoch_started.elapsed().as_secs_f64(),
            avg_loss,
            batches_ok,
            batches_skipped,
            self.eta_secs()
        );
    }

    pub fn complete(&self, final_loss: f64) {
        tracing::info!(
            "Training finished: {} epochs in {:.1}s, final loss {:.6}",
            self.total_epochs,
            self.run_started.elapsed().as_secs_f64(),
            final_loss
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_level() {
        let config = LogConfig::default().with_level("warn").unwrap();
        assert_eq!(config.level, Level::WARN);
        assert!(LogConfig::default().with_level("loud").is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(LogConfig::default().level, Level::INFO);
        assert_eq!(LogConfig::verbose().level, Level::DEBUG);
        assert_eq!(LogConfig::quiet().level, Level::ERROR);
    }

    #[test]
    fn test_sample_progress_counts_skips() {
        let mut progress = SampleProgress::new("Evaluation", 4);
        progress.record(true);
        progress.record(false);
        progress.record(true);
        assert_eq!(progress.done(), 3);
        assert_eq!(progress.skipped(), 1);
    }

    #[test]
    fn test_eta_after_last_epoch_is_zero() {
        let mut logger = EpochLogger::new(2);
        logger.start(2);
        assert_eq!(logger.eta_secs(), 0.0);
    }
}
