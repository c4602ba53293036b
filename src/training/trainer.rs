//! Training Loop for the Fusion Network
//!
//! Each batch runs degrade -> forward -> physics loss -> backward -> optimizer step.
//! `train_step` returns a `Result`; the epoch loop counts failed batches as skipped
//! and keeps going, so one corrupt or undersized raster never aborts an epoch.
//! The checkpoint is overwritten after every epoch and a failed write is fatal.

use std::path::{Path, PathBuf};

use burn::{
    optim::{GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::config::TrainingConfig;
use super::loss::physics_loss;
use crate::dataset::{PatchPair, PatchSource, ThermalBatcher};
use crate::model::{save_checkpoint, FusionNet};
use crate::utils::error::{Result, ThermalSrError};
use crate::utils::logging::EpochLogger;

/// Outcome of one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// Epoch number (1-indexed)
    pub epoch: usize,
    /// Mean loss over successful batches, NaN if none succeeded
    pub avg_loss: f64,
    /// Batches that completed an optimizer step
    pub batches_ok: usize,
    /// Batches that failed and were skipped
    pub batches_skipped: usize,
}

/// Loss history of a training run
#[derive(Debug, Clone, Default)]
pub struct TrainingState {
    pub epochs: Vec<EpochSummary>,
    /// Path of the last checkpoint written
    pub checkpoint: Option<PathBuf>,
}

impl TrainingState {
    /// Average loss of the most recent epoch
    pub fn last_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.avg_loss)
    }

    /// Total batches skipped over the run
    pub fn total_skipped(&self) -> usize {
        self.epochs.iter().map(|e| e.batches_skipped).sum()
    }
}

/// Owns the model and optimizer while training; the only writer of parameters
pub struct Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FusionNet<B>, B>,
{
    model: FusionNet<B>,
    optimizer: O,
    batcher: ThermalBatcher<B>,
    config: TrainingConfig,
    state: TrainingState,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FusionNet<B>, B>,
{
    pub fn new(model: FusionNet<B>, optimizer: O, config: TrainingConfig, device: B::Device) -> Self {
        Self {
            model,
            optimizer,
            batcher: ThermalBatcher::new(device),
            config,
            state: TrainingState::default(),
        }
    }

    pub fn model(&self) -> &FusionNet<B> {
        &self.model
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Hand the trained model back to the caller
    pub fn into_model(self) -> FusionNet<B> {
        self.model
    }

    /// One optimizer step on a batch of patch pairs, returning the batch loss
    pub fn train_step(&mut self, items: &[PatchPair]) -> Result<f64> {
        let batch = self.batcher.try_batch(items)?;

        let prediction = self.model.try_forward(batch.optical, batch.degraded)?;
        if prediction.dims() != batch.target.dims() {
            return Err(ThermalSrError::Dimension(format!(
                "prediction {:?} does not match target {:?}",
                prediction.dims(),
                batch.target.dims()
            )));
        }

        let loss = physics_loss(prediction, batch.target, self.config.tv_weight);
        let loss_value: f64 = loss.clone().into_scalar().elem();
        if !loss_value.is_finite() {
            return Err(ThermalSrError::Metric(format!("non-finite loss {}", loss_value)));
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optimizer
            .step(self.config.learning_rate, self.model.clone(), grads);

        Ok(loss_value)
    }

    fn draw_batch<S: PatchSource + ?Sized>(
        source: &S,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<PatchPair>> {
        indices.iter().map(|&i| source.draw(i, rng)).collect()
    }

    /// One pass over `source` in a freshly shuffled order
    pub fn train_epoch<S: PatchSource + ?Sized>(
        &mut self,
        source: &S,
        epoch: usize,
        rng: &mut ChaCha8Rng,
    ) -> EpochSummary {
        let mut indices: Vec<usize> = (0..source.len()).collect();
        indices.shuffle(rng);

        let batch_size = self.config.batch_size.max(1);
        let num_batches = indices.len().div_ceil(batch_size);
        let log_interval = self.config.log_interval.max(1);

        let mut loss_sum = 0.0f64;
        let mut batches_ok = 0usize;
        let mut batches_skipped = 0usize;

        for (batch_idx, chunk) in indices.chunks(batch_size).enumerate() {
            let outcome = Self::draw_batch(source, chunk, rng)
                .and_then(|items| self.train_step(&items))
                .map_err(|e| ThermalSrError::Batch {
                    index: batch_idx,
                    reason: e.to_string(),
                });

            match outcome {
                Ok(loss) => {
                    loss_sum += loss;
                    batches_ok += 1;
                    if logs_batch(batch_idx, log_interval) {
                        info!(
                            "Epoch {} | Batch {}/{} | Loss: {:.6}",
                            epoch,
                            batch_idx + 1,
                            num_batches,
                            loss
                        );
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    batches_skipped += 1;
                }
            }
        }

        let avg_loss = if batches_ok > 0 {
            loss_sum / batches_ok as f64
        } else {
            f64::NAN
        };

        EpochSummary {
            epoch,
            avg_loss,
            batches_ok,
            batches_skipped,
        }
    }

    /// Train for `config.epochs`, overwriting the checkpoint at `checkpoint` after each epoch
    pub fn fit<S: PatchSource + ?Sized>(
        &mut self,
        source: &S,
        checkpoint: &Path,
        rng: &mut ChaCha8Rng,
    ) -> Result<&TrainingState> {
        if source.is_empty() {
            return Err(ThermalSrError::Config(
                "training source has no samples".to_string(),
            ));
        }

        let mut logger = EpochLogger::new(self.config.epochs);
        for epoch_idx in 0..self.config.epochs {
            let epoch = epoch_idx + 1;
            logger.start(epoch);
            let summary = self.train_epoch(source, epoch, rng);

            if summary.batches_ok == 0 {
                warn!("Epoch {} had no successful batches", epoch);
            }
            logger.finish(summary.avg_loss, summary.batches_ok, summary.batches_skipped);

            let written = save_checkpoint(&self.model, checkpoint)?;
            debug!("Checkpoint for epoch {} at {:?}", epoch, written);

            self.state.checkpoint = Some(written);
            self.state.epochs.push(summary);
        }

        logger.complete(self.state.last_loss().unwrap_or(f64::NAN));
        Ok(&self.state)
    }
}

/// Batch losses are logged on the first batch and every `interval` after it
fn logs_batch(batch_idx: usize, interval: usize) -> bool {
    batch_idx % interval == 0
}
