//! Training Entry Point
//!
//! Scans a dataset root, splits it into train and held-out pools, trains the
//! fusion network with Adam and evaluates the held-out pool at the end.

use std::path::{Path, PathBuf};

use burn::{
    config::Config, module::AutodiffModule, optim::AdamConfig,
    tensor::backend::AutodiffBackend,
};
use colored::Colorize;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::config::TrainingConfig;
use super::trainer::{Trainer, TrainingState};
use crate::dataset::{PatchSource, RasterDataset, RasterPatchSource};
use crate::inference::{evaluate, EvaluationReport};
use crate::utils::error::{Result, ResultExt, ThermalSrError};

/// File the run configuration is written to, next to the checkpoint
pub const CONFIG_FILE: &str = "training_config.json";

/// Adam epsilon; burn's default of 1e-5 damps the early updates
pub const ADAM_EPSILON: f32 = 1e-8;

/// Durable results of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub state: TrainingState,
    /// Checkpoint file written after the last epoch
    pub checkpoint: PathBuf,
    /// Held-out metrics, `None` when the split left nothing to evaluate
    pub evaluation: Option<EvaluationReport>,
}

/// Run training with the given configuration
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>`)
///
/// # Arguments
/// * `data_dir` - Root scanned recursively for `config.file_marker` rasters
/// * `output_dir` - Directory receiving the checkpoint and the run config
/// * `config` - Training hyperparameters
/// * `device` - Device to train on
pub fn run_training<B: AutodiffBackend>(
    data_dir: &Path,
    output_dir: &Path,
    config: TrainingConfig,
    device: B::Device,
) -> Result<TrainingOutcome> {
    config.validate()?;
    println!("{}", "Initializing Training...".green().bold());
    println!("  Device: {:?}", device);

    println!("{}", "Scanning Dataset...".cyan());
    let dataset = RasterDataset::scan(data_dir, &config.file_marker)?;
    let (train_files, test_files) = dataset.split(config.train_fraction, config.seed);
    if train_files.is_empty() {
        return Err(ThermalSrError::EmptyDataset {
            root: data_dir.to_path_buf(),
            marker: config.file_marker.clone(),
        });
    }

    std::fs::create_dir_all(output_dir)?;
    config
        .save(output_dir.join(CONFIG_FILE))
        .context("Failed to write training config")?;

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  📊 Rasters found:     {}", dataset.len());
    println!("  🏷️  Training rasters:  {}", train_files.len());
    println!("  ✅ Held-out rasters:  {}", test_files.len());
    println!("  🔄 Epochs:            {}", config.epochs);
    println!("  📦 Batch size:        {}", config.batch_size);
    println!("  🧩 Patch size:        {}", config.patch_size);
    println!("  📈 Learning rate:     {}", config.learning_rate);
    println!("  〰️  TV weight:         {}", config.tv_weight);
    println!();

    let train_source = RasterPatchSource::new(train_files, config.patch_size);
    let test_source = RasterPatchSource::new(test_files, config.patch_size);
    let stem = output_dir.join(&config.checkpoint_name);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let model = config.model.init::<B>(&device);
    let optimizer = AdamConfig::new().with_epsilon(ADAM_EPSILON).init();
    let mut trainer = Trainer::new(model, optimizer, config, device.clone());

    println!("{}", "Starting Training...".green().bold());
    let state = trainer.fit(&train_source, &stem, &mut rng)?.clone();
    for summary in &state.epochs {
        println!(
            "  {} Epoch {:>3}: loss = {:.6} | {} ok, {} skipped",
            "→".cyan(),
            summary.epoch,
            summary.avg_loss,
            summary.batches_ok,
            summary.batches_skipped
        );
    }

    let checkpoint = state
        .checkpoint
        .clone()
        .ok_or_else(|| ThermalSrError::Checkpoint("no checkpoint was written".to_string()))?;
    println!("  💾 Saved to: {:?}", checkpoint);

    let evaluation = if !test_source.is_empty() {
        println!();
        println!("{}", "Evaluating Held-out Rasters...".cyan().bold());
        let inner_model = trainer.into_model().valid();
        let report = evaluate(&inner_model, &test_source, &device, &mut rng);
        println!("  {}", report.display());
        Some(report)
    } else {
        info!("No held-out rasters; skipping evaluation");
        None
    };

    println!();
    println!("{}", "Training Complete!".green().bold());

    Ok(TrainingOutcome {
        state,
        checkpoint,
        evaluation,
    })
}
