//! Thermal Super-Resolution CLI
//!
//! Entry point for training, evaluating and running the physics-aware fusion
//! network on stacked Landsat OLI/TIRS rasters.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use burn::config::Config;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use thermal_sr::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use thermal_sr::dataset::{load_scene, RasterDataset, RasterPatchSource, DEFAULT_FILE_MARKER};
use thermal_sr::inference::{evaluate, InferenceEngine, InferenceReport};
use thermal_sr::model::{load_checkpoint, FusionNetConfig};
use thermal_sr::training::supervised::{run_training, CONFIG_FILE};
use thermal_sr::training::TrainingConfig;
use thermal_sr::utils::format_duration;
use thermal_sr::utils::logging::{init_logging, LogConfig};
use thermal_sr::ThermalSrError;

/// Physics-Aware Thermal Super-Resolution
///
/// Reconstructs Landsat TIRS bands 10 and 11 from a degraded copy guided by
/// the co-registered visible bands.
#[derive(Parser, Debug)]
#[command(name = "thermal_sr")]
#[command(version)]
#[command(about = "Optical-guided thermal super-resolution with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, default_value = "false")]
    quiet: bool,

    /// Explicit log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the fusion network on a folder of stacked rasters
    Train {
        /// Root directory scanned recursively for rasters
        #[arg(short, long, default_value = "data/landsat")]
        data_dir: String,

        /// Output directory for the checkpoint and run config
        #[arg(short, long, default_value = "output")]
        output_dir: String,

        /// Number of training epochs
        #[arg(short, long, default_value = "40")]
        epochs: usize,

        /// Patch pairs per batch
        #[arg(short, long, default_value = "2")]
        batch_size: usize,

        /// Side length of square training patches
        #[arg(short, long, default_value = "128")]
        patch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.0001")]
        learning_rate: f64,

        /// Weight of the total-variation term
        #[arg(long, default_value = "0.01")]
        tv_weight: f64,

        /// Share of rasters used for training
        #[arg(long, default_value = "0.8")]
        train_fraction: f64,

        /// File-name marker of stacked rasters
        #[arg(long, default_value = DEFAULT_FILE_MARKER)]
        file_marker: String,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Evaluate a checkpoint on every raster under a directory
    Evaluate {
        /// Checkpoint stem (without extension)
        #[arg(short, long)]
        model: String,

        /// Root directory scanned recursively for rasters
        #[arg(short, long, default_value = "data/landsat")]
        data_dir: String,

        /// Side length of evaluation patches
        #[arg(short, long, default_value = "128")]
        patch_size: usize,

        /// File-name marker of stacked rasters
        #[arg(long, default_value = DEFAULT_FILE_MARKER)]
        file_marker: String,

        /// Random seed for patch offsets
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Run full-scene inference and write the visualization panels
    Infer {
        /// Path to a stacked raster
        #[arg(short, long)]
        input: String,

        /// Checkpoint stem (without extension)
        #[arg(short, long)]
        model: String,

        /// Directory receiving the PNG panels and report.json
        #[arg(short, long, default_value = "output/inference")]
        output_dir: String,
    },

    /// Show dataset statistics
    Stats {
        /// Root directory scanned recursively for rasters
        #[arg(short, long, default_value = "data/landsat")]
        data_dir: String,

        /// File-name marker of stacked rasters
        #[arg(long, default_value = DEFAULT_FILE_MARKER)]
        file_marker: String,

        /// Share of rasters used for training
        #[arg(long, default_value = "0.8")]
        train_fraction: f64,

        /// Random seed of the simulated split
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    let log_config = match &cli.log_level {
        Some(level) => log_config.with_level(level)?,
        None => log_config,
    };

    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Train {
            data_dir,
            output_dir,
            epochs,
            batch_size,
            patch_size,
            learning_rate,
            tv_weight,
            train_fraction,
            file_marker,
            seed,
        } => {
            let config = TrainingConfig::new(FusionNetConfig::new())
                .with_epochs(epochs)
                .with_batch_size(batch_size)
                .with_patch_size(patch_size)
                .with_learning_rate(learning_rate)
                .with_tv_weight(tv_weight)
                .with_train_fraction(train_fraction)
                .with_file_marker(file_marker)
                .with_seed(seed);
            cmd_train(&data_dir, &output_dir, config)?;
        }

        Commands::Evaluate {
            model,
            data_dir,
            patch_size,
            file_marker,
            seed,
        } => {
            cmd_evaluate(&model, &data_dir, patch_size, &file_marker, seed)?;
        }

        Commands::Infer {
            input,
            model,
            output_dir,
        } => {
            cmd_infer(&input, &model, &output_dir)?;
        }

        Commands::Stats {
            data_dir,
            file_marker,
            train_fraction,
            seed,
        } => {
            cmd_stats(&data_dir, &file_marker, train_fraction, seed)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════════════╗
 ║   🛰️  Landsat Thermal Super-Resolution                            ║
 ║   Optical-Guided TIRS Reconstruction with Burn + Rust            ║
 ╚══════════════════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

/// Architecture of a saved checkpoint, read from the run config next to it
fn model_config_for(stem: &Path) -> FusionNetConfig {
    let config_path = stem
        .parent()
        .map(|dir| dir.join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    match TrainingConfig::load(&config_path) {
        Ok(config) => config.model,
        Err(_) => {
            info!(
                "No run config at {:?}; using the default architecture",
                config_path
            );
            FusionNetConfig::new()
        }
    }
}

fn cmd_train(data_dir: &str, output_dir: &str, config: TrainingConfig) -> Result<()> {
    info!("Training on rasters under: {}", data_dir);
    println!("  🖥️  Backend: {}", backend_name());

    let start = Instant::now();
    let outcome = run_training::<TrainingBackend>(
        Path::new(data_dir),
        Path::new(output_dir),
        config,
        default_device(),
    )?;

    println!();
    println!("{}", "Training Summary:".cyan().bold());
    println!("  ⏱️  Duration:    {}", format_duration(start.elapsed()));
    if let Some(loss) = outcome.state.last_loss() {
        println!("  📉 Final loss:  {:.6}", loss);
    }
    println!("  ⚠️  Skipped:     {} batches", outcome.state.total_skipped());
    println!("  💾 Checkpoint:  {:?}", outcome.checkpoint);
    if let Some(report) = &outcome.evaluation {
        println!("  🧪 Held-out:    {}", report.display());
    }

    Ok(())
}

fn cmd_evaluate(
    model: &str,
    data_dir: &str,
    patch_size: usize,
    file_marker: &str,
    seed: u64,
) -> Result<()> {
    info!("Evaluating checkpoint {} on {}", model, data_dir);

    println!("{}", "Evaluation Configuration:".cyan().bold());
    println!("  🧠 Model:   {}", model);
    println!("  📁 Data:    {}", data_dir);
    println!("  🖥️  Backend: {}", backend_name());
    println!();

    let stem = Path::new(model);
    let device = default_device();
    let network = load_checkpoint::<DefaultBackend>(&model_config_for(stem), stem, &device)?;

    let dataset = RasterDataset::scan(data_dir, file_marker)?;
    let source = RasterPatchSource::new(dataset.files, patch_size);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let start = Instant::now();
    let report = evaluate(&network, &source, &device, &mut rng);

    println!();
    println!("{}", "Evaluation Results:".cyan().bold());
    match &report.metrics {
        Some(metrics) => {
            println!("  📈 PSNR: {:.2} dB", metrics.psnr);
            println!("  🔍 SSIM: {:.4}", metrics.ssim);
            println!("  📏 RMSE: {:.4}", metrics.rmse);
        }
        None => println!("  {} No sample could be evaluated", "Error:".red()),
    }
    println!(
        "  ✅ Evaluated: {} | ⚠️ Skipped: {} | ⏱️ {}",
        report.evaluated,
        report.skipped,
        format_duration(start.elapsed())
    );

    Ok(())
}

fn cmd_infer(input: &str, model: &str, output_dir: &str) -> Result<()> {
    info!("Running inference");
    info!("  Input: {}", input);
    info!("  Model: {}", model);

    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  🛰️  Input:  {}", input);
    println!("  🧠 Model:  {}", model);
    println!("  🖥️  Backend: {}", backend_name());
    println!();

    let output_dir = Path::new(output_dir);
    std::fs::create_dir_all(output_dir)?;

    if !Path::new(input).exists() {
        println!("{} Input path not found: {}", "Error:".red(), input);
        let report =
            InferenceReport::failure(&ThermalSrError::read(input, "input path not found"));
        return write_report(output_dir, &report);
    }

    println!("{}", "Loading model...".cyan());
    let stem = Path::new(model);
    let engine =
        InferenceEngine::<DefaultBackend>::load(stem, &model_config_for(stem), default_device())?;

    println!("{}", "Running inference...".cyan());
    let report = match engine.infer(input) {
        Ok(result) => {
            for (name, png) in &result.visualizations {
                std::fs::write(output_dir.join(format!("{}.png", name)), png)?;
            }
            println!(
                "  🖼️  Wrote {} panels in {:.1} ms",
                result.visualizations.len(),
                result.inference_time_ms
            );
            println!("  📈 {}", result.analysis.metrics);
            println!("  🎯 Confidence: {:.3}", result.analysis.confidence);
            InferenceReport::from_result(&result)?
        }
        Err(e) => {
            warn!("Inference failed: {}", e);
            println!("{} {}", "Error:".red(), e);
            InferenceReport::failure(&ThermalSrError::Inference(e.to_string()))
        }
    };

    write_report(output_dir, &report)
}

/// Write `report.json` into `output_dir`
fn write_report(output_dir: &Path, report: &InferenceReport) -> Result<()> {
    let report_path = output_dir.join("report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(report)?)?;
    println!("  📝 Report: {:?}", report_path);

    Ok(())
}

fn cmd_stats(data_dir: &str, file_marker: &str, train_fraction: f64, seed: u64) -> Result<()> {
    info!("Computing dataset statistics for: {}", data_dir);

    let dataset = match RasterDataset::scan(data_dir, file_marker) {
        Ok(dataset) => dataset,
        Err(e) => {
            println!("{} {}", "Error:".red(), e);
            return Ok(());
        }
    };
    let (train, test) = dataset.split(train_fraction, seed);
    let total = dataset.len();

    println!("{}", "Dataset Statistics:".cyan().bold());
    println!("  📊 Rasters found:  {}", total);
    println!(
        "  🏷️  Training:       {} ({:.1}%)",
        train.len(),
        100.0 * train.len() as f64 / total as f64
    );
    println!(
        "  🧪 Held-out:       {} ({:.1}%)",
        test.len(),
        100.0 * test.len() as f64 / total as f64
    );
    println!();

    if let Some(first) = dataset.files.first() {
        match load_scene(first) {
            Ok(scene) => {
                let (height, width) = scene.dims();
                println!("{}", "First Raster:".cyan().bold());
                println!("  📁 {:?}", first);
                println!("  📐 {} x {} pixels", width, height);
                println!("  🔢 Optical pre-scaled: {}", scene.optical_prescaled);
            }
            Err(e) => println!("{} Failed to read {:?}: {}", "Error:".red(), first, e),
        }
    }

    Ok(())
}
