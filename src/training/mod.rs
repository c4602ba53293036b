//! Training module for the physics-aware fusion network
//!
//! This module provides:
//! - The L1 + total-variation loss (`loss`)
//! - Hyperparameters (`config`)
//! - The skip-on-failure epoch loop with per-epoch checkpointing (`trainer`)
//! - The dataset-to-checkpoint entry point (`supervised`)

pub mod config;
pub mod loss;
pub mod supervised;
pub mod trainer;

pub use config::TrainingConfig;
pub use loss::{l1_loss, physics_loss, total_variation, DEFAULT_TV_WEIGHT};
pub use supervised::{run_training, TrainingOutcome};
pub use trainer::{EpochSummary, Trainer, TrainingState};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 40;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 2;

/// Fixed Adam learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-4;
