//! Model module for the thermal super-resolution network
//!
//! This module provides:
//! - The dual-branch optical/thermal fusion network (`fusion`)
//! - Checkpoint persistence for network parameters (`checkpoint`)

pub mod checkpoint;
pub mod fusion;

pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointRecorder};
pub use fusion::{FusionNet, FusionNetConfig};

/// Default checkpoint file stem, overwritten after every epoch
pub const DEFAULT_CHECKPOINT_NAME: &str = "physics_aware_unet";
