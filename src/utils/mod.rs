//! Utilities module for errors, logging and fidelity metrics
//!
//! This module provides:
//! - The crate error type (`error`)
//! - Structured logging with tracing (`logging`)
//! - PSNR, SSIM, RMSE and the confidence heuristic (`metrics`)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Result, ThermalSrError};
pub use logging::init_logging;
pub use metrics::{MetricAccumulator, MetricSet};

use std::time::Duration;

/// Wall-clock time for CLI summaries: `850ms`, `42.3s`, `3m 07s`, `2h 05m`
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    match secs {
        0 => format!("{}ms", elapsed.as_millis()),
        1..=59 => format!("{:.1}s", elapsed.as_secs_f64()),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
    }
}
