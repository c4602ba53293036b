//! Fidelity Metrics for Thermal Reconstruction
//!
//! Provides the image-quality measures used by evaluation and inference:
//! - PSNR and SSIM with a fixed data range of 1.0
//! - RMSE, per band and jointly over a stack
//! - A low-resolution agreement heuristic reported as "confidence"

use ndarray::{Array2, ArrayView2, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::dataset::degrade::downsample;
use crate::dataset::DEGRADATION_FACTOR;
use crate::utils::error::{Result, ThermalSrError};

/// Dynamic range of normalized thermal values
pub const DATA_RANGE: f64 = 1.0;

/// Side length of the uniform SSIM window
pub const SSIM_WINDOW: usize = 7;

const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

/// Fidelity metrics of one band, or a mean over bands and samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Peak signal-to-noise ratio in dB; infinite for a perfect prediction
    pub psnr: f64,
    /// Structural similarity in [-1, 1]
    pub ssim: f64,
    /// Root-mean-square error
    pub rmse: f64,
}

impl MetricSet {
    /// Compute all three metrics for a single band
    pub fn for_band(pred: ArrayView2<f32>, truth: ArrayView2<f32>) -> Result<Self> {
        Ok(Self {
            psnr: psnr(pred, truth)?,
            ssim: ssim(pred, truth)?,
            rmse: rmse(pred, truth)?,
        })
    }

    /// Arithmetic mean of a set of metric values
    pub fn mean(sets: &[MetricSet]) -> Option<Self> {
        let mut acc = MetricAccumulator::new();
        sets.iter().for_each(|s| acc.add(s));
        acc.mean()
    }

    pub fn display(&self) -> String {
        format!(
            "PSNR: {:.3} dB | SSIM: {:.4} | RMSE: {:.5}",
            self.psnr, self.ssim, self.rmse
        )
    }
}

impl std::fmt::Display for MetricSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Running mean of metric sets across bands and samples
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    psnr: f64,
    ssim: f64,
    rmse: f64,
    count: usize,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, set: &MetricSet) {
        self.psnr += set.psnr;
        self.ssim += set.ssim;
        self.rmse += set.rmse;
        self.count += 1;
    }

    pub fn extend(&mut self, sets: &[MetricSet]) {
        sets.iter().for_each(|s| self.add(s));
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of everything added so far, `None` when empty
    pub fn mean(&self) -> Option<MetricSet> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(MetricSet {
            psnr: self.psnr / n,
            ssim: self.ssim / n,
            rmse: self.rmse / n,
        })
    }
}

fn check_shapes(pred: &[usize], truth: &[usize]) -> Result<()> {
    if pred != truth {
        return Err(ThermalSrError::Metric(format!(
            "prediction shape {:?} differs from ground truth {:?}",
            pred, truth
        )));
    }
    if pred.iter().any(|&d| d == 0) {
        return Err(ThermalSrError::Metric("empty input".to_string()));
    }
    Ok(())
}

/// Mean squared error between two bands
pub fn mse(pred: ArrayView2<f32>, truth: ArrayView2<f32>) -> Result<f64> {
    check_shapes(pred.shape(), truth.shape())?;
    let sum = Zip::from(&pred)
        .and(&truth)
        .fold(0.0f64, |acc, &p, &t| acc + (p as f64 - t as f64).powi(2));
    Ok(sum / pred.len() as f64)
}

/// Root-mean-square error between two bands
pub fn rmse(pred: ArrayView2<f32>, truth: ArrayView2<f32>) -> Result<f64> {
    Ok(mse(pred, truth)?.sqrt())
}

/// RMSE pooled over every pixel of every band
pub fn joint_rmse(pred: ArrayView3<f32>, truth: ArrayView3<f32>) -> Result<f64> {
    check_shapes(pred.shape(), truth.shape())?;
    let sum = Zip::from(&pred)
        .and(&truth)
        .fold(0.0f64, |acc, &p, &t| acc + (p as f64 - t as f64).powi(2));
    Ok((sum / pred.len() as f64).sqrt())
}

/// Peak signal-to-noise ratio with data range 1.0
pub fn psnr(pred: ArrayView2<f32>, truth: ArrayView2<f32>) -> Result<f64> {
    let err = mse(pred, truth)?;
    if err == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (DATA_RANGE * DATA_RANGE / err).log10())
}

/// Summed-area table with a zero row and column prepended
fn integral(values: &Array2<f64>) -> Array2<f64> {
    let (h, w) = values.dim();
    let mut table = Array2::<f64>::zeros((h + 1, w + 1));
    for y in 0..h {
        let mut row_sum = 0.0;
        for x in 0..w {
            row_sum += values[[y, x]];
            table[[y + 1, x + 1]] = table[[y, x + 1]] + row_sum;
        }
    }
    table
}

fn window_sum(table: &Array2<f64>, y: usize, x: usize, size: usize) -> f64 {
    table[[y + size, x + size]] - table[[y, x + size]] - table[[y + size, x]] + table[[y, x]]
}

/// Structural similarity with a 7x7 uniform window and data range 1.0.
///
/// Uses sample covariance and averages the SSIM map over positions where the
/// window lies fully inside the image (a 3-pixel border is excluded).
pub fn ssim(pred: ArrayView2<f32>, truth: ArrayView2<f32>) -> Result<f64> {
    check_shapes(pred.shape(), truth.shape())?;
    let (h, w) = pred.dim();
    if h < SSIM_WINDOW || w < SSIM_WINDOW {
        return Err(ThermalSrError::Metric(format!(
            "SSIM needs at least {}x{} pixels, got {}x{}",
            SSIM_WINDOW, SSIM_WINDOW, h, w
        )));
    }

    let x = pred.mapv(|v| v as f64);
    let y = truth.mapv(|v| v as f64);

    let sum_x = integral(&x);
    let sum_y = integral(&y);
    let sum_xx = integral(&(&x * &x));
    let sum_yy = integral(&(&y * &y));
    let sum_xy = integral(&(&x * &y));

    let n = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (SSIM_K1 * DATA_RANGE).powi(2);
    let c2 = (SSIM_K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut positions = 0usize;
    for top in 0..=h - SSIM_WINDOW {
        for left in 0..=w - SSIM_WINDOW {
            let ux = window_sum(&sum_x, top, left, SSIM_WINDOW) / n;
            let uy = window_sum(&sum_y, top, left, SSIM_WINDOW) / n;
            let uxx = window_sum(&sum_xx, top, left, SSIM_WINDOW) / n;
            let uyy = window_sum(&sum_yy, top, left, SSIM_WINDOW) / n;
            let uxy = window_sum(&sum_xy, top, left, SSIM_WINDOW) / n;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            positions += 1;
        }
    }

    Ok(total / positions as f64)
}

/// Per-band metrics of a `C x H x W` prediction against ground truth
pub fn band_metrics(pred: ArrayView3<f32>, truth: ArrayView3<f32>) -> Result<Vec<MetricSet>> {
    check_shapes(pred.shape(), truth.shape())?;
    pred.axis_iter(Axis(0))
        .zip(truth.axis_iter(Axis(0)))
        .map(|(p, t)| MetricSet::for_band(p, t))
        .collect()
}

/// Map a mean absolute low-resolution difference to a confidence in [0, 1]
pub fn confidence_from_difference(mean_abs_diff: f64) -> f64 {
    (1.0 - 10.0 * mean_abs_diff).clamp(0.0, 1.0)
}

/// Heuristic agreement score between prediction and ground truth.
///
/// Both stacks are downsampled by 0.5 and compared by mean absolute difference.
/// This is a cheap disagreement proxy, not a calibrated probability.
pub fn confidence_score(pred: ArrayView3<f32>, truth: ArrayView3<f32>) -> Result<f64> {
    check_shapes(pred.shape(), truth.shape())?;
    let pred_low = downsample(pred, DEGRADATION_FACTOR)?;
    let truth_low = downsample(truth, DEGRADATION_FACTOR)?;

    let sum = Zip::from(&pred_low)
        .and(&truth_low)
        .fold(0.0f64, |acc, &p, &t| acc + (p as f64 - t as f64).abs());
    Ok(confidence_from_difference(sum / pred_low.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, Array3};

    fn ramp(h: usize, w: usize) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| ((y * w + x) as f32) / (h * w) as f32)
    }

    #[test]
    fn test_identical_inputs() {
        let band = ramp(16, 16);
        let m = MetricSet::for_band(band.view(), band.view()).unwrap();
        assert!(m.psnr.is_infinite() && m.psnr > 0.0);
        assert_abs_diff_eq!(m.ssim, 1.0, epsilon = 1e-9);
        assert_eq!(m.rmse, 0.0);
    }

    #[test]
    fn test_rmse_against_constant_truth() {
        let truth = Array2::<f32>::from_elem((8, 8), 0.5);
        let pred = Array2::from_shape_fn((8, 8), |(y, _)| if y % 2 == 0 { 0.4f32 } else { 0.7 });
        let expected = ((0.1f64.powi(2) + 0.2f64.powi(2)) / 2.0).sqrt();
        assert_abs_diff_eq!(rmse(pred.view(), truth.view()).unwrap(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_psnr_known_value() {
        let truth = Array2::<f32>::zeros((4, 4));
        let pred = Array2::<f32>::from_elem((4, 4), 0.1);
        // mse = 0.01 -> 20 dB
        assert_abs_diff_eq!(psnr(pred.view(), truth.view()).unwrap(), 20.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ssim_decreases_with_noise() {
        let truth = ramp(16, 16);
        let noisy = Array2::from_shape_fn((16, 16), |(y, x)| {
            truth[[y, x]] + if (x + y) % 2 == 0 { 0.05 } else { -0.05 }
        });
        let value = ssim(noisy.view(), truth.view()).unwrap();
        assert!(value < 1.0);
        assert!(value > -1.0);
    }

    #[test]
    fn test_ssim_too_small() {
        let band = Array2::<f32>::zeros((6, 10));
        assert!(matches!(
            ssim(band.view(), band.view()),
            Err(ThermalSrError::Metric(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array2::<f32>::zeros((8, 8));
        let b = Array2::<f32>::zeros((8, 9));
        assert!(rmse(a.view(), b.view()).is_err());
    }

    #[test]
    fn test_confidence_clamped_and_monotone() {
        let mut last = f64::INFINITY;
        for step in 0..30 {
            let diff = step as f64 * 0.01;
            let c = confidence_from_difference(diff);
            assert!((0.0..=1.0).contains(&c));
            assert!(c <= last);
            last = c;
        }
        assert_eq!(confidence_from_difference(0.0), 1.0);
        assert_eq!(confidence_from_difference(0.5), 0.0);
    }

    #[test]
    fn test_confidence_score_of_offset_prediction() {
        let truth = Array3::<f32>::from_elem((2, 8, 8), 0.5);
        let pred = Array3::<f32>::from_elem((2, 8, 8), 0.52);
        let c = confidence_score(pred.view(), truth.view()).unwrap();
        assert_abs_diff_eq!(c, 0.8, epsilon = 1e-5);
    }

    #[test]
    fn test_accumulator_mean() {
        let mut acc = MetricAccumulator::new();
        assert!(acc.mean().is_none());
        acc.add(&MetricSet { psnr: 30.0, ssim: 0.8, rmse: 0.02 });
        acc.add(&MetricSet { psnr: 40.0, ssim: 0.9, rmse: 0.04 });
        let mean = acc.mean().unwrap();
        assert_abs_diff_eq!(mean.psnr, 35.0);
        assert_abs_diff_eq!(mean.ssim, 0.85, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.rmse, 0.03, epsilon = 1e-12);
        assert_eq!(acc.count(), 2);
    }

    #[test]
    fn test_joint_rmse_pools_bands() {
        let truth = Array3::<f32>::zeros((2, 4, 4));
        let mut pred = Array3::<f32>::zeros((2, 4, 4));
        pred.index_axis_mut(Axis(0), 1).fill(0.2);
        // Half the pixels are off by 0.2 -> sqrt(0.02)
        assert_abs_diff_eq!(
            joint_rmse(pred.view(), truth.view()).unwrap(),
            0.02f64.sqrt(),
            epsilon = 1e-6
        );
    }
}
