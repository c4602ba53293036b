//! Held-out evaluation
//!
//! Runs degrade -> forward on each held-out sample and averages per-band PSNR,
//! SSIM and RMSE over bands and samples. Failed samples are logged and skipped
//! so a few corrupt rasters do not invalidate the aggregate.

use burn::tensor::backend::Backend;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::predictor::reconstruct;
use crate::dataset::{PatchPair, PatchSource};
use crate::model::FusionNet;
use crate::utils::error::Result;
use crate::utils::logging::SampleProgress;
use crate::utils::metrics::{band_metrics, MetricAccumulator, MetricSet};

/// Aggregate metrics of an evaluation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean over bands and evaluated samples, `None` if every sample failed
    pub metrics: Option<MetricSet>,
    pub evaluated: usize,
    pub skipped: usize,
}

impl EvaluationReport {
    pub fn display(&self) -> String {
        match &self.metrics {
            Some(m) => format!(
                "{} ({} samples, {} skipped)",
                m, self.evaluated, self.skipped
            ),
            None => format!("no samples evaluated ({} skipped)", self.skipped),
        }
    }
}

/// Per-band metrics of one patch pair
pub fn evaluate_pair<B: Backend>(
    model: &FusionNet<B>,
    pair: &PatchPair,
    device: &B::Device,
) -> Result<Vec<MetricSet>> {
    let prediction = reconstruct(model, &pair.optical, &pair.thermal, device)?;
    band_metrics(prediction.view(), pair.thermal.view())
}

/// Evaluate every sample of `source` in index order
pub fn evaluate<B: Backend, S: PatchSource + ?Sized>(
    model: &FusionNet<B>,
    source: &S,
    device: &B::Device,
    rng: &mut ChaCha8Rng,
) -> EvaluationReport {
    let mut acc = MetricAccumulator::new();
    let mut evaluated = 0usize;
    let mut skipped = 0usize;
    let mut progress = SampleProgress::new("Evaluation", source.len());

    for index in 0..source.len() {
        let outcome = source
            .draw(index, rng)
            .and_then(|pair| evaluate_pair(model, &pair, device));

        match outcome {
            Ok(sets) => {
                acc.extend(&sets);
                evaluated += 1;
                progress.record(true);
            }
            Err(e) => {
                if e.is_sample_scoped() {
                    warn!("Skipping evaluation sample {}: {}", index, e);
                } else {
                    error!("Evaluation sample {} failed: {}", index, e);
                }
                skipped += 1;
                progress.record(false);
            }
        }
    }
    progress.finish();

    let report = EvaluationReport {
        metrics: acc.mean(),
        evaluated,
        skipped,
    };
    info!("Evaluation: {}", report.display());
    report
}

#[cfg(all(test, feature = "ndarray"))]
mod tests {
    use super::*;
    use crate::model::FusionNetConfig;
    use crate::utils::error::ThermalSrError;
    use burn_ndarray::NdArray;
    use ndarray::Array3;
    use rand::SeedableRng;

    type TestBackend = NdArray;

    struct Samples {
        failing: Vec<usize>,
        len: usize,
    }

    impl PatchSource for Samples {
        fn len(&self) -> usize {
            self.len
        }

        fn draw(&self, index: usize, _rng: &mut ChaCha8Rng) -> Result<PatchPair> {
            if self.failing.contains(&index) {
                return Err(ThermalSrError::read("corrupt_all_bands.tif", "truncated"));
            }
            Ok(PatchPair {
                optical: Array3::from_shape_fn((3, 12, 12), |(c, y, x)| (c + y + x) as f32 / 30.0),
                thermal: Array3::from_shape_fn((2, 12, 12), |(_, y, x)| 0.4 + (y * x) as f32 / 500.0),
                top: 0,
                left: 0,
            })
        }
    }

    fn model() -> FusionNet<TestBackend> {
        FusionNetConfig::new()
            .with_branch_filters(4)
            .init::<TestBackend>(&Default::default())
    }

    #[test]
    fn test_failed_samples_are_skipped() {
        let source = Samples { failing: vec![1], len: 3 };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let report = evaluate(&model(), &source, &Default::default(), &mut rng);

        assert_eq!(report.evaluated, 2);
        assert_eq!(report.skipped, 1);
        let metrics = report.metrics.unwrap();
        assert!(metrics.rmse.is_finite());
        assert!(metrics.ssim <= 1.0);
    }

    #[test]
    fn test_all_failing_has_no_metrics() {
        let source = Samples { failing: vec![0, 1], len: 2 };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let report = evaluate(&model(), &source, &Default::default(), &mut rng);
        assert!(report.metrics.is_none());
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_mean_matches_single_sample() {
        let model = model();
        let device = Default::default();
        let source = Samples { failing: vec![], len: 1 };
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let pair = source.draw(0, &mut rng).unwrap();
        let per_band = evaluate_pair(&model, &pair, &device).unwrap();
        let expected = MetricSet::mean(&per_band).unwrap();

        let report = evaluate(&model, &source, &device, &mut rng);
        assert_eq!(report.metrics.unwrap(), expected);
    }
}
