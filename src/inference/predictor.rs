//! Inference Engine
//!
//! Holds a loaded [`FusionNet`] immutably for the lifetime of the hosting process
//! and runs the single-file inference contract:
//! load scene -> degrade -> forward -> metrics -> render panels.
//! The numeric stage finishes before rendering starts and rendering only reads
//! its results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::tensor::backend::Backend;
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::burn_dataset::{stack_to_tensor, tensor_to_array};
use crate::dataset::{degrade, load_scene, SceneBands};
use crate::model::{load_checkpoint, FusionNet, FusionNetConfig};
use crate::utils::error::{Result, ThermalSrError};
use crate::utils::metrics::{band_metrics, confidence_score, joint_rmse, MetricSet};
use crate::visualize::{
    self, to_base64, RenderInputs, Visualizations, DIAGNOSTIC_PANELS, PANEL_FALSE_COLOR,
    PANEL_FINAL_OUTPUT, PANEL_INPUT_PREVIEW, PANEL_THERMAL_RGB, PANEL_TRUE_COLOR,
    PANEL_VISUALIZATION,
};

/// Run the network on one scene-sized stack and return the `[2, H, W]` prediction.
///
/// The thermal stack is degraded onto the optical grid before the forward pass.
pub fn reconstruct<B: Backend>(
    model: &FusionNet<B>,
    optical: &Array3<f32>,
    thermal: &Array3<f32>,
    device: &B::Device,
) -> Result<Array3<f32>> {
    let (_, h, w) = optical.dim();
    let degraded = degrade(thermal.view(), h, w)?;

    let prediction = model.try_forward(
        stack_to_tensor::<B>(optical, device),
        stack_to_tensor::<B>(&degraded, device),
    )?;
    Ok(tensor_to_array(prediction)?.index_axis_move(Axis(0), 0))
}

/// Numeric outcome of one inference call
#[derive(Debug, Clone)]
pub struct ThermalAnalysis {
    /// Predicted thermal field `[2, H, W]`
    pub prediction: Array3<f32>,
    /// PSNR, SSIM and RMSE of each predicted band
    pub band_metrics: Vec<MetricSet>,
    /// Band-mean PSNR and SSIM with RMSE pooled over both bands
    pub metrics: MetricSet,
    /// Low-resolution agreement heuristic in [0, 1]
    pub confidence: f64,
}

/// Everything one inference call produces
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub analysis: ThermalAnalysis,
    /// PNG panels keyed by name
    pub visualizations: Visualizations,
    /// Wall time of the whole call
    pub inference_time_ms: f64,
}

/// Successful inference payload as reported to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSummary {
    /// `None` when the prediction is exact and PSNR is unbounded
    pub psnr: Option<f64>,
    pub ssim: f64,
    pub rmse: f64,
    pub confidence: f64,
    /// Base64 PNG of the 4x2 diagnostic grid
    pub visualization: String,
    /// Base64 PNGs of the individual diagnostic panels
    pub individual_visualizations: BTreeMap<String, String>,
    pub input_preview: String,
    pub thermal_rgb: String,
    pub optical_true_color: String,
    pub optical_false_color: String,
    pub final_output: String,
}

/// Structured result of the inference contract: a summary or an error message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InferenceReport {
    Success(Box<InferenceSummary>),
    Failure { error: String },
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl InferenceReport {
    /// Build the transport form of a result, rounding numbers to 3 decimals
    pub fn from_result(result: &InferenceResult) -> Result<Self> {
        let panel = |name: &str| -> Result<String> {
            result
                .visualizations
                .get(name)
                .map(|bytes| to_base64(bytes))
                .ok_or_else(|| ThermalSrError::Render(format!("panel '{}' missing", name)))
        };

        let individual_visualizations = DIAGNOSTIC_PANELS
            .iter()
            .map(|&name| Ok((name.to_string(), panel(name)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let metrics = &result.analysis.metrics;
        Ok(Self::Success(Box::new(InferenceSummary {
            psnr: metrics.psnr.is_finite().then(|| round3(metrics.psnr)),
            ssim: round3(metrics.ssim),
            rmse: round3(metrics.rmse),
            confidence: round3(result.analysis.confidence),
            visualization: panel(PANEL_VISUALIZATION)?,
            individual_visualizations,
            input_preview: panel(PANEL_INPUT_PREVIEW)?,
            thermal_rgb: panel(PANEL_THERMAL_RGB)?,
            optical_true_color: panel(PANEL_TRUE_COLOR)?,
            optical_false_color: panel(PANEL_FALSE_COLOR)?,
            final_output: panel(PANEL_FINAL_OUTPUT)?,
        })))
    }

    pub fn failure(error: &ThermalSrError) -> Self {
        Self::Failure {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Liveness information for a hosting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub model_loaded: bool,
    pub device: String,
}

/// Loaded-once, read-only inference handle
#[derive(Debug)]
pub struct InferenceEngine<B: Backend> {
    model: FusionNet<B>,
    device: B::Device,
    checkpoint: Option<PathBuf>,
}

impl<B: Backend> InferenceEngine<B> {
    /// Restore a model from a checkpoint stem
    pub fn load(checkpoint: &Path, config: &FusionNetConfig, device: B::Device) -> Result<Self> {
        let model = load_checkpoint::<B>(config, checkpoint, &device)?;
        info!("Inference engine ready on {:?}", device);
        Ok(Self {
            model,
            device,
            checkpoint: Some(checkpoint.to_path_buf()),
        })
    }

    /// Wrap an already-built model
    pub fn from_model(model: FusionNet<B>, device: B::Device) -> Self {
        Self {
            model,
            device,
            checkpoint: None,
        }
    }

    pub fn model(&self) -> &FusionNet<B> {
        &self.model
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn checkpoint(&self) -> Option<&Path> {
        self.checkpoint.as_deref()
    }

    /// Numeric stage: prediction, per-band metrics, pooled RMSE and confidence
    pub fn analyze(&self, scene: &SceneBands) -> Result<ThermalAnalysis> {
        let prediction = reconstruct(&self.model, &scene.optical, &scene.thermal, &self.device)?;
        let truth = scene.thermal.view();

        let per_band = band_metrics(prediction.view(), truth)?;
        let mean = MetricSet::mean(&per_band)
            .ok_or_else(|| ThermalSrError::Inference("prediction has no bands".to_string()))?;
        let metrics = MetricSet {
            rmse: joint_rmse(prediction.view(), truth)?,
            ..mean
        };
        let confidence = confidence_score(prediction.view(), truth)?;

        Ok(ThermalAnalysis {
            prediction,
            band_metrics: per_band,
            metrics,
            confidence,
        })
    }

    /// Full inference on an already-loaded scene
    pub fn infer_scene(&self, scene: &SceneBands) -> Result<InferenceResult> {
        let start = Instant::now();
        let analysis = self.analyze(scene)?;

        let visualizations = visualize::render_all(&RenderInputs {
            optical: scene.optical.view(),
            nir: scene.nir.view(),
            predicted: analysis.prediction.view(),
            truth: scene.thermal.view(),
        })?;

        let inference_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Inference done in {:.1} ms | {} | confidence {:.3}",
            inference_time_ms, analysis.metrics, analysis.confidence
        );

        Ok(InferenceResult {
            analysis,
            visualizations,
            inference_time_ms,
        })
    }

    /// Full inference on a raster file
    pub fn infer<P: AsRef<Path>>(&self, path: P) -> Result<InferenceResult> {
        let scene = load_scene(path.as_ref())?;
        self.infer_scene(&scene)
    }

    /// Inference contract: never fails, errors become a structured report
    pub fn infer_report<P: AsRef<Path>>(&self, path: P) -> InferenceReport {
        let path = path.as_ref();
        match self
            .infer(path)
            .and_then(|result| InferenceReport::from_result(&result))
        {
            Ok(report) => report,
            Err(e) => {
                warn!("Inference on {:?} failed: {}", path, e);
                InferenceReport::failure(&ThermalSrError::Inference(e.to_string()))
            }
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            model_loaded: true,
            device: format!("{:?}", self.device),
        }
    }
}

#[cfg(all(test, feature = "ndarray"))]
mod tests {
    use super::*;
    use crate::dataset::raster::tests::synthetic_stack;
    use crate::visualize::PANEL_NAMES;
    use approx::assert_abs_diff_eq;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn engine() -> InferenceEngine<TestBackend> {
        let device = Default::default();
        let model = FusionNetConfig::new()
            .with_branch_filters(4)
            .init::<TestBackend>(&device);
        InferenceEngine::from_model(model, device)
    }

    fn constant_scene(size: usize) -> SceneBands {
        synthetic_stack(11, size, size, |band| match band {
            2..=4 => 5000.0,
            10 | 11 => 150.0,
            _ => 1000.0,
        })
        .split()
        .unwrap()
    }

    #[test]
    fn test_constant_scene_end_to_end() {
        let scene = constant_scene(256);
        assert!(scene.optical.iter().all(|&v| (v - 0.5).abs() < 1e-6));
        assert!(scene.thermal.iter().all(|&v| (v - 0.5).abs() < 1e-6));

        let result = engine().infer_scene(&scene).unwrap();
        let prediction = &result.analysis.prediction;
        assert_eq!(prediction.dim(), (2, 256, 256));

        let expected = (prediction
            .iter()
            .map(|&p| (p as f64 - 0.5).powi(2))
            .sum::<f64>()
            / prediction.len() as f64)
            .sqrt();
        assert_abs_diff_eq!(result.analysis.metrics.rmse, expected, epsilon = 1e-6);
        assert!((0.0..=1.0).contains(&result.analysis.confidence));
        assert_eq!(result.analysis.band_metrics.len(), 2);

        for name in PANEL_NAMES {
            assert!(result.visualizations.contains_key(name), "missing {}", name);
        }
    }

    #[test]
    fn test_report_shape() {
        let result = engine().infer_scene(&constant_scene(16)).unwrap();
        let report = InferenceReport::from_result(&result).unwrap();
        assert!(report.is_success());

        let json = serde_json::to_value(&report).unwrap();
        for key in ["ssim", "rmse", "confidence", "visualization", "final_output"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(
            json["individual_visualizations"].as_object().unwrap().len(),
            DIAGNOSTIC_PANELS.len()
        );
    }

    #[test]
    fn test_missing_file_is_structured_error() {
        let report = engine().infer_report("/nonexistent/scene_all_bands.tif");
        match report {
            InferenceReport::Failure { error } => assert!(error.contains("Inference error")),
            InferenceReport::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_inference_is_repeatable() {
        let engine = engine();
        let scene = constant_scene(16);
        let a = engine.analyze(&scene).unwrap();
        let b = engine.analyze(&scene).unwrap();
        assert_eq!(a.prediction, b.prediction);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn test_health() {
        let health = engine().health();
        assert!(health.model_loaded);
        assert!(!health.device.is_empty());
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.123456), 0.123);
        assert_eq!(round3(31.99951), 32.0);
    }
}
