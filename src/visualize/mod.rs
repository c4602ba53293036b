//! Visualization renderer
//!
//! Consumes already-computed arrays (optical input, prediction, ground truth) and
//! produces the named diagnostic panels as PNG bytes. Inputs are borrowed
//! read-only, so rendering can never alter numeric results.
//!
//! Panels:
//! - `visualization`: 4x2 grid of every diagnostic
//! - `predicted_vs_gt`, `residual_maps`, `edge_analysis`, `statistical_analysis`
//! - `input_preview`, `thermal_rgb`
//! - `optical_true_color`, `optical_false_color`, `final_output`

pub mod colormap;
pub mod composite;
pub mod encode;
pub mod panels;

use std::collections::BTreeMap;

use image::RgbImage;
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use tracing::debug;

use crate::utils::error::{Result, ThermalSrError};
use colormap::{apply, Colormap};
use panels::{cell, fit, hstack, vstack, MAX_PANEL_SIDE};

pub use encode::{encode_png, to_base64};

pub const PANEL_VISUALIZATION: &str = "visualization";
pub const PANEL_PREDICTED_VS_GT: &str = "predicted_vs_gt";
pub const PANEL_RESIDUAL_MAPS: &str = "residual_maps";
pub const PANEL_EDGE_ANALYSIS: &str = "edge_analysis";
pub const PANEL_STATISTICAL_ANALYSIS: &str = "statistical_analysis";
pub const PANEL_INPUT_PREVIEW: &str = "input_preview";
pub const PANEL_THERMAL_RGB: &str = "thermal_rgb";
pub const PANEL_TRUE_COLOR: &str = "optical_true_color";
pub const PANEL_FALSE_COLOR: &str = "optical_false_color";
pub const PANEL_FINAL_OUTPUT: &str = "final_output";

/// Every panel produced by [`render_all`]
pub const PANEL_NAMES: [&str; 10] = [
    PANEL_VISUALIZATION,
    PANEL_PREDICTED_VS_GT,
    PANEL_RESIDUAL_MAPS,
    PANEL_EDGE_ANALYSIS,
    PANEL_STATISTICAL_ANALYSIS,
    PANEL_INPUT_PREVIEW,
    PANEL_THERMAL_RGB,
    PANEL_TRUE_COLOR,
    PANEL_FALSE_COLOR,
    PANEL_FINAL_OUTPUT,
];

/// Panels the `individual_visualizations` group of a report carries
pub const DIAGNOSTIC_PANELS: [&str; 4] = [
    PANEL_PREDICTED_VS_GT,
    PANEL_RESIDUAL_MAPS,
    PANEL_EDGE_ANALYSIS,
    PANEL_STATISTICAL_ANALYSIS,
];

/// Encoded PNG panels keyed by name
pub type Visualizations = BTreeMap<String, Vec<u8>>;

/// Arrays a render pass reads
#[derive(Debug, Clone, Copy)]
pub struct RenderInputs<'a> {
    /// Blue, green, red reflectance `[3, H, W]`
    pub optical: ArrayView3<'a, f32>,
    /// Near-infrared reflectance `[H, W]`
    pub nir: ArrayView2<'a, f32>,
    /// Predicted thermal `[2, H, W]`
    pub predicted: ArrayView3<'a, f32>,
    /// Ground-truth thermal `[2, H, W]`
    pub truth: ArrayView3<'a, f32>,
}

impl<'a> RenderInputs<'a> {
    fn validate(&self) -> Result<()> {
        let (_, h, w) = self.predicted.dim();
        let grids = [
            (self.optical.dim().1, self.optical.dim().2),
            (self.truth.dim().1, self.truth.dim().2),
            self.nir.dim(),
        ];
        if self.predicted.dim() != self.truth.dim() || grids.iter().any(|&g| g != (h, w)) {
            return Err(ThermalSrError::Render(format!(
                "render inputs disagree: optical {:?}, nir {:?}, predicted {:?}, truth {:?}",
                self.optical.dim(),
                self.nir.dim(),
                self.predicted.dim(),
                self.truth.dim()
            )));
        }
        if self.predicted.dim().0 == 0 || h == 0 || w == 0 {
            return Err(ThermalSrError::Render("nothing to render".to_string()));
        }
        Ok(())
    }

    fn residual(&self) -> Array2<f32> {
        &self.predicted.index_axis(Axis(0), 0) - &self.truth.index_axis(Axis(0), 0)
    }
}

/// 4x2 grid: maps, residuals, edges and statistics
fn diagnostic_grid(inputs: &RenderInputs) -> RgbImage {
    let predicted = inputs.predicted.index_axis(Axis(0), 0);
    let truth = inputs.truth.index_axis(Axis(0), 0);
    let residual = inputs.residual();

    let optical_edges = panels::sobel(panels::band_mean(inputs.optical).view());
    let thermal_edges = panels::sobel(panels::band_mean(inputs.predicted).view());

    let pred_values: Vec<f32> = inputs.predicted.iter().copied().collect();
    let truth_values: Vec<f32> = inputs.truth.iter().copied().collect();

    let rows = [
        [apply(predicted, Colormap::Inferno), apply(truth, Colormap::Inferno)],
        [
            apply(residual.view(), Colormap::Coolwarm),
            apply(residual.mapv(f32::abs).view(), Colormap::Magma),
        ],
        [
            panels::edge_overlay(&optical_edges, &thermal_edges),
            apply(thermal_edges.view(), Colormap::Gray),
        ],
        [
            panels::histogram(&truth_values, &pred_values),
            panels::scatter(&truth_values, &pred_values),
        ],
    ];

    let rows: Vec<RgbImage> = rows
        .iter()
        .map(|row| hstack(&[cell(&row[0]), cell(&row[1])]))
        .collect();
    vstack(&rows)
}

/// Render every named panel as an image
pub fn render_panels(inputs: &RenderInputs) -> Result<BTreeMap<&'static str, RgbImage>> {
    inputs.validate()?;

    let mut out = BTreeMap::new();
    out.insert(PANEL_VISUALIZATION, diagnostic_grid(inputs));
    out.insert(
        PANEL_PREDICTED_VS_GT,
        panels::predicted_vs_truth(
            inputs.predicted.index_axis(Axis(0), 0),
            inputs.truth.index_axis(Axis(0), 0),
        ),
    );
    out.insert(PANEL_RESIDUAL_MAPS, panels::residual_maps(inputs.residual().view()));
    out.insert(
        PANEL_EDGE_ANALYSIS,
        panels::edge_analysis(inputs.optical, inputs.predicted),
    );
    out.insert(
        PANEL_STATISTICAL_ANALYSIS,
        panels::statistical_analysis(inputs.predicted, inputs.truth),
    );
    out.insert(
        PANEL_INPUT_PREVIEW,
        fit(apply(inputs.optical.index_axis(Axis(0), 0), Colormap::Viridis), MAX_PANEL_SIDE),
    );
    out.insert(
        PANEL_THERMAL_RGB,
        fit(apply(inputs.predicted.index_axis(Axis(0), 0), Colormap::Inferno), MAX_PANEL_SIDE),
    );
    out.insert(PANEL_TRUE_COLOR, composite::true_color(inputs.optical)?);
    out.insert(PANEL_FALSE_COLOR, composite::false_color(inputs.optical, inputs.nir)?);
    out.insert(
        PANEL_FINAL_OUTPUT,
        composite::final_output(inputs.optical, inputs.predicted)?,
    );

    Ok(out)
}

/// Render and PNG-encode every named panel
pub fn render_all(inputs: &RenderInputs) -> Result<Visualizations> {
    let panels = render_panels(inputs)?;
    let mut encoded = Visualizations::new();
    for (name, img) in panels {
        let bytes = encode_png(&img)?;
        debug!("Rendered {} ({}x{}, {} bytes)", name, img.width(), img.height(), bytes.len());
        encoded.insert(name.to_string(), bytes);
    }
    Ok(encoded)
}
