//! Diagnostic panels: paired maps, edge analysis and value statistics.
//!
//! Panels are plain RGB rasters. Plots use a fixed square plot area with a light
//! grid and dark axes; maps are rendered at source resolution and shrunk only
//! when they exceed [`MAX_PANEL_SIDE`].

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

use super::colormap::{apply, Colormap};

/// Largest side of a single map inside a panel
pub const MAX_PANEL_SIDE: u32 = 512;

/// Side of each cell in the diagnostic grid
pub const CELL_SIZE: u32 = 256;

/// Bins of the value histogram
pub const HISTOGRAM_BINS: usize = 50;

const GAP: u32 = 8;
const PLOT_SIZE: u32 = 256;
const PLOT_MARGIN: u32 = 24;

const COLOR_BACKGROUND: [u8; 3] = [255, 255, 255];
const COLOR_GRID: [u8; 3] = [236, 240, 241];
const COLOR_AXIS: [u8; 3] = [44, 62, 80];
const COLOR_TRUTH: [u8; 3] = [255, 0, 0];
const COLOR_PREDICTED: [u8; 3] = [0, 128, 0];
const COLOR_SCATTER: [u8; 3] = [0, 0, 255];

fn blend(pixel: &mut Rgb<u8>, color: [u8; 3], alpha: f32) {
    for c in 0..3 {
        let base = pixel.0[c] as f32;
        pixel.0[c] = (base + (color[c] as f32 - base) * alpha).round() as u8;
    }
}

fn blank(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(COLOR_BACKGROUND))
}

/// Shrink an image so neither side exceeds `max_side`, keeping aspect ratio
pub fn fit(img: RgbImage, max_side: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if longest <= max_side {
        return img;
    }
    let scale = max_side as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    imageops::resize(&img, nw, nh, FilterType::Triangle)
}

/// Resize to a square grid cell
pub fn cell(img: &RgbImage) -> RgbImage {
    imageops::resize(img, CELL_SIZE, CELL_SIZE, FilterType::Triangle)
}

/// Place images left to right on a white background
pub fn hstack(images: &[RgbImage]) -> RgbImage {
    let width = images.iter().map(|i| i.width()).sum::<u32>()
        + GAP * images.len().saturating_sub(1) as u32;
    let height = images.iter().map(|i| i.height()).max().unwrap_or(1);
    let mut canvas = blank(width.max(1), height);

    let mut x = 0i64;
    for img in images {
        imageops::overlay(&mut canvas, img, x, 0);
        x += (img.width() + GAP) as i64;
    }
    canvas
}

/// Place images top to bottom on a white background
pub fn vstack(images: &[RgbImage]) -> RgbImage {
    let width = images.iter().map(|i| i.width()).max().unwrap_or(1);
    let height = images.iter().map(|i| i.height()).sum::<u32>()
        + GAP * images.len().saturating_sub(1) as u32;
    let mut canvas = blank(width, height.max(1));

    let mut y = 0i64;
    for img in images {
        imageops::overlay(&mut canvas, img, 0, y);
        y += (img.height() + GAP) as i64;
    }
    canvas
}

fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let r = if i < 0 {
        -i - 1
    } else if i >= n {
        2 * n - i - 1
    } else {
        i
    };
    r.clamp(0, n - 1) as usize
}

/// Sobel gradient magnitude, `sqrt((gx^2 + gy^2) / 2)`, kernels scaled by 1/4
/// and borders handled by reflection.
pub fn sobel(band: ArrayView2<f32>) -> Array2<f32> {
    let (h, w) = band.dim();
    let at = |y: isize, x: isize| band[[reflect(y, h), reflect(x, w)]];

    Array2::from_shape_fn((h, w), |(y, x)| {
        let (y, x) = (y as isize, x as isize);
        let gy = (at(y - 1, x - 1) + 2.0 * at(y - 1, x) + at(y - 1, x + 1)
            - at(y + 1, x - 1)
            - 2.0 * at(y + 1, x)
            - at(y + 1, x + 1))
            / 4.0;
        let gx = (at(y - 1, x - 1) + 2.0 * at(y, x - 1) + at(y + 1, x - 1)
            - at(y - 1, x + 1)
            - 2.0 * at(y, x + 1)
            - at(y + 1, x + 1))
            / 4.0;
        ((gx * gx + gy * gy) / 2.0).sqrt()
    })
}

/// Per-pixel mean over the bands of a stack
pub fn band_mean(stack: ArrayView3<f32>) -> Array2<f32> {
    stack
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array2::zeros((stack.dim().1, stack.dim().2)))
}

fn max_normalized(band: &Array2<f32>) -> Array2<f32> {
    let max = band.iter().cloned().filter(|v| v.is_finite()).fold(0.0f32, f32::max);
    if max > 0.0 {
        band.mapv(|v| (v / max).clamp(0.0, 1.0))
    } else {
        Array2::zeros(band.dim())
    }
}

/// Two-channel edge overlay: optical edges in red, thermal edges in green
pub fn edge_overlay(optical_edges: &Array2<f32>, thermal_edges: &Array2<f32>) -> RgbImage {
    let red = max_normalized(optical_edges);
    let green = max_normalized(thermal_edges);
    let (h, w) = red.dim();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let (r, g) = (red[[y as usize, x as usize]], green[[y as usize, x as usize]]);
        Rgb([(r * 255.0).round() as u8, (g * 255.0).round() as u8, 0])
    })
}

/// Square plot canvas with grid and axes
struct Plot {
    canvas: RgbImage,
    x_range: (f32, f32),
    y_range: (f32, f32),
}

impl Plot {
    fn new(x_range: (f32, f32), y_range: (f32, f32)) -> Self {
        let side = PLOT_SIZE + 2 * PLOT_MARGIN;
        let mut canvas = blank(side, side);

        for k in 0..=4 {
            let offset = PLOT_MARGIN + k * PLOT_SIZE / 4;
            for t in PLOT_MARGIN..PLOT_MARGIN + PLOT_SIZE {
                canvas.put_pixel(offset.min(side - 1), t, Rgb(COLOR_GRID));
                canvas.put_pixel(t, offset.min(side - 1), Rgb(COLOR_GRID));
            }
        }
        let bottom = PLOT_MARGIN + PLOT_SIZE;
        for t in PLOT_MARGIN..=bottom {
            canvas.put_pixel(PLOT_MARGIN, t, Rgb(COLOR_AXIS));
            canvas.put_pixel(t, bottom, Rgb(COLOR_AXIS));
        }

        Self {
            canvas,
            x_range,
            y_range,
        }
    }

    /// Data coordinates to canvas pixel, `None` outside the plot area
    fn to_pixel(&self, x: f32, y: f32) -> Option<(u32, u32)> {
        let fx = (x - self.x_range.0) / (self.x_range.1 - self.x_range.0);
        let fy = (y - self.y_range.0) / (self.y_range.1 - self.y_range.0);
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        let px = PLOT_MARGIN + (fx * (PLOT_SIZE - 1) as f32).round() as u32;
        let py = PLOT_MARGIN + PLOT_SIZE - 1 - (fy * (PLOT_SIZE - 1) as f32).round() as u32;
        Some((px, py))
    }

    fn blend_at(&mut self, px: u32, py: u32, color: [u8; 3], alpha: f32) {
        if px < self.canvas.width() && py < self.canvas.height() {
            blend(self.canvas.get_pixel_mut(px, py), color, alpha);
        }
    }
}

fn padded_range(lo: f32, hi: f32) -> (f32, f32) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, lo + 0.5)
    }
}

fn finite_range(values: impl Iterator<Item = f32>) -> (f32, f32) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        (0.0, 1.0)
    } else {
        (lo, hi)
    }
}

/// Bin counts over `[lo, hi]`; the top edge belongs to the last bin
pub fn histogram_counts(values: &[f32], lo: f32, hi: f32, bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    let span = hi - lo;
    for &v in values.iter().filter(|v| v.is_finite()) {
        if v < lo || v > hi {
            continue;
        }
        let idx = if span > 0.0 {
            (((v - lo) / span) * bins as f32).floor() as usize
        } else {
            bins / 2
        };
        counts[idx.min(bins - 1)] += 1;
    }
    counts
}

/// Overlaid histograms of ground truth (red) and predicted (green) values
pub fn histogram(truth: &[f32], predicted: &[f32]) -> RgbImage {
    let (lo, hi) = finite_range(truth.iter().chain(predicted.iter()).copied());
    let (lo, hi) = padded_range(lo, hi);
    let gt_counts = histogram_counts(truth, lo, hi, HISTOGRAM_BINS);
    let pred_counts = histogram_counts(predicted, lo, hi, HISTOGRAM_BINS);
    let peak = gt_counts.iter().chain(pred_counts.iter()).copied().max().unwrap_or(0).max(1);

    let mut plot = Plot::new((0.0, HISTOGRAM_BINS as f32), (0.0, peak as f32));
    for (counts, color) in [(&gt_counts, COLOR_TRUTH), (&pred_counts, COLOR_PREDICTED)] {
        for (bin, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let (Some((x0, y_top)), Some((x1, _))) = (
                plot.to_pixel(bin as f32, count as f32),
                plot.to_pixel((bin + 1) as f32, 0.0),
            ) else {
                continue;
            };
            let bottom = PLOT_MARGIN + PLOT_SIZE - 1;
            for px in x0..x1.max(x0 + 1) {
                for py in y_top..=bottom {
                    plot.blend_at(px, py, color, 0.6);
                }
            }
        }
    }
    plot.canvas
}

/// Predicted-vs-truth scatter with a dashed identity line
pub fn scatter(truth: &[f32], predicted: &[f32]) -> RgbImage {
    let (lo, hi) = finite_range(truth.iter().chain(predicted.iter()).copied());
    let range = padded_range(lo.min(0.0), hi.max(1.0));
    let mut plot = Plot::new(range, range);

    for (&t, &p) in truth.iter().zip(predicted) {
        if let Some((px, py)) = plot.to_pixel(t, p) {
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                plot.blend_at(px + dx, py.saturating_sub(dy), COLOR_SCATTER, 0.3);
            }
        }
    }

    let steps = PLOT_SIZE * 2;
    for s in 0..=steps {
        // 6 pixels on, 4 off
        if (s / 2) % 10 >= 6 {
            continue;
        }
        let v = s as f32 / steps as f32;
        if let Some((px, py)) = plot.to_pixel(v, v) {
            plot.blend_at(px, py, COLOR_TRUTH, 1.0);
        }
    }
    plot.canvas
}

/// Predicted and ground-truth band 1 side by side (inferno)
pub fn predicted_vs_truth(predicted: ArrayView2<f32>, truth: ArrayView2<f32>) -> RgbImage {
    hstack(&[
        fit(apply(predicted, Colormap::Inferno), MAX_PANEL_SIDE),
        fit(apply(truth, Colormap::Inferno), MAX_PANEL_SIDE),
    ])
}

/// Residual (coolwarm) and absolute error (magma) maps of one band
pub fn residual_maps(residual: ArrayView2<f32>) -> RgbImage {
    let absolute = residual.mapv(f32::abs);
    hstack(&[
        fit(apply(residual, Colormap::Coolwarm), MAX_PANEL_SIDE),
        fit(apply(absolute.view(), Colormap::Magma), MAX_PANEL_SIDE),
    ])
}

/// Edge overlay next to the predicted thermal edges in gray
pub fn edge_analysis(optical: ArrayView3<f32>, predicted: ArrayView3<f32>) -> RgbImage {
    let optical_edges = sobel(band_mean(optical).view());
    let thermal_edges = sobel(band_mean(predicted).view());
    hstack(&[
        fit(edge_overlay(&optical_edges, &thermal_edges), MAX_PANEL_SIDE),
        fit(apply(thermal_edges.view(), Colormap::Gray), MAX_PANEL_SIDE),
    ])
}

/// Value histogram and scatter over all bands
pub fn statistical_analysis(predicted: ArrayView3<f32>, truth: ArrayView3<f32>) -> RgbImage {
    let pred_values: Vec<f32> = predicted.iter().copied().collect();
    let truth_values: Vec<f32> = truth.iter().copied().collect();
    hstack(&[
        histogram(&truth_values, &pred_values),
        scatter(&truth_values, &pred_values),
    ])
}
