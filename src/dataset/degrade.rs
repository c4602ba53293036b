//! Thermal Degradation Operator
//!
//! Simulates the native TIRS resolution by resampling the thermal stack down by
//! [`DEGRADATION_FACTOR`] and back up to the optical grid. Both passes use bilinear
//! interpolation with half-pixel (corner-unaligned) sampling, matching the usual
//! `align_corners = false` resize convention.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::utils::error::{Result, ThermalSrError};

/// Downsampling factor of the degradation round-trip
pub const DEGRADATION_FACTOR: f64 = 0.5;

/// Source coordinate step for one axis.
///
/// With an explicit scale factor the step is `1 / scale`, otherwise `in / out`.
fn axis_step(in_len: usize, out_len: usize, scale: Option<f64>) -> f64 {
    match scale {
        Some(s) if s > 0.0 => 1.0 / s,
        _ => in_len as f64 / out_len as f64,
    }
}

/// Precomputed interpolation taps for one axis
fn axis_taps(in_len: usize, out_len: usize, scale: Option<f64>) -> Vec<(usize, usize, f32)> {
    let step = axis_step(in_len, out_len, scale);
    (0..out_len)
        .map(|dst| {
            let src = (step * (dst as f64 + 0.5) - 0.5).max(0.0);
            let i0 = (src.floor() as usize).min(in_len - 1);
            let i1 = if i0 + 1 < in_len { i0 + 1 } else { i0 };
            let frac = (src - i0 as f64) as f32;
            (i0, i1, frac)
        })
        .collect()
}

/// Bilinear resize of a single band to `(out_h, out_w)`.
///
/// `scale` is the `(row, col)` scale factor used to produce the output size, when
/// the size was derived from one; it only affects the coordinate mapping.
pub fn resize_bilinear(
    band: ArrayView2<f32>,
    out_h: usize,
    out_w: usize,
    scale: Option<(f64, f64)>,
) -> Result<Array2<f32>> {
    let (in_h, in_w) = band.dim();
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Err(ThermalSrError::Dimension(format!(
            "cannot resample {}x{} to {}x{}",
            in_h, in_w, out_h, out_w
        )));
    }

    let rows = axis_taps(in_h, out_h, scale.map(|s| s.0));
    let cols = axis_taps(in_w, out_w, scale.map(|s| s.1));

    let mut out = Array2::<f32>::zeros((out_h, out_w));
    for (y, &(y0, y1, fy)) in rows.iter().enumerate() {
        for (x, &(x0, x1, fx)) in cols.iter().enumerate() {
            let top = (1.0 - fx) * band[[y0, x0]] + fx * band[[y0, x1]];
            let bottom = (1.0 - fx) * band[[y1, x0]] + fx * band[[y1, x1]];
            out[[y, x]] = (1.0 - fy) * top + fy * bottom;
        }
    }
    Ok(out)
}

/// Resize every band of a `C x H x W` stack to `(out_h, out_w)`
pub fn resize_stack(
    stack: ArrayView3<f32>,
    out_h: usize,
    out_w: usize,
    scale: Option<(f64, f64)>,
) -> Result<Array3<f32>> {
    let channels = stack.len_of(Axis(0));
    let mut out = Array3::<f32>::zeros((channels, out_h, out_w));
    for (c, band) in stack.axis_iter(Axis(0)).enumerate() {
        let resized = resize_bilinear(band, out_h, out_w, scale)?;
        out.index_axis_mut(Axis(0), c).assign(&resized);
    }
    Ok(out)
}

/// Downsample a stack by a scale factor; output size is `floor(len * factor)`
pub fn downsample(stack: ArrayView3<f32>, factor: f64) -> Result<Array3<f32>> {
    let (_, h, w) = stack.dim();
    let out_h = (h as f64 * factor).floor() as usize;
    let out_w = (w as f64 * factor).floor() as usize;
    if out_h == 0 || out_w == 0 {
        return Err(ThermalSrError::Dimension(format!(
            "{}x{} is too small to downsample by {}",
            h, w, factor
        )));
    }
    resize_stack(stack, out_h, out_w, Some((factor, factor)))
}

/// Degrade a thermal stack: downsample by [`DEGRADATION_FACTOR`], then upsample to
/// exactly `(target_h, target_w)` (the optical grid).
pub fn degrade(thermal: ArrayView3<f32>, target_h: usize, target_w: usize) -> Result<Array3<f32>> {
    let low = downsample(thermal, DEGRADATION_FACTOR)?;
    resize_stack(low.view(), target_h, target_w, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    #[test]
    fn test_downsample_averages_pixel_pairs() {
        // With a 0.5 factor each output pixel sits between two input pixels.
        let band = array![[0.0f32, 2.0, 4.0, 6.0], [0.0, 2.0, 4.0, 6.0]];
        let stack = band.insert_axis(Axis(0));
        let low = downsample(stack.view(), 0.5).unwrap();
        assert_eq!(low.dim(), (1, 1, 2));
        assert_abs_diff_eq!(low[[0, 0, 0]], 1.0);
        assert_abs_diff_eq!(low[[0, 0, 1]], 5.0);
    }

    #[test]
    fn test_upsample_clamps_at_borders() {
        let band = array![[1.0f32, 3.0]];
        let up = resize_bilinear(band.view(), 1, 4, None).unwrap();
        // src x = 0.5 * (dst + 0.5) - 0.5 -> [-0.25 (clamped), 0.25, 0.75, 1.25]
        assert_abs_diff_eq!(up[[0, 0]], 1.0);
        assert_abs_diff_eq!(up[[0, 1]], 1.5);
        assert_abs_diff_eq!(up[[0, 2]], 2.5);
        assert_abs_diff_eq!(up[[0, 3]], 3.0);
    }

    #[test]
    fn test_degrade_matches_target_shape() {
        for &(h, w) in &[(16usize, 16usize), (15, 9), (33, 20)] {
            let thermal = Array3::<f32>::from_elem((2, h, w), 0.5);
            let degraded = degrade(thermal.view(), 24, 18).unwrap();
            assert_eq!(degraded.dim(), (2, 24, 18));
        }
    }

    #[test]
    fn test_degrade_preserves_constant_field() {
        let thermal = Array3::<f32>::from_elem((2, 32, 32), 0.5);
        let degraded = degrade(thermal.view(), 32, 32).unwrap();
        for v in degraded.iter() {
            assert_abs_diff_eq!(*v, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_degrade_rejects_single_pixel() {
        let thermal = Array3::<f32>::zeros((2, 1, 1));
        assert!(matches!(
            degrade(thermal.view(), 4, 4),
            Err(ThermalSrError::Dimension(_))
        ));
    }
}
