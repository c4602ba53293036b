//! Optical composites and the fused thermal/optical output.
//!
//! True and false colour composites use a per-band 2nd/98th percentile stretch.
//! The fused output replaces part of the CIELAB lightness of the true-colour
//! image with a histogram-equalized thermal intensity, then sharpens the result.

use image::{imageops, Rgb, RgbImage};
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

use super::panels::band_mean;
use crate::utils::error::{Result, ThermalSrError};

/// Lower and upper percentiles of the contrast stretch
pub const STRETCH_PERCENTILES: (f64, f64) = (2.0, 98.0);

/// Share of thermal intensity in the fused lightness channel
pub const THERMAL_BLEND: f32 = 0.35;

/// Bins of the histogram equalization
pub const EQUALIZE_BINS: usize = 256;

const UNSHARP_SIGMA: f32 = 1.0;
const UNSHARP_THRESHOLD: i32 = 1;

// sRGB (D65) <-> CIE XYZ
const XYZ_FROM_RGB: [[f32; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];
const RGB_FROM_XYZ: [[f32; 3]; 3] = [
    [3.240_481_3, -1.537_151_5, -0.498_536_3],
    [-0.969_254_9, 1.875_990_0, 0.041_555_93],
    [0.055_646_64, -0.204_041_3, 1.057_311_1],
];
const D65_WHITE: [f32; 3] = [0.95047, 1.0, 1.08883];

/// Percentile with linear interpolation between order statistics
pub fn percentile(values: &[f32], p: f64) -> Option<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = (rank - lower as f64) as f32;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Clip a band to its 2nd/98th percentiles and rescale to [0, 1]
pub fn stretch(band: ArrayView2<f32>) -> Array2<f32> {
    let values: Vec<f32> = band.iter().copied().collect();
    let (lo, hi) = match (
        percentile(&values, STRETCH_PERCENTILES.0),
        percentile(&values, STRETCH_PERCENTILES.1),
    ) {
        (Some(lo), Some(hi)) if hi > lo => (lo, hi),
        _ => return Array2::zeros(band.dim()),
    };
    band.mapv(|v| if v.is_finite() { ((v - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.0 })
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Compose three [0, 1] planes into an RGB image
pub fn compose(red: &Array2<f32>, green: &Array2<f32>, blue: &Array2<f32>) -> Result<RgbImage> {
    if red.dim() != green.dim() || red.dim() != blue.dim() {
        return Err(ThermalSrError::Render(format!(
            "composite planes disagree: {:?} {:?} {:?}",
            red.dim(),
            green.dim(),
            blue.dim()
        )));
    }
    let (h, w) = red.dim();
    Ok(RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let idx = [y as usize, x as usize];
        Rgb([to_u8(red[idx]), to_u8(green[idx]), to_u8(blue[idx])])
    }))
}

/// True colour from the optical stack ordered blue, green, red (bands 2-4)
pub fn true_color(optical: ArrayView3<f32>) -> Result<RgbImage> {
    if optical.dim().0 < 3 {
        return Err(ThermalSrError::Render(format!(
            "true colour needs 3 optical bands, got {}",
            optical.dim().0
        )));
    }
    let blue = stretch(optical.index_axis(Axis(0), 0));
    let green = stretch(optical.index_axis(Axis(0), 1));
    let red = stretch(optical.index_axis(Axis(0), 2));
    compose(&red, &green, &blue)
}

/// False colour (NIR, red, green) highlighting vegetation
pub fn false_color(optical: ArrayView3<f32>, nir: ArrayView2<f32>) -> Result<RgbImage> {
    if optical.dim().0 < 3 {
        return Err(ThermalSrError::Render(format!(
            "false colour needs 3 optical bands, got {}",
            optical.dim().0
        )));
    }
    let red = stretch(nir);
    let green = stretch(optical.index_axis(Axis(0), 2));
    let blue = stretch(optical.index_axis(Axis(0), 1));
    compose(&red, &green, &blue)
}

fn srgb_to_linear(c: f32) -> f32 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c > 0.003_130_8 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    if f > 0.206_896_6 {
        f * f * f
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

fn mat_mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// sRGB in [0, 1] to CIELAB (D65)
pub fn rgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let linear = rgb.map(srgb_to_linear);
    let xyz = mat_mul(&XYZ_FROM_RGB, linear);
    let fx = lab_f(xyz[0] / D65_WHITE[0]);
    let fy = lab_f(xyz[1] / D65_WHITE[1]);
    let fz = lab_f(xyz[2] / D65_WHITE[2]);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIELAB (D65) to sRGB clipped to [0, 1]
pub fn lab_to_rgb(lab: [f32; 3]) -> [f32; 3] {
    let fy = (lab[0] + 16.0) / 116.0;
    let fx = fy + lab[1] / 500.0;
    let fz = (fy - lab[2] / 200.0).max(0.0);
    let xyz = [
        lab_f_inv(fx) * D65_WHITE[0],
        lab_f_inv(fy) * D65_WHITE[1],
        lab_f_inv(fz) * D65_WHITE[2],
    ];
    mat_mul(&RGB_FROM_XYZ, xyz).map(|c| linear_to_srgb(c.max(0.0)).clamp(0.0, 1.0))
}

/// Histogram equalization onto [0, 1] using bin-centre interpolation of the CDF
pub fn equalize(band: ArrayView2<f32>) -> Array2<f32> {
    let (lo, hi) = super::colormap::value_range(band);
    if hi <= lo {
        return Array2::from_elem(band.dim(), 1.0);
    }

    let span = hi - lo;
    let mut counts = vec![0usize; EQUALIZE_BINS];
    for &v in band.iter().filter(|v| v.is_finite()) {
        let idx = (((v - lo) / span) * EQUALIZE_BINS as f32).floor() as usize;
        counts[idx.min(EQUALIZE_BINS - 1)] += 1;
    }
    let total = counts.iter().sum::<usize>().max(1) as f32;
    let mut running = 0usize;
    let cdf: Vec<f32> = counts
        .iter()
        .map(|&c| {
            running += c;
            running as f32 / total
        })
        .collect();

    let bin_width = span / EQUALIZE_BINS as f32;
    band.mapv(|v| {
        if !v.is_finite() {
            return 0.0;
        }
        // Position relative to the first bin centre, in bins
        let pos = (v - lo) / bin_width - 0.5;
        if pos <= 0.0 {
            return cdf[0];
        }
        let i0 = pos.floor() as usize;
        if i0 >= EQUALIZE_BINS - 1 {
            return cdf[EQUALIZE_BINS - 1];
        }
        let frac = pos - i0 as f32;
        cdf[i0] + (cdf[i0 + 1] - cdf[i0]) * frac
    })
}

/// Blend the predicted thermal intensity into the true-colour lightness.
///
/// `L' = (1 - w) * L + w * 100 * eq(thermal)` with `w = THERMAL_BLEND`, followed by
/// a light unsharp mask.
pub fn final_output(optical: ArrayView3<f32>, predicted: ArrayView3<f32>) -> Result<RgbImage> {
    let base = true_color(optical)?;
    let (_, h, w) = predicted.dim();
    if (w as u32, h as u32) != base.dimensions() {
        return Err(ThermalSrError::Render(format!(
            "thermal {}x{} does not match optical {:?}",
            h,
            w,
            base.dimensions()
        )));
    }

    let intensity = equalize(band_mean(predicted).view());
    let fused = RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let px = base.get_pixel(x, y).0;
        let mut lab = rgb_to_lab(px.map(|c| c as f32 / 255.0));
        let thermal = intensity[[y as usize, x as usize]] * 100.0;
        lab[0] = (1.0 - THERMAL_BLEND) * lab[0] + THERMAL_BLEND * thermal;
        Rgb(lab_to_rgb(lab).map(to_u8))
    });

    Ok(imageops::unsharpen(&fused, UNSHARP_SIGMA, UNSHARP_THRESHOLD))
}
