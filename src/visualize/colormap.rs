//! Scalar-to-colour mapping for diagnostic maps.
//!
//! Each colormap is a piecewise-linear interpolation between nine anchor colours
//! sampled evenly from the matching perceptual map. Bands are min-max normalized
//! before lookup, like a default `imshow`.

use image::{Rgb, RgbImage};
use ndarray::ArrayView2;

/// Named colormaps used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Inferno,
    Magma,
    Viridis,
    Coolwarm,
    Gray,
}

const INFERNO: [[u8; 3]; 9] = [
    [0, 0, 4],
    [31, 12, 72],
    [85, 15, 109],
    [136, 34, 106],
    [186, 54, 85],
    [227, 89, 51],
    [249, 140, 10],
    [249, 201, 50],
    [252, 255, 164],
];

const MAGMA: [[u8; 3]; 9] = [
    [0, 0, 4],
    [28, 16, 68],
    [79, 18, 123],
    [129, 37, 129],
    [181, 54, 122],
    [229, 80, 100],
    [251, 135, 97],
    [254, 194, 135],
    [252, 253, 191],
];

const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

const COOLWARM: [[u8; 3]; 9] = [
    [59, 76, 192],
    [98, 130, 234],
    [141, 176, 254],
    [184, 208, 249],
    [221, 221, 221],
    [245, 196, 173],
    [244, 154, 123],
    [222, 96, 77],
    [180, 4, 38],
];

const GRAY: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];

impl Colormap {
    fn anchors(&self) -> &'static [[u8; 3]] {
        match self {
            Colormap::Inferno => &INFERNO,
            Colormap::Magma => &MAGMA,
            Colormap::Viridis => &VIRIDIS,
            Colormap::Coolwarm => &COOLWARM,
            Colormap::Gray => &GRAY,
        }
    }

    /// Colour for a normalized value; `t` is clamped to [0, 1]
    pub fn map(&self, t: f32) -> Rgb<u8> {
        let anchors = self.anchors();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let pos = t * (anchors.len() - 1) as f32;
        let i0 = (pos.floor() as usize).min(anchors.len() - 1);
        let i1 = (i0 + 1).min(anchors.len() - 1);
        let frac = pos - i0 as f32;

        let mut rgb = [0u8; 3];
        for (c, out) in rgb.iter_mut().enumerate() {
            let a = anchors[i0][c] as f32;
            let b = anchors[i1][c] as f32;
            *out = (a + (b - a) * frac).round() as u8;
        }
        Rgb(rgb)
    }
}

/// Finite minimum and maximum of a band, `(0, 0)` when nothing is finite
pub fn value_range(band: ArrayView2<f32>) -> (f32, f32) {
    let (lo, hi) = band
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo > hi {
        (0.0, 0.0)
    } else {
        (lo, hi)
    }
}

/// Render a band through a colormap after min-max normalization
pub fn apply(band: ArrayView2<f32>, cmap: Colormap) -> RgbImage {
    let (h, w) = band.dim();
    let (lo, hi) = value_range(band);
    let span = hi - lo;

    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let v = band[[y as usize, x as usize]];
        let t = if span > 0.0 { (v - lo) / span } else { 0.0 };
        cmap.map(t)
    })
}
