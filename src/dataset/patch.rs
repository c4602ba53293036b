//! Patch Sampler
//!
//! Draws co-located optical/thermal crops from a scene at uniformly random
//! offsets. Both crops always come from the same row/column window.

use ndarray::{s, Array3};
use rand::Rng;

use super::raster::SceneBands;
use crate::utils::error::{Result, ThermalSrError};

/// Default training patch edge length
pub const DEFAULT_PATCH_SIZE: usize = 128;

/// One optical patch and its co-located thermal patch
#[derive(Debug, Clone)]
pub struct PatchPair {
    /// `[3, P, P]` reflectance
    pub optical: Array3<f32>,
    /// `[2, P, P]` normalized thermal ground truth
    pub thermal: Array3<f32>,
    /// Row offset of the crop in the source scene
    pub top: usize,
    /// Column offset of the crop in the source scene
    pub left: usize,
}

impl PatchPair {
    /// Spatial size of the optical patch as `(height, width)`
    pub fn dims(&self) -> (usize, usize) {
        let (_, h, w) = self.optical.dim();
        (h, w)
    }
}

/// Samples fixed-size square patches
#[derive(Debug, Clone, Copy)]
pub struct PatchSampler {
    patch_size: usize,
}

impl Default for PatchSampler {
    fn default() -> Self {
        Self::new(DEFAULT_PATCH_SIZE)
    }
}

impl PatchSampler {
    pub fn new(patch_size: usize) -> Self {
        Self { patch_size }
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    fn check_fits(&self, h: usize, w: usize) -> Result<()> {
        let ps = self.patch_size;
        if ps == 0 || h < ps || w < ps {
            return Err(ThermalSrError::Dimension(format!(
                "patch size {} does not fit a {}x{} scene",
                ps, h, w
            )));
        }
        Ok(())
    }

    /// Crop the patch whose top-left corner is `(top, left)`
    pub fn crop_at(&self, scene: &SceneBands, top: usize, left: usize) -> Result<PatchPair> {
        let (h, w) = scene.dims();
        self.check_fits(h, w)?;

        let ps = self.patch_size;
        if top + ps > h || left + ps > w {
            return Err(ThermalSrError::Dimension(format!(
                "patch at ({}, {}) of size {} exceeds {}x{}",
                top, left, ps, h, w
            )));
        }
        if scene.thermal.dim().1 != h || scene.thermal.dim().2 != w {
            return Err(ThermalSrError::Dimension(
                "optical and thermal stacks are not on the same grid".to_string(),
            ));
        }

        let (rows, cols) = (top..top + ps, left..left + ps);
        Ok(PatchPair {
            optical: scene.optical.slice(s![.., rows.clone(), cols.clone()]).to_owned(),
            thermal: scene.thermal.slice(s![.., rows, cols]).to_owned(),
            top,
            left,
        })
    }

    /// Draw one patch at a uniformly random offset where the full patch fits
    pub fn sample<R: Rng + ?Sized>(&self, scene: &SceneBands, rng: &mut R) -> Result<PatchPair> {
        let (h, w) = scene.dims();
        self.check_fits(h, w)?;

        let top = rng.gen_range(0..=h - self.patch_size);
        let left = rng.gen_range(0..=w - self.patch_size);
        self.crop_at(scene, top, left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scene(h: usize, w: usize) -> SceneBands {
        SceneBands {
            optical: Array3::zeros((3, h, w)),
            thermal: Array3::zeros((2, h, w)),
            nir: Array2::zeros((h, w)),
            optical_prescaled: false,
        }
    }

    fn find_marker(stack: &Array3<f32>, marker: f32) -> Option<(usize, usize)> {
        stack
            .indexed_iter()
            .find(|(_, &v)| v == marker)
            .map(|((_, r, c), _)| (r, c))
    }

    #[test]
    fn test_patch_shapes() {
        let sampler = PatchSampler::new(16);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pair = sampler.sample(&scene(40, 30), &mut rng).unwrap();
        assert_eq!(pair.optical.dim(), (3, 16, 16));
        assert_eq!(pair.thermal.dim(), (2, 16, 16));
        assert!(pair.top <= 24 && pair.left <= 14);
    }

    #[test]
    fn test_marker_lands_at_same_relative_position() {
        let mut s = scene(32, 32);
        s.optical[[0, 16, 17]] = 9.0;
        s.thermal[[1, 16, 17]] = 9.0;

        let sampler = PatchSampler::new(24);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..20 {
            let pair = sampler.sample(&s, &mut rng).unwrap();
            let in_optical = find_marker(&pair.optical, 9.0).unwrap();
            let in_thermal = find_marker(&pair.thermal, 9.0).unwrap();
            assert_eq!(in_optical, in_thermal);
            assert_eq!(in_optical, (16 - pair.top, 17 - pair.left));
        }
    }

    #[test]
    fn test_oversized_patch_fails() {
        let sampler = PatchSampler::new(128);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for &(h, w) in &[(64usize, 256usize), (256, 127), (10, 10)] {
            let result = sampler.sample(&scene(h, w), &mut rng);
            assert!(matches!(result, Err(ThermalSrError::Dimension(_))));
        }
    }

    #[test]
    fn test_exact_fit_uses_zero_offset() {
        let sampler = PatchSampler::new(16);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let pair = sampler.sample(&scene(16, 16), &mut rng).unwrap();
        assert_eq!((pair.top, pair.left), (0, 0));
    }

    #[test]
    fn test_same_seed_same_offsets() {
        let sampler = PatchSampler::new(8);
        let s = scene(64, 64);
        let mut a = ChaCha8Rng::seed_from_u64(11);
        let mut b = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..5 {
            let pa = sampler.sample(&s, &mut a).unwrap();
            let pb = sampler.sample(&s, &mut b).unwrap();
            assert_eq!((pa.top, pa.left), (pb.top, pb.left));
        }
    }
}
