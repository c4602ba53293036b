//! Raster Loader
//!
//! Reads stacked Landsat 8/9 OLI/TIRS rasters (one file, every band) into a
//! [`BandStack`] and extracts the fixed optical and thermal sub-stacks.
//!
//! Band layout (1-indexed, as stored in the file):
//! - bands 2-4: blue, green, red (optical)
//! - band 5: near infrared (false-colour composites only)
//! - bands 10-11: TIRS thermal

use std::path::Path;

use gdal::Dataset;
use ndarray::{Array2, Array3, Axis};
use tracing::debug;

use crate::utils::error::{Result, ThermalSrError};

/// Minimum number of bands a source raster must carry
pub const REQUIRED_BANDS: usize = 11;

/// 0-based band range of the optical sub-stack (bands 2-4)
pub const OPTICAL_BANDS: std::ops::Range<usize> = 1..4;

/// 0-based band range of the thermal sub-stack (bands 10-11)
pub const THERMAL_BANDS: std::ops::Range<usize> = 9..11;

/// 0-based index of the near-infrared band (band 5)
pub const NIR_BAND: usize = 4;

/// Divisor converting surface reflectance DNs to reflectance
pub const REFLECTANCE_SCALE: f32 = 10_000.0;

/// Divisor mapping brightness temperature (K) to roughly [0, 1]
pub const THERMAL_SCALE: f32 = 300.0;

/// Optical inputs whose maximum stays below this value are taken as already scaled.
///
/// A heuristic: scenes with DNs that happen to be tiny are passed through unscaled.
pub const PRESCALED_THRESHOLD: f32 = 1.5;

/// Ordered, co-registered spectral bands of one capture. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct BandStack {
    bands: Vec<Array2<f32>>,
}

impl BandStack {
    /// Build a stack from in-memory bands; all bands must share one shape
    pub fn from_bands(bands: Vec<Array2<f32>>) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| ThermalSrError::MissingBands {
                required: REQUIRED_BANDS,
                found: 0,
            })?
            .dim();

        if let Some((idx, band)) = bands.iter().enumerate().find(|(_, b)| b.dim() != first) {
            return Err(ThermalSrError::Dimension(format!(
                "band {} is {:?}, expected {:?}",
                idx + 1,
                band.dim(),
                first
            )));
        }

        Ok(Self { bands })
    }

    /// Open a multi-band raster with GDAL and read every band as `f32`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading raster {}", path.display());

        let dataset = Dataset::open(path).map_err(|e| ThermalSrError::read(path, e))?;
        let (width, height) = dataset.raster_size();
        let count = dataset.raster_count() as usize;

        let mut bands = Vec::with_capacity(count);
        for idx in 1..=count {
            let band = dataset
                .rasterband(idx as isize)
                .map_err(|e| ThermalSrError::read(path, e))?;
            let buffer = band
                .read_as::<f32>((0, 0), (width, height), (width, height), None)
                .map_err(|e| ThermalSrError::read(path, e))?;
            let array = Array2::from_shape_vec((height, width), buffer.data)
                .map_err(|e| ThermalSrError::read(path, e))?;
            bands.push(array);
        }

        debug!("Loaded {} bands of {}x{}", count, height, width);
        Self::from_bands(bands).map_err(|e| match e {
            ThermalSrError::MissingBands { .. } => ThermalSrError::read(path, "raster has no bands"),
            other => other,
        })
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Spatial size as `(height, width)`
    pub fn dims(&self) -> (usize, usize) {
        self.bands.first().map(|b| b.dim()).unwrap_or((0, 0))
    }

    /// Band by 1-based index, as numbered in the source file
    pub fn band(&self, number: usize) -> Option<&Array2<f32>> {
        number.checked_sub(1).and_then(|i| self.bands.get(i))
    }

    fn ensure_layout(&self) -> Result<()> {
        if self.bands.len() < REQUIRED_BANDS {
            return Err(ThermalSrError::MissingBands {
                required: REQUIRED_BANDS,
                found: self.bands.len(),
            });
        }
        Ok(())
    }

    fn stack(&self, range: std::ops::Range<usize>) -> Array3<f32> {
        let (h, w) = self.dims();
        let mut out = Array3::<f32>::zeros((range.len(), h, w));
        for (c, idx) in range.enumerate() {
            out.index_axis_mut(Axis(0), c).assign(&self.bands[idx]);
        }
        out
    }

    /// Split into normalized optical, thermal and NIR arrays
    pub fn split(&self) -> Result<SceneBands> {
        self.ensure_layout()?;

        let raw_optical = self.stack(OPTICAL_BANDS);
        let prescaled = is_prescaled(&raw_optical);
        let optical = scale_optical(raw_optical, prescaled);

        let nir = if prescaled {
            self.bands[NIR_BAND].clone()
        } else {
            self.bands[NIR_BAND].mapv(|v| v / REFLECTANCE_SCALE)
        };

        let thermal = self.stack(THERMAL_BANDS).mapv(|v| v / THERMAL_SCALE);

        if prescaled {
            debug!("Optical bands already in reflectance range, skipping rescale");
        }

        Ok(SceneBands {
            optical,
            thermal,
            nir,
            optical_prescaled: prescaled,
        })
    }
}

/// Normalized sub-stacks of one scene, all on the same grid
#[derive(Debug, Clone)]
pub struct SceneBands {
    /// Blue, green, red reflectance `[3, H, W]`
    pub optical: Array3<f32>,
    /// TIRS bands divided by [`THERMAL_SCALE`], `[2, H, W]`
    pub thermal: Array3<f32>,
    /// Near-infrared reflectance `[H, W]`
    pub nir: Array2<f32>,
    /// Whether the optical input skipped rescaling
    pub optical_prescaled: bool,
}

impl SceneBands {
    /// Spatial size as `(height, width)`
    pub fn dims(&self) -> (usize, usize) {
        let (_, h, w) = self.optical.dim();
        (h, w)
    }
}

/// Whether an optical stack is already in reflectance units
pub fn is_prescaled(optical: &Array3<f32>) -> bool {
    let max = optical.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    max < PRESCALED_THRESHOLD
}

fn scale_optical(optical: Array3<f32>, prescaled: bool) -> Array3<f32> {
    if prescaled {
        optical
    } else {
        optical.mapv(|v| v / REFLECTANCE_SCALE)
    }
}

/// Load a raster and split it in one step
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<SceneBands> {
    BandStack::open(path)?.split()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use gdal::raster::Buffer;
    use gdal::DriverManager;
    use tempfile::TempDir;

    /// Write a float32 GTiff whose pixel `(row, col)` of band `n` is `fill(n, row, col)`
    pub(crate) fn write_gtiff(
        path: &Path,
        count: usize,
        h: usize,
        w: usize,
        fill: impl Fn(usize, usize, usize) -> f32,
    ) {
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let dataset = driver
            .create_with_band_type::<f32, _>(path, w as isize, h as isize, count as isize)
            .unwrap();
        for n in 1..=count {
            let mut band = dataset.rasterband(n as isize).unwrap();
            let data: Vec<f32> = (0..h)
                .flat_map(|row| (0..w).map(move |col| (row, col)))
                .map(|(row, col)| fill(n, row, col))
                .collect();
            band.write((0, 0), (w, h), &Buffer::new((w, h), data)).unwrap();
        }
    }

    /// Synthetic stack with every band filled by `fill(band_number)`
    pub(crate) fn synthetic_stack(
        count: usize,
        h: usize,
        w: usize,
        fill: impl Fn(usize) -> f32,
    ) -> BandStack {
        let bands = (1..=count)
            .map(|n| Array2::from_elem((h, w), fill(n)))
            .collect();
        BandStack::from_bands(bands).unwrap()
    }

    #[test]
    fn test_split_extracts_fixed_bands() {
        let stack = synthetic_stack(11, 8, 8, |n| n as f32 * 1000.0);
        let scene = stack.split().unwrap();

        assert_eq!(scene.optical.dim(), (3, 8, 8));
        assert_eq!(scene.thermal.dim(), (2, 8, 8));
        // Bands 2, 3, 4 scaled by 1e4
        assert_abs_diff_eq!(scene.optical[[0, 0, 0]], 0.2);
        assert_abs_diff_eq!(scene.optical[[2, 0, 0]], 0.4);
        // Bands 10, 11 scaled by 300
        assert_abs_diff_eq!(scene.thermal[[0, 0, 0]], 10_000.0 / 300.0);
        assert_abs_diff_eq!(scene.thermal[[1, 0, 0]], 11_000.0 / 300.0);
        assert_abs_diff_eq!(scene.nir[[0, 0]], 0.5);
        assert!(!scene.optical_prescaled);
    }

    #[test]
    fn test_constant_scene_normalizes_to_half() {
        let stack = synthetic_stack(11, 256, 256, |n| match n {
            2..=4 => 5000.0,
            10 | 11 => 150.0,
            _ => 0.0,
        });
        let scene = stack.split().unwrap();

        assert!(scene.optical.iter().all(|&v| (v - 0.5).abs() < 1e-6));
        assert!(scene.thermal.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_prescaled_optical_passes_through() {
        let stack = synthetic_stack(12, 4, 4, |n| match n {
            2..=4 => 0.3,
            10 | 11 => 290.0,
            _ => 0.1,
        });
        let scene = stack.split().unwrap();

        assert!(scene.optical_prescaled);
        assert_abs_diff_eq!(scene.optical[[1, 2, 2]], 0.3);
        // Thermal is always divided, even for prescaled optical input
        assert_abs_diff_eq!(scene.thermal[[0, 0, 0]], 290.0 / 300.0);
    }

    #[test]
    fn test_threshold_boundary_is_scaled() {
        let stack = synthetic_stack(11, 2, 2, |_| PRESCALED_THRESHOLD);
        let scene = stack.split().unwrap();
        assert!(!scene.optical_prescaled);
        assert_abs_diff_eq!(scene.optical[[0, 0, 0]], PRESCALED_THRESHOLD / REFLECTANCE_SCALE);
    }

    #[test]
    fn test_too_few_bands_is_rejected() {
        let stack = synthetic_stack(10, 4, 4, |_| 1.0);
        assert!(matches!(
            stack.split(),
            Err(ThermalSrError::MissingBands { required: 11, found: 10 })
        ));
    }

    #[test]
    fn test_mismatched_band_shapes_rejected() {
        let bands = vec![Array2::zeros((4, 4)), Array2::zeros((4, 5))];
        assert!(matches!(
            BandStack::from_bands(bands),
            Err(ThermalSrError::Dimension(_))
        ));
    }

    #[test]
    fn test_open_missing_file_is_read_error() {
        let result = BandStack::open("/nonexistent/scene_all_bands.tif");
        assert!(matches!(result, Err(ThermalSrError::Read { .. })));
    }

    #[test]
    fn test_band_is_one_indexed() {
        let stack = synthetic_stack(11, 2, 2, |n| n as f32);
        assert_eq!(stack.band(1).unwrap()[[0, 0]], 1.0);
        assert_eq!(stack.band(11).unwrap()[[0, 0]], 11.0);
        assert!(stack.band(0).is_none());
        assert!(stack.band(12).is_none());
    }

    #[test]
    fn test_load_scene_from_gtiff() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("LC08_test_all_bands.tif");
        // 5 rows by 7 columns; one marker pixel at row 1, column 4
        write_gtiff(&path, 11, 5, 7, |n, row, col| {
            let base = n as f32 * 1000.0;
            if (row, col) == (1, 4) {
                base + 500.0
            } else {
                base
            }
        });

        let stack = BandStack::open(&path).unwrap();
        assert_eq!(stack.band_count(), 11);
        assert_eq!(stack.dims(), (5, 7));

        let scene = load_scene(&path).unwrap();
        assert_eq!(scene.optical.dim(), (3, 5, 7));
        assert_eq!(scene.thermal.dim(), (2, 5, 7));
        assert_abs_diff_eq!(scene.optical[[0, 0, 0]], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(scene.optical[[1, 3, 6]], 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(scene.optical[[2, 0, 0]], 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(scene.optical[[2, 1, 4]], 0.45, epsilon = 1e-6);
        assert_abs_diff_eq!(scene.thermal[[0, 0, 0]], 10_000.0 / 300.0, epsilon = 1e-4);
        assert_abs_diff_eq!(scene.thermal[[1, 4, 6]], 11_000.0 / 300.0, epsilon = 1e-4);
        assert_abs_diff_eq!(scene.thermal[[1, 1, 4]], 11_500.0 / 300.0, epsilon = 1e-4);
        assert_abs_diff_eq!(scene.nir[[1, 4]], 0.55, epsilon = 1e-6);
        // The transposed position carries no marker
        assert_abs_diff_eq!(scene.thermal[[0, 4, 1]], 10_000.0 / 300.0, epsilon = 1e-4);
    }
}
