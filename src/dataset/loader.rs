//! Raster Dataset Loader
//!
//! Scans a dataset root for stacked rasters, splits them into train/test pools and
//! exposes them to the training loop through the [`PatchSource`] seam.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::patch::{PatchPair, PatchSampler};
use super::raster::load_scene;
use crate::utils::error::{Result, ThermalSrError};

/// File-name marker of stacked all-band rasters
pub const DEFAULT_FILE_MARKER: &str = "all_bands";

/// A source of aligned optical/thermal patches addressed by sample index
pub trait PatchSource {
    /// Number of samples
    fn len(&self) -> usize;

    /// Whether there are no samples
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce the patch pair for `index`, drawing any random offsets from `rng`
    fn draw(&self, index: usize, rng: &mut ChaCha8Rng) -> Result<PatchPair>;
}

/// Stacked raster files discovered under a root directory
#[derive(Debug, Clone)]
pub struct RasterDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// Matching files, sorted by path
    pub files: Vec<PathBuf>,
}

impl RasterDataset {
    /// Recursively scan `root_dir` for files whose name contains `marker`
    pub fn scan<P: AsRef<Path>>(root_dir: P, marker: &str) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Scanning dataset folder: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(ThermalSrError::EmptyDataset {
                root: root_dir,
                marker: marker.to_string(),
            });
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&root_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().contains(marker))
            .map(|e| e.into_path())
            .collect();
        files.sort();

        info!("Found {} files matching '{}'", files.len(), marker);
        if files.is_empty() {
            return Err(ThermalSrError::EmptyDataset {
                root: root_dir,
                marker: marker.to_string(),
            });
        }

        Ok(Self { root_dir, files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Seeded shuffle, then split into `(train, test)` at `train_fraction`
    pub fn split(&self, train_fraction: f64, seed: u64) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut shuffled = self.files.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        let train_len = ((shuffled.len() as f64) * train_fraction.clamp(0.0, 1.0)) as usize;
        let test = shuffled.split_off(train_len);
        debug!("Split dataset: {} train / {} test", shuffled.len(), test.len());
        (shuffled, test)
    }
}

/// Patch source reading each sample from a raster file on demand
#[derive(Debug, Clone)]
pub struct RasterPatchSource {
    files: Vec<PathBuf>,
    sampler: PatchSampler,
}

impl RasterPatchSource {
    pub fn new(files: Vec<PathBuf>, patch_size: usize) -> Self {
        Self {
            files,
            sampler: PatchSampler::new(patch_size),
        }
    }
}

impl PatchSource for RasterPatchSource {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn draw(&self, index: usize, rng: &mut ChaCha8Rng) -> Result<PatchPair> {
        let path = self.files.get(index).ok_or_else(|| {
            ThermalSrError::Dimension(format!(
                "sample {} out of range ({} files)",
                index,
                self.files.len()
            ))
        })?;
        let scene = load_scene(path)?;
        self.sampler.sample(&scene, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_is_recursive_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a/LC08_001_all_bands.tif");
        touch(temp_dir.path(), "b/c/LC08_002_all_bands.tif");
        touch(temp_dir.path(), "b/LC08_002_B10.tif");
        touch(temp_dir.path(), "readme.txt");

        let dataset = RasterDataset::scan(temp_dir.path(), DEFAULT_FILE_MARKER).unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset
            .files
            .iter()
            .all(|p| p.to_string_lossy().contains("all_bands")));
    }

    #[test]
    fn test_scan_empty_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "LC08_B10.tif");
        let result = RasterDataset::scan(temp_dir.path(), DEFAULT_FILE_MARKER);
        assert!(matches!(result, Err(ThermalSrError::EmptyDataset { .. })));
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let dataset = RasterDataset {
            root_dir: PathBuf::from("/data"),
            files: (0..10).map(|i| PathBuf::from(format!("{}_all_bands.tif", i))).collect(),
        };
        let (train, test) = dataset.split(0.8, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let (train_again, _) = dataset.split(0.8, 42);
        assert_eq!(train, train_again);
    }

    #[test]
    fn test_unreadable_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "broken_all_bands.tif");
        let source = RasterPatchSource::new(vec![temp_dir.path().join("broken_all_bands.tif")], 16);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            source.draw(0, &mut rng),
            Err(ThermalSrError::Read { .. })
        ));
    }
}
