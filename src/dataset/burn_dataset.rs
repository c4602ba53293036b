//! Burn Batching for Thermal Patches
//!
//! Stacks [`PatchPair`]s into `[B, C, H, W]` tensors and applies the degradation
//! operator to produce the network's low-resolution thermal input.

use burn::prelude::*;
use ndarray::{Array3, Array4, Axis};

use super::degrade::degrade;
use super::patch::PatchPair;
use crate::utils::error::{Result, ThermalSrError};

/// One training/evaluation batch on device
#[derive(Clone, Debug)]
pub struct ThermalBatch<B: Backend> {
    /// Optical reflectance `[B, 3, H, W]`
    pub optical: Tensor<B, 4>,
    /// Degraded thermal input `[B, 2, H, W]`
    pub degraded: Tensor<B, 4>,
    /// Thermal ground truth `[B, 2, H, W]`
    pub target: Tensor<B, 4>,
}

/// Copy a host array into a tensor on `device`
pub fn array_to_tensor<B: Backend>(array: &Array4<f32>, device: &B::Device) -> Tensor<B, 4> {
    let (b, c, h, w) = array.dim();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::<B, 4>::from_data(TensorData::new(data, [b, c, h, w]), device)
}

/// Copy a single `C x H x W` stack into a `[1, C, H, W]` tensor
pub fn stack_to_tensor<B: Backend>(stack: &Array3<f32>, device: &B::Device) -> Tensor<B, 4> {
    array_to_tensor(&stack.clone().insert_axis(Axis(0)), device)
}

/// Read a `[B, C, H, W]` tensor back into host memory
pub fn tensor_to_array<B: Backend>(tensor: Tensor<B, 4>) -> Result<Array4<f32>> {
    let [b, c, h, w] = tensor.dims();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ThermalSrError::Inference(format!("tensor readback failed: {:?}", e)))?;
    Array4::from_shape_vec((b, c, h, w), values)
        .map_err(|e| ThermalSrError::Inference(format!("tensor readback failed: {}", e)))
}

fn stack_batch(stacks: &[Array3<f32>]) -> Result<Array4<f32>> {
    let views: Vec<_> = stacks.iter().map(|s| s.view()).collect();
    ndarray::stack(Axis(0), &views)
        .map_err(|e| ThermalSrError::Dimension(format!("cannot stack batch: {}", e)))
}

/// Batcher for thermal patch pairs
#[derive(Clone, Debug)]
pub struct ThermalBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ThermalBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Assemble a batch, degrading each thermal patch onto its optical grid.
    ///
    /// Fails when the batch is empty or patch shapes disagree across samples.
    pub fn try_batch(&self, items: &[PatchPair]) -> Result<ThermalBatch<B>> {
        if items.is_empty() {
            return Err(ThermalSrError::Dimension("empty batch".to_string()));
        }

        let mut optical = Vec::with_capacity(items.len());
        let mut degraded = Vec::with_capacity(items.len());
        let mut target = Vec::with_capacity(items.len());

        for item in items {
            let (h, w) = item.dims();
            degraded.push(degrade(item.thermal.view(), h, w)?);
            optical.push(item.optical.clone());
            target.push(item.thermal.clone());
        }

        Ok(ThermalBatch {
            optical: array_to_tensor(&stack_batch(&optical)?, &self.device),
            degraded: array_to_tensor(&stack_batch(&degraded)?, &self.device),
            target: array_to_tensor(&stack_batch(&target)?, &self.device),
        })
    }
}

#[cfg(all(test, feature = "ndarray"))]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use ndarray::Array3;

    type TestBackend = NdArray;

    fn pair(size: usize, value: f32) -> PatchPair {
        PatchPair {
            optical: Array3::from_elem((3, size, size), value),
            thermal: Array3::from_elem((2, size, size), value),
            top: 0,
            left: 0,
        }
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = ThermalBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.try_batch(&[pair(8, 0.1), pair(8, 0.2)]).unwrap();
        assert_eq!(batch.optical.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.degraded.dims(), [2, 2, 8, 8]);
        assert_eq!(batch.target.dims(), [2, 2, 8, 8]);
    }

    #[test]
    fn test_mixed_sizes_rejected() {
        let batcher = ThermalBatcher::<TestBackend>::new(Default::default());
        let result = batcher.try_batch(&[pair(8, 0.1), pair(10, 0.2)]);
        assert!(matches!(result, Err(ThermalSrError::Dimension(_))));
    }

    #[test]
    fn test_tensor_roundtrip_preserves_layout() {
        let device = Default::default();
        let mut stack = Array3::<f32>::zeros((2, 3, 4));
        stack[[1, 2, 3]] = 7.0;
        let tensor = stack_to_tensor::<TestBackend>(&stack, &device);
        let back = tensor_to_array(tensor).unwrap();
        assert_eq!(back.dim(), (1, 2, 3, 4));
        assert_eq!(back[[0, 1, 2, 3]], 7.0);
    }
}
