//! Dual-Branch Fusion Network
//!
//! Encodes optical reflectance and degraded thermal input in two independent
//! convolutional branches, concatenates their feature maps and decodes a
//! two-band thermal prediction at the input resolution. Every convolution is
//! 3x3 with padding 1, so spatial size never changes inside the network.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::utils::error::ThermalSrError;

/// Configuration for the [`FusionNet`] model
#[derive(Config, Debug)]
pub struct FusionNetConfig {
    /// Optical input channels (blue, green, red)
    #[config(default = "3")]
    pub optical_channels: usize,

    /// Thermal input channels (TIRS bands 10 and 11)
    #[config(default = "2")]
    pub thermal_channels: usize,

    /// Feature width of each encoder branch
    #[config(default = "64")]
    pub branch_filters: usize,

    /// Predicted thermal channels
    #[config(default = "2")]
    pub out_channels: usize,
}

impl FusionNetConfig {
    /// Initialize a model with random weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> FusionNet<B> {
        FusionNet::new(self, device)
    }
}

/// A 3x3 convolution with optional ReLU
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Option<Relu>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, with_relu: bool, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        Self {
            conv,
            relu: with_relu.then(Relu::new),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        match &self.relu {
            Some(relu) => relu.forward(x),
            None => x,
        }
    }
}

/// Two stacked conv+ReLU layers
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
}

impl<B: Backend> Encoder<B> {
    pub fn new(in_channels: usize, filters: usize, device: &B::Device) -> Self {
        Self {
            conv1: ConvBlock::new(in_channels, filters, true, device),
            conv2: ConvBlock::new(filters, filters, true, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv2.forward(self.conv1.forward(x))
    }
}

/// Physics-aware thermal super-resolution network
///
/// Architecture:
/// - optical branch: 3 -> 64 -> 64
/// - thermal branch: 2 -> 64 -> 64
/// - decoder on the concatenation: 128 -> 128 (ReLU) -> 2 (linear)
#[derive(Module, Debug)]
pub struct FusionNet<B: Backend> {
    pub optical_branch: Encoder<B>,
    pub thermal_branch: Encoder<B>,
    pub fuse1: ConvBlock<B>,
    pub fuse2: ConvBlock<B>,

    optical_channels: usize,
    thermal_channels: usize,
}

impl<B: Backend> FusionNet<B> {
    /// Create a new FusionNet from configuration
    pub fn new(config: &FusionNetConfig, device: &B::Device) -> Self {
        let filters = config.branch_filters;
        let fused = filters * 2;

        Self {
            optical_branch: Encoder::new(config.optical_channels, filters, device),
            thermal_branch: Encoder::new(config.thermal_channels, filters, device),
            fuse1: ConvBlock::new(fused, fused, true, device),
            fuse2: ConvBlock::new(fused, config.out_channels, false, device),
            optical_channels: config.optical_channels,
            thermal_channels: config.thermal_channels,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `optical` - `[batch, 3, H, W]`
    /// * `thermal_lr` - degraded thermal `[batch, 2, H, W]`
    ///
    /// # Returns
    /// * Thermal prediction `[batch, 2, H, W]`
    pub fn forward(&self, optical: Tensor<B, 4>, thermal_lr: Tensor<B, 4>) -> Tensor<B, 4> {
        let f_opt = self.optical_branch.forward(optical);
        let f_th = self.thermal_branch.forward(thermal_lr);
        let fused = Tensor::cat(vec![f_opt, f_th], 1);
        self.fuse2.forward(self.fuse1.forward(fused))
    }

    /// Forward pass that validates input shapes instead of panicking inside a kernel
    pub fn try_forward(
        &self,
        optical: Tensor<B, 4>,
        thermal_lr: Tensor<B, 4>,
    ) -> crate::utils::error::Result<Tensor<B, 4>> {
        self.check_inputs(&optical.dims(), &thermal_lr.dims())?;
        Ok(self.forward(optical, thermal_lr))
    }

    fn check_inputs(
        &self,
        optical: &[usize; 4],
        thermal: &[usize; 4],
    ) -> crate::utils::error::Result<()> {
        if optical[1] != self.optical_channels {
            return Err(ThermalSrError::Dimension(format!(
                "optical input has {} channels, expected {}",
                optical[1], self.optical_channels
            )));
        }
        if thermal[1] != self.thermal_channels {
            return Err(ThermalSrError::Dimension(format!(
                "thermal input has {} channels, expected {}",
                thermal[1], self.thermal_channels
            )));
        }
        if optical[0] != thermal[0] || optical[2..] != thermal[2..] {
            return Err(ThermalSrError::Dimension(format!(
                "optical {:?} and thermal {:?} inputs disagree",
                optical, thermal
            )));
        }
        Ok(())
    }

    pub fn optical_channels(&self) -> usize {
        self.optical_channels
    }

    pub fn thermal_channels(&self) -> usize {
        self.thermal_channels
    }
}

#[cfg(all(test, feature = "ndarray"))]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_forward_output_shape() {
        let device = Default::default();
        let model = FusionNetConfig::new().init::<TestBackend>(&device);

        for &(b, h, w) in &[(1usize, 8usize, 8usize), (2, 12, 20)] {
            let optical = Tensor::<TestBackend, 4>::zeros([b, 3, h, w], &device);
            let thermal = Tensor::<TestBackend, 4>::zeros([b, 2, h, w], &device);
            let output = model.forward(optical, thermal);
            assert_eq!(output.dims(), [b, 2, h, w]);
        }
    }

    #[test]
    fn test_try_forward_rejects_wrong_channels() {
        let device = Default::default();
        let model = FusionNetConfig::new().init::<TestBackend>(&device);
        let optical = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        let thermal = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        assert!(matches!(
            model.try_forward(optical, thermal),
            Err(ThermalSrError::Dimension(_))
        ));
    }

    #[test]
    fn test_try_forward_rejects_spatial_mismatch() {
        let device = Default::default();
        let model = FusionNetConfig::new().init::<TestBackend>(&device);
        let optical = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        let thermal = Tensor::<TestBackend, 4>::zeros([1, 2, 4, 4], &device);
        assert!(model.try_forward(optical, thermal).is_err());
    }

    #[test]
    fn test_forward_is_pure() {
        let device = Default::default();
        let model = FusionNetConfig::new().init::<TestBackend>(&device);
        let optical = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        let thermal = Tensor::<TestBackend, 4>::ones([1, 2, 8, 8], &device);

        let a = model.forward(optical.clone(), thermal.clone());
        let b = model.forward(optical, thermal);
        a.into_data().assert_eq(&b.into_data(), true);
    }
}
