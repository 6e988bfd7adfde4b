use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arc::DigitNetParams;
use crate::conv::ConvStrategy;
use crate::error::{check_accumulator, shape_mismatch, Error, Result};
use crate::network::*;

/// Static topology of the two-conv digit classifier.
///
/// The layer chain is fixed:
/// pad → conv1 → pool → pad → conv2 → pool → flatten → dense1 → sign → dense2.
/// Defaults describe a 1x16x16 binary input, 3x3 kernels, 16 and 32
/// convolution channels, and 512 → 256 → 10 dense units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub input_channels: usize,
    pub input_width: usize,
    pub kernel_size: usize,
    pub conv1_channels: usize,
    pub conv2_channels: usize,
    pub hidden_units: usize,
    pub num_classes: usize,
    /// Value written into the padding border.
    pub pad_value: bool,
    pub conv_strategy: ConvStrategy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            input_channels: 1,
            input_width: 16,
            kernel_size: 3,
            conv1_channels: 16,
            conv2_channels: 32,
            hidden_units: 256,
            num_classes: 10,
            pad_value: false,
            conv_strategy: ConvStrategy::LineBuffer,
        }
    }
}

impl NetworkConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: NetworkConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading network config");
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn input_shape(&self) -> Shape {
        Shape::Bits {
            c: self.input_channels,
            h: self.input_width,
            w: self.input_width,
        }
    }

    /// Symmetric margin that keeps the spatial size through a convolution.
    pub fn pad_margin(&self) -> usize {
        self.kernel_size.saturating_sub(1) / 2
    }

    /// Spatial width after the second pooling stage.
    pub fn output_width(&self) -> usize {
        self.input_width / 4
    }

    /// Number of bits fed into the first dense layer.
    pub fn flatten_units(&self) -> usize {
        self.conv2_channels * self.output_width() * self.output_width()
    }

    /// Rejects topologies that cannot be evaluated exactly.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("input_channels", self.input_channels),
            ("input_width", self.input_width),
            ("kernel_size", self.kernel_size),
            ("conv1_channels", self.conv1_channels),
            ("conv2_channels", self.conv2_channels),
            ("hidden_units", self.hidden_units),
            ("num_classes", self.num_classes),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidConfig(format!("{} must be > 0", name)));
        }
        if self.kernel_size % 2 == 0 {
            return Err(Error::InvalidConfig(format!(
                "kernel_size must be odd to keep spatial size, got {}",
                self.kernel_size
            )));
        }
        if self.input_width % 2 != 0 {
            return Err(Error::OddPoolingDimension {
                width: self.input_width,
            });
        }
        if (self.input_width / 2) % 2 != 0 {
            return Err(Error::OddPoolingDimension {
                width: self.input_width / 2,
            });
        }
        let f2 = self.kernel_size * self.kernel_size;
        check_accumulator("conv1", f2 * self.input_channels)?;
        check_accumulator("conv2", f2 * self.conv1_channels)?;
        check_accumulator("dense1", self.flatten_units())?;
        check_accumulator("dense2", self.hidden_units)?;
        Ok(())
    }
}

/// Assemble the digit classifier from a validated config and its parameters.
pub fn build(config: &NetworkConfig, params: DigitNetParams) -> Result<BinaryNetwork> {
    config.validate()?;
    let strategy = config.conv_strategy;
    let margin = config.pad_margin();

    let net = BinaryNetwork::new(config.input_shape())
        .with(PadLayer::new(margin, config.pad_value))?
        .with(BinaryConv2dLayer::with_strategy(
            params.conv1_weights,
            params.conv1_thresholds,
            strategy,
        )?)?
        .with(MaxPool2dLayer::new())?
        .with(PadLayer::new(margin, config.pad_value))?
        .with(BinaryConv2dLayer::with_strategy(
            params.conv2_weights,
            params.conv2_thresholds,
            strategy,
        )?)?
        .with(MaxPool2dLayer::new())?
        .with(FlattenLayer::new())?
        .with(DenseLayer::new(params.dense1)?)?
        .with(SignLayer::new())?
        .with(DenseLayer::new(params.dense2)?)?;

    net.validate()?;
    if net.output_shape() != Shape::Scores(config.num_classes) {
        return Err(shape_mismatch(
            "class scores",
            Shape::Scores(config.num_classes),
            net.output_shape(),
        ));
    }

    tracing::info!(
        layers = net.num_layers(),
        input = %net.input_shape(),
        classes = config.num_classes,
        strategy = ?strategy,
        weight_bytes = net.layer_weight_memory().iter().sum::<usize>(),
        "built digit network"
    );
    Ok(net)
}
