use super::{expect_bits, expect_scores, Activation, Layer, LayerType, Shape};
use super::ops::{dense, flatten, max_pool, pad, sign};
use crate::conv::{conv2d, ConvStrategy};
use crate::error::{check_accumulator, shape_mismatch, Error, Result};
use crate::tensor::{BitTensor, ConvWeights, DenseWeights, Thresholds};

fn expect_bits_shape(layer: LayerType, input: &Shape) -> Result<(usize, usize, usize)> {
    match *input {
        Shape::Bits { c, h, w } => Ok((c, h, w)),
        Shape::Scores(_) => Err(shape_mismatch(layer.to_string(), "bit tensor", input)),
    }
}

/// Constant-border padding layer.
pub struct PadLayer {
    margin: usize,
    fill: bool,
}

impl PadLayer {
    pub fn new(margin: usize, fill: bool) -> Self {
        PadLayer { margin, fill }
    }

    /// Zero padding that keeps the spatial size through a `kernel_size` convolution.
    /// A zero kernel size gets no padding.
    pub fn same(kernel_size: usize) -> Self {
        PadLayer::new(kernel_size.saturating_sub(1) / 2, false)
    }
}

impl Layer for PadLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::Pad
    }

    fn output_shape(&self, input: &Shape) -> Result<Shape> {
        let (c, h, w) = expect_bits_shape(self.layer_type(), input)?;
        Ok(Shape::Bits {
            c,
            h: h + 2 * self.margin,
            w: w + 2 * self.margin,
        })
    }

    fn fwd(&self, input: &Activation) -> Result<Activation> {
        let t = expect_bits(self.layer_type(), input)?;
        Ok(Activation::Bits(pad(t, self.margin, self.fill)))
    }
}

/// Binarized convolution with fused batch-norm thresholds.
pub struct BinaryConv2dLayer {
    weights: ConvWeights,
    thresholds: Thresholds,
    strategy: ConvStrategy,
}

impl BinaryConv2dLayer {
    pub fn new(weights: ConvWeights, thresholds: Thresholds) -> Result<Self> {
        Self::with_strategy(weights, thresholds, ConvStrategy::default())
    }

    pub fn with_strategy(
        weights: ConvWeights,
        thresholds: Thresholds,
        strategy: ConvStrategy,
    ) -> Result<Self> {
        if weights.kernel_size == 0 || weights.in_channels == 0 || weights.out_channels == 0 {
            return Err(Error::InvalidConfig(format!("degenerate conv weights {}", weights)));
        }
        if thresholds.len() != weights.out_channels {
            return Err(shape_mismatch("conv thresholds", weights.out_channels, thresholds.len()));
        }
        check_accumulator("BinaryConv2d", weights.window_len())?;
        Ok(BinaryConv2dLayer {
            weights,
            thresholds,
            strategy,
        })
    }

    pub fn weights(&self) -> &ConvWeights {
        &self.weights
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn strategy(&self) -> ConvStrategy {
        self.strategy
    }
}

impl Layer for BinaryConv2dLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::BinaryConv2d
    }

    fn output_shape(&self, input: &Shape) -> Result<Shape> {
        let (c, h, w) = expect_bits_shape(self.layer_type(), input)?;
        let f = self.weights.kernel_size;
        if c != self.weights.in_channels {
            return Err(shape_mismatch("conv input channels", self.weights.in_channels, c));
        }
        if h < f || w < f {
            return Err(shape_mismatch(
                "conv input size",
                format!("at least {}x{}", f, f),
                format!("{}x{}", h, w),
            ));
        }
        Ok(Shape::Bits {
            c: self.weights.out_channels,
            h: h - f + 1,
            w: w - f + 1,
        })
    }

    fn fwd(&self, input: &Activation) -> Result<Activation> {
        let t = expect_bits(self.layer_type(), input)?;
        Ok(Activation::Bits(conv2d(self.strategy, t, &self.weights, &self.thresholds)))
    }

    fn weight_memory_bytes(&self) -> usize {
        self.weights.memory_bytes() + self.thresholds.len() * 2
    }
}

/// 2x2, stride 2 binary max pooling (logical OR).
#[derive(Default)]
pub struct MaxPool2dLayer;

impl MaxPool2dLayer {
    pub fn new() -> Self {
        MaxPool2dLayer
    }
}

impl Layer for MaxPool2dLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::MaxPool2d
    }

    fn output_shape(&self, input: &Shape) -> Result<Shape> {
        let (c, h, w) = expect_bits_shape(self.layer_type(), input)?;
        if h % 2 != 0 {
            return Err(Error::OddPoolingDimension { width: h });
        }
        if w % 2 != 0 {
            return Err(Error::OddPoolingDimension { width: w });
        }
        Ok(Shape::Bits {
            c,
            h: h / 2,
            w: w / 2,
        })
    }

    fn fwd(&self, input: &Activation) -> Result<Activation> {
        let t = expect_bits(self.layer_type(), input)?;
        Ok(Activation::Bits(max_pool(t)))
    }
}

/// Channel-fastest flatten into an `N x 1 x 1` bit tensor.
#[derive(Default)]
pub struct FlattenLayer;

impl FlattenLayer {
    pub fn new() -> Self {
        FlattenLayer
    }
}

impl Layer for FlattenLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::Flatten
    }

    fn output_shape(&self, input: &Shape) -> Result<Shape> {
        let (c, h, w) = expect_bits_shape(self.layer_type(), input)?;
        Ok(Shape::Bits {
            c: c * h * w,
            h: 1,
            w: 1,
        })
    }

    fn fwd(&self, input: &Activation) -> Result<Activation> {
        let t = expect_bits(self.layer_type(), input)?;
        let len = t.len();
        Ok(Activation::Bits(BitTensor::from_bits(len, 1, 1, flatten(t))?))
    }
}

/// Binarized fully-connected layer producing raw signed scores.
pub struct DenseLayer {
    weights: DenseWeights,
}

impl DenseLayer {
    pub fn new(weights: DenseWeights) -> Result<Self> {
        if weights.inputs == 0 || weights.outputs == 0 {
            return Err(Error::InvalidConfig(format!("degenerate dense weights {}", weights)));
        }
        check_accumulator("Dense", weights.inputs)?;
        Ok(DenseLayer { weights })
    }

    pub fn weights(&self) -> &DenseWeights {
        &self.weights
    }
}

impl Layer for DenseLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::Dense
    }

    fn output_shape(&self, input: &Shape) -> Result<Shape> {
        let expected = Shape::Bits {
            c: self.weights.inputs,
            h: 1,
            w: 1,
        };
        if *input != expected {
            return Err(shape_mismatch("dense input", expected, input));
        }
        Ok(Shape::Scores(self.weights.outputs))
    }

    fn fwd(&self, input: &Activation) -> Result<Activation> {
        let t = expect_bits(self.layer_type(), input)?;
        Ok(Activation::Scores(dense(t.bits(), &self.weights)))
    }

    fn weight_memory_bytes(&self) -> usize {
        self.weights.memory_bytes()
    }
}

/// Sign activation turning scores back into bits.
#[derive(Default)]
pub struct SignLayer;

impl SignLayer {
    pub fn new() -> Self {
        SignLayer
    }
}

impl Layer for SignLayer {
    fn layer_type(&self) -> LayerType {
        LayerType::Sign
    }

    fn output_shape(&self, input: &Shape) -> Result<Shape> {
        match *input {
            Shape::Scores(n) => Ok(Shape::Bits { c: n, h: 1, w: 1 }),
            Shape::Bits { .. } => Err(shape_mismatch("sign input", "scores", input)),
        }
    }

    fn fwd(&self, input: &Activation) -> Result<Activation> {
        let scores = expect_scores(self.layer_type(), input)?;
        Ok(Activation::Bits(BitTensor::from_bits(scores.len(), 1, 1, sign(scores))?))
    }
}
