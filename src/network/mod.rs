/// Binarized layer implementations (Pad, BinaryConv2d, MaxPool2d, Flatten, Dense, Sign).
mod layers;
/// Free-standing tensor operations behind the layers.
mod ops;

pub use layers::*;
pub use ops::*;

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{shape_mismatch, Error, Result};
use crate::tensor::BitTensor;

/// Identifies the type of a neural network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    Pad,
    BinaryConv2d,
    MaxPool2d,
    Flatten,
    Dense,
    Sign,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerType::Pad => write!(f, "Pad"),
            LayerType::BinaryConv2d => write!(f, "BinaryConv2d"),
            LayerType::MaxPool2d => write!(f, "MaxPool2d"),
            LayerType::Flatten => write!(f, "Flatten"),
            LayerType::Dense => write!(f, "Dense"),
            LayerType::Sign => write!(f, "Sign"),
        }
    }
}

/// Shape of the value flowing between two layers, known when the network is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Bits { c: usize, h: usize, w: usize },
    Scores(usize),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Bits { c, h, w } => write!(f, "{}x{}x{} (bits)", c, h, w),
            Shape::Scores(n) => write!(f, "{} (i16 scores)", n),
        }
    }
}

/// Value flowing between two layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Bits(BitTensor),
    Scores(Vec<i16>),
}

impl Activation {
    pub fn shape(&self) -> Shape {
        match self {
            Activation::Bits(t) => Shape::Bits {
                c: t.c,
                h: t.h,
                w: t.w,
            },
            Activation::Scores(s) => Shape::Scores(s.len()),
        }
    }

    pub fn as_bits(&self) -> Option<&BitTensor> {
        match self {
            Activation::Bits(t) => Some(t),
            Activation::Scores(_) => None,
        }
    }

    pub fn as_scores(&self) -> Option<&[i16]> {
        match self {
            Activation::Scores(s) => Some(s),
            Activation::Bits(_) => None,
        }
    }
}

pub(crate) fn expect_bits(layer: LayerType, input: &Activation) -> Result<&BitTensor> {
    input
        .as_bits()
        .ok_or_else(|| shape_mismatch(layer.to_string(), "bit tensor", input.shape()))
}

pub(crate) fn expect_scores(layer: LayerType, input: &Activation) -> Result<&[i16]> {
    input
        .as_scores()
        .ok_or_else(|| shape_mismatch(layer.to_string(), "scores", input.shape()))
}

/// Trait for binarized network layers.
///
/// Layers own their parameters and never change after construction, so a
/// forward pass only needs `&self`.
pub trait Layer: Send + Sync {
    fn layer_type(&self) -> LayerType;

    /// Shape this layer produces for `input`, or the configuration error that
    /// makes `input` unacceptable.
    fn output_shape(&self, input: &Shape) -> Result<Shape>;

    fn fwd(&self, input: &Activation) -> Result<Activation>;

    fn weight_memory_bytes(&self) -> usize {
        0
    }

    /// Checks the input shape, then runs `fwd`.
    fn forward(&self, input: &Activation) -> Result<Activation> {
        self.output_shape(&input.shape())?;
        self.fwd(input)
    }
}

/// A feed-forward binarized network ending in one score per class.
///
/// Every layer is validated against the running output shape as it is added,
/// so all topology errors surface before the first inference.
pub struct BinaryNetwork {
    input_shape: Shape,
    output_shape: Shape,
    layers: Vec<Box<dyn Layer>>,
}

impl BinaryNetwork {
    pub fn new(input_shape: Shape) -> Self {
        BinaryNetwork {
            input_shape,
            output_shape: input_shape,
            layers: Vec::new(),
        }
    }

    pub fn add(&mut self, layer: Box<dyn Layer>) -> Result<()> {
        let shape = layer.output_shape(&self.output_shape)?;
        tracing::debug!(
            layer = %layer.layer_type(),
            input = %self.output_shape,
            output = %shape,
            "added layer"
        );
        self.output_shape = shape;
        self.layers.push(layer);
        Ok(())
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, layer: impl Layer + 'static) -> Result<Self> {
        self.add(Box::new(layer))?;
        Ok(self)
    }

    /// Checks that the network ends in at least one class score.
    pub fn validate(&self) -> Result<()> {
        match self.output_shape {
            Shape::Scores(n) if n > 0 => Ok(()),
            other => Err(Error::InvalidConfig(format!(
                "network must end in class scores, ends in {}",
                other
            ))),
        }
    }

    fn check_input(&self, image: &BitTensor) -> Result<()> {
        let shape = Shape::Bits {
            c: image.c,
            h: image.h,
            w: image.w,
        };
        if shape != self.input_shape {
            return Err(shape_mismatch("network input", self.input_shape, shape));
        }
        Ok(())
    }

    /// Runs every layer and returns the final class scores.
    pub fn scores(&self, image: &BitTensor) -> Result<Vec<i16>> {
        self.validate()?;
        self.check_input(image)?;
        let mut cur = Activation::Bits(image.clone());
        for layer in &self.layers {
            cur = layer.fwd(&cur)?;
            tracing::trace!(layer = %layer.layer_type(), output = %cur.shape(), "forward");
        }
        expect_scores(LayerType::Dense, &cur).map(<[i16]>::to_vec)
    }

    /// Classifies one image, returning the index of the highest class score.
    pub fn classify(&self, image: &BitTensor) -> Result<usize> {
        let scores = self.scores(image)?;
        let class = argmax(&scores);
        tracing::debug!(class, ?scores, "classified image");
        Ok(class)
    }

    pub fn classify_with_intermediates(&self, image: &BitTensor) -> Result<Vec<Activation>> {
        self.check_input(image)?;
        let mut intermediates: Vec<Activation> = Vec::with_capacity(self.layers.len());
        let mut cur = Activation::Bits(image.clone());
        for layer in &self.layers {
            cur = layer.fwd(&cur)?;
            intermediates.push(cur.clone());
        }
        Ok(intermediates)
    }

    pub fn classify_timed(
        &self,
        image: &BitTensor,
    ) -> Result<(Vec<Activation>, Vec<(LayerType, Duration)>)> {
        self.check_input(image)?;
        let mut timings = Vec::with_capacity(self.layers.len());
        let mut intermediates = Vec::with_capacity(self.layers.len());
        let mut cur = Activation::Bits(image.clone());
        for layer in &self.layers {
            let start = Instant::now();
            cur = layer.fwd(&cur)?;
            timings.push((layer.layer_type(), start.elapsed()));
            intermediates.push(cur.clone());
        }
        Ok((intermediates, timings))
    }

    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    pub fn output_shape(&self) -> Shape {
        self.output_shape
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_weight_memory(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.weight_memory_bytes()).collect()
    }
}
