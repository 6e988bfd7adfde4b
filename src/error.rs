use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring a network or loading its inputs.
///
/// Inference itself never fails once a network has been built.
#[derive(Debug, Error)]
pub enum Error {
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: String,
        actual: String,
    },
    #[error("accumulator overflow risk in {layer}: scores reach {bound}, beyond i16::MAX")]
    AccumulatorOverflowRisk { layer: String, bound: usize },
    #[error("max pooling needs an even spatial size, got {width}")]
    OddPoolingDimension { width: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub(crate) fn shape_mismatch(
    what: impl Into<String>,
    expected: impl ToString,
    actual: impl ToString,
) -> Error {
    Error::ShapeMismatch {
        what: what.into(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// Rejects layers whose doubled agreement count cannot be held by the `i16` accumulator.
pub(crate) fn check_accumulator(layer: &str, terms: usize) -> Result<()> {
    let bound = terms.saturating_mul(2);
    if bound > i16::MAX as usize {
        return Err(Error::AccumulatorOverflowRisk {
            layer: layer.to_string(),
            bound,
        });
    }
    Ok(())
}
