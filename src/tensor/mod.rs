mod bits;
mod tensor_bits;
mod weights;

pub use bits::BitVec;
pub use tensor_bits::BitTensor;
pub use weights::{ConvWeights, DenseWeights, Thresholds};
