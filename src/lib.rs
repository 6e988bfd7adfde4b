//! A minimal binarized CNN inference engine.
//!
//! Weights and activations are single bits. Convolution and fully-connected
//! layers count XNOR agreements with a population count, and convolution folds
//! bias, batch normalization, and the step activation into one integer
//! threshold per output channel. A reference two-conv digit classifier is
//! provided in [`arc`].
//!
//! # Example
//!
//! ```no_run
//! use microbnn::arc::{build, DigitNetParams, NetworkConfig};
//!
//! let config = NetworkConfig::default();
//! let params = DigitNetParams::load("data/bnn.params", &config)?;
//! let net = build(&config, params)?;
//! # Ok::<(), microbnn::Error>(())
//! ```

/// Error type shared by configuration, loading, and network construction.
pub mod error;
/// Packed bit containers, feature maps, and binary weights.
pub mod tensor;
/// Binarized convolution strategies.
pub mod conv;
/// Layers and the network driver.
pub mod network;
/// Digit classifier configuration, parameters, and builder.
pub mod arc;
/// Binarized MNIST dataset loaders.
pub mod loader;
/// Benchmarking utilities comparing convolution strategies.
pub mod metrics;

pub use error::{Error, Result};
