/// Digit-recognition network configuration and builder.
mod digitnet;
/// Raw parameter stream reader/writer.
mod params;

pub use digitnet::{build, NetworkConfig};
pub use params::DigitNetParams;
