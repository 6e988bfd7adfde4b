use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::arc::NetworkConfig;
use crate::error::{Error, Result};
use crate::tensor::{ConvWeights, DenseWeights, Thresholds};

/// Trained parameters of the digit classifier.
///
/// On disk the layers follow network order. Weight bits are stored one byte
/// each (0 or 1), conv weights in `(in, out, row, col)` order and dense weights
/// in `(in, out)` order. Each conv layer's weights are followed by one
/// little-endian `i16` threshold per output channel.
#[derive(Clone)]
pub struct DigitNetParams {
    pub conv1_weights: ConvWeights,
    pub conv1_thresholds: Thresholds,
    pub conv2_weights: ConvWeights,
    pub conv2_thresholds: Thresholds,
    pub dense1: DenseWeights,
    pub dense2: DenseWeights,
}

fn read_bits(reader: &mut impl Read, count: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; count];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_thresholds(reader: &mut impl Read, count: usize) -> Result<Thresholds> {
    let mut buf = vec![0u8; count * 2];
    reader.read_exact(&mut buf)?;
    Ok(buf
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect::<Vec<_>>()
        .into())
}

fn write_conv(
    writer: &mut impl Write,
    weights: &ConvWeights,
    thresholds: &Thresholds,
) -> Result<()> {
    let f = weights.kernel_size;
    let mut buf = Vec::with_capacity(weights.in_channels * weights.out_channels * f * f);
    for m in 0..weights.in_channels {
        for n in 0..weights.out_channels {
            for r in 0..f {
                for c in 0..f {
                    buf.push(weights.get(m, n, r, c) as u8);
                }
            }
        }
    }
    writer.write_all(&buf)?;
    for &t in thresholds.as_slice() {
        writer.write_all(&t.to_le_bytes())?;
    }
    Ok(())
}

fn write_dense(writer: &mut impl Write, weights: &DenseWeights) -> Result<()> {
    let mut buf = Vec::with_capacity(weights.inputs * weights.outputs);
    for m in 0..weights.inputs {
        for n in 0..weights.outputs {
            buf.push(weights.get(m, n) as u8);
        }
    }
    writer.write_all(&buf)?;
    Ok(())
}

impl DigitNetParams {
    /// Reads every layer's parameters with the shapes `config` declares.
    pub fn read(reader: &mut impl Read, config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        let f = config.kernel_size;
        let (c0, c1, c2) = (
            config.input_channels,
            config.conv1_channels,
            config.conv2_channels,
        );

        let conv1_bits = read_bits(reader, c0 * c1 * f * f)?;
        let conv1_weights = ConvWeights::from_flat(c0, c1, f, &conv1_bits)?;
        let conv1_thresholds = read_thresholds(reader, c1)?;
        let conv2_bits = read_bits(reader, c1 * c2 * f * f)?;
        let conv2_weights = ConvWeights::from_flat(c1, c2, f, &conv2_bits)?;
        let conv2_thresholds = read_thresholds(reader, c2)?;

        let units = config.flatten_units();
        let (hidden, classes) = (config.hidden_units, config.num_classes);
        let dense1 = DenseWeights::from_flat(units, hidden, &read_bits(reader, units * hidden)?)?;
        let dense2_bits = read_bits(reader, hidden * classes)?;
        let dense2 = DenseWeights::from_flat(hidden, classes, &dense2_bits)?;

        let mut extra = [0u8; 1];
        if reader.read(&mut extra)? != 0 {
            return Err(Error::InvalidConfig(
                "parameter stream is longer than the configured network".to_string(),
            ));
        }

        Ok(DigitNetParams {
            conv1_weights,
            conv1_thresholds,
            conv2_weights,
            conv2_thresholds,
            dense1,
            dense2,
        })
    }

    pub fn load(path: impl AsRef<Path>, config: &NetworkConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let params = Self::read(&mut reader, config)?;
        tracing::info!(path = %path.display(), "loaded network parameters");
        Ok(params)
    }

    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        write_conv(writer, &self.conv1_weights, &self.conv1_thresholds)?;
        write_conv(writer, &self.conv2_weights, &self.conv2_thresholds)?;
        write_dense(writer, &self.dense1)?;
        write_dense(writer, &self.dense2)?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
