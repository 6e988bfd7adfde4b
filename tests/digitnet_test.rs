use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use microbnn::arc::{build, DigitNetParams, NetworkConfig};
use microbnn::conv::ConvStrategy;
use microbnn::loader::mnist::{BinaryMnist, MnistLabels};
use microbnn::metrics::benchmark::{evaluate_accuracy, run_benchmark};
use microbnn::network::Shape;
use microbnn::tensor::{BitTensor, ConvWeights, DenseWeights, Thresholds};
use microbnn::Error;

/// Deterministic pseudo-random bits (xorshift64).
struct Bits(u64);

impl Bits {
    fn next(&mut self) -> bool {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 & 1 == 1
    }
}

fn random_params(config: &NetworkConfig, seed: u64) -> DigitNetParams {
    let mut rng = Bits(seed);
    let f = config.kernel_size;
    let (c0, c1, c2) = (config.input_channels, config.conv1_channels, config.conv2_channels);
    DigitNetParams {
        conv1_weights: ConvWeights::from_fn(c0, c1, f, |_, _, _, _| rng.next()),
        conv1_thresholds: Thresholds::new((0..c1 as i16).map(|i| i % 5 - 2).collect()),
        conv2_weights: ConvWeights::from_fn(c1, c2, f, |_, _, _, _| rng.next()),
        conv2_thresholds: Thresholds::new((0..c2 as i16).map(|i| i % 7 - 3).collect()),
        dense1: DenseWeights::from_fn(config.flatten_units(), config.hidden_units, |_, _| {
            rng.next()
        }),
        dense2: DenseWeights::from_fn(config.hidden_units, config.num_classes, |_, _| rng.next()),
    }
}

fn random_image(config: &NetworkConfig, seed: u64) -> BitTensor {
    let mut rng = Bits(seed);
    let w = config.input_width;
    BitTensor::from_fn(config.input_channels, w, w, |_, _, _| rng.next())
}

fn idx_images(images: &[Vec<u8>], rows: usize, cols: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x0000_0803u32.to_be_bytes());
    bytes.extend_from_slice(&(images.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&(rows as u32).to_be_bytes());
    bytes.extend_from_slice(&(cols as u32).to_be_bytes());
    for img in images {
        bytes.extend_from_slice(img);
    }
    bytes
}

fn idx_labels(labels: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x0000_0801u32.to_be_bytes());
    bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    bytes.extend_from_slice(labels);
    bytes
}

#[test]
fn default_config_matches_digit_network() {
    let config = NetworkConfig::default();
    config.validate().unwrap();
    assert_eq!(config.input_shape(), Shape::Bits { c: 1, h: 16, w: 16 });
    assert_eq!(config.pad_margin(), 1);
    assert_eq!(config.output_width(), 4);
    assert_eq!(config.flatten_units(), 512);
}

#[test]
fn config_from_json_fills_defaults() {
    let json = r#"{"input_width": 28, "conv_strategy": "parallel"}"#;
    let config = NetworkConfig::from_json_str(json).unwrap();
    assert_eq!(config.input_width, 28);
    assert_eq!(config.conv_strategy, ConvStrategy::Parallel);
    assert_eq!(config.kernel_size, 3);
    assert_eq!(config.flatten_units(), 32 * 7 * 7);
}

#[test]
fn config_validation_errors() {
    let err = NetworkConfig::from_json_str(r#"{"input_width": 18}"#).unwrap_err();
    assert!(matches!(err, Error::OddPoolingDimension { width: 9 }));

    let err = NetworkConfig::from_json_str(r#"{"input_width": 15}"#).unwrap_err();
    assert!(matches!(err, Error::OddPoolingDimension { width: 15 }));

    let err = NetworkConfig::from_json_str(r#"{"kernel_size": 4}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let err = NetworkConfig::from_json_str(r#"{"num_classes": 0}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let err = NetworkConfig::from_json_str(r#"{"conv1_channels": 4000}"#).unwrap_err();
    assert!(matches!(err, Error::AccumulatorOverflowRisk { .. }));

    let err = NetworkConfig::from_json_str(r#"{"layers": 3}"#).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn strategies_classify_identically() {
    let base = NetworkConfig::default();
    let params = random_params(&base, 0xDEAD_BEEF);
    let nets: Vec<_> = [ConvStrategy::Direct, ConvStrategy::LineBuffer, ConvStrategy::Parallel]
        .iter()
        .map(|&s| {
            let config = NetworkConfig {
                conv_strategy: s,
                ..base.clone()
            };
            build(&config, params.clone()).unwrap()
        })
        .collect();
    assert_eq!(nets[0].num_layers(), 10);

    for seed in 1..6 {
        let image = random_image(&base, seed);
        let reference = nets[0].scores(&image).unwrap();
        assert_eq!(reference.len(), 10);
        for score in &reference {
            assert!(score.abs() <= 256 && score % 2 == 0);
        }
        for net in &nets[1..] {
            assert_eq!(net.scores(&image).unwrap(), reference);
            assert_eq!(net.classify(&image).unwrap(), nets[0].classify(&image).unwrap());
        }
    }
}

#[test]
fn build_rejects_params_of_wrong_shape() {
    let config = NetworkConfig::default();
    let mut params = random_params(&config, 3);
    params.dense2 = DenseWeights::from_fn(config.hidden_units, 9, |_, _| true);
    let err = build(&config, params).err().unwrap();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let mut params = random_params(&config, 3);
    params.conv2_weights = ConvWeights::from_fn(8, 32, 3, |_, _, _, _| true);
    let err = build(&config, params).err().unwrap();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn params_stream_layout() {
    let config = NetworkConfig::default();
    let params = random_params(&config, 42);
    let mut bytes = Vec::new();
    params.write(&mut bytes).unwrap();
    assert_eq!(bytes.len(), 16 * 9 + 16 * 2 + 16 * 32 * 9 + 32 * 2 + 512 * 256 + 256 * 10);

    // conv1 thresholds follow the 144 conv1 weight bytes.
    assert_eq!(i16::from_le_bytes([bytes[144], bytes[145]]), params.conv1_thresholds.get(0));

    let read = DigitNetParams::read(&mut bytes.as_slice(), &config).unwrap();
    assert!(read.conv1_weights == params.conv1_weights);
    assert_eq!(read.conv2_thresholds, params.conv2_thresholds);
    assert!(read.dense1 == params.dense1 && read.dense2 == params.dense2);
}

#[test]
fn params_stream_length_is_checked() {
    let config = NetworkConfig::default();
    let mut bytes = Vec::new();
    random_params(&config, 5).write(&mut bytes).unwrap();

    let short = &bytes[..bytes.len() - 1];
    assert!(matches!(DigitNetParams::read(&mut &short[..], &config), Err(Error::Io(_))));

    let mut long = bytes.clone();
    long.push(0);
    assert!(matches!(
        DigitNetParams::read(&mut long.as_slice(), &config),
        Err(Error::InvalidConfig(_))
    ));

    let mut bad = bytes;
    bad[0] = 3;
    assert!(matches!(
        DigitNetParams::read(&mut bad.as_slice(), &config),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn mnist_images_are_binarized() {
    let bytes = idx_images(&[vec![0, 200, 127, 128, 255, 10], vec![255; 6]], 2, 3);
    let mnist = BinaryMnist::from_reader(&mut bytes.as_slice(), 127).unwrap();
    assert_eq!(mnist.len(), 2);
    assert_eq!(mnist.dims(), (2, 3));

    let img = mnist.at(0);
    let bits: Vec<bool> = img.bits().iter().collect();
    assert_eq!(bits, vec![false, true, false, true, true, false]);
    assert_eq!(mnist.at(1).count_ones(), 6);
    assert_eq!(mnist.render(0), " x \nxx \n");
    assert_eq!(mnist.at_resized(1, 4).count_ones(), 16);
}

#[test]
fn mnist_rejects_bad_magic() {
    let mut bytes = idx_labels(&[1, 2]);
    assert!(matches!(
        BinaryMnist::from_reader(&mut bytes.as_slice(), 127),
        Err(Error::InvalidDataset(_))
    ));
    bytes[3] = 0x03;
    assert!(matches!(
        MnistLabels::from_reader(&mut bytes.as_slice()),
        Err(Error::InvalidDataset(_))
    ));
}

fn idx_header(magic: u32, dims: &[u32]) -> Vec<u8> {
    let mut bytes = magic.to_be_bytes().to_vec();
    for d in dims {
        bytes.extend_from_slice(&d.to_be_bytes());
    }
    bytes
}

#[test]
fn mnist_header_counts_are_not_trusted() {
    // Header claims u32::MAX images of 28x28 but carries no pixel data.
    let bytes = idx_header(0x0000_0803, &[u32::MAX, 28, 28]);
    assert!(matches!(
        BinaryMnist::from_reader(&mut bytes.as_slice(), 127),
        Err(Error::Io(_))
    ));

    let bytes = idx_header(0x0000_0803, &[1, u32::MAX, u32::MAX]);
    assert!(matches!(
        BinaryMnist::from_reader(&mut bytes.as_slice(), 127),
        Err(Error::InvalidDataset(_))
    ));

    let mut bytes = idx_header(0x0000_0801, &[u32::MAX]);
    bytes.extend_from_slice(&[1, 2, 3]);
    assert!(matches!(
        MnistLabels::from_reader(&mut bytes.as_slice()),
        Err(Error::InvalidDataset(_))
    ));
}

#[test]
fn mnist_labels_read_gzip() {
    let path = std::env::temp_dir().join(format!("microbnn-labels-{}.gz", std::process::id()));
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&idx_labels(&[3, 7, 1])).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();

    let labels = MnistLabels::new(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.at(1), 7);
}

#[test]
fn benchmark_strategies_agree() {
    let config = NetworkConfig::default();
    let params = random_params(&config, 9);
    let images: Vec<Vec<u8>> = (0..4u64)
        .map(|i| {
            let mut rng = Bits(100 + i);
            (0..16 * 16).map(|_| if rng.next() { 255 } else { 0 }).collect()
        })
        .collect();
    let mnist = BinaryMnist::from_reader(&mut idx_images(&images, 16, 16).as_slice(), 127).unwrap();

    let net = build(&config, params.clone()).unwrap();
    let classes: Vec<u8> = (0..4).map(|i| net.classify(mnist.at(i)).unwrap() as u8).collect();
    let labels = MnistLabels::from_reader(&mut idx_labels(&classes).as_slice()).unwrap();

    assert_eq!(evaluate_accuracy(&net, &mnist, &labels, 16, 10).unwrap(), 100.0);

    let result = run_benchmark(&config, &params, &mnist, &labels, 4).unwrap();
    assert_eq!(result.num_samples, 4);
    assert_eq!(result.layer_metrics.len(), 10);
    assert_eq!(result.strategies.len(), 3);
    for s in &result.strategies {
        assert_eq!(s.agreement, 100.0, "{:?}", s.strategy);
        assert_eq!(s.accuracy, 100.0, "{:?}", s.strategy);
    }
    assert!(result.to_string().contains("LineBuffer"));
}
