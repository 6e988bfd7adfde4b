//! Binarized digit classifier on MNIST.
//!
//! Run with: `cargo run --release --example bnn_mnist -- --params data/bnn.params`
//!
//! Requires data files in `data/`:
//! - a parameter file matching the network config
//! - `t10k-images-idx3-ubyte` (MNIST test images)
//! - `t10k-labels-idx1-ubyte.gz` (MNIST test labels)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use microbnn::arc::{build, DigitNetParams, NetworkConfig};
use microbnn::loader::mnist::{BinaryMnist, MnistLabels, DEFAULT_THRESHOLD};
use microbnn::metrics::benchmark::{evaluate_accuracy, run_benchmark};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Network parameter file.
    #[clap(long, env = "BNN_PARAMS")]
    params: PathBuf,
    /// Optional JSON network config; defaults to the 16x16 digit network.
    #[clap(long)]
    config: Option<PathBuf>,
    #[clap(long, default_value = "data/t10k-images-idx3-ubyte")]
    images: PathBuf,
    #[clap(long, default_value = "data/t10k-labels-idx1-ubyte.gz")]
    labels: PathBuf,
    /// Pixels brighter than this become 1.
    #[clap(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u8,
    /// Number of samples to evaluate.
    #[clap(short, long, default_value_t = 1000)]
    samples: usize,
    /// Also compare the convolution strategies.
    #[clap(long)]
    benchmark: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => NetworkConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => NetworkConfig::default(),
    };
    let params = DigitNetParams::load(&args.params, &config).context("failed to load parameters")?;
    let net = build(&config, params.clone())?;

    let images = BinaryMnist::new(&args.images, args.threshold).context("failed to load images")?;
    let labels = MnistLabels::new(&args.labels).context("failed to load labels")?;

    println!("Sample 0 (label {}):", labels.at(0));
    print!("{}", images.render(0));
    let class = net.classify(&images.at_resized(0, config.input_width))?;
    println!("Predicted: {}", class);

    let accuracy = evaluate_accuracy(&net, &images, &labels, config.input_width, args.samples)?;
    println!("Accuracy over {} samples: {:.1}%", args.samples.min(labels.len()), accuracy);

    if args.benchmark {
        let result = run_benchmark(&config, &params, &images, &labels, args.samples)?;
        println!("\n{}", result);
    }
    Ok(())
}
