use std::fmt;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::arc::{build, DigitNetParams, NetworkConfig};
use crate::conv::ConvStrategy;
use crate::error::{Error, Result};
use crate::loader::mnist::{BinaryMnist, MnistLabels};
use crate::network::{BinaryNetwork, LayerType};

const STRATEGIES: [ConvStrategy; 3] = [
    ConvStrategy::Direct,
    ConvStrategy::LineBuffer,
    ConvStrategy::Parallel,
];

/// Per-layer timings of every convolution strategy on one sample.
pub struct LayerMetrics {
    pub layer_idx: usize,
    pub layer_type: LayerType,
    pub times: [Duration; 3],
    pub weight_bytes: usize,
}

/// Aggregate results for one strategy.
pub struct StrategyMetrics {
    pub strategy: ConvStrategy,
    pub total_time: Duration,
    pub accuracy: f32,
    /// Share of samples whose class matches the direct reference.
    pub agreement: f32,
}

/// Benchmark comparing the direct, line-buffer, and parallel convolution strategies.
pub struct BenchmarkResult {
    pub layer_metrics: Vec<LayerMetrics>,
    pub strategies: Vec<StrategyMetrics>,
    pub total_weight_bytes: usize,
    pub num_samples: usize,
}

fn check_dataset(images: &BinaryMnist, labels: &MnistLabels) -> Result<()> {
    if images.is_empty() || images.len() != labels.len() {
        return Err(Error::InvalidDataset(format!(
            "{} images but {} labels",
            images.len(),
            labels.len()
        )));
    }
    Ok(())
}

/// Classifies the first `num_samples` images on the rayon pool and returns the
/// percentage classified correctly.
pub fn evaluate_accuracy(
    net: &BinaryNetwork,
    images: &BinaryMnist,
    labels: &MnistLabels,
    width: usize,
    num_samples: usize,
) -> Result<f32> {
    check_dataset(images, labels)?;
    let samples = num_samples.min(labels.len());
    let correct = (0..samples)
        .into_par_iter()
        .map(|i| -> Result<usize> {
            let class = net.classify(&images.at_resized(i, width))?;
            Ok(usize::from(class == labels.at(i) as usize))
        })
        .sum::<Result<usize>>()?;
    Ok(correct as f32 / samples.max(1) as f32 * 100.0)
}

/// Builds one network per strategy from the same parameters and compares
/// per-layer time, total time, accuracy, and agreement with the direct reference.
pub fn run_benchmark(
    config: &NetworkConfig,
    params: &DigitNetParams,
    images: &BinaryMnist,
    labels: &MnistLabels,
    num_samples: usize,
) -> Result<BenchmarkResult> {
    check_dataset(images, labels)?;
    let width = config.input_width;
    let nets = STRATEGIES
        .iter()
        .map(|&strategy| {
            let config = NetworkConfig {
                conv_strategy: strategy,
                ..config.clone()
            };
            build(&config, params.clone())
        })
        .collect::<Result<Vec<_>>>()?;

    let first_input = images.at_resized(0, width);
    let mut layer_times = Vec::with_capacity(nets.len());
    for net in &nets {
        let (_, timings) = net.classify_timed(&first_input)?;
        layer_times.push(timings);
    }
    let weight_mem = nets[0].layer_weight_memory();
    let layer_metrics = (0..nets[0].num_layers())
        .map(|i| LayerMetrics {
            layer_idx: i,
            layer_type: layer_times[0][i].0,
            times: [layer_times[0][i].1, layer_times[1][i].1, layer_times[2][i].1],
            weight_bytes: weight_mem[i],
        })
        .collect();

    let samples = num_samples.min(labels.len());
    let mut correct = [0usize; 3];
    let mut agree = [0usize; 3];
    let mut total_time = [Duration::ZERO; 3];
    for i in 0..samples {
        let input = images.at_resized(i, width);
        let label = labels.at(i) as usize;
        let mut classes = [0usize; 3];
        for (s, net) in nets.iter().enumerate() {
            let start = Instant::now();
            classes[s] = net.classify(&input)?;
            total_time[s] += start.elapsed();
        }
        for s in 0..3 {
            if classes[s] == label {
                correct[s] += 1;
            }
            if classes[s] == classes[0] {
                agree[s] += 1;
            }
        }
    }

    let pct = |count: usize| count as f32 / samples.max(1) as f32 * 100.0;
    let strategies = STRATEGIES
        .iter()
        .enumerate()
        .map(|(s, &strategy)| StrategyMetrics {
            strategy,
            total_time: total_time[s],
            accuracy: pct(correct[s]),
            agreement: pct(agree[s]),
        })
        .collect();

    Ok(BenchmarkResult {
        layer_metrics,
        strategies,
        total_weight_bytes: weight_mem.iter().sum(),
        num_samples: samples,
    })
}

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Per-Layer Metrics ===")?;
        writeln!(
            f,
            "{:<6} {:<13} {:>10} {:>10} {:>10} {:>9}",
            "Layer", "Type", "Direct", "LineBuf", "Parallel", "Weights"
        )?;
        for m in &self.layer_metrics {
            writeln!(
                f,
                "{:<6} {:<13} {:>8.3}ms {:>8.3}ms {:>8.3}ms {:>8}B",
                m.layer_idx,
                m.layer_type,
                millis(m.times[0]),
                millis(m.times[1]),
                millis(m.times[2]),
                m.weight_bytes
            )?;
        }

        writeln!(
            f,
            "\n=== Strategies ({} samples, {}B weights) ===",
            self.num_samples, self.total_weight_bytes
        )?;
        let direct_ms = self.strategies.first().map_or(0.0, |s| millis(s.total_time));
        for s in &self.strategies {
            let ms = millis(s.total_time);
            let speedup = if ms > 0.001 { direct_ms / ms } else { 0.0 };
            writeln!(
                f,
                "{:<11} {:>9.1}ms  speedup {:.2}x  accuracy {:.1}%  agree {:.1}%",
                format!("{:?}", s.strategy),
                ms,
                speedup,
                s.accuracy,
                s.agreement
            )?;
        }
        Ok(())
    }
}
