use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

/// Write a synthetic profile stack: two peaks whose separation oscillates over
/// time, a taller reference spot, and Gaussian noise.
#[derive(Parser, Debug)]
struct Args {
    /// Output parquet file
    #[arg(default_value = "sample_stack.parquet")]
    output: PathBuf,

    /// Number of slices
    #[arg(long, default_value_t = 120)]
    slices: usize,

    /// Samples per profile
    #[arg(long, default_value_t = 128)]
    samples: usize,

    /// Seconds between slices
    #[arg(long, default_value_t = 0.05)]
    frame_interval: f64,

    /// Noise standard deviation
    #[arg(long, default_value_t = 2.0)]
    noise: f64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_profile(
    positions: &[f64],
    peaks: &[(f64, f64, f64)],
    baseline: f64,
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    positions
        .iter()
        .map(|&x| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(x, mu, sigma, amp))
                .sum();
            baseline + signal + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let positions: Vec<f64> = (0..args.samples).map(|i| i as f64).collect();
    let centre = args.samples as f64 * 0.4;
    let reference = args.samples as f64 * 0.85;

    let mut all_y: Vec<Vec<f64>> = Vec::with_capacity(args.slices);
    let mut all_time: Vec<f64> = Vec::with_capacity(args.slices);

    for k in 0..args.slices {
        let t = k as f64 * args.frame_interval;
        // Separation breathes between 18 and 26 samples.
        let separation = 22.0 + 4.0 * (2.0 * std::f64::consts::PI * 0.5 * t).sin();
        let peaks = [
            (centre - separation / 2.0, 2.0, 80.0),
            (centre + separation / 2.0, 2.0, 70.0),
            (reference, 3.0, 200.0),
        ];
        all_y.push(generate_profile(&positions, &peaks, 10.0, args.noise, &mut rng));
        all_time.push(t);
    }

    let mut y_builder = ListBuilder::new(Float64Builder::new());
    for row in &all_y {
        y_builder.values().append_slice(row);
        y_builder.append(true);
    }
    let y_array = y_builder.finish();

    let mut x_builder = ListBuilder::new(Float64Builder::new());
    for _ in 0..args.slices {
        x_builder.values().append_slice(&positions);
        x_builder.append(true);
    }
    let x_array = x_builder.finish();

    let time_array = Float64Array::from(all_time);

    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::List(item.clone()), false),
        Field::new("y", DataType::List(item), false),
        Field::new("time", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(x_array), Arc::new(y_array), Arc::new(time_array)],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;

    println!(
        "Wrote {} slices ({} samples each) to {}",
        args.slices,
        args.samples,
        args.output.display()
    );
    Ok(())
}
