//! Kernel case descriptions: what to run, with which shape, on which inputs.
//!
//! Cases are read from JSON, inputs are synthesized from a seed so runs are
//! reproducible, and every run is checked against the scalar reference.
//!
//! ```json
//! { "kernel": "conv_skip",
//!   "params": { "width": 32, "input_channels": 16, "output_channels": 8 },
//!   "skip_kind": "signed", "seed": 7 }
//! ```

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::kernels::reference::{convolve_with_skip_reference, filter2d_reference};
use crate::kernels::{
    convolve_with_skip, convolve_with_skip_par, filter2d_image, filter2d_three_rows, ConvSkipParams, SkipKind,
    KERNEL_WIDTH, SRS_SHIFT,
};

pub type Coefficients = [i16; KERNEL_WIDTH * KERNEL_WIDTH];

/// Centre tap at unit gain, everything else zero.
pub fn identity_coefficients() -> Coefficients {
    let mut k = [0i16; KERNEL_WIDTH * KERNEL_WIDTH];
    k[KERNEL_WIDTH * KERNEL_WIDTH / 2] = 1 << SRS_SHIFT;
    k
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kernel", rename_all = "snake_case")]
pub enum KernelCase {
    ConvSkip {
        params: ConvSkipParams,
        #[serde(default)]
        skip_kind: SkipKind,
        #[serde(default)]
        seed: u64,
    },
    Filter2d {
        width: usize,
        height: usize,
        #[serde(default = "identity_coefficients")]
        coefficients: Coefficients,
        #[serde(default)]
        seed: u64,
    },
}

#[derive(Debug, Clone)]
pub enum SkipTensor {
    Signed(Vec<i8>),
    Unsigned(Vec<u8>),
}

/// Synthesized input buffers for one case.
#[derive(Debug, Clone)]
pub enum CaseInputs {
    ConvSkip { a: Vec<u8>, b: Vec<u8>, weights: Vec<i8>, skip: SkipTensor },
    Filter2d { image: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    pub kernel: String,
    pub elements: usize,
    pub checksum: u64,
    pub mismatches: usize,
    pub elapsed_us: u128,
}

impl CaseReport {
    pub fn passed(&self) -> bool { self.mismatches == 0 }
}

/// Product of `dims`, or an error naming `what` if it overflows `usize`.
fn checked_len(what: &str, dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .with_context(|| format!("{} size {:?} overflows usize", what, dims))
}

fn random_u8(rng: &mut SmallRng, n: usize) -> Vec<u8> {
    (0..n).map(|_| rng.gen()).collect()
}

impl KernelCase {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read case file: {}", path.as_ref().display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse case file: {}", path.as_ref().display()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            KernelCase::ConvSkip { .. } => "conv_skip",
            KernelCase::Filter2d { .. } => "filter2d",
        }
    }

    pub fn output_len(&self) -> Result<usize> {
        match self {
            KernelCase::ConvSkip { params, .. } => checked_len("output", &[params.output_channels, params.width]),
            KernelCase::Filter2d { width, height, .. } => checked_len("image", &[*width, *height]),
        }
    }

    /// Deterministic inputs for this case. Weights are drawn from a normal
    /// distribution and clamped to int8; everything else is uniform.
    pub fn synthesize(&self) -> Result<CaseInputs> {
        match self {
            KernelCase::ConvSkip { params, skip_kind, seed } => {
                params.validate()?;
                let activation_len = checked_len("activation", &[params.input_channels, params.width])?;
                let weight_len = checked_len("weight", &[params.output_channels, 2, params.input_channels])?;
                let output_len = self.output_len()?;
                let mut rng = SmallRng::seed_from_u64(*seed);
                let normal = Normal::new(0.0f32, 16.0).context("weight distribution")?;
                let a = random_u8(&mut rng, activation_len);
                let b = random_u8(&mut rng, activation_len);
                let weights = (0..weight_len)
                    .map(|_| normal.sample(&mut rng).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8)
                    .collect();
                let skip = match skip_kind {
                    SkipKind::Signed => SkipTensor::Signed((0..output_len).map(|_| rng.gen()).collect()),
                    SkipKind::Unsigned => SkipTensor::Unsigned(random_u8(&mut rng, output_len)),
                };
                debug!("synthesized conv_skip inputs: seed={} weights={}", seed, weight_len);
                Ok(CaseInputs::ConvSkip { a, b, weights, skip })
            }
            KernelCase::Filter2d { width, height, seed, .. } => {
                let len = self.output_len()?;
                let mut rng = SmallRng::seed_from_u64(*seed);
                let image = random_u8(&mut rng, len);
                debug!("synthesized filter2d image: {}x{} seed={}", width, height, seed);
                Ok(CaseInputs::Filter2d { image })
            }
        }
    }

    /// Run the tiled kernel once into `output`.
    pub fn execute(&self, inputs: &CaseInputs, output: &mut [u8], parallel: bool) -> Result<()> {
        match (self, inputs) {
            (KernelCase::ConvSkip { params, .. }, CaseInputs::ConvSkip { a, b, weights, skip }) => {
                match (skip, parallel) {
                    (SkipTensor::Signed(s), false) => convolve_with_skip(a, b, weights, s, output, params)?,
                    (SkipTensor::Signed(s), true) => convolve_with_skip_par(a, b, weights, s, output, params)?,
                    (SkipTensor::Unsigned(s), false) => convolve_with_skip(a, b, weights, s, output, params)?,
                    (SkipTensor::Unsigned(s), true) => convolve_with_skip_par(a, b, weights, s, output, params)?,
                }
            }
            (KernelCase::Filter2d { width, height, coefficients, .. }, CaseInputs::Filter2d { image }) => {
                if parallel {
                    filter2d_image(image, output, *width, *height, coefficients)?;
                } else {
                    let len = checked_len("image", &[*width, *height])?;
                    anyhow::ensure!(image.len() >= len && output.len() >= len, "filter2d buffers shorter than {}", len);
                    let row = |r: usize| &image[r * width..(r + 1) * width];
                    for y in 0..*height {
                        let above = y.saturating_sub(1);
                        let below = (y + 1).min(height - 1);
                        filter2d_three_rows(
                            row(above),
                            row(y),
                            row(below),
                            &mut output[y * width..(y + 1) * width],
                            *width,
                            coefficients,
                        )?;
                    }
                }
            }
            _ => anyhow::bail!("inputs do not belong to a {} case", self.name()),
        }
        Ok(())
    }

    fn reference(&self, inputs: &CaseInputs, output: &mut [u8]) -> Result<()> {
        match (self, inputs) {
            (KernelCase::ConvSkip { params, .. }, CaseInputs::ConvSkip { a, b, weights, skip }) => match skip {
                SkipTensor::Signed(s) => convolve_with_skip_reference(a, b, weights, s, output, params)?,
                SkipTensor::Unsigned(s) => convolve_with_skip_reference(a, b, weights, s, output, params)?,
            },
            (KernelCase::Filter2d { width, height, coefficients, .. }, CaseInputs::Filter2d { image }) => {
                filter2d_reference(image, output, *width, *height, coefficients)
            }
            _ => anyhow::bail!("inputs do not belong to a {} case", self.name()),
        }
        Ok(())
    }

    /// Synthesize, run the tiled kernel, and compare with the reference.
    pub fn run(&self, parallel: bool) -> Result<CaseReport> {
        let len = self.output_len()?;
        let inputs = self.synthesize()?;
        let mut output = vec![0u8; len];
        let t0 = Instant::now();
        self.execute(&inputs, &mut output, parallel)?;
        let elapsed_us = t0.elapsed().as_micros();

        let mut expected = vec![0u8; len];
        self.reference(&inputs, &mut expected)?;
        let mismatches = output.iter().zip(&expected).filter(|(a, b)| a != b).count();
        if mismatches > 0 {
            warn!("{}: {} of {} elements differ from the reference", self.name(), mismatches, output.len());
        }
        let checksum = output.iter().fold(0u64, |acc, &v| acc.wrapping_mul(31).wrapping_add(v as u64));
        info!("{}: {} elements in {}us", self.name(), output.len(), elapsed_us);
        Ok(CaseReport { kernel: self.name().to_string(), elements: output.len(), checksum, mismatches, elapsed_us })
    }
}
