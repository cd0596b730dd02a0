//! Scalar reference kernels computed straight from logical indices.
//!
//! No tiling, no shuffles: these exist to cross-check the tiled engines and
//! share only the quantization unit with them.

use super::conv_skip::{activation_index, output_index, weight_index, ConvSkipParams, SkipElement};
use super::quant::{reduce_coefficient, srs};
use super::filter2d::{KERNEL_RADIUS, OUTPUT_SHIFT};
use super::KERNEL_WIDTH;
use crate::error::ShapeError;

/// Pre-quantization sum for one output element.
pub fn mac_reference(a: &[u8], b: &[u8], weights: &[i8], p: &ConvSkipParams, oc: usize, column: usize) -> i32 {
    let mut sum = 0i32;
    for (source, act) in [a, b].into_iter().enumerate() {
        for ic in 0..p.input_channels {
            let x = act[activation_index(p.width, ic, column)] as i32;
            let w = weights[weight_index(p.input_channels, source, oc, ic)] as i32;
            sum += x * w;
        }
    }
    sum
}

pub fn convolve_with_skip_reference<S: SkipElement>(
    a: &[u8],
    b: &[u8],
    weights: &[i8],
    skip: &[S],
    output: &mut [u8],
    p: &ConvSkipParams,
) -> Result<(), ShapeError> {
    p.check(a.len(), b.len(), weights.len(), skip.len(), output.len())?;
    for oc in 0..p.output_channels {
        for column in 0..p.width {
            let idx = output_index(p.width, oc, column);
            let mac: i8 = srs(mac_reference(a, b, weights, p, oc, column) as i64, p.mac_scale);
            output[idx] = srs(skip[idx].widen() as i64 + mac as i64, p.skip_scale);
        }
    }
    Ok(())
}

/// Direct 3x3 filter of one `height x width` image with clamped (replicated)
/// borders on all four sides.
pub fn filter2d_reference(image: &[u8], output: &mut [u8], width: usize, height: usize, kernel: &[i16; KERNEL_WIDTH * KERNEL_WIDTH]) {
    let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0i32;
            for j in 0..KERNEL_WIDTH {
                for i in 0..KERNEL_WIDTH {
                    let sy = clamp(y as isize + j as isize - KERNEL_RADIUS as isize, height);
                    let sx = clamp(x as isize + i as isize - KERNEL_RADIUS as isize, width);
                    let c = reduce_coefficient(kernel[j * KERNEL_WIDTH + i]) as i32;
                    acc += c * image[sy * width + sx] as i32;
                }
            }
            output[y * width + x] = srs(acc as i64, OUTPUT_SHIFT);
        }
    }
}
