//! 1x1 convolution over two activation sources with a fused residual add.
//!
//! Tensor layouts (all row-major, channel-blocked by 8):
//!
//! - activations: `[input_channels / 8][width][8]`, one buffer per source
//! - weights: `[output_channels / 8][2 * input_channels / 8][8 ic][8 oc]`;
//!   within an output-channel tile the first half of the 8x8 blocks pairs
//!   with source A and the second half with source B
//! - skip and output: `[output_channels / 8][width][8]`
//!
//! `input_channels` is the channel count of each source, so the contraction
//! runs over `2 * input_channels` channels in total.

use log::trace;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::quant::{srs, Narrow};
use super::vector::{mmul_4x8x8, AccumulatorBank};
use super::{
    ACCUMULATOR_COUNT, CHANNEL_GROUP, INPUT_CHANNEL_TILE, LANE_WIDTH, OUTPUT_CHANNEL_TILE, SPATIAL_TILE,
    WEIGHT_BLOCK,
};
use crate::error::{check_len, ShapeError};

/// Largest per-source channel count whose worst-case sum,
/// `2 * input_channels * 255 * 128`, still fits the i32 accumulators.
pub const MAX_INPUT_CHANNELS: usize =
    i32::MAX as usize / (2 * u8::MAX as usize * 128) / INPUT_CHANNEL_TILE * INPUT_CHANNEL_TILE;

/// Shape and scale parameters of one `convolve_with_skip` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvSkipParams {
    pub width: usize,
    /// Channels per activation source.
    pub input_channels: usize,
    pub output_channels: usize,
    /// Right shift taking the MAC sum into the residual's int8 domain.
    #[serde(default)]
    pub mac_scale: u32,
    /// Right shift applied to `residual + requantized MAC` for the u8 output.
    #[serde(default)]
    pub skip_scale: u32,
}

impl ConvSkipParams {
    pub fn new(width: usize, input_channels: usize, output_channels: usize) -> Self {
        Self { width, input_channels, output_channels, mac_scale: 0, skip_scale: 0 }
    }

    pub fn with_scales(mut self, mac_scale: u32, skip_scale: u32) -> Self {
        self.mac_scale = mac_scale;
        self.skip_scale = skip_scale;
        self
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.width == 0 || self.width % SPATIAL_TILE != 0 {
            return Err(ShapeError::WidthNotTiled { width: self.width, tile: SPATIAL_TILE });
        }
        if self.input_channels == 0 || self.input_channels % INPUT_CHANNEL_TILE != 0 {
            return Err(ShapeError::ChannelsNotTiled {
                dim: "input_channels",
                count: self.input_channels,
                tile: INPUT_CHANNEL_TILE,
            });
        }
        if self.input_channels > MAX_INPUT_CHANNELS {
            return Err(ShapeError::AccumulatorOverflow { count: self.input_channels, max: MAX_INPUT_CHANNELS });
        }
        if self.output_channels == 0 || self.output_channels % OUTPUT_CHANNEL_TILE != 0 {
            return Err(ShapeError::ChannelsNotTiled {
                dim: "output_channels",
                count: self.output_channels,
                tile: OUTPUT_CHANNEL_TILE,
            });
        }
        Ok(())
    }

    /// Elements in each activation source.
    pub fn activation_len(&self) -> usize { self.input_channels * self.width }
    pub fn weight_len(&self) -> usize { self.output_channels * 2 * self.input_channels }
    /// Elements in the skip tensor and in the output.
    pub fn output_len(&self) -> usize { self.output_channels * self.width }

    fn tile_len(&self) -> usize { OUTPUT_CHANNEL_TILE * self.width }
    fn tile_weight_len(&self) -> usize { 2 * self.input_channels * OUTPUT_CHANNEL_TILE }

    pub(crate) fn check(&self, a: usize, b: usize, weights: usize, skip: usize, output: usize) -> Result<(), ShapeError> {
        self.validate()?;
        check_len("activation_a", a, self.activation_len())?;
        check_len("activation_b", b, self.activation_len())?;
        check_len("weights", weights, self.weight_len())?;
        check_len("skip", skip, self.output_len())?;
        check_len("output", output, self.output_len())
    }
}

/// Residual element type. Signed and unsigned skip tensors run the same
/// kernel; only the widening differs.
pub trait SkipElement: Narrow {}

impl SkipElement for i8 {}
impl SkipElement for u8 {}

/// Runtime tag for the skip element type, used by case descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    #[default]
    Signed,
    Unsigned,
}

/// Position of `(channel, column)` in a channel-blocked activation buffer.
#[inline]
pub fn activation_index(width: usize, channel: usize, column: usize) -> usize {
    (channel / CHANNEL_GROUP) * width * CHANNEL_GROUP + column * CHANNEL_GROUP + channel % CHANNEL_GROUP
}

/// Position of `(channel, column)` in the skip/output buffers.
#[inline]
pub fn output_index(width: usize, channel: usize, column: usize) -> usize {
    (channel / OUTPUT_CHANNEL_TILE) * width * OUTPUT_CHANNEL_TILE
        + column * OUTPUT_CHANNEL_TILE
        + channel % OUTPUT_CHANNEL_TILE
}

/// Position of the weight linking input channel `ic` of `source` (0 = A,
/// 1 = B) to output channel `oc`.
#[inline]
pub fn weight_index(input_channels: usize, source: usize, oc: usize, ic: usize) -> usize {
    let blocks_per_source = input_channels / CHANNEL_GROUP;
    let block = source * blocks_per_source + ic / CHANNEL_GROUP;
    (oc / OUTPUT_CHANNEL_TILE) * 2 * blocks_per_source * WEIGHT_BLOCK
        + block * WEIGHT_BLOCK
        + (ic % CHANNEL_GROUP) * OUTPUT_CHANNEL_TILE
        + oc % OUTPUT_CHANNEL_TILE
}

/// Accumulate one source's channel groups into the bank for spatial tile `x`.
fn accumulate_source(bank: &mut AccumulatorBank, act: &[u8], weights: &[i8], width: usize, x: usize) {
    let group_stride = width * CHANNEL_GROUP;
    let tile_base = x * SPATIAL_TILE * CHANNEL_GROUP;
    for (g, block) in weights.chunks_exact(WEIGHT_BLOCK).enumerate() {
        let base = g * group_stride + tile_base;
        for (lane, acc) in bank.lanes.iter_mut().enumerate() {
            let off = base + lane * LANE_WIDTH;
            mmul_4x8x8(acc, &act[off..off + LANE_WIDTH], block);
        }
    }
}

/// Zero the bank and run both sources for spatial tile `x`.
fn accumulate_tile(bank: &mut AccumulatorBank, a: &[u8], b: &[u8], tile_weights: &[i8], width: usize, x: usize) {
    let (wa, wb) = tile_weights.split_at(tile_weights.len() / 2);
    bank.clear();
    accumulate_source(bank, a, wa, width, x);
    accumulate_source(bank, b, wb, width, x);
}

#[inline]
fn fuse_lane<S: SkipElement>(acc: &[i32; LANE_WIDTH], skip: &[S], out: &mut [u8], mac_scale: u32, skip_scale: u32) {
    for ((o, &sum), &residual) in out.iter_mut().zip(acc).zip(skip) {
        let mac: i8 = srs(sum as i64, mac_scale);
        *o = srs(residual.widen() as i64 + mac as i64, skip_scale);
    }
}

fn conv_output_tile<S: SkipElement>(
    oc_tile: usize,
    a: &[u8],
    b: &[u8],
    weights: &[i8],
    skip_tile: &[S],
    out_tile: &mut [u8],
    p: &ConvSkipParams,
) {
    let twl = p.tile_weight_len();
    let tile_weights = &weights[oc_tile * twl..(oc_tile + 1) * twl];
    let mut bank = AccumulatorBank::new();
    for x in 0..p.width / SPATIAL_TILE {
        accumulate_tile(&mut bank, a, b, tile_weights, p.width, x);
        for (lane, acc) in bank.lanes.iter().enumerate() {
            let off = (x * ACCUMULATOR_COUNT + lane) * LANE_WIDTH;
            fuse_lane(acc, &skip_tile[off..off + LANE_WIDTH], &mut out_tile[off..off + LANE_WIDTH], p.mac_scale, p.skip_scale);
        }
    }
}

/// Tiled 1x1 convolution of two activation sources, fused with a residual.
///
/// `output = srs_u8(skip + srs_i8(conv(A) + conv(B), mac_scale), skip_scale)`
/// elementwise. Shapes are validated up front; on error nothing is written.
pub fn convolve_with_skip<S: SkipElement>(
    activation_a: &[u8],
    activation_b: &[u8],
    weights: &[i8],
    skip: &[S],
    output: &mut [u8],
    params: &ConvSkipParams,
) -> Result<(), ShapeError> {
    params.check(activation_a.len(), activation_b.len(), weights.len(), skip.len(), output.len())?;
    trace!(
        "conv_skip: width={} ic={} oc={} mac_scale={} skip_scale={}",
        params.width, params.input_channels, params.output_channels, params.mac_scale, params.skip_scale
    );
    let tile_len = params.tile_len();
    let output = &mut output[..params.output_len()];
    for (t, out_tile) in output.chunks_exact_mut(tile_len).enumerate() {
        let skip_tile = &skip[t * tile_len..(t + 1) * tile_len];
        conv_output_tile(t, activation_a, activation_b, weights, skip_tile, out_tile, params);
    }
    Ok(())
}

/// Same result as [`convolve_with_skip`], with output-channel tiles computed
/// on the rayon pool. Tiles write disjoint output regions.
pub fn convolve_with_skip_par<S: SkipElement>(
    activation_a: &[u8],
    activation_b: &[u8],
    weights: &[i8],
    skip: &[S],
    output: &mut [u8],
    params: &ConvSkipParams,
) -> Result<(), ShapeError> {
    params.check(activation_a.len(), activation_b.len(), weights.len(), skip.len(), output.len())?;
    trace!(
        "conv_skip_par: width={} ic={} oc={} threads={}",
        params.width, params.input_channels, params.output_channels, rayon::current_num_threads()
    );
    let tile_len = params.tile_len();
    output[..params.output_len()]
        .par_chunks_exact_mut(tile_len)
        .enumerate()
        .for_each(|(t, out_tile)| {
            let skip_tile = &skip[t * tile_len..(t + 1) * tile_len];
            conv_output_tile(t, activation_a, activation_b, weights, skip_tile, out_tile, params);
        });
    Ok(())
}

/// Raw pre-quantization sums of both sources, in the output layout.
pub fn mac_accumulators(
    activation_a: &[u8],
    activation_b: &[u8],
    weights: &[i8],
    acc_out: &mut [i32],
    params: &ConvSkipParams,
) -> Result<(), ShapeError> {
    params.check(activation_a.len(), activation_b.len(), weights.len(), params.output_len(), acc_out.len())?;
    let tile_len = params.tile_len();
    let twl = params.tile_weight_len();
    let mut bank = AccumulatorBank::new();
    for (t, acc_tile) in acc_out[..params.output_len()].chunks_exact_mut(tile_len).enumerate() {
        let tile_weights = &weights[t * twl..(t + 1) * twl];
        for x in 0..params.width / SPATIAL_TILE {
            accumulate_tile(&mut bank, activation_a, activation_b, tile_weights, params.width, x);
            for (lane, acc) in bank.lanes.iter().enumerate() {
                let off = (x * ACCUMULATOR_COUNT + lane) * LANE_WIDTH;
                acc_tile[off..off + LANE_WIDTH].copy_from_slice(acc);
            }
        }
    }
    Ok(())
}
