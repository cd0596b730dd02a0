pub mod quant;
pub mod vector;
pub mod conv_skip;
pub mod filter2d;
pub mod reference;

pub use conv_skip::{
    convolve_with_skip, convolve_with_skip_par, mac_accumulators, ConvSkipParams, SkipElement, SkipKind,
    MAX_INPUT_CHANNELS,
};
pub use filter2d::{filter2d_image, filter2d_three_rows, pack_kernel, PackedKernel};
pub use quant::{srs, Narrow};

// Tiling constants for the target vector unit. Everything below is derived
// from these; nothing else in the crate spells out a tile size.

/// Elements moved by one vector load/store.
pub const LANE_WIDTH: usize = 32;
/// Parallel accumulators per spatial tile.
pub const ACCUMULATOR_COUNT: usize = 8;
/// Output columns covered by one accumulator (rows of the 4x8x8 mmul).
pub const COLUMNS_PER_LANE: usize = 4;
/// Input channels consumed per weight block (contraction depth of the mmul).
pub const CHANNEL_GROUP: usize = 8;
/// Output channels produced per tile.
pub const OUTPUT_CHANNEL_TILE: usize = 8;
/// Granularity required of each activation source's channel count.
pub const INPUT_CHANNEL_TILE: usize = 16;
/// Columns covered by one accumulator bank.
pub const SPATIAL_TILE: usize = COLUMNS_PER_LANE * ACCUMULATOR_COUNT;
/// Weights per block: `CHANNEL_GROUP` inputs by `OUTPUT_CHANNEL_TILE` outputs.
pub const WEIGHT_BLOCK: usize = CHANNEL_GROUP * OUTPUT_CHANNEL_TILE;

/// Square stencil side of the filter engine.
pub const KERNEL_WIDTH: usize = 3;
/// Taps per sliding multiply; each stencil row is padded out to this stride.
pub const POINTS: usize = 8;
/// Fixed-point position of the 16-bit filter coefficients (unit gain is `1 << SRS_SHIFT`).
pub const SRS_SHIFT: u32 = 12;
