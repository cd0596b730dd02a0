//! 3x3 filter over a three-row window with replicated borders.
//!
//! A row is processed in `LANE_WIDTH` segments: the first and last segments
//! extend the image by replicating the edge column, interior segments borrow
//! the neighbouring column from the previous segment. Coefficients are 16-bit
//! fixed point with unit gain at `1 << SRS_SHIFT`.

use log::trace;
use rayon::prelude::*;

use super::quant::{reduce_coefficient, srs};
use super::vector::{insert, shuffle_down_replicate, shuffle_up_fill, shuffle_up_replicate, sliding_mac, Window, WINDOW};
use super::{KERNEL_WIDTH, LANE_WIDTH, POINTS, SRS_SHIFT};
use crate::error::{check_len, ShapeError};

pub const KERNEL_RADIUS: usize = KERNEL_WIDTH / 2;
/// Narrowest row the edge/interior split is defined for.
pub const MIN_WIDTH: usize = 2 * LANE_WIDTH;
/// Output shift after the coefficients lost their low byte.
pub const OUTPUT_SHIFT: u32 = SRS_SHIFT - 8;

/// Coefficients laid out for the sliding multiply: row `j` starts at
/// `j * POINTS`, unused taps are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedKernel(pub [i8; LANE_WIDTH]);

pub fn pack_kernel(kernel: &[i16; KERNEL_WIDTH * KERNEL_WIDTH]) -> PackedKernel {
    let mut v = [0i8; LANE_WIDTH];
    for j in 0..KERNEL_WIDTH {
        for i in 0..KERNEL_WIDTH {
            v[j * POINTS + i] = reduce_coefficient(kernel[j * KERNEL_WIDTH + i]);
        }
    }
    PackedKernel(v)
}

fn check_row_width(width: usize) -> Result<(), ShapeError> {
    if width == 0 || width % LANE_WIDTH != 0 {
        return Err(ShapeError::WidthNotTiled { width, tile: LANE_WIDTH });
    }
    if width < MIN_WIDTH {
        return Err(ShapeError::RowTooShort { width, min: MIN_WIDTH });
    }
    Ok(())
}

fn store_segment(coeffs: &PackedKernel, windows: &[Window; KERNEL_WIDTH], out: &mut [u8]) {
    let mut acc = [0i32; LANE_WIDTH];
    for (j, w) in windows.iter().enumerate() {
        sliding_mac(&mut acc, &coeffs.0, j * POINTS, w);
    }
    for (o, &a) in out.iter_mut().zip(&acc) {
        *o = srs(a as i64, OUTPUT_SHIFT);
    }
}

/// Filter one output row from the rows above, at, and below it.
///
/// `width` must be a multiple of `LANE_WIDTH` and at least `MIN_WIDTH`.
/// Top/bottom edge handling is the caller's choice of rows; see
/// [`filter2d_image`] for the replicate policy.
pub fn filter2d_three_rows(
    row0: &[u8],
    row1: &[u8],
    row2: &[u8],
    output: &mut [u8],
    width: usize,
    kernel: &[i16; KERNEL_WIDTH * KERNEL_WIDTH],
) -> Result<(), ShapeError> {
    check_row_width(width)?;
    check_len("row0", row0.len(), width)?;
    check_len("row1", row1.len(), width)?;
    check_len("row2", row2.len(), width)?;
    check_len("output", output.len(), width)?;
    trace!("filter2d: width={}", width);

    let coeffs = pack_kernel(kernel);
    let rows = [row0, row1, row2];
    let segments = width / LANE_WIDTH;
    let mut windows = [[0u8; WINDOW]; KERNEL_WIDTH];
    // High half holds the previous segment; its last lane is the left neighbour.
    let mut prev = [[0u8; WINDOW]; KERNEL_WIDTH];

    // left edge: replicate column 0
    for (r, row) in rows.iter().enumerate() {
        let w = &mut windows[r];
        insert(w, 0, row);
        insert(w, 1, &row[LANE_WIDTH..]);
        insert(&mut prev[r], 1, row);
        *w = shuffle_up_replicate(w, KERNEL_RADIUS);
    }
    store_segment(&coeffs, &windows, &mut output[..LANE_WIDTH]);

    for s in 1..segments - 1 {
        let seg = s * LANE_WIDTH;
        for (r, row) in rows.iter().enumerate() {
            let w = &mut windows[r];
            insert(w, 0, &row[seg..]);
            insert(w, 1, &row[seg + LANE_WIDTH..]);
            let shifted = shuffle_up_fill(w, &prev[r], KERNEL_RADIUS);
            insert(&mut prev[r], 1, &row[seg..]);
            *w = shifted;
        }
        store_segment(&coeffs, &windows, &mut output[seg..seg + LANE_WIDTH]);
    }

    // right edge: replicate the last column
    let seg = (segments - 1) * LANE_WIDTH;
    for (r, row) in rows.iter().enumerate() {
        let w = &mut windows[r];
        insert(w, 1, &row[seg..]);
        let tail = shuffle_down_replicate(w, LANE_WIDTH);
        *w = shuffle_up_fill(&tail, &prev[r], KERNEL_RADIUS);
    }
    store_segment(&coeffs, &windows, &mut output[seg..seg + LANE_WIDTH]);
    Ok(())
}

/// Filter a whole `height x width` image, duplicating the first and last
/// rows at the top and bottom borders. Rows run in parallel on the rayon pool.
pub fn filter2d_image(
    image: &[u8],
    output: &mut [u8],
    width: usize,
    height: usize,
    kernel: &[i16; KERNEL_WIDTH * KERNEL_WIDTH],
) -> Result<(), ShapeError> {
    check_row_width(width)?;
    // no buffer can hold an image whose size overflows usize
    let len = width
        .checked_mul(height)
        .ok_or(ShapeError::BufferTooSmall { buffer: "image", needed: usize::MAX, got: image.len() })?;
    check_len("image", image.len(), len)?;
    check_len("output", output.len(), len)?;
    trace!("filter2d_image: {}x{}", width, height);

    let row = |y: usize| &image[y * width..(y + 1) * width];
    output[..len]
        .par_chunks_exact_mut(width)
        .enumerate()
        .try_for_each(|(y, out_row)| {
            let above = y.saturating_sub(1);
            let below = (y + 1).min(height - 1);
            filter2d_three_rows(row(above), row(y), row(below), out_row, width, kernel)
        })
}
