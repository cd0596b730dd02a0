//! Vector-unit primitives the tiled kernels are written against.
//!
//! Each function stands in for one coprocessor instruction; the scalar loops
//! are emulation only. Callers keep the register discipline of the device:
//! operands are loaded whole, accumulators stay wide until the final shift.

use super::{ACCUMULATOR_COUNT, CHANNEL_GROUP, COLUMNS_PER_LANE, LANE_WIDTH, OUTPUT_CHANNEL_TILE, POINTS};

/// Two concatenated `LANE_WIDTH` segments, the operand of the shuffle ops.
pub const WINDOW: usize = 2 * LANE_WIDTH;

pub type Window = [u8; WINDOW];

/// Write one `LANE_WIDTH` segment into the low (`half = 0`) or high half.
#[inline]
pub fn insert(window: &mut Window, half: usize, segment: &[u8]) {
    let base = half * LANE_WIDTH;
    window[base..base + LANE_WIDTH].copy_from_slice(&segment[..LANE_WIDTH]);
}

/// Move every lane up by `n`; the vacated low lanes copy lane 0.
pub fn shuffle_up_replicate(v: &Window, n: usize) -> Window {
    let mut out = [v[0]; WINDOW];
    out[n..].copy_from_slice(&v[..WINDOW - n]);
    out
}

/// Move every lane up by `n`; the vacated low lanes take the top `n` lanes of `fill`.
pub fn shuffle_up_fill(v: &Window, fill: &Window, n: usize) -> Window {
    let mut out = [0u8; WINDOW];
    out[..n].copy_from_slice(&fill[WINDOW - n..]);
    out[n..].copy_from_slice(&v[..WINDOW - n]);
    out
}

/// Move every lane down by `n`; the vacated high lanes copy the last lane.
pub fn shuffle_down_replicate(v: &Window, n: usize) -> Window {
    let mut out = [v[WINDOW - 1]; WINDOW];
    out[..WINDOW - n].copy_from_slice(&v[n..]);
    out
}

/// Sliding multiply: `acc[l] += sum_p coeff[coeff_start + p] * data[l + p]`
/// over `POINTS` taps, for all `LANE_WIDTH` output lanes.
#[inline]
pub fn sliding_mac(acc: &mut [i32; LANE_WIDTH], coeffs: &[i8; LANE_WIDTH], coeff_start: usize, data: &Window) {
    let taps = &coeffs[coeff_start..coeff_start + POINTS];
    for (l, slot) in acc.iter_mut().enumerate() {
        let window = &data[l..l + POINTS];
        let mut sum = 0i32;
        for (c, d) in taps.iter().zip(window) {
            sum += (*c as i32) * (*d as i32);
        }
        *slot += sum;
    }
}

/// `acc(4x8) += a(4x8, u8) * b(8x8, i8)`, all row-major.
///
/// Rows of `a` are output columns, its columns are input channels; `b` is
/// indexed `[input channel][output channel]`.
#[inline]
pub fn mmul_4x8x8(acc: &mut [i32; LANE_WIDTH], a: &[u8], b: &[i8]) {
    for m in 0..COLUMNS_PER_LANE {
        let a_row = &a[m * CHANNEL_GROUP..(m + 1) * CHANNEL_GROUP];
        let acc_row = &mut acc[m * OUTPUT_CHANNEL_TILE..(m + 1) * OUTPUT_CHANNEL_TILE];
        for (k, &av) in a_row.iter().enumerate() {
            let av = av as i32;
            let b_row = &b[k * OUTPUT_CHANNEL_TILE..(k + 1) * OUTPUT_CHANNEL_TILE];
            for (slot, &bv) in acc_row.iter_mut().zip(b_row) {
                *slot += av * bv as i32;
            }
        }
    }
}

/// Wide accumulators for one spatial tile, one row of `LANE_WIDTH` per lane.
#[derive(Clone)]
pub struct AccumulatorBank {
    pub lanes: [[i32; LANE_WIDTH]; ACCUMULATOR_COUNT],
}

impl AccumulatorBank {
    pub fn new() -> Self { Self { lanes: [[0; LANE_WIDTH]; ACCUMULATOR_COUNT] } }
    pub fn clear(&mut self) { for lane in &mut self.lanes { *lane = [0; LANE_WIDTH]; } }
}

impl Default for AccumulatorBank {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Window {
        let mut w = [0u8; WINDOW];
        for (i, v) in w.iter_mut().enumerate() { *v = i as u8; }
        w
    }

    #[test]
    fn shuffle_up_replicate_copies_first_lane() {
        let out = shuffle_up_replicate(&ramp(), 1);
        assert_eq!(&out[..4], &[0, 0, 1, 2]);
        assert_eq!(out[WINDOW - 1], (WINDOW - 2) as u8);
    }

    #[test]
    fn shuffle_up_fill_pulls_from_top_of_fill() {
        let mut fill = [9u8; WINDOW];
        fill[WINDOW - 1] = 77;
        let out = shuffle_up_fill(&ramp(), &fill, 1);
        assert_eq!(&out[..3], &[77, 0, 1]);
    }

    #[test]
    fn shuffle_down_replicate_copies_last_lane() {
        let out = shuffle_down_replicate(&ramp(), LANE_WIDTH);
        assert_eq!(out[0], LANE_WIDTH as u8);
        assert_eq!(out[LANE_WIDTH - 1], (WINDOW - 1) as u8);
        assert!(out[LANE_WIDTH..].iter().all(|&v| v == (WINDOW - 1) as u8));
    }

    #[test]
    fn sliding_mac_applies_taps_per_lane() {
        let mut coeffs = [0i8; LANE_WIDTH];
        coeffs[8] = 1;
        coeffs[9] = 2;
        coeffs[10] = -1;
        let mut acc = [0i32; LANE_WIDTH];
        sliding_mac(&mut acc, &coeffs, 8, &ramp());
        // l*1 + (l+1)*2 - (l+2) = 2l
        for (l, v) in acc.iter().enumerate() {
            assert_eq!(*v, 2 * l as i32);
        }
    }

    #[test]
    fn mmul_matches_matrix_product() {
        let mut a = [0u8; LANE_WIDTH];
        for (i, v) in a.iter_mut().enumerate() { *v = (i % 5) as u8; }
        let mut b = [0i8; CHANNEL_GROUP * OUTPUT_CHANNEL_TILE];
        for (i, v) in b.iter_mut().enumerate() { *v = (i as i32 % 7 - 3) as i8; }
        let mut acc = [0i32; LANE_WIDTH];
        mmul_4x8x8(&mut acc, &a, &b);
        for m in 0..COLUMNS_PER_LANE {
            for n in 0..OUTPUT_CHANNEL_TILE {
                let mut want = 0i32;
                for k in 0..CHANNEL_GROUP {
                    want += a[m * 8 + k] as i32 * b[k * 8 + n] as i32;
                }
                assert_eq!(acc[m * 8 + n], want, "m={} n={}", m, n);
            }
        }
    }

    #[test]
    fn bank_clear_zeroes_every_lane() {
        let mut bank = AccumulatorBank::new();
        bank.lanes[3][7] = 42;
        bank.clear();
        assert!(bank.lanes.iter().all(|l| l.iter().all(|&v| v == 0)));
    }
}
