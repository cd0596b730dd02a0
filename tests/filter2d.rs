use pretty_assertions::assert_eq;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tilekern::kernels::quant::srs;
use tilekern::kernels::reference::filter2d_reference;
use tilekern::kernels::{filter2d_image, filter2d_three_rows, pack_kernel};
use tilekern::ShapeError;

const UNIT: i16 = 1 << 12;

fn single_tap(row: usize, col: usize, gain: i16) -> [i16; 9] {
    let mut k = [0i16; 9];
    k[row * 3 + col] = gain;
    k
}

fn run_row(row: &[u8], kernel: &[i16; 9]) -> Vec<u8> {
    let mut out = vec![0u8; row.len()];
    filter2d_three_rows(row, row, row, &mut out, row.len(), kernel).unwrap();
    out
}

#[test]
fn packed_kernel_uses_eight_point_stride() {
    let k = [256, 512, 768, -256, 4096, 0, 1, 255, -32768];
    let packed = pack_kernel(&k).0;
    assert_eq!(&packed[0..8], &[1, 2, 3, 0, 0, 0, 0, 0]);
    assert_eq!(&packed[8..16], &[-1, 16, 0, 0, 0, 0, 0, 0]);
    assert_eq!(&packed[16..24], &[0, 0, -128, 0, 0, 0, 0, 0]);
    assert!(packed[24..].iter().all(|&c| c == 0));
}

#[test]
fn constant_image_stays_constant_at_borders() {
    let k = [256i16; 9];
    for width in [64usize, 96, 128] {
        let row = vec![100u8; width];
        let out = run_row(&row, &k);
        let want = srs::<u8>(9 * 100, 4);
        assert!(out.iter().all(|&v| v == want), "width {}: {:?}", width, out);
    }
}

#[test]
fn identity_kernel_reproduces_ramp() {
    let row: Vec<u8> = (0..64).map(|i| (i % 32) as u8).collect();
    assert_eq!(run_row(&row, &single_tap(1, 1, UNIT)), row);
}

#[test]
fn coefficient_precision_reduction_scales_output() {
    // 256 keeps only 1 after the >> 8, so the output is x / 16 rounded half up
    let row: Vec<u8> = (0..128).map(|i| (i * 2) as u8).collect();
    let want: Vec<u8> = row.iter().map(|&x| ((x as u32 + 8) >> 4) as u8).collect();
    assert_eq!(run_row(&row, &single_tap(1, 1, 256)), want);
}

#[test]
fn left_neighbour_tap_shifts_right_with_replicated_first_column() {
    let width = 160;
    let row: Vec<u8> = (0..width).map(|i| (i + 1) as u8).collect();
    let out = run_row(&row, &single_tap(1, 0, UNIT));
    let mut want = vec![row[0]];
    want.extend_from_slice(&row[..width - 1]);
    assert_eq!(out, want);
}

#[test]
fn right_neighbour_tap_shifts_left_with_replicated_last_column() {
    let width = 160;
    let row: Vec<u8> = (0..width).map(|i| (i + 1) as u8).collect();
    let out = run_row(&row, &single_tap(1, 2, UNIT));
    let mut want = row[1..].to_vec();
    want.push(row[width - 1]);
    assert_eq!(out, want);
}

#[test]
fn rows_are_weighted_by_their_kernel_row() {
    let width = 64;
    let r0 = vec![10u8; width];
    let r1 = vec![20u8; width];
    let r2 = vec![30u8; width];
    let mut out = vec![0u8; width];
    filter2d_three_rows(&r0, &r1, &r2, &mut out, width, &single_tap(2, 1, UNIT)).unwrap();
    assert!(out.iter().all(|&v| v == 30));
    filter2d_three_rows(&r0, &r1, &r2, &mut out, width, &single_tap(0, 1, UNIT)).unwrap();
    assert!(out.iter().all(|&v| v == 10));
}

#[test]
fn saturates_to_u8_range() {
    let row = vec![255u8; 64];
    assert!(run_row(&row, &[UNIT; 9]).iter().all(|&v| v == 255));
    assert!(run_row(&row, &[-UNIT; 9]).iter().all(|&v| v == 0));
}

#[test]
fn image_matches_reference_on_random_data() {
    let mut rng = SmallRng::seed_from_u64(42);
    for (width, height) in [(64usize, 1usize), (96, 5), (160, 7)] {
        let image: Vec<u8> = (0..width * height).map(|_| rng.gen()).collect();
        let kernel: [i16; 9] = std::array::from_fn(|_| rng.gen_range(-1024..=1024));
        let mut got = vec![0u8; width * height];
        let mut want = vec![0u8; width * height];
        filter2d_image(&image, &mut got, width, height, &kernel).unwrap();
        filter2d_reference(&image, &mut want, width, height, &kernel);
        assert_eq!(got, want, "{}x{}", width, height);
    }
}

#[test]
fn image_duplicates_top_and_bottom_rows() {
    let (width, height) = (64, 4);
    let image: Vec<u8> = (0..width * height).map(|i| (i / width * 10) as u8).collect();
    let mut out = vec![0u8; width * height];
    filter2d_image(&image, &mut out, width, height, &single_tap(0, 1, UNIT)).unwrap();
    let rows: Vec<u8> = out.chunks(width).map(|r| r[0]).collect();
    assert_eq!(rows, vec![0, 0, 10, 20]);
    filter2d_image(&image, &mut out, width, height, &single_tap(2, 1, UNIT)).unwrap();
    let rows: Vec<u8> = out.chunks(width).map(|r| r[0]).collect();
    assert_eq!(rows, vec![10, 20, 30, 30]);
}

#[test]
fn short_or_untiled_rows_are_rejected() {
    let row = vec![0u8; 128];
    let mut out = vec![0u8; 128];
    let k = single_tap(1, 1, UNIT);
    assert_eq!(
        filter2d_three_rows(&row, &row, &row, &mut out, 48, &k).unwrap_err(),
        ShapeError::WidthNotTiled { width: 48, tile: 32 }
    );
    assert_eq!(
        filter2d_three_rows(&row, &row, &row, &mut out, 32, &k).unwrap_err(),
        ShapeError::RowTooShort { width: 32, min: 64 }
    );
    assert_eq!(
        filter2d_three_rows(&row, &row[..63], &row, &mut out, 64, &k).unwrap_err(),
        ShapeError::BufferTooSmall { buffer: "row1", needed: 64, got: 63 }
    );
    assert_eq!(
        filter2d_image(&row, &mut out, 64, 3, &k).unwrap_err(),
        ShapeError::BufferTooSmall { buffer: "image", needed: 192, got: 128 }
    );
    assert_eq!(
        filter2d_image(&row, &mut out, 64, usize::MAX, &k).unwrap_err(),
        ShapeError::BufferTooSmall { buffer: "image", needed: usize::MAX, got: 128 }
    );
}
