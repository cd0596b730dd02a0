use tilekern::kernels::quant::{round_shift, srs};

#[test]
fn srs_matches_round_half_up_division() {
    for s in 0..8u32 {
        for v in -2000i64..2000 {
            let exact = v as f64 / (1u64 << s) as f64;
            let want = (exact + 0.5).floor() as i64;
            assert_eq!(round_shift(v, s), want, "v={} s={}", v, s);
            assert_eq!(srs::<i8>(v, s) as i64, want.clamp(-128, 127), "i8 v={} s={}", v, s);
            assert_eq!(srs::<u8>(v, s) as i64, want.clamp(0, 255), "u8 v={} s={}", v, s);
        }
    }
}

#[test]
fn exact_half_values_round_up() {
    // 0.5, 2.5, -0.5, -2.5 at shift 1
    assert_eq!(srs::<i8>(1, 1), 1);
    assert_eq!(srs::<i8>(5, 1), 3);
    assert_eq!(srs::<i8>(-1, 1), 0);
    assert_eq!(srs::<i8>(-5, 1), -2);
}

#[test]
fn clamp_thresholds() {
    assert_eq!(srs::<i8>(127, 0), 127);
    assert_eq!(srs::<i8>(128, 0), 127);
    assert_eq!(srs::<i8>(-128, 0), -128);
    assert_eq!(srs::<i8>(-129, 0), -128);
    assert_eq!(srs::<u8>(255, 0), 255);
    assert_eq!(srs::<u8>(256, 0), 255);
    // 255.5 rounds to 256, then saturates
    assert_eq!(srs::<u8>(511, 1), 255);
}

#[test]
fn extreme_inputs_saturate() {
    assert_eq!(srs::<u8>(i64::MAX, 1), 255);
    assert_eq!(srs::<i8>(i64::MAX - 1, 4), 127);
    assert_eq!(srs::<i8>(i64::MAX, 62), 2);
    assert_eq!(srs::<i8>(i64::MAX, 64), 0);
    assert_eq!(srs::<i8>(i64::MIN, 200), 0);
    assert_eq!(srs::<i8>(i64::MIN, 3), -128);
    assert_eq!(srs::<u8>(i64::MIN, 1), 0);
    assert_eq!(round_shift(i64::MIN, 1), i64::MIN / 2);
}
